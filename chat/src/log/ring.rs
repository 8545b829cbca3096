use crate::accounts::{UserId, SYSTEM_USER};

/// Slots in the production log. Sequence numbers are `u16`, so a full ring
/// uses every one of them.
pub const LOG_CAPACITY: usize = 1 << 16;

pub const STARTUP_TEXT: &str = "Chat server started.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub sequence: u16,
    pub timestamp: i64,
    pub author: UserId,
    pub text: String,
}

/// A `(sequence, timestamp)` bookmark. The timestamp disambiguates a slot that
/// has been overwritten since the client last saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
    pub sequence: u16,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Window {
    /// Entries newer than the bookmark, oldest first, plus the new bookmark.
    Entries {
        entries: Vec<ChatEntry>,
        cursor: Cursor,
    },
    /// The bookmark no longer matches the log; restart from this one.
    Resync(Cursor),
    NoNews,
}

/// Circular buffer of chat entries. Slot `i` holds the entry whose sequence is
/// `i`; once the ring has wrapped every slot holds a live entry.
#[derive(Debug)]
pub struct RingChatLog {
    slots: Vec<Option<ChatEntry>>,
    first: usize,
    last: usize,
    first_timestamp: i64,
    last_timestamp: i64,
    has_wrapped: bool,
}

impl RingChatLog {
    /// A production-sized log opened at `now` with the startup entry in slot 0.
    pub fn new(now: i64) -> Self {
        Self::with_capacity(LOG_CAPACITY, now)
    }

    /// `capacity` is clamped to `2..=LOG_CAPACITY`.
    pub fn with_capacity(capacity: usize, now: i64) -> Self {
        let capacity = capacity.clamp(2, LOG_CAPACITY);
        let mut slots = vec![None; capacity];
        slots[0] = Some(ChatEntry {
            sequence: 0,
            timestamp: now,
            author: SYSTEM_USER,
            text: STARTUP_TEXT.to_string(),
        });
        Self {
            slots,
            first: 0,
            last: 0,
            first_timestamp: now,
            last_timestamp: now,
            has_wrapped: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn has_wrapped(&self) -> bool {
        self.has_wrapped
    }

    /// Number of entries currently retained.
    pub fn len(&self) -> usize {
        if self.has_wrapped {
            self.capacity()
        } else {
            self.last + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn head(&self) -> Cursor {
        cursor(self.first, self.first_timestamp)
    }

    pub fn tail(&self) -> Cursor {
        cursor(self.last, self.last_timestamp)
    }

    /// Writes the next slot, overwriting the oldest entry once the ring is full.
    ///
    /// Timestamps never go backwards: a clock step back is absorbed by reusing
    /// the newest timestamp.
    pub fn append(&mut self, author: UserId, text: String, now: i64) -> ChatEntry {
        let timestamp = now.max(self.last_timestamp);
        if self.last == self.capacity() - 1 {
            self.has_wrapped = true;
        }
        let slot = self.next(self.last);
        let entry = ChatEntry {
            sequence: slot as u16,
            timestamp,
            author,
            text,
        };
        self.slots[slot] = Some(entry.clone());
        self.last = slot;
        self.last_timestamp = timestamp;

        if self.has_wrapped {
            self.first = self.next(slot);
            self.first_timestamp = self.timestamp_at(self.first).unwrap_or(timestamp);
        }
        entry
    }

    /// Everything a client holding `known` has not seen yet.
    pub fn window_since(&self, known: Cursor) -> Window {
        if known.timestamp > self.last_timestamp {
            return Window::NoNews;
        }

        let slot = usize::from(known.sequence);
        match self.timestamp_at(slot) {
            // Never written: the client invented this bookmark.
            None => return Window::Resync(self.tail()),
            Some(timestamp) if timestamp != known.timestamp => {
                return Window::Resync(cursor(slot, timestamp))
            }
            Some(_) => {}
        }

        let start = if known.timestamp < self.first_timestamp {
            self.first
        } else if slot == self.last {
            return Window::NoNews;
        } else {
            self.next(slot)
        };

        let entries = self.collect_from(start);
        if entries.is_empty() {
            return Window::NoNews;
        }
        Window::Entries {
            entries,
            cursor: self.tail(),
        }
    }

    /// The retained entries, oldest first.
    pub fn retained(&self) -> Vec<ChatEntry> {
        self.collect_from(self.first)
    }

    fn collect_from(&self, start: usize) -> Vec<ChatEntry> {
        let mut entries = Vec::new();
        let mut slot = start;
        loop {
            if let Some(entry) = &self.slots[slot] {
                entries.push(entry.clone());
            }
            if slot == self.last {
                return entries;
            }
            slot = self.next(slot);
        }
    }

    fn timestamp_at(&self, slot: usize) -> Option<i64> {
        self.slots
            .get(slot)
            .and_then(|entry| entry.as_ref())
            .map(|entry| entry.timestamp)
    }

    fn next(&self, slot: usize) -> usize {
        (slot + 1) % self.capacity()
    }
}

fn cursor(slot: usize, timestamp: i64) -> Cursor {
    Cursor {
        sequence: slot as u16,
        timestamp,
    }
}
