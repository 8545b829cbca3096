//! Anti-automation challenges: an image with a small numeric answer.

mod model;
mod store;

pub use model::{Challenge, ChallengeAnswer, ChallengeId, ChallengeImage, ImageGenerator, Payload};
pub use store::{ChallengeStore, ChallengeStoreHandle};
