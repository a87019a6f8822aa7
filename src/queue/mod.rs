//! Karaoke line state shared by both bots

/// Session record and signup stages
pub mod session;
/// Lock-guarded session store
pub mod store;

pub use session::{Session, Stage, UserProfile};
pub use store::{QueueStore, SelectOutcome};
