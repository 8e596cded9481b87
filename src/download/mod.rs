//! Download Engine (C5). See `engine.rs` for the implementation and
//! spec.md §4.5 for the contract.

pub mod engine;
pub mod error;
pub mod naming;
pub mod progress;
pub mod retry;

pub use engine::{AttemptOutcome, DownloadEngine};
pub use error::DownloadError;
pub use progress::DownloadProgress;
