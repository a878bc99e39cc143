//! File actions module.
//!
//! Currently a single action: removing duplicate copies, either permanently
//! or to the system trash, while keeping the index consistent with what is
//! actually left on disk. See [`delete`].

pub mod delete;

pub use delete::{DeleteError, DeleteMethod, DeleteOutcome, Deleter};
