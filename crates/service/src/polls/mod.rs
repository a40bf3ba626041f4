//! Poll vote storage: document codec, the store itself, and the catalog of known polls.

pub mod catalog;
pub mod document;
pub mod store;

pub use document::{OptionTally, Votes};
pub use store::VoteStore;
