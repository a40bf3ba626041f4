//! Service layer for the marketing site backend.
//! - Poll vote store with crash-safe whole-document writes.
//! - Review moderation store on the same storage port.
//! - Storage adapters (JSON file, in-memory) and metrics.

pub mod errors;
pub mod metrics;
pub mod polls;
pub mod reviews;
pub mod runtime;
pub mod storage;
