//! Runtime environment helpers
//!
//! Thin wrapper around `common::env` to keep binary crates importing
//! `service::runtime::ensure_env` without depending directly on `common`.

/// Ensure the data directory exists; note whether the vote file is there yet.
pub async fn ensure_env(data_dir: &str, votes_file: &str) -> anyhow::Result<()> {
    common::env::ensure_env(data_dir, votes_file).await
}

/// Resolve a configured file name against the data directory.
pub fn data_path(data_dir: &str, file: &str) -> String {
    common::env::resolve_in(data_dir, file)
}
