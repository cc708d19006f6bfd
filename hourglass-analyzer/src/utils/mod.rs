//! Utility modules for hourglass-analyzer

pub mod retry;

pub use retry::{retry_transient, Backoff, RetryError, RetryPolicy, Transient};
