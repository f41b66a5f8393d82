pub mod authenticity;
pub mod idempotency;

/// Upper bound on request bodies buffered by the guards.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;
