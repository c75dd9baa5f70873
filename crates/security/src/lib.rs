//! Security primitives for the gosuto ACP surface: idempotent replay,
//! dual-level event rate limiting, webhook HMAC authentication, and
//! secret-lease redemption.

pub mod idempotency;
pub mod ratelimit;
pub mod redeemer;
pub mod webhook;

pub use idempotency::{CachedResponse, IdempotencyCache};
pub use ratelimit::EventRateLimiter;
pub use redeemer::{redeem, RedeemerError, SecretLease};
pub use webhook::{compute_hmac_sha256, validate_hmac_sha256, wrap_raw_webhook_body};
