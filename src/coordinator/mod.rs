// ABOUTME: Coordinator module for bounding concurrent agent invocations.
// ABOUTME: Contains resource keys, concurrency config, and the per-key limiter.

mod limiter;
mod resource;

pub use limiter::ConcurrencyLimiter;
pub use resource::{ConcurrencyConfig, ConcurrencyLimit, DEFAULT_CONCURRENCY, ResourceKey};
