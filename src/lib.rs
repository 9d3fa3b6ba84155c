// library entry
pub mod balancer;
pub mod cancel;
pub mod client_ip;
pub mod config;
pub mod error;
pub mod limiter;
pub mod logging;
pub mod metrics;
pub mod storage;

#[cfg(test)]
pub mod test_utils;

// Re-export key components for convenience
pub use cancel::CancelToken;
pub use error::{LimiterError, Result};
pub use limiter::SlidingWindow;
pub use logging::init as init_logging;
pub use storage::{MemoryStorage, RedisStorage, Storage};
