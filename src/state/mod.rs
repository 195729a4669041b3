pub mod cache;

pub use cache::{CacheStats, QueryCache};
