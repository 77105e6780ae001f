pub mod lru;
pub mod remote;

pub use lru::{LruConfig, LruTtlCache};
pub use remote::{RemoteCache, RemoteCacheConfig, DEFAULT_PREFIX};
