//! # 键值存储模块
//!
//! 键缓存与配额计数器共用的存储抽象：Redis 为生产后端，
//! 内存实现用于测试和单机评估。

mod client;
mod keys;
mod memory;
mod store;

pub use client::RedisStore;
pub use keys::CacheKey;
pub use memory::MemoryStore;
pub use store::KvStore;
