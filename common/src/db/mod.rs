// Redis connection layer

pub mod redis;
pub mod shared;

pub use self::redis::{ClientOptions, RedisHandle};
pub use shared::{Memoized, SharedRedis};
