//! Ports - 抽象化レイヤー
//!
//! Storage and time are the two things the runtime does not own. Both are
//! traits here; concrete implementations live in `impls` (in-memory) or in
//! the embedding application (a real Redis client).

pub mod clock;
pub mod store;

pub use self::clock::{Clock, FixedClock, SystemClock, format_timestamp};
pub use self::store::{CounterStore, HashStore, KeyValueStore, QueueStore, SetStore, Stores};
