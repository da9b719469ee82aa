//! Impls - ports の実装（開発用・テスト用）
//!
//! A production deployment plugs a Redis client into the store ports; this
//! module only carries the in-memory backend used by tests and the demo binary.

pub mod memory;

pub use self::memory::InMemoryStore;
