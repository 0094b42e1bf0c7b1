//! ConnectionRegistry の実装
//!
//! - `inmemory`: 単一プロセス内の HashMap による実装

pub mod inmemory;

pub use inmemory::InMemoryConnectionRegistry;
