//! 记忆层：长期记忆接口（save / query）与实现

pub mod sqlite;
pub mod store;

pub use sqlite::SqliteMemory;
pub use store::{KeywordMemory, MemoryRecord, MemoryStore, NoopMemory};
