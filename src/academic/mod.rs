//! 学业状态：数据类型、存储抽象与内存实现

pub mod keys;
pub mod memory;
pub mod store;
pub mod types;

pub use memory::InMemoryAcademicStore;
pub use store::AcademicStore;
pub use types::*;
