pub mod entities;
pub mod enums;
pub mod memory_store;
pub mod services;
pub mod store;
pub mod target;

pub use memory_store::MemoryStore;
pub use store::{DbStore, MonitorStore, StoreError};
pub use target::{Monitor, MonitorTarget, TargetRef};
