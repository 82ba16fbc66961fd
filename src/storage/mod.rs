pub mod local_store;
pub mod storage_manager;

pub use local_store::LocalStorage;
pub use storage_manager::StorageManager;
