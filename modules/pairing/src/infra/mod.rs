pub mod locks;
pub mod storage;
