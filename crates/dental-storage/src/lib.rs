//! # 牙科存储模块
//!
//! 负责照片文件的本地存储、读取和删除。

pub mod storage;

pub use storage::*;
