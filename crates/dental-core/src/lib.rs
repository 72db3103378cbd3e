//! # Dental Core
//!
//! 牙科诊所管理系统的核心模块，提供领域模型、状态枚举、请求校验和统一错误定义。

pub mod error;
pub mod models;
pub mod utils;
pub mod validation;

pub use error::{DentalError, Result};
pub use models::*;
