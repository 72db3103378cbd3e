//! 错误定义模块

use thiserror::Error;

/// 牙科系统统一错误类型
#[derive(Error, Debug)]
pub enum DentalError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("未认证: {0}")]
    Unauthorized(String),

    #[error("权限错误: {0}")]
    Permission(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("资源冲突: {0}")]
    Conflict(String),

    #[error("系统内部错误: {0}")]
    Internal(String),

    #[error("无效状态转换: {entity} 从 {from} 经 {event}")]
    InvalidStateTransition {
        entity: &'static str,
        from: String,
        event: String,
    },
}

impl DentalError {
    /// 构造"未找到"错误
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DentalError::NotFound(format!("{} {} not found", entity, id))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for DentalError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DentalError::NotFound(err.to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DentalError::Conflict(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DentalError::Validation(db_err.message().to_string())
            }
            _ => DentalError::Database(err.to_string()),
        }
    }
}

/// 牙科系统统一结果类型
pub type Result<T> = std::result::Result<T, DentalError>;
