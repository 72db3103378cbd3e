//! # 牙科管理模块
//!
//! 运维相关功能：配置加载与校验、日志初始化、Prometheus 指标

pub mod config;
pub mod logging;
pub mod monitoring;

pub use config::{
    AuthConfig, ConfigValidator, DatabaseConfig, DentalConfig, LogFormat, LoggingConfig,
    ServerConfig, StorageConfig,
};
pub use logging::init_logging;
pub use monitoring::Metrics;
