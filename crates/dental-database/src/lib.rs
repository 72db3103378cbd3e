//! # 牙科数据库模块
//!
//! 负责患者、治疗、照片、AI分析和用户数据的持久化。对外暴露仓储 trait，
//! 提供 PostgreSQL 实现和内存实现两种后端。

pub mod connection;
pub mod memory;
pub mod models;
pub mod queries;
pub mod repository;

// 重新导出主要类型
pub use connection::{ConnectionSettings, DatabasePool};
pub use memory::InMemoryStore;
pub use queries::DatabaseQueries;
pub use repository::{
    AnalysisRepository, HealthCheck, PatientRepository, PhotoRepository, Repositories,
    TreatmentRepository, UserRepository,
};
