//! 仓储接口
//!
//! 业务层只依赖这些 trait，具体后端可以是 PostgreSQL 或内存存储。

use async_trait::async_trait;
use dental_core::{
    Analysis, AnalysisStatus, Page, Patient, PatientFilter, PatientStatus, Photo, Result,
    Treatment, TreatmentFilter, TreatmentStatus, User,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::connection::DatabasePool;
use crate::memory::InMemoryStore;
use crate::queries::DatabaseQueries;

/// 患者仓储
#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn insert_patient(&self, patient: &Patient) -> Result<()>;
    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>>;
    async fn list_patients(&self, filter: &PatientFilter) -> Result<Page<Patient>>;
    /// 更新已有患者，不存在时返回 `NotFound`
    async fn update_patient(&self, patient: &Patient) -> Result<()>;
    /// 删除患者并级联删除其治疗、照片和分析，返回是否存在
    async fn delete_patient(&self, id: Uuid) -> Result<bool>;
    async fn count_patients_by_status(&self) -> Result<Vec<(PatientStatus, i64)>>;
}

/// 治疗仓储
#[async_trait]
pub trait TreatmentRepository: Send + Sync {
    async fn insert_treatment(&self, treatment: &Treatment) -> Result<()>;
    async fn get_treatment(&self, id: Uuid) -> Result<Option<Treatment>>;
    async fn list_treatments(&self, filter: &TreatmentFilter) -> Result<Page<Treatment>>;
    async fn update_treatment(&self, treatment: &Treatment) -> Result<()>;
    async fn delete_treatment(&self, id: Uuid) -> Result<bool>;
    async fn count_treatments_by_status(
        &self,
        patient_id: Option<Uuid>,
    ) -> Result<Vec<(TreatmentStatus, i64)>>;
}

/// 照片仓储
#[async_trait]
pub trait PhotoRepository: Send + Sync {
    async fn insert_photo(&self, photo: &Photo) -> Result<()>;
    async fn get_photo(&self, id: Uuid) -> Result<Option<Photo>>;
    async fn list_photos_by_treatment(&self, treatment_id: Uuid) -> Result<Vec<Photo>>;
    async fn update_photo(&self, photo: &Photo) -> Result<()>;
    async fn delete_photo(&self, id: Uuid) -> Result<bool>;
    /// 患者名下所有已存储照片的路径（级联删除前清理文件用）
    async fn storage_paths_for_patient(&self, patient_id: Uuid) -> Result<Vec<String>>;
    async fn storage_paths_for_treatment(&self, treatment_id: Uuid) -> Result<Vec<String>>;
    async fn count_photos_for_patient(&self, patient_id: Uuid) -> Result<i64>;
}

/// AI分析仓储
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    async fn insert_analysis(&self, analysis: &Analysis) -> Result<()>;
    async fn get_analysis(&self, id: Uuid) -> Result<Option<Analysis>>;
    async fn list_analyses_by_photo(&self, photo_id: Uuid) -> Result<Vec<Analysis>>;
    async fn update_analysis(&self, analysis: &Analysis) -> Result<()>;
    async fn delete_analysis(&self, id: Uuid) -> Result<bool>;
    async fn count_analyses_by_status(&self) -> Result<Vec<(AnalysisStatus, i64)>>;
}

/// 用户仓储
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 用户名或邮箱重复时返回 `Conflict`
    async fn insert_user(&self, user: &User) -> Result<()>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn update_user(&self, user: &User) -> Result<()>;
    async fn count_users(&self) -> Result<i64>;
}

/// 存储健康检查
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<()>;
    fn backend_name(&self) -> &'static str;
}

/// 所有仓储的集合，供业务层注入
#[derive(Clone)]
pub struct Repositories {
    pub patients: Arc<dyn PatientRepository>,
    pub treatments: Arc<dyn TreatmentRepository>,
    pub photos: Arc<dyn PhotoRepository>,
    pub analyses: Arc<dyn AnalysisRepository>,
    pub users: Arc<dyn UserRepository>,
    pub health: Arc<dyn HealthCheck>,
}

impl Repositories {
    /// 由同时实现全部 trait 的后端构建
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: PatientRepository
            + TreatmentRepository
            + PhotoRepository
            + AnalysisRepository
            + UserRepository
            + HealthCheck
            + 'static,
    {
        Self {
            patients: store.clone(),
            treatments: store.clone(),
            photos: store.clone(),
            analyses: store.clone(),
            users: store.clone(),
            health: store,
        }
    }

    /// PostgreSQL 后端
    pub fn postgres(pool: DatabasePool) -> Self {
        Self::from_store(Arc::new(DatabaseQueries::new(pool)))
    }

    /// 内存后端
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemoryStore::new()))
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories")
            .field("backend", &self.health.backend_name())
            .finish()
    }
}
