//! 诊所引擎
//!
//! 统一构建并持有所有业务服务，HTTP 层通过它分发命令和查询

use dental_core::Result;
use dental_database::Repositories;
use dental_storage::StorageManager;
use std::sync::Arc;

use crate::analyses::AnalysisService;
use crate::patients::PatientService;
use crate::photos::PhotoService;
use crate::stats::StatsService;
use crate::treatments::TreatmentService;

/// 工作流参数
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// 单张照片的最大字节数
    pub max_photo_bytes: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_photo_bytes: 20 * 1024 * 1024,
        }
    }
}

/// 诊所引擎
#[derive(Debug, Clone)]
pub struct ClinicEngine {
    repos: Repositories,
    patients: Arc<PatientService>,
    treatments: Arc<TreatmentService>,
    photos: Arc<PhotoService>,
    analyses: Arc<AnalysisService>,
    stats: Arc<StatsService>,
}

impl ClinicEngine {
    /// 创建新的诊所引擎
    pub fn new(repos: Repositories, storage: StorageManager, settings: WorkflowSettings) -> Self {
        Self {
            patients: Arc::new(PatientService::new(repos.clone(), storage.clone())),
            treatments: Arc::new(TreatmentService::new(repos.clone(), storage.clone())),
            photos: Arc::new(PhotoService::new(
                repos.clone(),
                storage,
                settings.max_photo_bytes,
            )),
            analyses: Arc::new(AnalysisService::new(repos.clone())),
            stats: Arc::new(StatsService::new(repos.clone())),
            repos,
        }
    }

    pub fn patients(&self) -> &PatientService {
        &self.patients
    }

    pub fn treatments(&self) -> &TreatmentService {
        &self.treatments
    }

    pub fn photos(&self) -> &PhotoService {
        &self.photos
    }

    pub fn analyses(&self) -> &AnalysisService {
        &self.analyses
    }

    pub fn stats(&self) -> &StatsService {
        &self.stats
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    /// 检查存储后端可用
    pub async fn health_check(&self) -> Result<&'static str> {
        self.repos.health.ping().await?;
        Ok(self.repos.health.backend_name())
    }
}
