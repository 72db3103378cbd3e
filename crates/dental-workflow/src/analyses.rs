//! AI分析命令与查询
//!
//! 分析状态变化会同步到所属照片：
//! - 分析开始时照片进入 Processing
//! - 没有进行中的分析后，按结果把照片置为 Analyzed / Failed / Uploaded

use chrono::Utc;
use dental_core::{
    Analysis, AnalysisStatus, CompleteAnalysisRequest, CreateAnalysisRequest, DentalError,
    FailAnalysisRequest, Photo, PhotoStatus, Result,
};
use dental_database::Repositories;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state_machine::{AnalysisEvent, AnalysisStateMachine, PhotoEvent, PhotoStateMachine};

/// AI分析服务
#[derive(Debug)]
pub struct AnalysisService {
    repos: Repositories,
    state_machine: AnalysisStateMachine,
    photo_state_machine: PhotoStateMachine,
}

impl AnalysisService {
    pub fn new(repos: Repositories) -> Self {
        Self {
            repos,
            state_machine: AnalysisStateMachine::new(),
            photo_state_machine: PhotoStateMachine::new(),
        }
    }

    /// 为照片申请一次分析
    pub async fn request(&self, photo_id: Uuid, request: CreateAnalysisRequest) -> Result<Analysis> {
        request.validate()?;
        let photo = self.photo(photo_id).await?;
        if photo.status == PhotoStatus::Archived {
            return Err(DentalError::Conflict(format!("photo {} is archived", photo_id)));
        }
        if !photo.has_content() {
            return Err(DentalError::Conflict(format!(
                "photo {} has no uploaded content",
                photo_id
            )));
        }

        let analysis = Analysis::new(photo_id, request);
        self.repos.analyses.insert_analysis(&analysis).await?;

        info!(
            analysis_id = %analysis.id,
            photo_id = %photo_id,
            analysis_type = ?analysis.analysis_type,
            "Requested analysis"
        );
        Ok(analysis)
    }

    pub async fn get(&self, id: Uuid) -> Result<Analysis> {
        self.repos
            .analyses
            .get_analysis(id)
            .await?
            .ok_or_else(|| DentalError::not_found("analysis", id))
    }

    pub async fn list_for_photo(&self, photo_id: Uuid) -> Result<Vec<Analysis>> {
        self.photo(photo_id).await?;
        self.repos.analyses.list_analyses_by_photo(photo_id).await
    }

    /// 不带附加数据的状态事件：start / cancel / retry
    pub async fn apply_event(&self, id: Uuid, event: AnalysisEvent) -> Result<Analysis> {
        match event {
            AnalysisEvent::Complete | AnalysisEvent::Fail => {
                return Err(DentalError::Validation(format!(
                    "{:?} requires a result payload",
                    event
                )));
            }
            _ => {}
        }

        let mut analysis = self.get(id).await?;
        let old_status = analysis.status;
        analysis.status = self.state_machine.transition(old_status, event)?;
        if event == AnalysisEvent::Start {
            let photo = self.photo(analysis.photo_id).await?;
            if photo.status == PhotoStatus::Archived {
                return Err(DentalError::Conflict(format!(
                    "photo {} is archived, analysis {} cannot start",
                    photo.id, id
                )));
            }
        }

        let now = Utc::now();
        match event {
            AnalysisEvent::Start => {
                analysis.started_at = Some(now);
            }
            AnalysisEvent::Cancel => {
                analysis.completed_at = Some(now);
            }
            AnalysisEvent::Retry => {
                analysis.error_message = None;
                analysis.started_at = None;
                analysis.completed_at = None;
            }
            _ => {}
        }
        analysis.updated_at = now;
        self.repos.analyses.update_analysis(&analysis).await?;
        info!(analysis_id = %id, from = ?old_status, to = ?analysis.status, "Analysis status changed");

        if event == AnalysisEvent::Start {
            self.begin_photo_processing(analysis.photo_id).await?;
        } else if old_status == AnalysisStatus::Processing {
            self.sync_photo_status(analysis.photo_id).await?;
        }
        Ok(analysis)
    }

    pub async fn start(&self, id: Uuid) -> Result<Analysis> {
        self.apply_event(id, AnalysisEvent::Start).await
    }

    pub async fn cancel(&self, id: Uuid) -> Result<Analysis> {
        self.apply_event(id, AnalysisEvent::Cancel).await
    }

    pub async fn retry(&self, id: Uuid) -> Result<Analysis> {
        self.apply_event(id, AnalysisEvent::Retry).await
    }

    /// 记录分析结果
    pub async fn complete(&self, id: Uuid, request: CompleteAnalysisRequest) -> Result<Analysis> {
        request.validate()?;
        let mut analysis = self.get(id).await?;
        analysis.status = self
            .state_machine
            .transition(analysis.status, AnalysisEvent::Complete)?;

        let now = Utc::now();
        analysis.confidence = Some(request.confidence);
        analysis.findings = Some(request.findings);
        if request.model_version.is_some() {
            analysis.model_version = request.model_version;
        }
        analysis.completed_at = Some(now);
        analysis.updated_at = now;
        self.repos.analyses.update_analysis(&analysis).await?;

        info!(analysis_id = %id, confidence = request.confidence, "Analysis completed");
        self.sync_photo_status(analysis.photo_id).await?;
        Ok(analysis)
    }

    /// 记录分析失败
    pub async fn fail(&self, id: Uuid, request: FailAnalysisRequest) -> Result<Analysis> {
        request.validate()?;
        let mut analysis = self.get(id).await?;
        analysis.status = self
            .state_machine
            .transition(analysis.status, AnalysisEvent::Fail)?;

        let now = Utc::now();
        analysis.error_message = Some(request.error_message.trim().to_string());
        analysis.completed_at = Some(now);
        analysis.updated_at = now;
        self.repos.analyses.update_analysis(&analysis).await?;

        warn!(analysis_id = %id, error = ?analysis.error_message, "Analysis failed");
        self.sync_photo_status(analysis.photo_id).await?;
        Ok(analysis)
    }

    /// 删除分析记录，进行中的分析需先取消
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let analysis = self.get(id).await?;
        if analysis.status == AnalysisStatus::Processing {
            return Err(DentalError::Conflict(format!(
                "analysis {} is processing, cancel it first",
                id
            )));
        }
        if !self.repos.analyses.delete_analysis(id).await? {
            return Err(DentalError::not_found("analysis", id));
        }

        info!(analysis_id = %id, "Deleted analysis");
        Ok(())
    }

    async fn photo(&self, photo_id: Uuid) -> Result<Photo> {
        self.repos
            .photos
            .get_photo(photo_id)
            .await?
            .ok_or_else(|| DentalError::not_found("photo", photo_id))
    }

    async fn begin_photo_processing(&self, photo_id: Uuid) -> Result<()> {
        let mut photo = self.photo(photo_id).await?;
        if !self
            .photo_state_machine
            .can_transition(photo.status, PhotoEvent::BeginAnalysis)
        {
            return Ok(());
        }
        photo.status = self
            .photo_state_machine
            .transition(photo.status, PhotoEvent::BeginAnalysis)?;
        photo.updated_at = Utc::now();
        self.repos.photos.update_photo(&photo).await
    }

    /// 照片上没有进行中的分析后，根据分析结果确定照片状态
    async fn sync_photo_status(&self, photo_id: Uuid) -> Result<()> {
        let mut photo = self.photo(photo_id).await?;
        if photo.status != PhotoStatus::Processing {
            return Ok(());
        }

        let analyses = self.repos.analyses.list_analyses_by_photo(photo_id).await?;
        let has = |status: AnalysisStatus| analyses.iter().any(|a| a.status == status);
        if has(AnalysisStatus::Processing) {
            return Ok(());
        }

        let event = if has(AnalysisStatus::Completed) {
            PhotoEvent::FinishAnalysis
        } else if has(AnalysisStatus::Failed) {
            PhotoEvent::FailAnalysis
        } else {
            PhotoEvent::Reset
        };
        photo.status = self.photo_state_machine.transition(photo.status, event)?;
        photo.updated_at = Utc::now();
        self.repos.photos.update_photo(&photo).await?;

        debug!(photo_id = %photo_id, status = ?photo.status, "Photo status synced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::state_machine::AnalysisEvent;
    use crate::testing::*;
    use crate::ClinicEngine;
    use dental_core::*;

    fn caries() -> CreateAnalysisRequest {
        CreateAnalysisRequest {
            analysis_type: AnalysisType::Caries,
            model_version: None,
        }
    }

    async fn started(engine: &ClinicEngine, photo_id: uuid::Uuid) -> Analysis {
        let analysis = engine.analyses().request(photo_id, caries()).await.unwrap();
        engine.analyses().start(analysis.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_start_moves_photo_to_processing() {
        let (engine, _dir) = engine();
        let (_patient, _treatment, photo) = seeded_photo(&engine).await;
        let analysis = started(&engine, photo.id).await;

        assert_eq!(analysis.status, AnalysisStatus::Processing);
        assert!(analysis.started_at.is_some());
        assert_eq!(
            engine.photos().get(photo.id).await.unwrap().status,
            PhotoStatus::Processing
        );
    }

    #[tokio::test]
    async fn test_complete_validates_confidence() {
        let (engine, _dir) = engine();
        let (_patient, _treatment, photo) = seeded_photo(&engine).await;
        let analysis = started(&engine, photo.id).await;

        let err = engine
            .analyses()
            .complete(
                analysis.id,
                CompleteAnalysisRequest {
                    confidence: 1.5,
                    findings: serde_json::json!({}),
                    model_version: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DentalError::Validation(_)));
        assert_eq!(
            engine.analyses().get(analysis.id).await.unwrap().status,
            AnalysisStatus::Processing
        );
    }

    #[tokio::test]
    async fn test_fail_then_retry() {
        let (engine, _dir) = engine();
        let (_patient, _treatment, photo) = seeded_photo(&engine).await;
        let analysis = started(&engine, photo.id).await;

        let failed = engine
            .analyses()
            .fail(
                analysis.id,
                FailAnalysisRequest {
                    error_message: "model timeout".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("model timeout"));
        assert_eq!(
            engine.photos().get(photo.id).await.unwrap().status,
            PhotoStatus::Failed
        );

        let retried = engine.analyses().retry(analysis.id).await.unwrap();
        assert_eq!(retried.status, AnalysisStatus::Pending);
        assert!(retried.error_message.is_none());
        assert!(retried.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_photo_waits_for_all_processing_analyses() {
        let (engine, _dir) = engine();
        let (_patient, _treatment, photo) = seeded_photo(&engine).await;
        let first = started(&engine, photo.id).await;
        let second = started(&engine, photo.id).await;

        engine
            .analyses()
            .fail(
                first.id,
                FailAnalysisRequest {
                    error_message: "bad exposure".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            engine.photos().get(photo.id).await.unwrap().status,
            PhotoStatus::Processing
        );

        engine
            .analyses()
            .complete(
                second.id,
                CompleteAnalysisRequest {
                    confidence: 0.6,
                    findings: serde_json::json!({ "healthy": true }),
                    model_version: Some("general-v1".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            engine.photos().get(photo.id).await.unwrap().status,
            PhotoStatus::Analyzed
        );
    }

    #[tokio::test]
    async fn test_cancel_resets_photo() {
        let (engine, _dir) = engine();
        let (_patient, _treatment, photo) = seeded_photo(&engine).await;
        let analysis = started(&engine, photo.id).await;

        assert!(matches!(
            engine.analyses().delete(analysis.id).await,
            Err(DentalError::Conflict(_))
        ));
        engine.analyses().cancel(analysis.id).await.unwrap();
        assert_eq!(
            engine.photos().get(photo.id).await.unwrap().status,
            PhotoStatus::Uploaded
        );
        engine.analyses().delete(analysis.id).await.unwrap();
        assert!(engine
            .analyses()
            .list_for_photo(photo.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_request_requires_content() {
        let (engine, _dir) = engine();
        let (_patient, treatment, photo) = seeded_photo(&engine).await;
        let empty = engine
            .photos()
            .register(treatment.id, photo_request())
            .await
            .unwrap();
        assert!(matches!(
            engine.analyses().request(empty.id, caries()).await,
            Err(DentalError::Conflict(_))
        ));

        engine.photos().archive(photo.id).await.unwrap();
        assert!(matches!(
            engine.analyses().request(photo.id, caries()).await,
            Err(DentalError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_pending_analysis_cannot_start_on_archived_photo() {
        let (engine, _dir) = engine();
        let (_patient, _treatment, photo) = seeded_photo(&engine).await;
        let analysis = engine.analyses().request(photo.id, caries()).await.unwrap();
        engine.photos().archive(photo.id).await.unwrap();

        assert!(matches!(
            engine.analyses().start(analysis.id).await,
            Err(DentalError::Conflict(_))
        ));
        assert_eq!(
            engine.analyses().get(analysis.id).await.unwrap().status,
            AnalysisStatus::Pending
        );
        assert_eq!(
            engine.photos().get(photo.id).await.unwrap().status,
            PhotoStatus::Archived
        );
    }

    #[tokio::test]
    async fn test_payload_events_rejected_without_payload() {
        let (engine, _dir) = engine();
        let (_patient, _treatment, photo) = seeded_photo(&engine).await;
        let analysis = started(&engine, photo.id).await;
        assert!(matches!(
            engine
                .analyses()
                .apply_event(analysis.id, AnalysisEvent::Complete)
                .await,
            Err(DentalError::Validation(_))
        ));
    }
}
