//! 治疗命令与查询

use chrono::Utc;
use dental_core::{
    CreateTreatmentRequest, DentalError, Page, PatientStatus, Result, Treatment,
    TreatmentFilter, UpdateTreatmentRequest,
};
use dental_database::Repositories;
use dental_storage::StorageManager;
use tracing::info;
use uuid::Uuid;

use crate::state_machine::{TreatmentEvent, TreatmentStateMachine};

/// 治疗服务
#[derive(Debug)]
pub struct TreatmentService {
    repos: Repositories,
    storage: StorageManager,
    state_machine: TreatmentStateMachine,
}

impl TreatmentService {
    pub fn new(repos: Repositories, storage: StorageManager) -> Self {
        Self {
            repos,
            storage,
            state_machine: TreatmentStateMachine::new(),
        }
    }

    /// 为患者创建治疗计划，患者必须处于活跃状态
    pub async fn create(
        &self,
        patient_id: Uuid,
        request: CreateTreatmentRequest,
    ) -> Result<Treatment> {
        request.validate()?;
        let patient = self
            .repos
            .patients
            .get_patient(patient_id)
            .await?
            .ok_or_else(|| DentalError::not_found("patient", patient_id))?;
        if patient.status != PatientStatus::Active {
            return Err(DentalError::Conflict(format!(
                "patient {} is {:?}, treatments can only be planned for active patients",
                patient_id, patient.status
            )));
        }

        let treatment = Treatment::new(patient_id, request);
        self.repos.treatments.insert_treatment(&treatment).await?;

        info!(
            treatment_id = %treatment.id,
            patient_id = %patient_id,
            treatment_type = ?treatment.treatment_type,
            "Planned treatment"
        );
        Ok(treatment)
    }

    pub async fn get(&self, id: Uuid) -> Result<Treatment> {
        self.repos
            .treatments
            .get_treatment(id)
            .await?
            .ok_or_else(|| DentalError::not_found("treatment", id))
    }

    pub async fn list(&self, filter: &TreatmentFilter) -> Result<Page<Treatment>> {
        self.repos.treatments.list_treatments(filter).await
    }

    /// 患者的全部治疗，患者不存在时返回 NotFound
    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
        mut filter: TreatmentFilter,
    ) -> Result<Page<Treatment>> {
        if self.repos.patients.get_patient(patient_id).await?.is_none() {
            return Err(DentalError::not_found("patient", patient_id));
        }
        filter.patient_id = Some(patient_id);
        self.list(&filter).await
    }

    /// 更新治疗内容，已完成或已取消的治疗不可修改
    pub async fn update(&self, id: Uuid, request: UpdateTreatmentRequest) -> Result<Treatment> {
        request.validate()?;
        let mut treatment = self.get(id).await?;
        if treatment.status.is_terminal() {
            return Err(DentalError::Conflict(format!(
                "treatment {} is {:?} and cannot be modified",
                id, treatment.status
            )));
        }

        treatment.apply_update(request);
        self.repos.treatments.update_treatment(&treatment).await?;

        info!(treatment_id = %id, "Updated treatment");
        Ok(treatment)
    }

    /// 推进治疗状态
    pub async fn apply_event(&self, id: Uuid, event: TreatmentEvent) -> Result<Treatment> {
        let mut treatment = self.get(id).await?;
        let old_status = treatment.status;
        let new_status = self.state_machine.transition(old_status, event)?;

        let now = Utc::now();
        match event {
            TreatmentEvent::Start => treatment.started_at = Some(now),
            TreatmentEvent::Complete => treatment.completed_at = Some(now),
            _ => {}
        }
        treatment.status = new_status;
        treatment.updated_at = now;
        self.repos.treatments.update_treatment(&treatment).await?;

        info!(treatment_id = %id, from = ?old_status, to = ?new_status, "Treatment status changed");
        Ok(treatment)
    }

    /// 删除治疗及其照片文件
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let paths = self.repos.photos.storage_paths_for_treatment(id).await?;
        if !self.repos.treatments.delete_treatment(id).await? {
            return Err(DentalError::not_found("treatment", id));
        }
        self.storage.delete_files(&paths).await;

        info!(treatment_id = %id, photos = paths.len(), "Deleted treatment");
        Ok(())
    }
}
