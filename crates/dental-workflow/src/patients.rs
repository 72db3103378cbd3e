//! 患者命令与查询

use chrono::Utc;
use dental_core::{
    CreatePatientRequest, DentalError, Page, Patient, PatientFilter, PatientStatus, Result,
    UpdatePatientRequest,
};
use dental_database::Repositories;
use dental_storage::StorageManager;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state_machine::{PatientEvent, PatientStateMachine};

/// 患者概要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSummary {
    pub patient: Patient,
    pub age: u32,
    pub total_treatments: i64,
    /// 按状态统计的治疗数
    pub treatments_by_status: BTreeMap<String, i64>,
    pub photo_count: i64,
}

/// 患者服务
#[derive(Debug)]
pub struct PatientService {
    repos: Repositories,
    storage: StorageManager,
    state_machine: PatientStateMachine,
}

impl PatientService {
    pub fn new(repos: Repositories, storage: StorageManager) -> Self {
        Self {
            repos,
            storage,
            state_machine: PatientStateMachine::new(),
        }
    }

    /// 登记新患者
    pub async fn create(&self, request: CreatePatientRequest) -> Result<Patient> {
        request.validate()?;
        let patient = Patient::new(request);
        self.repos.patients.insert_patient(&patient).await?;

        info!(patient_id = %patient.id, "Registered patient");
        Ok(patient)
    }

    pub async fn get(&self, id: Uuid) -> Result<Patient> {
        self.repos
            .patients
            .get_patient(id)
            .await?
            .ok_or_else(|| DentalError::not_found("patient", id))
    }

    pub async fn list(&self, filter: &PatientFilter) -> Result<Page<Patient>> {
        self.repos.patients.list_patients(filter).await
    }

    /// 更新患者资料，已归档患者不可修改
    pub async fn update(&self, id: Uuid, request: UpdatePatientRequest) -> Result<Patient> {
        request.validate()?;
        let mut patient = self.get(id).await?;
        if patient.status == PatientStatus::Archived {
            return Err(DentalError::Conflict(format!(
                "patient {} is archived and cannot be modified",
                id
            )));
        }

        patient.apply_update(request);
        self.repos.patients.update_patient(&patient).await?;

        info!(patient_id = %id, "Updated patient");
        Ok(patient)
    }

    /// 删除患者，级联删除治疗、照片、分析及照片文件
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let paths = self.repos.photos.storage_paths_for_patient(id).await?;
        if !self.repos.patients.delete_patient(id).await? {
            return Err(DentalError::not_found("patient", id));
        }

        let removed = self.storage.delete_files(&paths).await;
        if removed < paths.len() {
            warn!(patient_id = %id, expected = paths.len(), removed, "Some photo files were already missing");
        }
        info!(patient_id = %id, "Deleted patient");
        Ok(())
    }

    /// 变更患者状态
    pub async fn change_status(&self, id: Uuid, event: PatientEvent) -> Result<Patient> {
        let mut patient = self.get(id).await?;
        let new_status = self.state_machine.transition(patient.status, event)?;

        let old_status = patient.status;
        patient.status = new_status;
        patient.updated_at = Utc::now();
        self.repos.patients.update_patient(&patient).await?;

        info!(patient_id = %id, from = ?old_status, to = ?new_status, "Patient status changed");
        Ok(patient)
    }

    /// 患者概要：年龄、治疗统计、照片数量
    pub async fn summary(&self, id: Uuid) -> Result<PatientSummary> {
        let patient = self.get(id).await?;
        let counts = self
            .repos
            .treatments
            .count_treatments_by_status(Some(id))
            .await?;
        let photo_count = self.repos.photos.count_photos_for_patient(id).await?;

        let treatments_by_status: BTreeMap<String, i64> = counts
            .into_iter()
            .map(|(status, count)| (format!("{:?}", status), count))
            .collect();

        Ok(PatientSummary {
            age: patient.age_on(Utc::now().date_naive()),
            total_treatments: treatments_by_status.values().sum(),
            treatments_by_status,
            photo_count,
            patient,
        })
    }
}
