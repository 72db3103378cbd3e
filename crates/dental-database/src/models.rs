//! 数据库模型

use chrono::{DateTime, NaiveDate, Utc};
use dental_core::{models::*, DentalError, Result};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

// 数据库表模型 - 枚举字段以编码字符串存储，读取时解析

fn decode<T>(column: &str, code: &str) -> Result<T>
where
    T: FromStr<Err = DentalError>,
{
    T::from_str(code).map_err(|_| {
        DentalError::Database(format!("invalid value '{}' in column {}", code, column))
    })
}

/// 数据库患者表
#[derive(Debug, FromRow)]
pub struct DbPatient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbPatient> for Patient {
    type Error = DentalError;

    fn try_from(row: DbPatient) -> Result<Self> {
        Ok(Patient {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth: row.date_of_birth,
            gender: row
                .gender
                .as_deref()
                .map(|g| decode("patients.gender", g))
                .transpose()?,
            email: row.email,
            phone: row.phone,
            address: row.address,
            medical_history: row.medical_history,
            allergies: row.allergies,
            status: decode("patients.status", &row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 数据库治疗表
#[derive(Debug, FromRow)]
pub struct DbTreatment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub treatment_type: String,
    pub tooth_number: Option<i32>,
    pub description: Option<String>,
    pub cost: Option<f64>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbTreatment> for Treatment {
    type Error = DentalError;

    fn try_from(row: DbTreatment) -> Result<Self> {
        Ok(Treatment {
            id: row.id,
            patient_id: row.patient_id,
            treatment_type: decode("treatments.treatment_type", &row.treatment_type)?,
            tooth_number: row.tooth_number,
            description: row.description,
            cost: row.cost,
            scheduled_at: row.scheduled_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            notes: row.notes,
            status: decode("treatments.status", &row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 数据库照片表
#[derive(Debug, FromRow)]
pub struct DbPhoto {
    pub id: Uuid,
    pub treatment_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub photo_type: String,
    pub description: Option<String>,
    pub taken_at: Option<DateTime<Utc>>,
    pub storage_path: Option<String>,
    pub checksum: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbPhoto> for Photo {
    type Error = DentalError;

    fn try_from(row: DbPhoto) -> Result<Self> {
        Ok(Photo {
            id: row.id,
            treatment_id: row.treatment_id,
            file_name: row.file_name,
            content_type: row.content_type,
            file_size: row.file_size,
            photo_type: decode("photos.photo_type", &row.photo_type)?,
            description: row.description,
            taken_at: row.taken_at,
            storage_path: row.storage_path,
            checksum: row.checksum,
            status: decode("photos.status", &row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 数据库分析表
#[derive(Debug, FromRow)]
pub struct DbAnalysis {
    pub id: Uuid,
    pub photo_id: Uuid,
    pub analysis_type: String,
    pub model_version: Option<String>,
    pub confidence: Option<f64>,
    pub findings: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbAnalysis> for Analysis {
    type Error = DentalError;

    fn try_from(row: DbAnalysis) -> Result<Self> {
        Ok(Analysis {
            id: row.id,
            photo_id: row.photo_id,
            analysis_type: decode("analyses.analysis_type", &row.analysis_type)?,
            model_version: row.model_version,
            confidence: row.confidence,
            findings: row.findings,
            error_message: row.error_message,
            status: decode("analyses.status", &row.status)?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 数据库用户表
#[derive(Debug, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub password_hash: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbUser> for User {
    type Error = DentalError;

    fn try_from(row: DbUser) -> Result<Self> {
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            role: decode("users.role", &row.role)?,
            password_hash: row.password_hash,
            is_active: row.is_active,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// `GROUP BY status` 计数行
#[derive(Debug, FromRow)]
pub struct DbStatusCount {
    pub status: String,
    pub count: i64,
}

impl DbStatusCount {
    pub fn decode<T>(self, column: &str) -> Result<(T, i64)>
    where
        T: FromStr<Err = DentalError>,
    {
        Ok((decode(column, &self.status)?, self.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_treatment_conversion() {
        let now = Utc::now();
        let row = DbTreatment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            treatment_type: "ROOT_CANAL".to_string(),
            tooth_number: Some(36),
            description: None,
            cost: Some(850.0),
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            notes: None,
            status: "ON_HOLD".to_string(),
            created_at: now,
            updated_at: now,
        };
        let treatment = Treatment::try_from(row).unwrap();
        assert_eq!(treatment.treatment_type, TreatmentType::RootCanal);
        assert_eq!(treatment.status, TreatmentStatus::OnHold);
    }

    #[test]
    fn test_unknown_status_is_database_error() {
        let now = Utc::now();
        let row = DbPatient {
            id: Uuid::new_v4(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            gender: Some("X".to_string()),
            email: None,
            phone: None,
            address: None,
            medical_history: None,
            allergies: None,
            status: "ACTIVE".to_string(),
            created_at: now,
            updated_at: now,
        };
        let err = Patient::try_from(row).unwrap_err();
        assert!(matches!(err, DentalError::Database(_)));
    }
}
