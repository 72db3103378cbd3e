//! 核心数据模型定义

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DentalError, Result};
use crate::utils::{normalize_email, normalize_name, whole_years_between};

/// 为枚举生成存储编码（`as_str` / `FromStr` / `Display`）
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $code:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// 全部取值
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// 数据库存储编码
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $code ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DentalError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $( $code => Ok($name::$variant), )+
                    _ => Err(DentalError::Validation(format!(
                        "unknown {} code '{}'",
                        stringify!($name),
                        s
                    ))),
                }
            }
        }
    };
}

coded_enum! {
    /// 性别
    Gender {
        Male => "M",
        Female => "F",
        Other => "O",
    }
}

coded_enum! {
    /// 患者状态
    PatientStatus {
        Active => "ACTIVE",
        Inactive => "INACTIVE",
        /// 已归档，终态
        Archived => "ARCHIVED",
    }
}

coded_enum! {
    /// 治疗类型
    TreatmentType {
        Checkup => "CHECKUP",
        Cleaning => "CLEANING",
        Filling => "FILLING",
        RootCanal => "ROOT_CANAL",
        Extraction => "EXTRACTION",
        Crown => "CROWN",
        Bridge => "BRIDGE",
        Implant => "IMPLANT",
        Orthodontics => "ORTHODONTICS",
        Whitening => "WHITENING",
        Other => "OTHER",
    }
}

coded_enum! {
    /// 治疗状态
    TreatmentStatus {
        Planned => "PLANNED",       // 已计划
        InProgress => "IN_PROGRESS", // 进行中
        Completed => "COMPLETED",   // 已完成
        Cancelled => "CANCELLED",   // 已取消
        OnHold => "ON_HOLD",        // 暂停
    }
}

impl TreatmentStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, TreatmentStatus::Completed | TreatmentStatus::Cancelled)
    }
}

coded_enum! {
    /// 照片类型
    PhotoType {
        Intraoral => "INTRAORAL",
        Extraoral => "EXTRAORAL",
        Xray => "XRAY",
        Panoramic => "PANORAMIC",
        Other => "OTHER",
    }
}

coded_enum! {
    /// 照片状态
    PhotoStatus {
        Uploaded => "UPLOADED",
        Processing => "PROCESSING",
        Analyzed => "ANALYZED",
        Failed => "FAILED",
        Archived => "ARCHIVED",
    }
}

coded_enum! {
    /// AI分析类型
    AnalysisType {
        Caries => "CARIES",
        Periodontal => "PERIODONTAL",
        Orthodontic => "ORTHODONTIC",
        BoneLoss => "BONE_LOSS",
        General => "GENERAL",
    }
}

coded_enum! {
    /// AI分析状态
    AnalysisStatus {
        Pending => "PENDING",
        Processing => "PROCESSING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Cancelled => "CANCELLED",
    }
}

impl AnalysisStatus {
    /// 是否仍在排队或执行中
    pub fn is_active(&self) -> bool {
        matches!(self, AnalysisStatus::Pending | AnalysisStatus::Processing)
    }
}

coded_enum! {
    /// 用户角色
    UserRole {
        /// 管理员 - 完全访问权限
        Admin => "ADMIN",
        /// 牙医 - 诊疗和删除权限
        Dentist => "DENTIST",
        /// 洁牙师
        Hygienist => "HYGIENIST",
        /// 前台 - 仅登记和查看
        Receptionist => "RECEPTIONIST",
    }
}

/// 患者信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub status: PatientStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    /// 根据创建请求构建新患者（状态为 Active）
    pub fn new(request: CreatePatientRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            first_name: normalize_name(&request.first_name),
            last_name: normalize_name(&request.last_name),
            date_of_birth: request.date_of_birth,
            gender: request.gender,
            email: request.email.as_deref().map(normalize_email),
            phone: request.phone.map(|p| p.trim().to_string()),
            address: request.address,
            medical_history: request.medical_history,
            allergies: request.allergies,
            status: PatientStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// 周岁年龄
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        whole_years_between(self.date_of_birth, today)
    }

    /// 应用部分更新
    pub fn apply_update(&mut self, update: UpdatePatientRequest) {
        if let Some(first_name) = update.first_name {
            self.first_name = normalize_name(&first_name);
        }
        if let Some(last_name) = update.last_name {
            self.last_name = normalize_name(&last_name);
        }
        if let Some(date_of_birth) = update.date_of_birth {
            self.date_of_birth = date_of_birth;
        }
        if update.gender.is_some() {
            self.gender = update.gender;
        }
        if let Some(email) = update.email {
            self.email = Some(normalize_email(&email));
        }
        if let Some(phone) = update.phone {
            self.phone = Some(phone.trim().to_string());
        }
        if update.address.is_some() {
            self.address = update.address;
        }
        if update.medical_history.is_some() {
            self.medical_history = update.medical_history;
        }
        if update.allergies.is_some() {
            self.allergies = update.allergies;
        }
        self.updated_at = Utc::now();
    }
}

/// 治疗记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Treatment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub treatment_type: TreatmentType,
    pub tooth_number: Option<i32>, // FDI牙位
    pub description: Option<String>,
    pub cost: Option<f64>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: TreatmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Treatment {
    pub fn new(patient_id: Uuid, request: CreateTreatmentRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            patient_id,
            treatment_type: request.treatment_type,
            tooth_number: request.tooth_number,
            description: request.description,
            cost: request.cost,
            scheduled_at: request.scheduled_at,
            started_at: None,
            completed_at: None,
            notes: request.notes,
            status: TreatmentStatus::Planned,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: UpdateTreatmentRequest) {
        if let Some(treatment_type) = update.treatment_type {
            self.treatment_type = treatment_type;
        }
        if update.tooth_number.is_some() {
            self.tooth_number = update.tooth_number;
        }
        if update.description.is_some() {
            self.description = update.description;
        }
        if update.cost.is_some() {
            self.cost = update.cost;
        }
        if update.scheduled_at.is_some() {
            self.scheduled_at = update.scheduled_at;
        }
        if update.notes.is_some() {
            self.notes = update.notes;
        }
        self.updated_at = Utc::now();
    }
}

/// 照片元数据
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Photo {
    pub id: Uuid,
    pub treatment_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub photo_type: PhotoType,
    pub description: Option<String>,
    pub taken_at: Option<DateTime<Utc>>,
    pub storage_path: Option<String>,
    pub checksum: Option<String>, // SHA-256 十六进制
    pub status: PhotoStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Photo {
    pub fn new(treatment_id: Uuid, request: CreatePhotoRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            treatment_id,
            file_name: request.file_name.trim().to_string(),
            content_type: request.content_type.trim().to_lowercase(),
            file_size: 0,
            photo_type: request.photo_type,
            description: request.description,
            taken_at: request.taken_at,
            storage_path: None,
            checksum: None,
            status: PhotoStatus::Uploaded,
            created_at: now,
            updated_at: now,
        }
    }

    /// 是否已上传内容
    pub fn has_content(&self) -> bool {
        self.storage_path.is_some()
    }
}

/// AI分析记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Analysis {
    pub id: Uuid,
    pub photo_id: Uuid,
    pub analysis_type: AnalysisType,
    pub model_version: Option<String>,
    pub confidence: Option<f64>,
    pub findings: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub status: AnalysisStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Analysis {
    pub fn new(photo_id: Uuid, request: CreateAnalysisRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            photo_id,
            analysis_type: request.analysis_type,
            model_version: request.model_version,
            confidence: None,
            findings: None,
            error_message: None,
            status: AnalysisStatus::Pending,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 系统用户
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ========== 请求 DTO ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
}

/// 患者部分更新，`None` 表示保持不变
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTreatmentRequest {
    pub treatment_type: TreatmentType,
    #[serde(default)]
    pub tooth_number: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTreatmentRequest {
    pub treatment_type: Option<TreatmentType>,
    pub tooth_number: Option<i32>,
    pub description: Option<String>,
    pub cost: Option<f64>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePhotoRequest {
    pub file_name: String,
    pub content_type: String,
    pub photo_type: PhotoType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub taken_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAnalysisRequest {
    pub analysis_type: AnalysisType,
    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteAnalysisRequest {
    pub confidence: f64,
    pub findings: serde_json::Value,
    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailAnalysisRequest {
    pub error_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub password: String,
}

// ========== 查询参数 ==========

/// 患者查询条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientFilter {
    /// 按姓名/邮箱/电话模糊匹配
    pub search: Option<String>,
    pub status: Option<PatientStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// 治疗查询条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreatmentFilter {
    pub patient_id: Option<Uuid>,
    pub status: Option<TreatmentStatus>,
    pub treatment_type: Option<TreatmentType>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// 分页结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_round_trip() {
        for status in TreatmentStatus::ALL {
            let parsed: TreatmentStatus = status.as_str().parse().unwrap();
            assert_eq!(&parsed, status);
        }
        assert_eq!(AnalysisStatus::Processing.as_str(), "PROCESSING");
        assert!("BOGUS".parse::<PhotoStatus>().is_err());
    }

    #[test]
    fn test_patient_update_keeps_unset_fields() {
        let mut patient = Patient::new(CreatePatientRequest {
            first_name: " Ada ".to_string(),
            last_name: "Lovelace".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
            gender: Some(Gender::Female),
            email: Some("Ada@Example.com".to_string()),
            phone: None,
            address: None,
            medical_history: None,
            allergies: Some("penicillin".to_string()),
        });
        assert_eq!(patient.first_name, "Ada");
        assert_eq!(patient.email.as_deref(), Some("ada@example.com"));

        patient.apply_update(UpdatePatientRequest {
            last_name: Some("Byron".to_string()),
            ..Default::default()
        });
        assert_eq!(patient.full_name(), "Ada Byron");
        assert_eq!(patient.allergies.as_deref(), Some("penicillin"));
        assert_eq!(patient.status, PatientStatus::Active);
    }

    #[test]
    fn test_patient_age() {
        let patient = Patient::new(CreatePatientRequest {
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2000, 6, 15).unwrap(),
            gender: None,
            email: None,
            phone: None,
            address: None,
            medical_history: None,
            allergies: None,
        });
        assert_eq!(patient.age_on(NaiveDate::from_ymd_opt(2020, 6, 14).unwrap()), 19);
        assert_eq!(patient.age_on(NaiveDate::from_ymd_opt(2020, 6, 15).unwrap()), 20);
    }

    #[test]
    fn test_enum_json_uses_variant_names() {
        let json = serde_json::to_string(&TreatmentStatus::InProgress).unwrap();
        assert_eq!(json, "\"InProgress\"");
    }
}
