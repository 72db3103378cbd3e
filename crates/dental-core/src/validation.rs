//! 请求校验
//!
//! 所有校验失败都返回 `DentalError::Validation`，消息以字段名开头。

use chrono::{Months, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::{DentalError, Result};
use crate::models::*;
use crate::utils::{now_utc, today_utc};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_TEXT_LEN: usize = 2000;
pub const MAX_NOTES_LEN: usize = 4000;
pub const MAX_FILE_NAME_LEN: usize = 255;
pub const MAX_COST: f64 = 1_000_000.0;
pub const MAX_AGE_YEARS: u32 = 150;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_PHONE_LEN: usize = 7;
pub const MAX_PHONE_LEN: usize = 20;

/// 允许上传的照片类型
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/tiff",
    "image/bmp",
    "image/webp",
];

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"))
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9() \-]+$").expect("valid phone regex"))
}

fn username_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]{3,50}$").expect("valid username regex"))
}

fn invalid(field: &str, reason: impl std::fmt::Display) -> DentalError {
    DentalError::Validation(format!("{}: {}", field, reason))
}

/// 非空且不超过长度上限
pub fn require_text(field: &str, value: &str, max_len: usize) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    optional_text(field, Some(value), max_len)
}

/// 可选文本长度上限
pub fn optional_text(field: &str, value: Option<&str>, max_len: usize) -> Result<()> {
    match value {
        Some(v) if v.chars().count() > max_len => {
            Err(invalid(field, format!("must be at most {} characters", max_len)))
        }
        Some(v) if v.chars().any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t') => {
            Err(invalid(field, "contains control characters"))
        }
        _ => Ok(()),
    }
}

/// 出生日期必须在过去，且不早于 150 年前
pub fn date_of_birth(value: NaiveDate, today: NaiveDate) -> Result<()> {
    if value >= today {
        return Err(invalid("date_of_birth", "must be in the past"));
    }
    let earliest = today
        .checked_sub_months(Months::new(MAX_AGE_YEARS * 12))
        .unwrap_or(NaiveDate::MIN);
    if value < earliest {
        return Err(invalid(
            "date_of_birth",
            format!("must be within the last {} years", MAX_AGE_YEARS),
        ));
    }
    Ok(())
}

pub fn email(value: &str) -> Result<()> {
    let value = value.trim();
    if value.len() > 254 || !email_regex().is_match(value) {
        return Err(invalid("email", "is not a valid email address"));
    }
    Ok(())
}

pub fn phone(value: &str) -> Result<()> {
    let value = value.trim();
    let len = value.chars().count();
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    if !(MIN_PHONE_LEN..=MAX_PHONE_LEN).contains(&len)
        || !phone_regex().is_match(value)
        || digits < MIN_PHONE_LEN
    {
        return Err(invalid("phone", "is not a valid phone number"));
    }
    Ok(())
}

/// FDI 两位牙位：象限 1-4，牙齿 1-8
pub fn tooth_number(value: i32) -> Result<()> {
    let quadrant = value / 10;
    let tooth = value % 10;
    if (1..=4).contains(&quadrant) && (1..=8).contains(&tooth) {
        Ok(())
    } else {
        Err(invalid("tooth_number", format!("{} is not a valid FDI tooth number", value)))
    }
}

pub fn cost(value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=MAX_COST).contains(&value) {
        return Err(invalid("cost", format!("must be between 0 and {}", MAX_COST)));
    }
    Ok(())
}

pub fn confidence(value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(invalid("confidence", "must be between 0.0 and 1.0"));
    }
    Ok(())
}

pub fn content_type(value: &str) -> Result<()> {
    let normalized = value.trim().to_lowercase();
    if ALLOWED_CONTENT_TYPES.contains(&normalized.as_str()) {
        Ok(())
    } else {
        Err(invalid("content_type", format!("'{}' is not a supported image type", value)))
    }
}

pub fn file_name(value: &str) -> Result<()> {
    require_text("file_name", value, MAX_FILE_NAME_LEN)?;
    if value.contains('/') || value.contains('\\') || value.trim() == ".." {
        return Err(invalid("file_name", "must not contain path separators"));
    }
    Ok(())
}

pub fn username(value: &str) -> Result<()> {
    if !username_regex().is_match(value) {
        return Err(invalid(
            "username",
            "must be 3-50 characters of letters, digits, '_', '.' or '-'",
        ));
    }
    Ok(())
}

pub fn password(value: &str) -> Result<()> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid(
            "password",
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

impl CreatePatientRequest {
    pub fn validate(&self) -> Result<()> {
        require_text("first_name", &self.first_name, MAX_NAME_LEN)?;
        require_text("last_name", &self.last_name, MAX_NAME_LEN)?;
        date_of_birth(self.date_of_birth, today_utc())?;
        if let Some(value) = &self.email {
            email(value)?;
        }
        if let Some(value) = &self.phone {
            phone(value)?;
        }
        optional_text("address", self.address.as_deref(), MAX_TEXT_LEN)?;
        optional_text("medical_history", self.medical_history.as_deref(), MAX_NOTES_LEN)?;
        optional_text("allergies", self.allergies.as_deref(), MAX_TEXT_LEN)?;
        Ok(())
    }
}

impl UpdatePatientRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(value) = &self.first_name {
            require_text("first_name", value, MAX_NAME_LEN)?;
        }
        if let Some(value) = &self.last_name {
            require_text("last_name", value, MAX_NAME_LEN)?;
        }
        if let Some(value) = self.date_of_birth {
            date_of_birth(value, today_utc())?;
        }
        if let Some(value) = &self.email {
            email(value)?;
        }
        if let Some(value) = &self.phone {
            phone(value)?;
        }
        optional_text("address", self.address.as_deref(), MAX_TEXT_LEN)?;
        optional_text("medical_history", self.medical_history.as_deref(), MAX_NOTES_LEN)?;
        optional_text("allergies", self.allergies.as_deref(), MAX_TEXT_LEN)?;
        Ok(())
    }
}

impl CreateTreatmentRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(value) = self.tooth_number {
            tooth_number(value)?;
        }
        if let Some(value) = self.cost {
            cost(value)?;
        }
        optional_text("description", self.description.as_deref(), MAX_TEXT_LEN)?;
        optional_text("notes", self.notes.as_deref(), MAX_NOTES_LEN)?;
        Ok(())
    }
}

impl UpdateTreatmentRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(value) = self.tooth_number {
            tooth_number(value)?;
        }
        if let Some(value) = self.cost {
            cost(value)?;
        }
        optional_text("description", self.description.as_deref(), MAX_TEXT_LEN)?;
        optional_text("notes", self.notes.as_deref(), MAX_NOTES_LEN)?;
        Ok(())
    }
}

impl CreatePhotoRequest {
    pub fn validate(&self) -> Result<()> {
        file_name(&self.file_name)?;
        content_type(&self.content_type)?;
        optional_text("description", self.description.as_deref(), MAX_TEXT_LEN)?;
        if let Some(taken_at) = self.taken_at {
            if taken_at > now_utc() {
                return Err(invalid("taken_at", "must not be in the future"));
            }
        }
        Ok(())
    }
}

impl CreateAnalysisRequest {
    pub fn validate(&self) -> Result<()> {
        optional_text("model_version", self.model_version.as_deref(), 50)
    }
}

impl CompleteAnalysisRequest {
    pub fn validate(&self) -> Result<()> {
        confidence(self.confidence)?;
        if !(self.findings.is_object() || self.findings.is_array()) {
            return Err(invalid("findings", "must be a JSON object or array"));
        }
        optional_text("model_version", self.model_version.as_deref(), 50)
    }
}

impl FailAnalysisRequest {
    pub fn validate(&self) -> Result<()> {
        require_text("error_message", &self.error_message, MAX_TEXT_LEN)
    }
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<()> {
        username(&self.username)?;
        email(&self.email)?;
        require_text("full_name", &self.full_name, MAX_NAME_LEN)?;
        password(&self.password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient_request() -> CreatePatientRequest {
        CreatePatientRequest {
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 3, 14).unwrap(),
            gender: Some(Gender::Male),
            email: Some("john.doe@example.com".to_string()),
            phone: Some("+1 (555) 123-4567".to_string()),
            address: None,
            medical_history: None,
            allergies: None,
        }
    }

    #[test]
    fn test_valid_patient() {
        assert!(patient_request().validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut request = patient_request();
        request.first_name = "   ".to_string();
        let err = request.validate().unwrap_err();
        assert!(matches!(err, DentalError::Validation(msg) if msg.starts_with("first_name")));
    }

    #[test]
    fn test_date_of_birth_bounds() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(date_of_birth(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(), today).is_ok());
        assert!(date_of_birth(today, today).is_err());
        assert!(date_of_birth(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(), today).is_err());
        assert!(date_of_birth(NaiveDate::from_ymd_opt(1850, 1, 1).unwrap(), today).is_err());
    }

    #[test]
    fn test_email_and_phone() {
        assert!(email("a@b.co").is_ok());
        assert!(email("not-an-email").is_err());
        assert!(phone("555-1234").is_ok());
        assert!(phone("12").is_err());
        assert!(phone("call me maybe").is_err());
        assert!(phone("+1234567890123456789").is_ok());
        assert!(phone("+12345678901234567890").is_err());
        assert!(phone(" 555-1234 ").is_ok());
    }

    #[test]
    fn test_tooth_numbers() {
        for valid in [11, 18, 21, 28, 31, 38, 41, 48] {
            assert!(tooth_number(valid).is_ok(), "{} should be valid", valid);
        }
        for invalid in [0, 10, 19, 50, 51, 9, -11, 100] {
            assert!(tooth_number(invalid).is_err(), "{} should be invalid", invalid);
        }
    }

    #[test]
    fn test_cost_and_confidence_ranges() {
        assert!(cost(0.0).is_ok());
        assert!(cost(-1.0).is_err());
        assert!(cost(f64::NAN).is_err());
        assert!(cost(MAX_COST + 1.0).is_err());
        assert!(confidence(0.75).is_ok());
        assert!(confidence(1.5).is_err());
    }

    #[test]
    fn test_photo_request() {
        let mut request = CreatePhotoRequest {
            file_name: "molar.jpg".to_string(),
            content_type: "IMAGE/JPEG".to_string(),
            photo_type: PhotoType::Intraoral,
            description: None,
            taken_at: None,
        };
        assert!(request.validate().is_ok());

        request.content_type = "application/pdf".to_string();
        assert!(request.validate().is_err());

        request.content_type = "image/png".to_string();
        request.file_name = "../etc/passwd".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_complete_analysis_requires_structured_findings() {
        let request = CompleteAnalysisRequest {
            confidence: 0.9,
            findings: serde_json::json!("caries"),
            model_version: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_user_request() {
        let request = CreateUserRequest {
            username: "dr.smile".to_string(),
            email: "smile@clinic.test".to_string(),
            full_name: "Dr Smile".to_string(),
            role: UserRole::Dentist,
            password: "short".to_string(),
        };
        assert!(request.validate().is_err());
    }
}
