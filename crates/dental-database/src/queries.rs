//! PostgreSQL 仓储实现

use async_trait::async_trait;
use dental_core::utils::{clamp_page, like_pattern};
use dental_core::{
    Analysis, AnalysisStatus, DentalError, Page, Patient, PatientFilter, PatientStatus, Photo,
    Result, Treatment, TreatmentFilter, TreatmentStatus, User,
};
use uuid::Uuid;

use crate::connection::DatabasePool;
use crate::models::*;
use crate::repository::*;

/// PostgreSQL 查询操作
#[derive(Debug, Clone)]
pub struct DatabaseQueries {
    pool: DatabasePool,
}

impl DatabaseQueries {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 用户表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                username VARCHAR(50) UNIQUE NOT NULL,
                email VARCHAR(254) UNIQUE NOT NULL,
                full_name VARCHAR(100) NOT NULL,
                role VARCHAR(20) NOT NULL,
                password_hash TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                last_login_at TIMESTAMP WITH TIME ZONE,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;

        // 患者表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS patients (
                id UUID PRIMARY KEY,
                first_name VARCHAR(100) NOT NULL,
                last_name VARCHAR(100) NOT NULL,
                date_of_birth DATE NOT NULL,
                gender CHAR(1),
                email VARCHAR(254),
                phone VARCHAR(20),
                address TEXT,
                medical_history TEXT,
                allergies TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'ACTIVE',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;

        // 治疗表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS treatments (
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
                treatment_type VARCHAR(20) NOT NULL,
                tooth_number INTEGER CHECK (tooth_number IS NULL OR (tooth_number BETWEEN 11 AND 48)),
                description TEXT,
                cost DOUBLE PRECISION CHECK (cost IS NULL OR (cost >= 0 AND cost <= 1000000)),
                scheduled_at TIMESTAMP WITH TIME ZONE,
                started_at TIMESTAMP WITH TIME ZONE,
                completed_at TIMESTAMP WITH TIME ZONE,
                notes TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'PLANNED',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;

        // 照片表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS photos (
                id UUID PRIMARY KEY,
                treatment_id UUID NOT NULL REFERENCES treatments(id) ON DELETE CASCADE,
                file_name VARCHAR(255) NOT NULL,
                content_type VARCHAR(50) NOT NULL,
                file_size BIGINT NOT NULL DEFAULT 0 CHECK (file_size >= 0),
                photo_type VARCHAR(20) NOT NULL,
                description TEXT,
                taken_at TIMESTAMP WITH TIME ZONE,
                storage_path VARCHAR(512),
                checksum CHAR(64),
                status VARCHAR(20) NOT NULL DEFAULT 'UPLOADED',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;

        // 分析表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analyses (
                id UUID PRIMARY KEY,
                photo_id UUID NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
                analysis_type VARCHAR(20) NOT NULL,
                model_version VARCHAR(50),
                confidence DOUBLE PRECISION CHECK (confidence IS NULL OR (confidence >= 0 AND confidence <= 1)),
                findings JSONB,
                error_message TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'PENDING',
                started_at TIMESTAMP WITH TIME ZONE,
                completed_at TIMESTAMP WITH TIME ZONE,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;

        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(last_name, first_name)",
            "CREATE INDEX IF NOT EXISTS idx_patients_status ON patients(status)",
            "CREATE INDEX IF NOT EXISTS idx_treatments_patient_id ON treatments(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_treatments_status ON treatments(status)",
            "CREATE INDEX IF NOT EXISTS idx_photos_treatment_id ON photos(treatment_id)",
            "CREATE INDEX IF NOT EXISTS idx_analyses_photo_id ON analyses(photo_id)",
            "CREATE INDEX IF NOT EXISTS idx_analyses_status ON analyses(status)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql).execute(pool).await?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }
}

fn ensure_updated(rows_affected: u64, entity: &str, id: Uuid) -> Result<()> {
    if rows_affected == 0 {
        Err(DentalError::not_found(entity, id))
    } else {
        Ok(())
    }
}

// ========== 患者相关操作 ==========

const PATIENT_FILTER: &str = r#"
    WHERE ($1::text IS NULL
           OR first_name ILIKE $1
           OR last_name ILIKE $1
           OR (first_name || ' ' || last_name) ILIKE $1
           OR email ILIKE $1
           OR phone ILIKE $1)
      AND ($2::text IS NULL OR status = $2)
"#;

#[async_trait]
impl PatientRepository for DatabaseQueries {
    async fn insert_patient(&self, patient: &Patient) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO patients (id, first_name, last_name, date_of_birth, gender, email, phone,
                                  address, medical_history, allergies, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
        )
        .bind(patient.id)
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(patient.date_of_birth)
        .bind(patient.gender.map(|g| g.as_str()))
        .bind(&patient.email)
        .bind(&patient.phone)
        .bind(&patient.address)
        .bind(&patient.medical_history)
        .bind(&patient.allergies)
        .bind(patient.status.as_str())
        .bind(patient.created_at)
        .bind(patient.updated_at)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>> {
        let row = sqlx::query_as::<_, DbPatient>("SELECT * FROM patients WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        row.map(Patient::try_from).transpose()
    }

    async fn list_patients(&self, filter: &PatientFilter) -> Result<Page<Patient>> {
        let pool = self.pool.pool();
        let (limit, offset) = clamp_page(filter.limit, filter.offset);
        let search = filter
            .search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern);
        let status = filter.status.map(|s| s.as_str());

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM patients {}",
            PATIENT_FILTER
        ))
        .bind(&search)
        .bind(status)
        .fetch_one(pool)
        .await?;

        let rows = sqlx::query_as::<_, DbPatient>(&format!(
            "SELECT * FROM patients {} ORDER BY last_name, first_name, id LIMIT $3 OFFSET $4",
            PATIENT_FILTER
        ))
        .bind(&search)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(Patient::try_from)
                .collect::<Result<Vec<_>>>()?,
            total,
            limit,
            offset,
        })
    }

    async fn update_patient(&self, patient: &Patient) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE patients
            SET first_name = $2, last_name = $3, date_of_birth = $4, gender = $5, email = $6,
                phone = $7, address = $8, medical_history = $9, allergies = $10, status = $11,
                updated_at = $12
            WHERE id = $1
        "#,
        )
        .bind(patient.id)
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(patient.date_of_birth)
        .bind(patient.gender.map(|g| g.as_str()))
        .bind(&patient.email)
        .bind(&patient.phone)
        .bind(&patient.address)
        .bind(&patient.medical_history)
        .bind(&patient.allergies)
        .bind(patient.status.as_str())
        .bind(patient.updated_at)
        .execute(self.pool.pool())
        .await?;
        ensure_updated(result.rows_affected(), "patient", patient.id)
    }

    async fn delete_patient(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_patients_by_status(&self) -> Result<Vec<(PatientStatus, i64)>> {
        let rows = sqlx::query_as::<_, DbStatusCount>(
            "SELECT status, COUNT(*) AS count FROM patients GROUP BY status",
        )
        .fetch_all(self.pool.pool())
        .await?;
        rows.into_iter().map(|r| r.decode("patients.status")).collect()
    }
}

// ========== 治疗相关操作 ==========

const TREATMENT_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR patient_id = $1)
      AND ($2::text IS NULL OR status = $2)
      AND ($3::text IS NULL OR treatment_type = $3)
"#;

#[async_trait]
impl TreatmentRepository for DatabaseQueries {
    async fn insert_treatment(&self, treatment: &Treatment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO treatments (id, patient_id, treatment_type, tooth_number, description, cost,
                                    scheduled_at, started_at, completed_at, notes, status,
                                    created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
        )
        .bind(treatment.id)
        .bind(treatment.patient_id)
        .bind(treatment.treatment_type.as_str())
        .bind(treatment.tooth_number)
        .bind(&treatment.description)
        .bind(treatment.cost)
        .bind(treatment.scheduled_at)
        .bind(treatment.started_at)
        .bind(treatment.completed_at)
        .bind(&treatment.notes)
        .bind(treatment.status.as_str())
        .bind(treatment.created_at)
        .bind(treatment.updated_at)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn get_treatment(&self, id: Uuid) -> Result<Option<Treatment>> {
        let row = sqlx::query_as::<_, DbTreatment>("SELECT * FROM treatments WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        row.map(Treatment::try_from).transpose()
    }

    async fn list_treatments(&self, filter: &TreatmentFilter) -> Result<Page<Treatment>> {
        let pool = self.pool.pool();
        let (limit, offset) = clamp_page(filter.limit, filter.offset);
        let status = filter.status.map(|s| s.as_str());
        let treatment_type = filter.treatment_type.map(|t| t.as_str());

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM treatments {}",
            TREATMENT_FILTER
        ))
        .bind(filter.patient_id)
        .bind(status)
        .bind(treatment_type)
        .fetch_one(pool)
        .await?;

        let rows = sqlx::query_as::<_, DbTreatment>(&format!(
            "SELECT * FROM treatments {} ORDER BY created_at DESC, id LIMIT $4 OFFSET $5",
            TREATMENT_FILTER
        ))
        .bind(filter.patient_id)
        .bind(status)
        .bind(treatment_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(Treatment::try_from)
                .collect::<Result<Vec<_>>>()?,
            total,
            limit,
            offset,
        })
    }

    async fn update_treatment(&self, treatment: &Treatment) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE treatments
            SET treatment_type = $2, tooth_number = $3, description = $4, cost = $5,
                scheduled_at = $6, started_at = $7, completed_at = $8, notes = $9, status = $10,
                updated_at = $11
            WHERE id = $1
        "#,
        )
        .bind(treatment.id)
        .bind(treatment.treatment_type.as_str())
        .bind(treatment.tooth_number)
        .bind(&treatment.description)
        .bind(treatment.cost)
        .bind(treatment.scheduled_at)
        .bind(treatment.started_at)
        .bind(treatment.completed_at)
        .bind(&treatment.notes)
        .bind(treatment.status.as_str())
        .bind(treatment.updated_at)
        .execute(self.pool.pool())
        .await?;
        ensure_updated(result.rows_affected(), "treatment", treatment.id)
    }

    async fn delete_treatment(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM treatments WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_treatments_by_status(
        &self,
        patient_id: Option<Uuid>,
    ) -> Result<Vec<(TreatmentStatus, i64)>> {
        let rows = sqlx::query_as::<_, DbStatusCount>(
            r#"
            SELECT status, COUNT(*) AS count FROM treatments
            WHERE ($1::uuid IS NULL OR patient_id = $1)
            GROUP BY status
        "#,
        )
        .bind(patient_id)
        .fetch_all(self.pool.pool())
        .await?;
        rows.into_iter().map(|r| r.decode("treatments.status")).collect()
    }
}

// ========== 照片相关操作 ==========

#[async_trait]
impl PhotoRepository for DatabaseQueries {
    async fn insert_photo(&self, photo: &Photo) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO photos (id, treatment_id, file_name, content_type, file_size, photo_type,
                                description, taken_at, storage_path, checksum, status,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
        )
        .bind(photo.id)
        .bind(photo.treatment_id)
        .bind(&photo.file_name)
        .bind(&photo.content_type)
        .bind(photo.file_size)
        .bind(photo.photo_type.as_str())
        .bind(&photo.description)
        .bind(photo.taken_at)
        .bind(&photo.storage_path)
        .bind(&photo.checksum)
        .bind(photo.status.as_str())
        .bind(photo.created_at)
        .bind(photo.updated_at)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn get_photo(&self, id: Uuid) -> Result<Option<Photo>> {
        let row = sqlx::query_as::<_, DbPhoto>("SELECT * FROM photos WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        row.map(Photo::try_from).transpose()
    }

    async fn list_photos_by_treatment(&self, treatment_id: Uuid) -> Result<Vec<Photo>> {
        let rows = sqlx::query_as::<_, DbPhoto>(
            "SELECT * FROM photos WHERE treatment_id = $1 ORDER BY created_at, id",
        )
        .bind(treatment_id)
        .fetch_all(self.pool.pool())
        .await?;
        rows.into_iter().map(Photo::try_from).collect()
    }

    async fn update_photo(&self, photo: &Photo) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE photos
            SET file_name = $2, content_type = $3, file_size = $4, photo_type = $5,
                description = $6, taken_at = $7, storage_path = $8, checksum = $9, status = $10,
                updated_at = $11
            WHERE id = $1
        "#,
        )
        .bind(photo.id)
        .bind(&photo.file_name)
        .bind(&photo.content_type)
        .bind(photo.file_size)
        .bind(photo.photo_type.as_str())
        .bind(&photo.description)
        .bind(photo.taken_at)
        .bind(&photo.storage_path)
        .bind(&photo.checksum)
        .bind(photo.status.as_str())
        .bind(photo.updated_at)
        .execute(self.pool.pool())
        .await?;
        ensure_updated(result.rows_affected(), "photo", photo.id)
    }

    async fn delete_photo(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM photos WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn storage_paths_for_patient(&self, patient_id: Uuid) -> Result<Vec<String>> {
        let paths = sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.storage_path FROM photos p
            JOIN treatments t ON t.id = p.treatment_id
            WHERE t.patient_id = $1 AND p.storage_path IS NOT NULL
        "#,
        )
        .bind(patient_id)
        .fetch_all(self.pool.pool())
        .await?;
        Ok(paths)
    }

    async fn storage_paths_for_treatment(&self, treatment_id: Uuid) -> Result<Vec<String>> {
        let paths = sqlx::query_scalar::<_, String>(
            "SELECT storage_path FROM photos WHERE treatment_id = $1 AND storage_path IS NOT NULL",
        )
        .bind(treatment_id)
        .fetch_all(self.pool.pool())
        .await?;
        Ok(paths)
    }

    async fn count_photos_for_patient(&self, patient_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM photos p
            JOIN treatments t ON t.id = p.treatment_id
            WHERE t.patient_id = $1
        "#,
        )
        .bind(patient_id)
        .fetch_one(self.pool.pool())
        .await?;
        Ok(count)
    }
}

// ========== 分析相关操作 ==========

#[async_trait]
impl AnalysisRepository for DatabaseQueries {
    async fn insert_analysis(&self, analysis: &Analysis) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analyses (id, photo_id, analysis_type, model_version, confidence, findings,
                                  error_message, status, started_at, completed_at,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
        )
        .bind(analysis.id)
        .bind(analysis.photo_id)
        .bind(analysis.analysis_type.as_str())
        .bind(&analysis.model_version)
        .bind(analysis.confidence)
        .bind(&analysis.findings)
        .bind(&analysis.error_message)
        .bind(analysis.status.as_str())
        .bind(analysis.started_at)
        .bind(analysis.completed_at)
        .bind(analysis.created_at)
        .bind(analysis.updated_at)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn get_analysis(&self, id: Uuid) -> Result<Option<Analysis>> {
        let row = sqlx::query_as::<_, DbAnalysis>("SELECT * FROM analyses WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        row.map(Analysis::try_from).transpose()
    }

    async fn list_analyses_by_photo(&self, photo_id: Uuid) -> Result<Vec<Analysis>> {
        let rows = sqlx::query_as::<_, DbAnalysis>(
            "SELECT * FROM analyses WHERE photo_id = $1 ORDER BY created_at, id",
        )
        .bind(photo_id)
        .fetch_all(self.pool.pool())
        .await?;
        rows.into_iter().map(Analysis::try_from).collect()
    }

    async fn update_analysis(&self, analysis: &Analysis) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE analyses
            SET model_version = $2, confidence = $3, findings = $4, error_message = $5,
                status = $6, started_at = $7, completed_at = $8, updated_at = $9
            WHERE id = $1
        "#,
        )
        .bind(analysis.id)
        .bind(&analysis.model_version)
        .bind(analysis.confidence)
        .bind(&analysis.findings)
        .bind(&analysis.error_message)
        .bind(analysis.status.as_str())
        .bind(analysis.started_at)
        .bind(analysis.completed_at)
        .bind(analysis.updated_at)
        .execute(self.pool.pool())
        .await?;
        ensure_updated(result.rows_affected(), "analysis", analysis.id)
    }

    async fn delete_analysis(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM analyses WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_analyses_by_status(&self) -> Result<Vec<(AnalysisStatus, i64)>> {
        let rows = sqlx::query_as::<_, DbStatusCount>(
            "SELECT status, COUNT(*) AS count FROM analyses GROUP BY status",
        )
        .fetch_all(self.pool.pool())
        .await?;
        rows.into_iter().map(|r| r.decode("analyses.status")).collect()
    }
}

// ========== 用户相关操作 ==========

#[async_trait]
impl UserRepository for DatabaseQueries {
    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, full_name, role, password_hash, is_active,
                               last_login_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(self.pool.pool())
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, DbUser>("SELECT * FROM users ORDER BY username")
            .fetch_all(self.pool.pool())
            .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, full_name = $3, role = $4, password_hash = $5, is_active = $6,
                last_login_at = $7, updated_at = $8
            WHERE id = $1
        "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.last_login_at)
        .bind(user.updated_at)
        .execute(self.pool.pool())
        .await?;
        ensure_updated(result.rows_affected(), "user", user.id)
    }

    async fn count_users(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool.pool())
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl HealthCheck for DatabaseQueries {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(self.pool.pool()).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
