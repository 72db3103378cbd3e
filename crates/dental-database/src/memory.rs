//! 内存仓储实现
//!
//! 与 PostgreSQL 实现语义一致（级联删除、唯一约束），用于测试和演示环境。

use async_trait::async_trait;
use dental_core::utils::{clamp_page, contains_ignore_case};
use dental_core::{
    Analysis, AnalysisStatus, DentalError, Page, Patient, PatientFilter, PatientStatus, Photo,
    Result, Treatment, TreatmentFilter, TreatmentStatus, User,
};
use std::collections::HashMap;
use std::hash::Hash;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::repository::*;

#[derive(Debug, Default)]
struct Tables {
    patients: HashMap<Uuid, Patient>,
    treatments: HashMap<Uuid, Treatment>,
    photos: HashMap<Uuid, Photo>,
    analyses: HashMap<Uuid, Analysis>,
    users: HashMap<Uuid, User>,
}

impl Tables {
    fn treatment_ids_of(&self, patient_id: Uuid) -> Vec<Uuid> {
        self.treatments
            .values()
            .filter(|t| t.patient_id == patient_id)
            .map(|t| t.id)
            .collect()
    }

    fn photo_ids_of(&self, treatment_id: Uuid) -> Vec<Uuid> {
        self.photos
            .values()
            .filter(|p| p.treatment_id == treatment_id)
            .map(|p| p.id)
            .collect()
    }

    fn remove_photo_cascade(&mut self, photo_id: Uuid) -> bool {
        self.analyses.retain(|_, a| a.photo_id != photo_id);
        self.photos.remove(&photo_id).is_some()
    }

    fn remove_treatment_cascade(&mut self, treatment_id: Uuid) -> bool {
        for photo_id in self.photo_ids_of(treatment_id) {
            self.remove_photo_cascade(photo_id);
        }
        self.treatments.remove(&treatment_id).is_some()
    }

    fn remove_patient_cascade(&mut self, patient_id: Uuid) -> bool {
        for treatment_id in self.treatment_ids_of(patient_id) {
            self.remove_treatment_cascade(treatment_id);
        }
        self.patients.remove(&patient_id).is_some()
    }
}

/// 内存存储
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(mut items: Vec<T>, limit: Option<i64>, offset: Option<i64>) -> Page<T> {
    let (limit, offset) = clamp_page(limit, offset);
    let total = items.len() as i64;
    let start = (offset as usize).min(items.len());
    let end = (start + limit as usize).min(items.len());
    let items: Vec<T> = items.drain(start..end).collect();
    Page {
        items,
        total,
        limit,
        offset,
    }
}

fn count_by<T, K, F>(items: impl Iterator<Item = T>, key: F) -> Vec<(K, i64)>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut counts: HashMap<K, i64> = HashMap::new();
    for item in items {
        *counts.entry(key(&item)).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

#[async_trait]
impl PatientRepository for InMemoryStore {
    async fn insert_patient(&self, patient: &Patient) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.patients.contains_key(&patient.id) {
            return Err(DentalError::Conflict(format!("patient {} already exists", patient.id)));
        }
        tables.patients.insert(patient.id, patient.clone());
        Ok(())
    }

    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>> {
        Ok(self.tables.read().await.patients.get(&id).cloned())
    }

    async fn list_patients(&self, filter: &PatientFilter) -> Result<Page<Patient>> {
        let tables = self.tables.read().await;
        let search = filter.search.as_deref().filter(|s| !s.trim().is_empty());

        let mut matched: Vec<Patient> = tables
            .patients
            .values()
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .filter(|p| {
                search.map_or(true, |term| {
                    contains_ignore_case(&p.full_name(), term)
                        || p.email.as_deref().is_some_and(|e| contains_ignore_case(e, term))
                        || p.phone.as_deref().is_some_and(|ph| contains_ignore_case(ph, term))
                })
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id))
        });

        Ok(paginate(matched, filter.limit, filter.offset))
    }

    async fn update_patient(&self, patient: &Patient) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.patients.get_mut(&patient.id) {
            Some(existing) => {
                *existing = patient.clone();
                Ok(())
            }
            None => Err(DentalError::not_found("patient", patient.id)),
        }
    }

    async fn delete_patient(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.remove_patient_cascade(id))
    }

    async fn count_patients_by_status(&self) -> Result<Vec<(PatientStatus, i64)>> {
        let tables = self.tables.read().await;
        Ok(count_by(tables.patients.values(), |p| p.status))
    }
}

#[async_trait]
impl TreatmentRepository for InMemoryStore {
    async fn insert_treatment(&self, treatment: &Treatment) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.patients.contains_key(&treatment.patient_id) {
            return Err(DentalError::Validation(format!(
                "patient {} does not exist",
                treatment.patient_id
            )));
        }
        tables.treatments.insert(treatment.id, treatment.clone());
        Ok(())
    }

    async fn get_treatment(&self, id: Uuid) -> Result<Option<Treatment>> {
        Ok(self.tables.read().await.treatments.get(&id).cloned())
    }

    async fn list_treatments(&self, filter: &TreatmentFilter) -> Result<Page<Treatment>> {
        let tables = self.tables.read().await;
        let mut matched: Vec<Treatment> = tables
            .treatments
            .values()
            .filter(|t| filter.patient_id.map_or(true, |id| t.patient_id == id))
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| filter.treatment_type.map_or(true, |ty| t.treatment_type == ty))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        Ok(paginate(matched, filter.limit, filter.offset))
    }

    async fn update_treatment(&self, treatment: &Treatment) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.treatments.get_mut(&treatment.id) {
            Some(existing) => {
                *existing = treatment.clone();
                Ok(())
            }
            None => Err(DentalError::not_found("treatment", treatment.id)),
        }
    }

    async fn delete_treatment(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.remove_treatment_cascade(id))
    }

    async fn count_treatments_by_status(
        &self,
        patient_id: Option<Uuid>,
    ) -> Result<Vec<(TreatmentStatus, i64)>> {
        let tables = self.tables.read().await;
        let treatments = tables
            .treatments
            .values()
            .filter(|t| patient_id.map_or(true, |id| t.patient_id == id));
        Ok(count_by(treatments, |t| t.status))
    }
}

#[async_trait]
impl PhotoRepository for InMemoryStore {
    async fn insert_photo(&self, photo: &Photo) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.treatments.contains_key(&photo.treatment_id) {
            return Err(DentalError::Validation(format!(
                "treatment {} does not exist",
                photo.treatment_id
            )));
        }
        tables.photos.insert(photo.id, photo.clone());
        Ok(())
    }

    async fn get_photo(&self, id: Uuid) -> Result<Option<Photo>> {
        Ok(self.tables.read().await.photos.get(&id).cloned())
    }

    async fn list_photos_by_treatment(&self, treatment_id: Uuid) -> Result<Vec<Photo>> {
        let tables = self.tables.read().await;
        let mut photos: Vec<Photo> = tables
            .photos
            .values()
            .filter(|p| p.treatment_id == treatment_id)
            .cloned()
            .collect();
        photos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(photos)
    }

    async fn update_photo(&self, photo: &Photo) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.photos.get_mut(&photo.id) {
            Some(existing) => {
                *existing = photo.clone();
                Ok(())
            }
            None => Err(DentalError::not_found("photo", photo.id)),
        }
    }

    async fn delete_photo(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.remove_photo_cascade(id))
    }

    async fn storage_paths_for_patient(&self, patient_id: Uuid) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        let treatment_ids = tables.treatment_ids_of(patient_id);
        Ok(tables
            .photos
            .values()
            .filter(|p| treatment_ids.contains(&p.treatment_id))
            .filter_map(|p| p.storage_path.clone())
            .collect())
    }

    async fn storage_paths_for_treatment(&self, treatment_id: Uuid) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .photos
            .values()
            .filter(|p| p.treatment_id == treatment_id)
            .filter_map(|p| p.storage_path.clone())
            .collect())
    }

    async fn count_photos_for_patient(&self, patient_id: Uuid) -> Result<i64> {
        let tables = self.tables.read().await;
        let treatment_ids = tables.treatment_ids_of(patient_id);
        Ok(tables
            .photos
            .values()
            .filter(|p| treatment_ids.contains(&p.treatment_id))
            .count() as i64)
    }
}

#[async_trait]
impl AnalysisRepository for InMemoryStore {
    async fn insert_analysis(&self, analysis: &Analysis) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.photos.contains_key(&analysis.photo_id) {
            return Err(DentalError::Validation(format!(
                "photo {} does not exist",
                analysis.photo_id
            )));
        }
        tables.analyses.insert(analysis.id, analysis.clone());
        Ok(())
    }

    async fn get_analysis(&self, id: Uuid) -> Result<Option<Analysis>> {
        Ok(self.tables.read().await.analyses.get(&id).cloned())
    }

    async fn list_analyses_by_photo(&self, photo_id: Uuid) -> Result<Vec<Analysis>> {
        let tables = self.tables.read().await;
        let mut analyses: Vec<Analysis> = tables
            .analyses
            .values()
            .filter(|a| a.photo_id == photo_id)
            .cloned()
            .collect();
        analyses.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(analyses)
    }

    async fn update_analysis(&self, analysis: &Analysis) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.analyses.get_mut(&analysis.id) {
            Some(existing) => {
                *existing = analysis.clone();
                Ok(())
            }
            None => Err(DentalError::not_found("analysis", analysis.id)),
        }
    }

    async fn delete_analysis(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.analyses.remove(&id).is_some())
    }

    async fn count_analyses_by_status(&self) -> Result<Vec<(AnalysisStatus, i64)>> {
        let tables = self.tables.read().await;
        Ok(count_by(tables.analyses.values(), |a| a.status))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.users.values().any(|u| {
            u.username == user.username || u.email.eq_ignore_ascii_case(&user.email)
        });
        if duplicate {
            return Err(DentalError::Conflict(format!(
                "username '{}' or email already in use",
                user.username
            )));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(DentalError::not_found("user", user.id)),
        }
    }

    async fn count_users(&self) -> Result<i64> {
        Ok(self.tables.read().await.users.len() as i64)
    }
}

#[async_trait]
impl HealthCheck for InMemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use dental_core::*;

    fn patient(first: &str, last: &str) -> Patient {
        Patient::new(CreatePatientRequest {
            first_name: first.to_string(),
            last_name: last.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 1, 1).unwrap(),
            gender: None,
            email: Some(format!("{}@example.com", first.to_lowercase())),
            phone: None,
            address: None,
            medical_history: None,
            allergies: None,
        })
    }

    fn treatment(patient_id: Uuid) -> Treatment {
        Treatment::new(
            patient_id,
            CreateTreatmentRequest {
                treatment_type: TreatmentType::Filling,
                tooth_number: Some(16),
                description: None,
                cost: Some(120.0),
                scheduled_at: None,
                notes: None,
            },
        )
    }

    fn photo(treatment_id: Uuid) -> Photo {
        Photo::new(
            treatment_id,
            CreatePhotoRequest {
                file_name: "bitewing.png".to_string(),
                content_type: "image/png".to_string(),
                photo_type: PhotoType::Xray,
                description: None,
                taken_at: None,
            },
        )
    }

    #[tokio::test]
    async fn test_patient_search_and_paging() {
        let store = InMemoryStore::new();
        for (first, last) in [("Alice", "Zephyr"), ("Bob", "Young"), ("Carol", "Young")] {
            store.insert_patient(&patient(first, last)).await.unwrap();
        }

        let page = store
            .list_patients(&PatientFilter {
                search: Some("young".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].first_name, "Bob");

        let page = store
            .list_patients(&PatientFilter {
                limit: Some(1),
                offset: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].last_name, "Zephyr");
    }

    #[tokio::test]
    async fn test_delete_patient_cascades() {
        let store = InMemoryStore::new();
        let p = patient("Dan", "Root");
        store.insert_patient(&p).await.unwrap();
        let t = treatment(p.id);
        store.insert_treatment(&t).await.unwrap();
        let mut ph = photo(t.id);
        ph.storage_path = Some("photos/x".to_string());
        store.insert_photo(&ph).await.unwrap();
        let a = Analysis::new(
            ph.id,
            CreateAnalysisRequest {
                analysis_type: AnalysisType::Caries,
                model_version: None,
            },
        );
        store.insert_analysis(&a).await.unwrap();

        assert_eq!(store.storage_paths_for_patient(p.id).await.unwrap(), vec!["photos/x"]);
        assert!(store.delete_patient(p.id).await.unwrap());
        assert!(store.get_treatment(t.id).await.unwrap().is_none());
        assert!(store.get_photo(ph.id).await.unwrap().is_none());
        assert!(store.get_analysis(a.id).await.unwrap().is_none());
        assert!(!store.delete_patient(p.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_orphan_insert_rejected() {
        let store = InMemoryStore::new();
        let err = store.insert_treatment(&treatment(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, DentalError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.update_patient(&patient("Eve", "Gone")).await.unwrap_err();
        assert!(matches!(err, DentalError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_username_conflict() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: "admin".to_string(),
            email: "admin@clinic.test".to_string(),
            full_name: "Admin".to_string(),
            role: UserRole::Admin,
            password_hash: "hash".to_string(),
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        store.insert_user(&user).await.unwrap();
        let mut dup = user.clone();
        dup.id = Uuid::new_v4();
        let err = store.insert_user(&dup).await.unwrap_err();
        assert!(matches!(err, DentalError::Conflict(_)));
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_treatment_counts_by_status() {
        let store = InMemoryStore::new();
        let p = patient("Fay", "Count");
        store.insert_patient(&p).await.unwrap();
        store.insert_treatment(&treatment(p.id)).await.unwrap();
        let mut done = treatment(p.id);
        done.status = TreatmentStatus::Completed;
        store.insert_treatment(&done).await.unwrap();

        let mut counts = store.count_treatments_by_status(Some(p.id)).await.unwrap();
        counts.sort_by_key(|(s, _)| s.as_str());
        assert_eq!(
            counts,
            vec![(TreatmentStatus::Completed, 1), (TreatmentStatus::Planned, 1)]
        );
    }
}
