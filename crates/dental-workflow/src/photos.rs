//! 照片命令与查询
//!
//! 照片分两步登记：先创建元数据，再上传二进制内容。
//! 内容写入存储后记录路径、大小和 SHA-256 校验和。

use chrono::Utc;
use dental_core::{
    CreatePhotoRequest, DentalError, Photo, PhotoStatus, Result, TreatmentStatus,
};
use dental_database::Repositories;
use dental_storage::StorageManager;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::state_machine::{PhotoEvent, PhotoStateMachine};

/// 照片内容
#[derive(Debug, Clone, Serialize)]
pub struct PhotoContent {
    pub photo: Photo,
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// 照片服务
#[derive(Debug)]
pub struct PhotoService {
    repos: Repositories,
    storage: StorageManager,
    max_photo_bytes: usize,
    state_machine: PhotoStateMachine,
}

impl PhotoService {
    pub fn new(repos: Repositories, storage: StorageManager, max_photo_bytes: usize) -> Self {
        Self {
            repos,
            storage,
            max_photo_bytes,
            state_machine: PhotoStateMachine::new(),
        }
    }

    /// 登记照片元数据
    pub async fn register(&self, treatment_id: Uuid, request: CreatePhotoRequest) -> Result<Photo> {
        request.validate()?;
        let treatment = self
            .repos
            .treatments
            .get_treatment(treatment_id)
            .await?
            .ok_or_else(|| DentalError::not_found("treatment", treatment_id))?;
        if treatment.status == TreatmentStatus::Cancelled {
            return Err(DentalError::Conflict(format!(
                "treatment {} is cancelled",
                treatment_id
            )));
        }

        let photo = Photo::new(treatment_id, request);
        self.repos.photos.insert_photo(&photo).await?;

        info!(photo_id = %photo.id, treatment_id = %treatment_id, "Registered photo");
        Ok(photo)
    }

    pub async fn get(&self, id: Uuid) -> Result<Photo> {
        self.repos
            .photos
            .get_photo(id)
            .await?
            .ok_or_else(|| DentalError::not_found("photo", id))
    }

    pub async fn list_for_treatment(&self, treatment_id: Uuid) -> Result<Vec<Photo>> {
        if self
            .repos
            .treatments
            .get_treatment(treatment_id)
            .await?
            .is_none()
        {
            return Err(DentalError::not_found("treatment", treatment_id));
        }
        self.repos.photos.list_photos_by_treatment(treatment_id).await
    }

    /// 上传（或替换）照片内容
    pub async fn upload_content(&self, id: Uuid, data: &[u8]) -> Result<Photo> {
        if data.is_empty() {
            return Err(DentalError::Validation("photo content is empty".to_string()));
        }
        if data.len() > self.max_photo_bytes {
            return Err(DentalError::Validation(format!(
                "photo content is {} bytes, limit is {}",
                data.len(),
                self.max_photo_bytes
            )));
        }

        let mut photo = self.get(id).await?;
        match photo.status {
            PhotoStatus::Archived | PhotoStatus::Processing => {
                return Err(DentalError::Conflict(format!(
                    "photo {} is {:?}, content cannot be replaced",
                    id, photo.status
                )));
            }
            _ => {}
        }

        let stored = self
            .storage
            .store_photo(photo.treatment_id, photo.id, data)
            .await?;
        photo.storage_path = Some(stored.path);
        photo.file_size = stored.size;
        photo.checksum = Some(stored.checksum);
        photo.updated_at = Utc::now();
        self.repos.photos.update_photo(&photo).await?;

        info!(photo_id = %id, size = photo.file_size, "Uploaded photo content");
        Ok(photo)
    }

    /// 读取照片内容
    pub async fn download_content(&self, id: Uuid) -> Result<PhotoContent> {
        let photo = self.get(id).await?;
        let path = photo
            .storage_path
            .as_deref()
            .ok_or_else(|| DentalError::NotFound(format!("photo {} has no content", id)))?;
        let data = self.storage.get_file(path).await?;
        debug!(photo_id = %id, size = data.len(), "Read photo content");

        Ok(PhotoContent { photo, data })
    }

    /// 归档照片
    pub async fn archive(&self, id: Uuid) -> Result<Photo> {
        let mut photo = self.get(id).await?;
        photo.status = self
            .state_machine
            .transition(photo.status, PhotoEvent::Archive)?;
        photo.updated_at = Utc::now();
        self.repos.photos.update_photo(&photo).await?;

        info!(photo_id = %id, "Archived photo");
        Ok(photo)
    }

    /// 删除照片、其分析记录和存储文件
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let photo = self.get(id).await?;
        if !self.repos.photos.delete_photo(id).await? {
            return Err(DentalError::not_found("photo", id));
        }
        if let Some(path) = photo.storage_path {
            self.storage.delete_files(&[path]).await;
        }

        info!(photo_id = %id, "Deleted photo");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::state_machine::TreatmentEvent;
    use crate::testing::*;
    use dental_core::*;
    use dental_storage::sha256_hex;

    #[tokio::test]
    async fn test_upload_and_download() {
        let (engine, _dir) = engine();
        let (_patient, _treatment, photo) = seeded_photo(&engine).await;
        assert!(photo.has_content());

        let replaced = engine
            .photos()
            .upload_content(photo.id, b"second version")
            .await
            .unwrap();
        assert_eq!(replaced.file_size, 14);
        assert_eq!(replaced.checksum.as_deref(), Some(sha256_hex(b"second version").as_str()));

        let content = engine.photos().download_content(photo.id).await.unwrap();
        assert_eq!(content.data, b"second version");
        assert_eq!(content.photo.id, photo.id);
    }

    #[tokio::test]
    async fn test_upload_limits() {
        let (engine, _dir) = engine();
        let (_patient, _treatment, photo) = seeded_photo(&engine).await;

        assert!(matches!(
            engine.photos().upload_content(photo.id, b"").await,
            Err(DentalError::Validation(_))
        ));
        let too_big = vec![0u8; 1025];
        assert!(matches!(
            engine.photos().upload_content(photo.id, &too_big).await,
            Err(DentalError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_download_without_content() {
        let (engine, _dir) = engine();
        let (_patient, treatment, _photo) = seeded_photo(&engine).await;
        let empty = engine
            .photos()
            .register(treatment.id, photo_request())
            .await
            .unwrap();
        assert!(matches!(
            engine.photos().download_content(empty.id).await,
            Err(DentalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_requests() {
        let (engine, _dir) = engine();
        let (_patient, treatment, _photo) = seeded_photo(&engine).await;

        let mut request = photo_request();
        request.content_type = "application/pdf".to_string();
        assert!(matches!(
            engine.photos().register(treatment.id, request).await,
            Err(DentalError::Validation(_))
        ));

        engine
            .treatments()
            .apply_event(treatment.id, TreatmentEvent::Cancel)
            .await
            .unwrap();
        assert!(matches!(
            engine.photos().register(treatment.id, photo_request()).await,
            Err(DentalError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_archive_blocks_upload() {
        let (engine, _dir) = engine();
        let (_patient, _treatment, photo) = seeded_photo(&engine).await;
        let archived = engine.photos().archive(photo.id).await.unwrap();
        assert_eq!(archived.status, PhotoStatus::Archived);

        assert!(matches!(
            engine.photos().upload_content(photo.id, b"new").await,
            Err(DentalError::Conflict(_))
        ));
        assert!(matches!(
            engine.photos().archive(photo.id).await,
            Err(DentalError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let (engine, dir) = engine();
        let (_patient, treatment, photo) = seeded_photo(&engine).await;
        let path = dir.path().join(photo.storage_path.clone().unwrap());

        engine.photos().delete(photo.id).await.unwrap();
        assert!(!path.exists());
        assert!(engine
            .photos()
            .list_for_treatment(treatment.id)
            .await
            .unwrap()
            .is_empty());
    }
}
