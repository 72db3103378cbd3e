//! 照片存储管理

use dental_core::{DentalError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 已存储对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// 相对存储根目录的路径
    pub path: String,
    pub size: i64,
    /// SHA-256 十六进制摘要
    pub checksum: String,
}

/// 存储管理器
#[derive(Debug, Clone)]
pub struct StorageManager {
    base_path: PathBuf,
}

impl StorageManager {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// 照片的相对存储路径，只由UUID组成
    pub fn photo_path(treatment_id: Uuid, photo_id: Uuid) -> String {
        format!("photos/{}/{}", treatment_id, photo_id)
    }

    /// 存储照片内容
    pub async fn store_photo(
        &self,
        treatment_id: Uuid,
        photo_id: Uuid,
        data: &[u8],
    ) -> Result<StoredObject> {
        self.store_file(data, &Self::photo_path(treatment_id, photo_id))
            .await
    }

    /// 存储文件：先写临时文件再重命名，避免读到半截内容
    pub async fn store_file(&self, data: &[u8], path: &str) -> Result<StoredObject> {
        let full_path = self.resolve(path)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = full_path.with_extension("part");
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, &full_path).await?;

        let stored = StoredObject {
            path: path.to_string(),
            size: data.len() as i64,
            checksum: sha256_hex(data),
        };
        info!(path = %stored.path, size = stored.size, "Stored file");
        Ok(stored)
    }

    /// 获取文件
    pub async fn get_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path)?;
        match tokio::fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(DentalError::NotFound(format!("stored file {} not found", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 删除文件，文件不存在时返回 `false`
    pub async fn delete_file(&self, path: &str) -> Result<bool> {
        let full_path = self.resolve(path)?;
        match tokio::fs::remove_file(&full_path).await {
            Ok(()) => {
                debug!(path, "Deleted stored file");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// 批量删除，单个失败只记录日志
    pub async fn delete_files(&self, paths: &[String]) -> usize {
        let mut deleted = 0;
        for path in paths {
            match self.delete_file(path).await {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => warn!(path = %path, error = %e, "Failed to delete stored file"),
            }
        }
        deleted
    }

    /// 检查存储根目录可写
    pub async fn ensure_ready(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| {
                DentalError::Storage(format!(
                    "cannot create storage root {}: {}",
                    self.base_path.display(),
                    e
                ))
            })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(DentalError::Storage(format!("invalid storage path '{}'", path)));
        }
        Ok(self.base_path.join(relative))
    }
}

/// 计算 SHA-256 十六进制摘要
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path());
        let treatment_id = Uuid::new_v4();
        let photo_id = Uuid::new_v4();

        let stored = storage
            .store_photo(treatment_id, photo_id, b"jpeg-bytes")
            .await
            .unwrap();
        assert_eq!(stored.size, 10);
        assert_eq!(stored.checksum, sha256_hex(b"jpeg-bytes"));
        assert_eq!(stored.path, StorageManager::photo_path(treatment_id, photo_id));

        let data = storage.get_file(&stored.path).await.unwrap();
        assert_eq!(data, b"jpeg-bytes");

        assert!(storage.delete_file(&stored.path).await.unwrap());
        assert!(!storage.delete_file(&stored.path).await.unwrap());
        assert!(matches!(
            storage.get_file(&stored.path).await,
            Err(DentalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path());
        for bad in ["../outside", "/etc/passwd", "photos/../../x", ""] {
            let result = storage.store_file(b"x", bad).await;
            assert!(matches!(result, Err(DentalError::Storage(_))), "{} accepted", bad);
        }
    }

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
