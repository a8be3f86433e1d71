use crate::error::{AppError, AppResult};
use crate::models::{ImagePatch, ImageRecord};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Image metadata kept as one JSON array on disk.
///
/// Every mutation rewrites the whole file. Writers are serialised by an in-process lock and the
/// file is replaced by rename, so readers never see a partial array. Nothing coordinates with
/// other processes sharing the same file.
pub struct MetadataStore {
    metadata_file: PathBuf,
    upload_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl MetadataStore {
    pub fn new(metadata_file: PathBuf, upload_dir: PathBuf) -> Self {
        Self {
            metadata_file,
            upload_dir,
            write_lock: Mutex::new(()),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Where the backing file of `record` lives. It may not exist.
    pub fn file_path(&self, record: &ImageRecord) -> PathBuf {
        self.upload_dir.join(record.file_name())
    }

    pub async fn list(&self) -> AppResult<Vec<ImageRecord>> {
        self.read_all().await
    }

    pub async fn get(&self, id: &str) -> AppResult<ImageRecord> {
        let records = self.read_all().await?;
        let index = find_index(&records, id)?;
        Ok(records[index].clone())
    }

    pub async fn create(&self, record: ImageRecord) -> AppResult<ImageRecord> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;
        records.push(record.clone());
        self.write_all(&records).await?;
        Ok(record)
    }

    /// Apply the writable fields of `patch`; everything else on the record is left alone.
    pub async fn patch(&self, id: &str, patch: ImagePatch) -> AppResult<ImageRecord> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;
        let index = find_index(&records, id)?;
        if let Some(name) = patch.original_name {
            records[index].original_name = name;
        }
        let updated = records[index].clone();
        self.write_all(&records).await?;
        Ok(updated)
    }

    /// Remove the record, then try to unlink its file. Unlink failures are logged and ignored.
    pub async fn delete(&self, id: &str) -> AppResult<ImageRecord> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;
        let index = find_index(&records, id)?;
        let removed = records.remove(index);
        self.write_all(&records).await?;

        let path = self.file_path(&removed);
        if let Err(e) = fs::remove_file(&path).await {
            tracing::warn!("Failed to remove {} for image {}: {}", path.display(), removed.id, e);
        }
        Ok(removed)
    }

    async fn read_all(&self) -> AppResult<Vec<ImageRecord>> {
        let bytes = match fs::read(&self.metadata_file).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write_all(&self, records: &[ImageRecord]) -> AppResult<()> {
        if let Some(parent) = self.metadata_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_vec_pretty(records)?;
        let mut tmp = self.metadata_file.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.metadata_file).await?;
        Ok(())
    }
}

fn find_index(records: &[ImageRecord], id: &str) -> AppResult<usize> {
    let not_found = || AppError::NotFound("Image not found".to_string());
    let id = Uuid::parse_str(id).map_err(|_| not_found())?;
    records
        .iter()
        .position(|record| record.id == id)
        .ok_or_else(not_found)
}
