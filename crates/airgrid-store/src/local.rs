use crate::{ByteStream, ObjectStore, StoreError, StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use fs2::FileExt;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::task::spawn_blocking;
use uuid::Uuid;
use walkdir::WalkDir;

const LOCK_DIR: &str = ".locks";
const LOCK_SUFFIX: &str = ".lock";
const TEMP_MARKER: &str = ".tmp-";

/// Directory-backed store. Writes land in a temp file and are renamed into
/// place, so a key either exists with its full content or not at all.
/// Per-key lock files live under `.locks/`, outside the key tree.
#[derive(Debug, Clone)]
pub struct LocalFsStore {
    base_dir: PathBuf,
}

impl LocalFsStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalFsStore {
    async fn put_stream(&self, key: &str, mut body: ByteStream) -> Result<StoredObject, StoreError> {
        let path = key_to_path(&self.base_dir, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let tmp = temp_path(&path);
        let (size, etag) = match write_temp(&tmp, key, &mut body).await {
            Ok(written) => written,
            Err(error) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(error);
            }
        };
        drop(body);

        let base_dir = self.base_dir.clone();
        let owned_key = key.to_string();
        let tmp_path = tmp.clone();
        let committed = run_blocking(move || {
            with_key_lock(&base_dir, &owned_key, |path| {
                if path.exists() {
                    return Err(StoreError::AlreadyExists(owned_key.clone()));
                }
                fs::rename(&tmp_path, &path).map_err(io_err)
            })
        })
        .await;
        if let Err(error) = committed {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(error);
        }

        Ok(StoredObject {
            key: key.to_string(),
            size,
            etag,
        })
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let base_dir = self.base_dir.clone();
        let key = key.to_string();
        run_blocking(move || {
            let path = key_to_path(&base_dir, &key)?;
            if !path.is_file() {
                return Err(StoreError::NotFound(key));
            }
            let body = fs::read(&path).map_err(io_err)?;
            Ok(Bytes::from(body))
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let base_dir = self.base_dir.clone();
        let key = key.to_string();
        run_blocking(move || {
            let path = key_to_path(&base_dir, &key)?;
            Ok(path.is_file())
        })
        .await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let base_dir = self.base_dir.clone();
        let prefix = prefix.to_string();
        run_blocking(move || {
            if !base_dir.exists() {
                return Ok(Vec::new());
            }
            let mut keys = Vec::new();
            let entries = WalkDir::new(&base_dir)
                .into_iter()
                .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == LOCK_DIR));
            for entry in entries {
                let entry = entry.map_err(|e| StoreError::Io(e.to_string()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if entry.file_name().to_string_lossy().contains(TEMP_MARKER) {
                    continue;
                }
                let rel = entry
                    .path()
                    .strip_prefix(&base_dir)
                    .map_err(|e| StoreError::Other(e.to_string()))?;
                let key = rel
                    .iter()
                    .map(|part| part.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(&prefix) {
                    keys.push(key);
                }
            }
            keys.sort();
            Ok(keys)
        })
        .await
    }
}

async fn write_temp(
    tmp: &Path,
    key: &str,
    body: &mut ByteStream,
) -> Result<(u64, String), StoreError> {
    let mut file = tokio::fs::File::create(tmp).await.map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut size = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| StoreError::Source {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        hasher.update(&chunk);
        size += chunk.len() as u64;
        file.write_all(&chunk).await.map_err(io_err)?;
    }

    file.flush().await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    Ok((size, format!("{:x}", hasher.finalize())))
}

async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Other(format!("blocking task join error: {e}")))?
}

fn key_to_path(base_dir: &Path, key: &str) -> Result<PathBuf, StoreError> {
    if key.is_empty() {
        return Err(StoreError::Other("key cannot be empty".to_string()));
    }
    let key_path = Path::new(key);
    if key_path.components().next() == Some(Component::Normal(LOCK_DIR.as_ref())) {
        return Err(StoreError::Other(format!("reserved key path: {key}")));
    }
    for component in key_path.components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StoreError::Other(format!("invalid key path: {key}")));
            }
        }
    }
    Ok(base_dir.join(key_path))
}

fn temp_path(path: &Path) -> PathBuf {
    PathBuf::from(format!(
        "{}{TEMP_MARKER}{}",
        path.to_string_lossy(),
        Uuid::new_v4()
    ))
}

fn with_key_lock<T, F>(base_dir: &Path, key: &str, f: F) -> Result<T, StoreError>
where
    F: FnOnce(PathBuf) -> Result<T, StoreError>,
{
    let path = key_to_path(base_dir, key)?;
    let lock_path = base_dir
        .join(LOCK_DIR)
        .join(format!("{}{LOCK_SUFFIX}", key.trim_start_matches("./")));
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(io_err)?;
    lock_exclusive(&file)?;
    let result = f(path);
    unlock(&file)?;
    result
}

fn lock_exclusive(file: &File) -> Result<(), StoreError> {
    file.lock_exclusive().map_err(io_err)
}

fn unlock(file: &File) -> Result<(), StoreError> {
    FileExt::unlock(file).map_err(io_err)
}

fn io_err(error: std::io::Error) -> StoreError {
    StoreError::Io(error.to_string())
}
