//! File Storage - 文件系统项目产物存储实现
//!
//! 实现 ArtifactStoragePort trait
//!
//! 目录布局:
//! - `{folder}/chapters/chapter_{n:05}.txt` 章节文本
//! - `{folder}/chapters/chapter_{n:05}.{ext}` 章节音频
//! - `{folder}/batch_{index:03}_chapters_{first}_to_{last}.{ext}` 批次音频

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::application::ports::{
    ArtifactStoragePort, AudioClip, AudioFileInfo, AudioFormat, RemovedArtifacts, StorageError,
};
use crate::domain::project::NovelName;

const CHAPTERS_DIR: &str = "chapters";
const BATCH_PREFIX: &str = "batch_";

/// 文件系统产物存储
pub struct FileArtifactStorage {
    /// 输出根目录
    base_dir: PathBuf,
}

impl FileArtifactStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// 获取输出根目录
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn chapter_stem(folder: &str, number: u32) -> PathBuf {
        Path::new(folder)
            .join(CHAPTERS_DIR)
            .join(format!("chapter_{:05}", number))
    }

    async fn write_file(path: &Path, data: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        // 先写临时文件再重命名，避免留下半截文件
        let tmp = path.with_extension("part");
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

fn is_batch_file(name: &str) -> bool {
    name.starts_with(BATCH_PREFIX)
        && Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(AudioFormat::from_extension)
            .is_some()
}

#[async_trait]
impl ArtifactStoragePort for FileArtifactStorage {
    fn project_folder(&self, novel_name: &NovelName) -> PathBuf {
        self.base_dir.join(novel_name.folder_name())
    }

    async fn folder_exists(&self, folder: &str) -> bool {
        fs::metadata(folder)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn save_chapter_text(
        &self,
        folder: &str,
        number: u32,
        text: &str,
    ) -> Result<PathBuf, StorageError> {
        let path = Self::chapter_stem(folder, number).with_extension("txt");
        Self::write_file(&path, text.as_bytes()).await?;
        tracing::debug!(chapter = number, path = %path.display(), "Saved chapter text");
        Ok(path)
    }

    async fn read_chapter_text(
        &self,
        folder: &str,
        number: u32,
    ) -> Result<Option<String>, StorageError> {
        let path = Self::chapter_stem(folder, number).with_extension("txt");
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_chapter_audio(
        &self,
        folder: &str,
        number: u32,
        clip: &AudioClip,
    ) -> Result<PathBuf, StorageError> {
        let path = Self::chapter_stem(folder, number).with_extension(clip.format.extension());
        Self::write_file(&path, &clip.data).await?;
        tracing::debug!(
            chapter = number,
            size = clip.data.len(),
            path = %path.display(),
            "Saved chapter audio"
        );
        Ok(path)
    }

    async fn read_audio(&self, path: &str) -> Result<AudioClip, StorageError> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::FileNotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let format = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(AudioFormat::from_extension)
            .or_else(|| AudioFormat::sniff(&data))
            .ok_or_else(|| StorageError::IoError(format!("unknown audio format: {}", path)))?;

        Ok(AudioClip::new(format, data))
    }

    async fn save_batch_audio(
        &self,
        folder: &str,
        batch_index: u32,
        first_chapter: u32,
        last_chapter: u32,
        clip: &AudioClip,
    ) -> Result<PathBuf, StorageError> {
        let filename = format!(
            "{}{:03}_chapters_{}_to_{}.{}",
            BATCH_PREFIX,
            batch_index,
            first_chapter,
            last_chapter,
            clip.format.extension()
        );
        let path = Path::new(folder).join(filename);
        Self::write_file(&path, &clip.data).await?;

        tracing::info!(
            batch = batch_index,
            size = clip.data.len(),
            path = %path.display(),
            "Saved batch audio"
        );
        Ok(path)
    }

    async fn remove_chapter_artifacts(
        &self,
        folder: &str,
        number: u32,
    ) -> Result<RemovedArtifacts, StorageError> {
        let stem = Self::chapter_stem(folder, number);
        let mut removed = RemovedArtifacts::default();

        for ext in ["txt", "wav", "mp3"] {
            let path = stem.with_extension(ext);
            let size = match fs::metadata(&path).await {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match fs::remove_file(&path).await {
                Ok(()) => {
                    removed.files += 1;
                    removed.bytes += size;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        if removed.files > 0 {
            tracing::debug!(chapter = number, files = removed.files, "Removed chapter artifacts");
        }
        Ok(removed)
    }

    async fn list_batch_files(&self, folder: &str) -> Result<Vec<AudioFileInfo>, StorageError> {
        let mut entries = match fs::read_dir(folder).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name().to_string_lossy().to_string();
            if !is_batch_file(&filename) {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            files.push(AudioFileInfo {
                filename,
                path: entry.path(),
                size_bytes: meta.len(),
                modified_at: meta.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    async fn batch_file_path(&self, folder: &str, filename: &str) -> Result<PathBuf, StorageError> {
        if filename.contains(['/', '\\']) || filename.contains("..") || !is_batch_file(filename) {
            return Err(StorageError::InvalidFileName(filename.to_string()));
        }

        let path = Path::new(folder).join(filename);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(StorageError::FileNotFound(filename.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::FileNotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileArtifactStorage, String) {
        let dir = TempDir::new().unwrap();
        let storage = FileArtifactStorage::new(dir.path().join("audio"));
        let folder = storage
            .project_folder(&NovelName::new("My Novel").unwrap())
            .to_string_lossy()
            .to_string();
        (dir, storage, folder)
    }

    #[tokio::test]
    async fn test_chapter_text_roundtrip() {
        let (_dir, storage, folder) = setup();
        assert!(!storage.folder_exists(&folder).await);
        assert_eq!(storage.read_chapter_text(&folder, 1).await.unwrap(), None);

        let path = storage.save_chapter_text(&folder, 1, "Hello").await.unwrap();
        assert!(path.ends_with("chapters/chapter_00001.txt"));
        assert!(storage.folder_exists(&folder).await);
        assert_eq!(
            storage.read_chapter_text(&folder, 1).await.unwrap().as_deref(),
            Some("Hello")
        );
    }

    #[tokio::test]
    async fn test_batch_naming_and_listing() {
        let (_dir, storage, folder) = setup();
        let clip = AudioClip::new(AudioFormat::Mp3, vec![1, 2, 3]);

        storage.save_chapter_audio(&folder, 21, &clip).await.unwrap();
        let path = storage.save_batch_audio(&folder, 3, 21, 23, &clip).await.unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "batch_003_chapters_21_to_23.mp3"
        );
        storage.save_batch_audio(&folder, 1, 1, 10, &clip).await.unwrap();

        let files = storage.list_batch_files(&folder).await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(
            names,
            vec!["batch_001_chapters_1_to_10.mp3", "batch_003_chapters_21_to_23.mp3"]
        );
        assert_eq!(files[0].size_bytes, 3);

        let clip = storage.read_audio(path.to_str().unwrap()).await.unwrap();
        assert_eq!(clip.format, AudioFormat::Mp3);
    }

    #[tokio::test]
    async fn test_batch_file_path_validation() {
        let (_dir, storage, folder) = setup();
        let clip = AudioClip::new(AudioFormat::Wav, vec![0; 8]);
        storage.save_batch_audio(&folder, 1, 1, 2, &clip).await.unwrap();

        assert!(storage
            .batch_file_path(&folder, "batch_001_chapters_1_to_2.wav")
            .await
            .is_ok());
        assert!(matches!(
            storage.batch_file_path(&folder, "../secret.wav").await,
            Err(StorageError::InvalidFileName(_))
        ));
        assert!(matches!(
            storage.batch_file_path(&folder, "chapters").await,
            Err(StorageError::InvalidFileName(_))
        ));
        assert!(matches!(
            storage.batch_file_path(&folder, "batch_009_chapters_1_to_2.wav").await,
            Err(StorageError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_chapter_artifacts() {
        let (_dir, storage, folder) = setup();
        storage.save_chapter_text(&folder, 4, "abcd").await.unwrap();
        storage
            .save_chapter_audio(&folder, 4, &AudioClip::new(AudioFormat::Wav, vec![0; 10]))
            .await
            .unwrap();

        let removed = storage.remove_chapter_artifacts(&folder, 4).await.unwrap();
        assert_eq!(removed, RemovedArtifacts { files: 2, bytes: 14 });

        let again = storage.remove_chapter_artifacts(&folder, 4).await.unwrap();
        assert_eq!(again, RemovedArtifacts::default());
    }
}
