use crate::core::Storage;
use crate::domain::model::Payload;
use crate::utils::error::{LoadTestError, Result};
use bytes::Bytes;

pub const MP3_CONTENT_TYPE: &str = "audio/mp3";
pub const RAW_AUDIO_CONTENT_TYPE: &str = "audio/x-raw;rate=22050;format=f32le;channels=1";

/// 依副檔名決定預設的 Content-Type
pub fn default_content_type(file_name: &str) -> &'static str {
    if file_name.ends_with(".mp3") {
        MP3_CONTENT_TYPE
    } else {
        RAW_AUDIO_CONTENT_TYPE
    }
}

impl Payload {
    /// 在初始化階段讀入目標音檔，找不到時列出 dataset 中可用的檔案
    pub async fn load<S: Storage>(
        storage: &S,
        target_file: &str,
        content_type: Option<&str>,
    ) -> Result<Self> {
        let available = storage.list_files().await?;
        if !available.iter().any(|name| name == target_file) {
            return Err(LoadTestError::PayloadError {
                message: format!(
                    "File {} not found. Available: {}",
                    target_file,
                    available.join(", ")
                ),
            });
        }

        let body = storage.read_file(target_file).await?;
        let content_type = content_type
            .map(str::to_string)
            .unwrap_or_else(|| default_content_type(target_file).to_string());

        tracing::info!(
            "🎵 Loaded payload {} ({} bytes, {})",
            target_file,
            body.len(),
            content_type
        );

        let payload = Payload {
            name: target_file.to_string(),
            content_type,
            body: Bytes::from(body),
        };
        if payload.is_empty() {
            tracing::warn!("⚠️ Payload {} is empty, the endpoint will receive no audio", target_file);
        }
        Ok(payload)
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cli::LocalStorage;
    use tempfile::TempDir;

    fn dataset() -> (TempDir, LocalStorage) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("10sec_test.mp3"), b"ID3-short").unwrap();
        std::fs::write(dir.path().join("35sec_test.mp3"), b"ID3-long").unwrap();
        std::fs::write(dir.path().join("tone.raw"), [0u8; 16]).unwrap();
        let storage = LocalStorage::new(dir.path().to_string_lossy().to_string());
        (dir, storage)
    }

    #[test]
    fn test_default_content_type() {
        assert_eq!(default_content_type("10sec_test.mp3"), "audio/mp3");
        assert_eq!(
            default_content_type("tone.raw"),
            "audio/x-raw;rate=22050;format=f32le;channels=1"
        );
    }

    #[tokio::test]
    async fn test_load_mp3_payload() {
        let (_dir, storage) = dataset();
        let payload = Payload::load(&storage, "10sec_test.mp3", None).await.unwrap();

        assert_eq!(payload.name, "10sec_test.mp3");
        assert_eq!(payload.content_type, "audio/mp3");
        assert_eq!(&payload.body[..], b"ID3-short");
    }

    #[tokio::test]
    async fn test_content_type_override() {
        let (_dir, storage) = dataset();
        let payload = Payload::load(&storage, "tone.raw", Some("audio/wav"))
            .await
            .unwrap();
        assert_eq!(payload.content_type, "audio/wav");
        assert_eq!(payload.len(), 16);
    }

    #[tokio::test]
    async fn test_missing_file_lists_available() {
        let (_dir, storage) = dataset();
        let err = Payload::load(&storage, "60sec_test.mp3", None)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Payload error: File 60sec_test.mp3 not found. Available: 10sec_test.mp3, 35sec_test.mp3, tone.raw"
        );
    }
}
