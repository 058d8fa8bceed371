//! Comment persistence.
//!
//! Each accepted request becomes one file named
//! `<YYYY-MM-DD_HH-MM-SS>_<port>.comment` in the comment directory. Two
//! requests finishing within the same second on the same port map to the
//! same name, and the later one overwrites the earlier.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use commentd_core::{CommentError, CommentResult};
use tokio::io::AsyncWriteExt;

/// File extension of persisted comments.
pub const COMMENT_EXTENSION: &str = "comment";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// A persisted comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    /// Path of the comment file.
    pub path: PathBuf,
    /// Number of bytes written.
    pub len: usize,
}

/// Writes validated requests into the comment directory.
#[derive(Debug, Clone)]
pub struct CommentStore {
    dir: PathBuf,
}

impl CommentStore {
    /// Creates a store writing into `dir`. The directory is not created.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The comment directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists `bytes` as a comment received on `port`, stamped now.
    pub async fn persist(&self, port: u16, bytes: &[u8]) -> CommentResult<CommentRecord> {
        self.persist_at(port, bytes, &Local::now()).await
    }

    /// Persists `bytes` as a comment received on `port` at `now`.
    ///
    /// # Errors
    ///
    /// Returns `Timestamp` or `Path` if the file name cannot be built,
    /// `FileOpen` if the file cannot be created, and `ShortWrite` if the
    /// bytes are not fully written. A partially written file is left behind.
    pub async fn persist_at(
        &self,
        port: u16,
        bytes: &[u8],
        now: &DateTime<Local>,
    ) -> CommentResult<CommentRecord> {
        let timestamp = format_timestamp(now)?;
        let path = self.path_for(&timestamp, port)?;

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|source| CommentError::FileOpen {
                path: path.clone(),
                source,
            })?;

        let written = async {
            file.write_all(bytes).await?;
            file.flush().await
        };
        written.await.map_err(|source| CommentError::ShortWrite {
            path: path.clone(),
            source,
        })?;

        Ok(CommentRecord {
            path,
            len: bytes.len(),
        })
    }

    /// Builds `<dir>/<timestamp>_<port>.comment`.
    pub fn path_for(&self, timestamp: &str, port: u16) -> CommentResult<PathBuf> {
        if self.dir.as_os_str().is_empty() {
            return Err(CommentError::path("comment directory is empty"));
        }
        if timestamp.is_empty() || timestamp.contains(std::path::is_separator) {
            return Err(CommentError::path(format!(
                "unusable timestamp {timestamp:?}"
            )));
        }
        Ok(self
            .dir
            .join(format!("{timestamp}_{port}.{COMMENT_EXTENSION}")))
    }
}

/// Formats `now` as `YYYY-MM-DD_HH-MM-SS`.
pub fn format_timestamp(now: &DateTime<Local>) -> CommentResult<String> {
    let mut timestamp = String::with_capacity(19);
    write!(timestamp, "{}", now.format(TIMESTAMP_FORMAT)).map_err(|_| CommentError::Timestamp)?;
    Ok(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(&fixed_time()).unwrap(), "2024-03-09_07-05-01");
    }

    #[test]
    fn test_path_for() {
        let store = CommentStore::new("/srv/comments");
        assert_eq!(
            store.path_for("2024-03-09_07-05-01", 8080).unwrap(),
            PathBuf::from("/srv/comments/2024-03-09_07-05-01_8080.comment")
        );
    }

    #[test]
    fn test_path_for_empty_dir() {
        let store = CommentStore::new("");
        assert!(matches!(
            store.path_for("2024-03-09_07-05-01", 8080),
            Err(CommentError::Path { .. })
        ));
    }

    #[test]
    fn test_path_for_bad_timestamp() {
        let store = CommentStore::new("/srv/comments");
        assert!(store.path_for("", 8080).is_err());
        assert!(store.path_for("../etc", 8080).is_err());
    }

    #[tokio::test]
    async fn test_persist_writes_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = CommentStore::new(dir.path());

        let record = store
            .persist_at(8081, "caf\u{e9}\n".as_bytes(), &fixed_time())
            .await
            .unwrap();

        assert_eq!(record.path, dir.path().join("2024-03-09_07-05-01_8081.comment"));
        assert_eq!(record.len, 6);
        assert_eq!(std::fs::read(&record.path).unwrap(), "caf\u{e9}\n".as_bytes());
    }

    #[tokio::test]
    async fn test_persist_same_second_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = CommentStore::new(dir.path());

        store.persist_at(8080, b"first", &fixed_time()).await.unwrap();
        let record = store.persist_at(8080, b"second", &fixed_time()).await.unwrap();

        assert_eq!(std::fs::read(&record.path).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_persist_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = CommentStore::new(dir.path().join("missing"));

        let err = store.persist(8080, b"hello").await.unwrap_err();
        assert!(matches!(err, CommentError::FileOpen { .. }));
    }
}
