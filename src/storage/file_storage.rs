use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error_handling::types::StorageError;
use crate::validation::TimezoneReport;

/// A text file that only ever grows by whole lines.
///
/// Every operation holds the file's own lock from open to flush, so concurrent
/// writers never interleave inside a line. Two `AppendOnlyFile`s never share a lock.
pub struct AppendOnlyFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AppendOnlyFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append_line(&self, line: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                error!("Open append failed {}: {}", self.path.display(), e);
                StorageError::Io(e)
            })?;

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        f.write_all(buf.as_bytes()).await.map_err(|e| {
            error!("Write failed {}: {}", self.path.display(), e);
            StorageError::Io(e)
        })?;
        f.flush().await.map_err(|e| {
            error!("Flush failed {}: {}", self.path.display(), e);
            StorageError::Io(e)
        })?;

        debug!("Appended {} byte(s) to {}", buf.len(), self.path.display());
        Ok(())
    }

    pub async fn read_lines(&self) -> Result<Vec<String>, StorageError> {
        let _guard = self.lock.lock().await;

        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound(self.path.clone())
            } else {
                error!("Read failed {}: {}", self.path.display(), e);
                StorageError::Io(e)
            }
        })?;

        Ok(content.lines().map(str::to_string).collect())
    }
}

/// Append-only record file holding one canonical report line per accepted report.
pub struct FileStorage {
    file: AppendOnlyFile,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let file = AppendOnlyFile::new(path);
        info!("FileStorage initialized at {}", file.path().display());
        Self { file }
    }

    pub async fn append_record(&self, report: &TimezoneReport) -> Result<(), StorageError> {
        self.file.append_line(&report.to_string()).await
    }

    pub async fn read_records(&self) -> Result<Vec<String>, StorageError> {
        self.file.read_lines().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_and_read_records() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("client_data.txt"));

        storage
            .append_record(&validate("Tokyo,UTC+9,2024-5-1 7:30:00").unwrap())
            .await
            .unwrap();
        storage
            .append_record(&validate("Oslo,UTC+1,2024-5-1 0:30:00").unwrap())
            .await
            .unwrap();

        let records = storage.read_records().await.unwrap();
        assert_eq!(
            records,
            vec![
                "Tokyo,UTC+9,2024-05-01 07:30:00".to_string(),
                "Oslo,UTC+1,2024-05-01 00:30:00".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("absent.txt"));

        match storage.read_records().await {
            Err(StorageError::NotFound(p)) => assert!(p.ends_with("absent.txt")),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unwritable_path_is_io_failure() {
        let dir = TempDir::new().unwrap();
        // a directory cannot be opened for appending
        let storage = FileStorage::new(dir.path());
        let report = validate("Tokyo,UTC+9,2024-5-1 7:30:00").unwrap();

        assert!(matches!(
            storage.append_record(&report).await,
            Err(StorageError::Io(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_keep_lines_whole() {
        let dir = TempDir::new().unwrap();
        let file = Arc::new(AppendOnlyFile::new(dir.path().join("lines.txt")));

        let mut handles = Vec::new();
        for i in 0..32 {
            let file = Arc::clone(&file);
            handles.push(tokio::spawn(async move {
                let line = format!("writer-{:02}-{}", i, "x".repeat(2048));
                file.append_line(&line).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let lines = file.read_lines().await.unwrap();
        assert_eq!(lines.len(), 32);
        for line in lines {
            assert!(line.starts_with("writer-"));
            assert_eq!(line.len(), "writer-00-".len() + 2048);
        }
    }
}
