//! File sink with deferred creation
//!
//! Nothing is created until the first chunk arrives, and bytes go to a
//! sibling `.partial` file that replaces the target only on `finish`. A
//! failed or aborted export therefore never truncates an existing file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tracing::{debug, warn};

use crate::error::{ConfigurationError, Result, SinkError};

use super::{ExportSink, WriterSink};

/// Sink writing to a file path
pub struct FileSink {
    path: PathBuf,
    partial: PathBuf,
    inner: Option<WriterSink<File>>,
    done: bool,
}

impl FileSink {
    /// Prepare a sink for `path`. Only checks that the parent directory
    /// exists; the file system is left untouched.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            return Err(ConfigurationError::InvalidValue {
                field: "output".to_string(),
                value: format!("directory does not exist: {}", parent.display()),
            }
            .into());
        }

        let partial = partial_path(&path);
        Ok(Self {
            path,
            partial,
            inner: None,
            done: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&mut self) -> Result<&mut WriterSink<File>> {
        if self.done {
            return Err(SinkError::Closed.into());
        }
        let inner = match self.inner.take() {
            Some(inner) => inner,
            None => {
                let file = File::create(&self.partial).await.map_err(SinkError::from)?;
                debug!("Created {}", self.partial.display());
                WriterSink::new(file)
            }
        };
        Ok(self.inner.insert(inner))
    }
}

/// `dir/name.ext` -> `dir/.name.ext.partial`
fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_string());
    path.with_file_name(format!(".{name}.partial"))
}

#[async_trait]
impl ExportSink for FileSink {
    async fn send(&mut self, chunk: Vec<u8>) -> Result<()> {
        self.open().await?.send(chunk).await
    }

    async fn finish(&mut self) -> Result<()> {
        if self.done {
            return Ok(());
        }
        // An export with no bytes still produces an (empty) file.
        self.open().await?.finish().await?;
        self.done = true;
        fs::rename(&self.partial, &self.path)
            .await
            .map_err(SinkError::from)?;
        debug!("Moved output into place at {}", self.path.display());
        Ok(())
    }

    async fn abort(&mut self, reason: &str) {
        if self.done {
            return;
        }
        self.done = true;
        if let Some(inner) = self.inner.as_mut() {
            inner.abort(reason).await;
            warn!(
                "Incomplete output left at {}; {} untouched",
                self.partial.display(),
                self.path.display()
            );
        }
    }

    fn is_closed(&self) -> bool {
        self.inner.as_ref().is_some_and(|inner| inner.is_closed())
    }

    fn bytes_written(&self) -> u64 {
        self.inner.as_ref().map_or(0, |inner| inner.bytes_written())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(ext: &str) -> PathBuf {
        std::env::temp_dir().join(format!("file-sink-{}.{ext}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_file_sink() {
        let path = temp_path("json");
        let mut sink = FileSink::create(&path).unwrap();

        sink.send(b"[1,".to_vec()).await.unwrap();
        sink.send(b"2]".to_vec()).await.unwrap();
        assert!(!path.exists());
        sink.finish().await.unwrap();

        assert_eq!(sink.bytes_written(), 5);
        assert_eq!(fs::read_to_string(&path).await.unwrap(), "[1,2]");
        assert!(!partial_path(&path).exists());

        // Cleanup
        fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn test_empty_output_creates_file() {
        let path = temp_path("jsonl");
        let mut sink = FileSink::create(&path).unwrap();
        sink.finish().await.unwrap();

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "");
        fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn test_unused_sink_touches_nothing() {
        let path = temp_path("json");
        fs::write(&path, "previous").await.unwrap();

        let sink = FileSink::create(&path).unwrap();
        drop(sink);

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "previous");
        assert!(!partial_path(&path).exists());
        fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn test_abort_keeps_existing_file() {
        let path = temp_path("json");
        fs::write(&path, "previous").await.unwrap();

        let mut sink = FileSink::create(&path).unwrap();
        sink.send(b"[{\"a\":1}".to_vec()).await.unwrap();
        sink.abort("store failed").await;

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "previous");
        let partial = partial_path(&path);
        assert_eq!(fs::read_to_string(&partial).await.unwrap(), "[{\"a\":1}");
        assert!(sink.send(b"]".to_vec()).await.is_err());

        fs::remove_file(&path).await.ok();
        fs::remove_file(&partial).await.ok();
    }

    #[test]
    fn test_invalid_directory() {
        assert!(FileSink::create("/nonexistent/directory/file.json").is_err());
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/tmp/out.csv")),
            PathBuf::from("/tmp/.out.csv.partial")
        );
    }
}
