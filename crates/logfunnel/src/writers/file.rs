use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
    fs::File,
    io::{self, AsyncWriteExt},
};
use tracing::trace;

use crate::writers::{Writer, write_line};

// -- 🚰 FileWriterConfig lives next to its FileWriter bestie. One device = one config = one file.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FileWriterConfig {
    pub file_name: String,
}

/// 🗄️ FileWriter: payloads in, bytes on disk out. A BufWriter around a tokio `File`.
///
/// Does not retry. Does not rotate. Does not have opinions about your log format.
/// If the disk fills up, `write` errors, the funnel logs it and keeps going.
///
/// ⚠️ `File::create` truncates if the file exists. No warning. No backup. Just gone.
#[derive(Debug)]
pub struct FileWriter {
    file_buf: io::BufWriter<File>,
    config: FileWriterConfig,
    // -- a cancelled write left half a line in the buffer
    torn_line: bool,
}

impl FileWriter {
    /// 🚀 Creates (or obliterates and recreates) the log file and wraps it in a BufWriter.
    pub async fn new(config: FileWriterConfig) -> Result<Self> {
        let file_handle = File::create(&config.file_name).await.context(format!(
            "💀 The log file '{}' could not be conjured into existence. \
                We stared at the path. The path stared back. \
                One of us was wrong about whether the parent directory existed.",
            &config.file_name
        ))?;
        // -- 📦 BufWriter: because one syscall per log line is a war crime.
        let file_buf = io::BufWriter::new(file_handle);
        Ok(Self {
            file_buf,
            config,
            torn_line: false,
        })
    }
}

#[async_trait]
impl Writer for FileWriter {
    async fn write(&mut self, payload: &[u8]) -> Result<()> {
        trace!(
            "📬 {} bytes walked into '{}', writing it all down",
            payload.len(),
            self.config.file_name
        );
        write_line(&mut self.file_buf, &mut self.torn_line, payload)
            .await
            .context(format!(
                "💀 Failed writing to '{}'. Disk full? Disk gone? Disk having a day?",
                self.config.file_name
            ))
    }

    /// 🗑️ Flush the BufWriter. Async Drop is not a thing yet, so this is where bytes reach disk.
    async fn close(&mut self) -> Result<()> {
        trace!("🎬 final flush for '{}'", self.config.file_name);
        self.file_buf.flush().await.context(format!(
            "💀 Error flushing '{}'. The bytes were SO CLOSE. They could SEE the disk.",
            self.config.file_name
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_bytes_survive_the_trip_to_disk() -> Result<()> {
        let the_scratch_dir = tempfile::tempdir()?;
        let the_path = the_scratch_dir.path().join("funnel.log");
        let config = FileWriterConfig {
            file_name: the_path.to_string_lossy().into_owned(),
        };

        let mut writer = FileWriter::new(config).await?;
        writer.write(b"0: log data\n").await?;
        writer.write(b"1: log data\n").await?;
        writer.close().await?;

        let on_disk = tokio::fs::read_to_string(&the_path).await?;
        assert_eq!(on_disk, "0: log data\n1: log data\n");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_torn_line_is_closed_off_before_the_next() -> Result<()> {
        let the_scratch_dir = tempfile::tempdir()?;
        let the_path = the_scratch_dir.path().join("funnel.log");
        let config = FileWriterConfig {
            file_name: the_path.to_string_lossy().into_owned(),
        };

        let mut writer = FileWriter::new(config).await?;
        // -- what a write timeout leaves behind: half a line, and the flag saying so
        writer.file_buf.write_all(b"0: log da").await?;
        writer.torn_line = true;
        writer.write(b"1: log data\n").await?;
        writer.close().await?;

        let on_disk = tokio::fs::read_to_string(&the_path).await?;
        assert_eq!(on_disk, "0: log da\n1: log data\n");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_parent_directory_was_a_lie() {
        let the_scratch_dir = tempfile::tempdir().expect("💀 no tempdir, no test");
        let the_path = the_scratch_dir.path().join("nope").join("funnel.log");
        let config = FileWriterConfig {
            file_name: the_path.to_string_lossy().into_owned(),
        };

        let the_verdict = FileWriter::new(config).await;
        assert!(the_verdict.is_err(), "creating a file in a missing directory should fail");
    }
}
