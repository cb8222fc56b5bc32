use super::{ByteRange, Storage};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> Result<fs::File> {
        fs::File::open(&self.path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound(self.path.display().to_string()),
            _ => Error::Io(e),
        })
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn read_bytes(&self, range: ByteRange) -> Result<Bytes> {
        let mut file = self.open().await?;
        let size = file.metadata().await?.len();

        if range.start >= size {
            return Ok(Bytes::new());
        }

        let available = size - range.start;
        let len = range.length.map_or(available, |l| l.min(available)) as usize;

        file.seek(std::io::SeekFrom::Start(range.start)).await?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await?;

        Ok(Bytes::from(buf))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
