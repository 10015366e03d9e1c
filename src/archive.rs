//! Graph archives
//!
//! An archive is a header followed by a stream of MessagePack values. Graphs
//! write the number of kernels and, for every kernel, the number of shader
//! maps followed by the maps themselves. Editor saves write no maps; cooked
//! saves write one map per shader format of the cook target.

use crate::error::{ComputeGraphError, Result};
use crate::graph::key::SCHEMA_VERSION;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use uuid::Uuid;

pub const ARCHIVE_MAGIC: [u8; 4] = *b"CGKA";
pub const ARCHIVE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub schema: Uuid,
    pub graph_name: String,
    /// Cook target name, `None` for editor saves
    pub target_platform: Option<String>,
    pub cooked_at: Option<DateTime<Utc>>,
}

impl ArchiveHeader {
    pub fn editor(graph_name: impl Into<String>) -> Self {
        Self {
            magic: ARCHIVE_MAGIC,
            version: ARCHIVE_VERSION,
            schema: SCHEMA_VERSION,
            graph_name: graph_name.into(),
            target_platform: None,
            cooked_at: None,
        }
    }

    pub fn cooked(graph_name: impl Into<String>, target_platform: impl Into<String>) -> Self {
        Self {
            target_platform: Some(target_platform.into()),
            cooked_at: Some(Utc::now()),
            ..Self::editor(graph_name)
        }
    }

    pub fn is_cooked(&self) -> bool {
        self.target_platform.is_some()
    }

    fn check(&self) -> Result<()> {
        if self.magic != ARCHIVE_MAGIC {
            return Err(ComputeGraphError::Archive(format!(
                "bad magic {:?}",
                self.magic
            )));
        }
        if self.version != ARCHIVE_VERSION {
            return Err(ComputeGraphError::Archive(format!(
                "unsupported archive version {} (expected {})",
                self.version, ARCHIVE_VERSION
            )));
        }
        if self.schema != SCHEMA_VERSION {
            return Err(ComputeGraphError::Archive(format!(
                "archive schema {} does not match {}",
                self.schema, SCHEMA_VERSION
            )));
        }
        Ok(())
    }
}

pub struct ArchiveWriter<W: Write> {
    inner: W,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(inner: W, header: &ArchiveHeader) -> Result<Self> {
        let mut writer = Self { inner };
        writer.write_value(header)?;
        Ok(writer)
    }

    pub fn write_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        rmp_serde::encode::write_named(&mut self.inner, value)?;
        Ok(())
    }

    pub fn write_count(&mut self, count: usize) -> Result<()> {
        self.write_value(&(count as u32))
    }

    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

pub struct ArchiveReader<R: Read> {
    inner: R,
    header: ArchiveHeader,
}

impl<R: Read> ArchiveReader<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let header: ArchiveHeader = rmp_serde::decode::from_read(&mut inner)?;
        header.check()?;
        Ok(Self { inner, header })
    }

    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    pub fn read_value<T: DeserializeOwned>(&mut self) -> Result<T> {
        Ok(rmp_serde::decode::from_read(&mut self.inner)?)
    }

    pub fn read_count(&mut self) -> Result<usize> {
        let count: u32 = self.read_value()?;
        Ok(count as usize)
    }
}
