// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable listener checkpoint.
//!
//! A single decimal integer: the next block number to process. Writes go to
//! a temp file first and are renamed into place, so a crash leaves either
//! the old or the new value, never a torn one.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt checkpoint at {path}: {content:?}")]
    Corrupt { path: PathBuf, content: String },
}

/// File-backed next-block checkpoint.
#[derive(Debug, Clone)]
pub struct CheckpointFile {
    path: PathBuf,
}

impl CheckpointFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the next block to process. A missing file means genesis (0).
    pub fn load(&self) -> Result<u64, CheckpointError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(CheckpointError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }

        trimmed.parse().map_err(|_| CheckpointError::Corrupt {
            path: self.path.clone(),
            content: trimmed.to_string(),
        })
    }

    /// Persist `next_block` (atomic write via rename).
    pub fn store(&self, next_block: u64) -> Result<(), CheckpointError> {
        self.write(next_block).map_err(|source| CheckpointError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, next_block: u64) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(next_block.to_string().as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.path)
    }
}
