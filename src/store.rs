// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Pluggable append-only block stores.
//!
//! The service writes every block to its store before the block becomes
//! visible in the in-memory chain, so a failing store leaves no trace.
//! [`MemoryStore`] keeps nothing and lives as long as the process;
//! [`JsonLinesStore`] appends one JSON object per block to a file and lets a
//! chain survive restarts.

use crate::block::Block;
use crate::error::StoreError;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Durable destination for appended blocks.
pub trait BlockStore: Send + Sync {
    /// Persists one block. Called in chain order, under the ledger's write lock.
    fn append(&self, block: &Block) -> Result<(), StoreError>;

    /// Returns every block persisted so far, in chain order.
    fn load(&self) -> Result<Vec<Block>, StoreError>;
}

/// Store that persists nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStore;

impl BlockStore for MemoryStore {
    fn append(&self, _block: &Block) -> Result<(), StoreError> {
        Ok(())
    }

    fn load(&self) -> Result<Vec<Block>, StoreError> {
        Ok(Vec::new())
    }
}

/// Newline-delimited JSON journal, one block per line.
#[derive(Debug)]
pub struct JsonLinesStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesStore {
    /// Opens the journal at `path`, creating an empty one if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "opened block journal");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockStore for JsonLinesStore {
    fn append(&self, block: &Block) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(block).map_err(StoreError::Encode)?;
        line.push(b'\n');
        let mut file = self.file.lock();
        append_line(&mut file, &line, File::sync_data)
    }

    fn load(&self) -> Result<Vec<Block>, StoreError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut blocks = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let block = serde_json::from_str(&line).map_err(|source| StoreError::Malformed {
                line: number + 1,
                source,
            })?;
            blocks.push(block);
        }
        Ok(blocks)
    }
}

/// Writes `line` and syncs it, or truncates the file back to its previous
/// length so a failed append leaves no partial entry behind.
fn append_line(
    file: &mut File,
    line: &[u8],
    sync: impl FnOnce(&File) -> io::Result<()>,
) -> Result<(), StoreError> {
    let previous_len = file.metadata()?.len();
    let written = match file.write_all(line) {
        Ok(()) => sync(&*file),
        Err(err) => Err(err),
    };
    if let Err(err) = written {
        warn!(error = %err, len = previous_len, "journal append failed, rolling back");
        if let Err(rollback) = file.set_len(previous_len) {
            warn!(error = %rollback, "journal rollback failed");
        }
        return Err(err.into());
    }
    Ok(())
}
