//! Append-only journal file backing the event store.
//!
//! # Format
//! One line per committed batch:
//! ```text
//! <sha256(json) as hex> <json {"events":[...],"uniques":[...]}>\n
//! ```
//! A batch is written with a single `write_all` followed by `sync_data`, so
//! it is either fully present or absent after a crash. On open, a damaged
//! final line is treated as a torn write and truncated; damage anywhere else
//! is reported as corruption.
//!
//! A failed write is rolled back by truncating to the last committed batch.
//! If that truncate fails too, the store refuses every later append until it
//! is reopened.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use exchange_types::{EventRecord, ExchangeError, Result, SequenceId, UniqueEventRecord};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::store::{EventStore, MemoryEventStore};

#[derive(Serialize)]
struct BatchRef<'a> {
    events: &'a [EventRecord],
    uniques: &'a [UniqueEventRecord],
}

#[derive(Deserialize)]
struct Batch {
    events: Vec<EventRecord>,
    uniques: Vec<UniqueEventRecord>,
}

fn checksum(json: &[u8]) -> String {
    hex::encode(Sha256::digest(json))
}

fn encode_line(events: &[EventRecord], uniques: &[UniqueEventRecord]) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(&BatchRef { events, uniques })?;
    let mut line = checksum(&json).into_bytes();
    line.push(b' ');
    line.extend_from_slice(&json);
    line.push(b'\n');
    Ok(line)
}

fn decode_line(line: &[u8]) -> std::result::Result<Batch, String> {
    let split = line
        .iter()
        .position(|b| *b == b' ')
        .ok_or("missing checksum separator")?;
    let (sum, json) = (&line[..split], &line[split + 1..]);
    if sum != checksum(json).as_bytes() {
        return Err("checksum mismatch".into());
    }
    serde_json::from_slice(json).map_err(|e| e.to_string())
}

/// File-backed [`EventStore`]. Records are also indexed in memory.
#[derive(Debug)]
pub struct JournalEventStore {
    path: PathBuf,
    file: File,
    /// Length of the file up to the last committed batch.
    committed_len: u64,
    index: MemoryEventStore,
    /// Set when a partial write could not be rolled back.
    failed: Option<String>,
}

impl JournalEventStore {
    /// Open or create the journal at `path` and load every committed batch.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut index = MemoryEventStore::new();
        let mut offset = 0usize;
        let mut line_no = 0usize;
        while offset < data.len() {
            let rest = &data[offset..];
            let Some(end) = rest.iter().position(|b| *b == b'\n') else {
                tracing::warn!(path = %path.display(), offset, "dropping torn journal tail");
                break;
            };
            line_no += 1;
            match decode_line(&rest[..end]) {
                Ok(batch) => {
                    index.check_batch(&batch.events, &batch.uniques)?;
                    index.commit(&batch.events, &batch.uniques);
                }
                Err(reason) if offset + end + 1 == data.len() => {
                    tracing::warn!(
                        path = %path.display(), line = line_no, %reason,
                        "dropping damaged final journal line"
                    );
                    break;
                }
                Err(reason) => {
                    return Err(ExchangeError::Storage(format!(
                        "journal {} corrupt at line {line_no}: {reason}",
                        path.display()
                    )));
                }
            }
            offset += end + 1;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let committed_len = offset as u64;
        if committed_len < data.len() as u64 {
            file.set_len(committed_len)?;
        }
        tracing::info!(
            path = %path.display(),
            events = index.len(),
            last = %index.last_sequence_id(),
            "journal opened"
        );
        Ok(Self {
            path,
            file,
            committed_len,
            index,
            failed: None,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn write_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        self.file.write_all(line)?;
        self.file.sync_data()
    }
}

impl EventStore for JournalEventStore {
    fn append_batch(
        &mut self,
        events: &[EventRecord],
        uniques: &[UniqueEventRecord],
    ) -> Result<()> {
        if let Some(reason) = &self.failed {
            return Err(ExchangeError::Storage(format!(
                "journal {} is unusable until reopened: {reason}",
                self.path.display()
            )));
        }
        if events.is_empty() && uniques.is_empty() {
            return Ok(());
        }
        self.index.check_batch(events, uniques)?;
        let line = encode_line(events, uniques)?;
        if let Err(e) = self.write_line(&line) {
            // Drop whatever part of the line reached the file.
            if let Err(truncate) = self.file.set_len(self.committed_len) {
                tracing::error!(path = %self.path.display(), %truncate, "journal truncate failed");
                self.failed = Some(format!("write failed ({e}), truncate failed ({truncate})"));
            }
            return Err(ExchangeError::Storage(format!(
                "journal {} write failed: {e}",
                self.path.display()
            )));
        }
        self.committed_len += line.len() as u64;
        self.index.commit(events, uniques);
        Ok(())
    }

    fn unique_event(&self, unique_id: &str) -> Result<Option<UniqueEventRecord>> {
        self.index.unique_event(unique_id)
    }

    fn last_event(&self) -> Result<Option<EventRecord>> {
        self.index.last_event()
    }

    fn read_after(&self, after: SequenceId, limit: usize) -> Result<Vec<EventRecord>> {
        self.index.read_after(after, limit)
    }
}
