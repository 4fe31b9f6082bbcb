//! Ordered delivery of live transcript entries.
//!
//! The sink owns the ordering invariant: entries go out in strictly increasing
//! segment-index order, no duplicates, no gaps other than explicitly skipped
//! (failed) segments. Today's driver transcribes sequentially, so entries arrive
//! in order already, but the sink buffers and reorders anyway so the interface
//! never has to assume that.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::transcript::TranscriptEntry;

/// Writes transcript entries in segment order to a writer (normally stdout) and,
/// optionally, appends them to a file.
///
/// File writes are append-only; previously emitted entries are never rewritten.
pub struct TranscriptSink<W: Write> {
    out: W,
    file: Option<File>,

    /// The next index eligible for emission.
    next_index: u64,

    /// Entries (or skip markers, `None`) waiting for their predecessors.
    pending: BTreeMap<u64, Option<String>>,

    emitted: u64,
}

impl<W: Write> TranscriptSink<W> {
    /// Create a sink writing to `out`, appending to `append_path` when given.
    pub fn new(out: W, append_path: Option<&Path>) -> Result<Self> {
        let file = match append_path {
            Some(path) => Some(
                OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(path)
                    .with_context(|| format!("failed to open output file {}", path.display()))?,
            ),
            None => None,
        };

        Ok(Self {
            out,
            file,
            next_index: 0,
            pending: BTreeMap::new(),
            emitted: 0,
        })
    }

    /// Queue an entry; emits it (and any entries it unblocks) once contiguous.
    pub fn push(&mut self, entry: TranscriptEntry) -> Result<()> {
        self.insert(entry.index, Some(entry.text))
    }

    /// Mark a segment as failed so ordering can advance past it.
    pub fn skip(&mut self, index: u64) -> Result<()> {
        debug!(index, "skipping failed segment in output ordering");
        self.insert(index, None)
    }

    /// Number of entries actually written out.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Entries buffered while waiting for a predecessor.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn insert(&mut self, index: u64, text: Option<String>) -> Result<()> {
        if index < self.next_index {
            bail!("segment {index} was already emitted (next expected {})", self.next_index);
        }
        if self.pending.insert(index, text).is_some() {
            bail!("segment {index} was delivered twice");
        }
        self.flush_ready()
    }

    fn flush_ready(&mut self) -> Result<()> {
        while let Some(text) = self.pending.remove(&self.next_index) {
            if let Some(text) = text {
                self.write_line(&text)?;
                self.emitted += 1;
            }
            self.next_index += 1;
        }
        Ok(())
    }

    fn write_line(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{text}").context("failed to write transcript to output")?;
        // Flush per entry so live consumers (terminals, pipes) see lines promptly.
        self.out.flush()?;

        if let Some(file) = &mut self.file {
            writeln!(file, "{text}").context("failed to append transcript to file")?;
            file.flush()?;
        }

        Ok(())
    }
}
