//! External sort of the occurrence stream
//!
//! Occurrences are buffered up to a fixed capacity, sorted and spilled
//! as runs; [`ExternalSorter::finish`] merges the runs into one stream
//! ordered by (term, document).

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};
use tempfile::TempDir;

use crate::{
    base::{Len, Occurrence},
    error::{IndexError, Result},
};

pub mod merge;

/// Size of an occurrence in memory and in run files
pub const OCCURRENCE_BYTES: usize = std::mem::size_of::<Occurrence>();

/// Smallest read buffer given to a run during the merge
pub const MIN_RUN_BUFFER_BYTES: usize = 8 * 1024;

const MERGED_DAT: &str = "merged.dat";
const SPILL_PREFIX: &str = "spill-";

pub(crate) fn write_occurrence<W: Write>(writer: &mut W, occurrence: &Occurrence) -> io::Result<()> {
    writer.write_u32::<BigEndian>(occurrence.term_id)?;
    writer.write_u32::<BigEndian>(occurrence.docid)
}

pub(crate) fn read_occurrence<R: Read>(reader: &mut R) -> io::Result<Occurrence> {
    let term_id = reader.read_u32::<BigEndian>()?;
    let docid = reader.read_u32::<BigEndian>()?;
    Ok(Occurrence { term_id, docid })
}

/// Creates a fresh temporary folder below `parent`, removed on drop
pub fn spill_directory(parent: &Path) -> Result<TempDir> {
    std::fs::create_dir_all(parent)?;
    let spill = tempfile::Builder::new()
        .prefix(SPILL_PREFIX)
        .tempdir_in(parent)?;
    debug!("Created spill folder {}", spill.path().display());
    Ok(spill)
}

/// Read buffer of each run when merging `runs` runs
///
/// The buffers share the sort memory budget, with a floor of
/// [`MIN_RUN_BUFFER_BYTES`], and never exceed `block_bytes`.
pub fn run_buffer_capacity(memory_bytes: usize, block_bytes: usize, runs: usize) -> usize {
    let share = memory_bytes / runs.max(1);
    share.max(MIN_RUN_BUFFER_BYTES).min(block_bytes)
}

/// A sorted run on disk
pub struct RunFile {
    pub path: PathBuf,
    /// Number of occurrences
    pub length: u64,
}

/// Generates sorted runs with a bounded in-memory buffer
pub struct ExternalSorter {
    spill: TempDir,
    memory_bytes: usize,
    capacity: usize,
    block_bytes: usize,
    buffer: Vec<Occurrence>,
    runs: Vec<RunFile>,
    count: u64,
}

impl ExternalSorter {
    /// Creates a sorter whose buffer fits in `memory_bytes`; temporary files
    /// go in a new folder below `spill_parent`
    pub fn new(spill_parent: &Path, memory_bytes: usize, block_bytes: usize) -> Result<Self> {
        if block_bytes == 0 {
            return Err(IndexError::InvalidOption(
                "the merge block size should be positive".to_string(),
            ));
        }

        let capacity = (memory_bytes / OCCURRENCE_BYTES).max(1);
        info!(
            "External sort with runs of {} occurrences ({} bytes)",
            capacity, memory_bytes
        );
        Ok(Self {
            spill: spill_directory(spill_parent)?,
            memory_bytes,
            capacity,
            block_bytes,
            buffer: Vec::new(),
            runs: Vec::new(),
            count: 0,
        })
    }

    /// Maximum number of occurrences held in memory
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of runs flushed so far
    pub fn runs(&self) -> usize {
        self.runs.len()
    }

    /// Total number of occurrences pushed
    pub fn occurrences(&self) -> u64 {
        self.count
    }

    pub fn spill_path(&self) -> &Path {
        self.spill.path()
    }

    /// Read buffer of each run if the runs flushed so far were merged
    pub fn run_buffer_capacity(&self) -> usize {
        run_buffer_capacity(self.memory_bytes, self.block_bytes, self.runs.len())
    }

    pub fn push(&mut self, occurrence: Occurrence) -> Result<()> {
        self.buffer.push(occurrence);
        self.count += 1;
        if self.buffer.len() >= self.capacity {
            self.flush_run()?;
        }
        Ok(())
    }

    /// Sorts the buffer and writes it as a new run
    fn flush_run(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        // Sorting on the full key keeps runs valid merge inputs
        // whatever the emission order of documents
        self.buffer.sort_unstable();

        let path = self.spill.path().join(format!("run-{}.dat", self.runs.len()));
        let mut writer = BufWriter::with_capacity(self.block_bytes, File::create(&path)?);
        for occurrence in self.buffer.iter() {
            write_occurrence(&mut writer, occurrence)?;
        }
        writer.flush()?;

        debug!(
            "Flushed run {} ({} occurrences) to {}",
            self.runs.len(),
            self.buffer.len(),
            path.display()
        );
        self.runs.push(RunFile {
            path,
            length: self.buffer.len() as u64,
        });
        self.buffer.clear();
        Ok(())
    }

    /// Flushes the last run and merges all the runs
    pub fn finish(mut self) -> Result<SortedOccurrences> {
        self.flush_run()?;
        // Release the buffer before merging
        self.buffer = Vec::new();

        let merged_path = self.spill.path().join(MERGED_DAT);
        let run_bytes = self.run_buffer_capacity();
        info!(
            "Merging {} runs ({} occurrences, {} bytes of buffer per run)",
            self.runs.len(),
            self.count,
            run_bytes
        );
        let merged = merge::merge_runs(&self.runs, &merged_path, run_bytes, self.block_bytes)?;
        if merged != self.count {
            return Err(IndexError::Format(format!(
                "merge produced {} occurrences instead of {}",
                merged, self.count
            )));
        }
        info!("Merged {} occurrences", merged);

        SortedOccurrences::open(self.spill, &merged_path, self.count, self.block_bytes)
    }
}

/// Forward-only stream over the merged occurrences
///
/// The temporary folder is removed when the stream is dropped.
pub struct SortedOccurrences {
    reader: BufReader<File>,
    remaining: u64,
    length: u64,
    failed: bool,
    _spill: TempDir,
}

impl SortedOccurrences {
    fn open(spill: TempDir, path: &Path, length: u64, block_bytes: usize) -> Result<Self> {
        Ok(Self {
            reader: BufReader::with_capacity(block_bytes, File::open(path)?),
            remaining: length,
            length,
            failed: false,
            _spill: spill,
        })
    }
}

impl Len for SortedOccurrences {
    fn len(&self) -> usize {
        self.length as usize
    }
}

impl Iterator for SortedOccurrences {
    type Item = Result<Occurrence>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let occurrence = read_occurrence(&mut self.reader).map_err(IndexError::from);
        self.failed = occurrence.is_err();
        Some(occurrence)
    }
}
