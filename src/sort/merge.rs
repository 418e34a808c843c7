//! k-way merge of sorted runs

use std::{
    cmp::Reverse,
    collections::BinaryHeap,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};

use super::{read_occurrence, write_occurrence, RunFile};
use crate::{
    base::{DocId, Occurrence, TermId},
    error::Result,
};

/// Current head of a run; ordered by (term, document, run)
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug)]
struct RunHead {
    term_id: TermId,
    docid: DocId,
    run: usize,
}

impl RunHead {
    fn new(occurrence: Occurrence, run: usize) -> Self {
        Self {
            term_id: occurrence.term_id,
            docid: occurrence.docid,
            run,
        }
    }
}

/// Reads a run; the file is closed and deleted once exhausted or dropped
struct RunReader {
    reader: Option<BufReader<File>>,
    path: PathBuf,
    remaining: u64,
}

impl RunReader {
    fn open(run: &RunFile, buffer_bytes: usize) -> Result<Self> {
        Ok(Self {
            reader: Some(BufReader::with_capacity(buffer_bytes, File::open(&run.path)?)),
            path: run.path.clone(),
            remaining: run.length,
        })
    }

    fn next(&mut self) -> Result<Option<Occurrence>> {
        if self.remaining == 0 {
            self.close()?;
            return Ok(None);
        }
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return Ok(None),
        };
        let occurrence = read_occurrence(reader)?;
        self.remaining -= 1;
        Ok(Some(occurrence))
    }

    fn close(&mut self) -> Result<()> {
        if self.reader.take().is_some() {
            fs::remove_file(&self.path)?;
            debug!("Removed exhausted run {}", self.path.display());
        }
        Ok(())
    }
}

impl Drop for RunReader {
    fn drop(&mut self) {
        if self.reader.take().is_some() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Could not remove run {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Merges the runs into `output` and returns the number of occurrences
///
/// Each run is read through a buffer of `run_bytes`; the output is written
/// through one buffer of `block_bytes`.
pub fn merge_runs(
    runs: &[RunFile],
    output: &Path,
    run_bytes: usize,
    block_bytes: usize,
) -> Result<u64> {
    let mut readers = runs
        .iter()
        .map(|run| RunReader::open(run, run_bytes))
        .collect::<Result<Vec<_>>>()?;

    let mut heads = BinaryHeap::with_capacity(readers.len());
    for (run, reader) in readers.iter_mut().enumerate() {
        if let Some(occurrence) = reader.next()? {
            heads.push(Reverse(RunHead::new(occurrence, run)));
        }
    }

    let mut writer = BufWriter::with_capacity(block_bytes, File::create(output)?);
    let mut count = 0u64;
    while let Some(Reverse(head)) = heads.pop() {
        write_occurrence(&mut writer, &Occurrence::new(head.term_id, head.docid))?;
        count += 1;

        if let Some(occurrence) = readers[head.run].next()? {
            heads.push(Reverse(RunHead::new(occurrence, head.run)));
        }
    }
    writer.flush()?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::read_occurrence;
    use temp_dir::TempDir;

    fn write_run(dir: &Path, name: &str, occurrences: &[(TermId, DocId)]) -> RunFile {
        let path = dir.join(name);
        let mut writer = BufWriter::new(File::create(&path).unwrap());
        for &(t, d) in occurrences {
            write_occurrence(&mut writer, &Occurrence::new(t, d)).unwrap();
        }
        writer.flush().unwrap();
        RunFile {
            path,
            length: occurrences.len() as u64,
        }
    }

    #[test]
    fn test_merge_with_ties() {
        let dir = TempDir::new().expect("Could not create temporary directory");
        let runs = vec![
            write_run(dir.path(), "a", &[(0, 1), (0, 4), (2, 2)]),
            write_run(dir.path(), "b", &[(0, 1), (1, 7)]),
            write_run(dir.path(), "c", &[]),
            write_run(dir.path(), "d", &[(0, 3), (2, 2), (2, 9)]),
        ];
        let output = dir.path().join("merged");
        assert_eq!(merge_runs(&runs, &output, 16, 32).unwrap(), 8);

        for run in runs.iter() {
            assert!(!run.path.exists(), "{} should be removed", run.path.display());
        }

        let mut reader = BufReader::new(File::open(&output).unwrap());
        let observed: Vec<(TermId, DocId)> = (0..8)
            .map(|_| read_occurrence(&mut reader).unwrap())
            .map(|o| (o.term_id, o.docid))
            .collect();
        assert_eq!(
            observed,
            vec![(0, 1), (0, 1), (0, 3), (0, 4), (1, 7), (2, 2), (2, 2), (2, 9)]
        );
    }

    #[test]
    fn test_truncated_run() {
        let dir = TempDir::new().expect("Could not create temporary directory");
        let mut run = write_run(dir.path(), "a", &[(0, 1)]);
        // Announces more records than the file holds
        run.length = 2;

        let output = dir.path().join("merged");
        assert!(merge_runs(&[run], &output, 16, 32).is_err());
        assert!(!dir.path().join("a").exists());
    }
}
