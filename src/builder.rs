use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

use derivative::Derivative;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    base::{
        save_information, DocId, IndexInformation, Len, Occurrence, TermId, INDEX_VERSION,
        POSTINGS_DAT,
    },
    compress::compress_postings,
    dictionary::{DictionaryWriter, Vocabulary},
    error::{IndexError, Result},
    index::ReviewIndex,
    sort::ExternalSorter,
};

const DEFAULT_PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})";

/// Folder used for temporary files when none is given
const DEFAULT_SPILL_FOLDER: &str = "tmp";

fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(DEFAULT_PROGRESS_TEMPLATE)
        .progress_chars("=> ")
}

#[derive(Derivative, Clone, Serialize, Deserialize, Debug)]
#[derivative(Default)]
pub struct BuilderOptions {
    /// Memory used to buffer occurrences before a run is written
    #[derivative(Default(value = "160 * 1024 * 1024"))]
    pub sort_memory_bytes: usize,

    /// Size of the buffers used when writing and merging runs
    #[derivative(Default(value = "160 * 1024 * 1024 / 128"))]
    pub merge_block_bytes: usize,

    /// Number of terms per front-coded block
    #[derivative(Default(value = "10"))]
    pub block_size: usize,

    /// Lower-case query terms before lookup
    #[derivative(Default(value = "false"))]
    pub case_insensitive: bool,

    #[derivative(Default(value = "true"))]
    pub show_progress: bool,

    /// Parent of the temporary folder (defaults to `tmp` in the index folder)
    #[derivative(Default(value = "None"))]
    pub spill_folder: Option<PathBuf>,
}

/// The indexer consumes the occurrences of a corpus and writes the index
/// files once [`Indexer::build`] is called
pub struct Indexer {
    folder: PathBuf,
    spill_parent: PathBuf,
    options: BuilderOptions,
    vocabulary: Vocabulary,

    /// None once the build has been attempted
    sorter: Option<ExternalSorter>,
    built: bool,
}

impl Indexer {
    pub fn new(folder: &Path, options: &BuilderOptions, vocabulary: Vocabulary) -> Result<Indexer> {
        if options.block_size == 0 {
            return Err(IndexError::InvalidOption(
                "the dictionary block size should be positive".to_string(),
            ));
        }

        fs::create_dir_all(folder)?;
        let spill_parent = options
            .spill_folder
            .clone()
            .unwrap_or_else(|| folder.join(DEFAULT_SPILL_FOLDER));
        let sorter = ExternalSorter::new(
            &spill_parent,
            options.sort_memory_bytes,
            options.merge_block_bytes,
        )?;

        info!(
            "Indexing into {} with a vocabulary of {} terms",
            folder.display(),
            vocabulary.len()
        );
        Ok(Indexer {
            folder: folder.to_path_buf(),
            spill_parent,
            options: options.clone(),
            vocabulary,
            sorter: Some(sorter),
            built: false,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Records one occurrence of a term in a document
    pub fn add(&mut self, term_id: TermId, docid: DocId) -> Result<()> {
        let num_terms = self.vocabulary.len();
        let sorter = self.sorter.as_mut().ok_or(IndexError::AlreadyBuilt)?;
        if term_id as usize >= num_terms {
            return Err(IndexError::Format(format!(
                "term {} is outside of the vocabulary ({} terms)",
                term_id, num_terms
            )));
        }
        sorter.push(Occurrence::new(term_id, docid))
    }

    /// Records the tokens of a document, repeats included
    pub fn add_document(&mut self, docid: DocId, terms: &[TermId]) -> Result<()> {
        for &term_id in terms {
            self.add(term_id, docid)?;
        }
        Ok(())
    }

    /// Sorts the occurrences and writes the postings, the dictionary and
    /// the index information
    pub fn build(&mut self) -> Result<()> {
        let sorter = self.sorter.take().ok_or(IndexError::AlreadyBuilt)?;
        let result = self.write_index(sorter);
        self.remove_spill_parent();
        result?;

        self.built = true;
        info!("Index built in {}", self.folder.display());
        Ok(())
    }

    fn write_index(&self, sorter: ExternalSorter) -> Result<()> {
        let num_tokens = sorter.occurrences();
        let num_terms = self.vocabulary.len();
        let merged = sorter.finish()?;

        let progress = if self.options.show_progress {
            let progress = ProgressBar::new(num_terms as u64);
            progress.set_style(pb_style());
            progress
        } else {
            ProgressBar::hidden()
        };

        let postings = BufWriter::with_capacity(
            self.options.merge_block_bytes,
            File::create(self.folder.join(POSTINGS_DAT))?,
        );
        // The merged stream (and its spill folder) is dropped here
        let (statistics, _) = compress_postings(merged, num_terms, postings, &progress)?;
        progress.finish();

        DictionaryWriter::new(self.options.block_size)?.write(
            &self.folder,
            &self.vocabulary,
            &statistics,
            num_tokens,
        )?;

        save_information(
            &IndexInformation {
                version: INDEX_VERSION,
                block_size: self.options.block_size,
                num_terms,
                num_tokens,
                case_insensitive: self.options.case_insensitive,
            },
            &self.folder,
        )
    }

    /// Removes the default spill folder if nothing else uses it
    fn remove_spill_parent(&self) {
        if self.options.spill_folder.is_some() {
            return;
        }
        match fs::remove_dir(&self.spill_parent) {
            Ok(()) => debug!("Removed {}", self.spill_parent.display()),
            Err(e) => warn!(
                "Could not remove the spill folder {}: {}",
                self.spill_parent.display(),
                e
            ),
        }
    }

    /// Opens the index that was just built
    pub fn to_index(&self, in_memory: bool) -> Result<ReviewIndex> {
        if !self.built {
            return Err(IndexError::NotBuilt);
        }
        ReviewIndex::load(&self.folder, in_memory)
    }
}
