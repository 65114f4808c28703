use crate::error::{IndexerError, Result};
use crate::snapshot::IndexSnapshot;
use crate::state::{ArtifactDigests, IndexState, digest};
use codeindex_lexical_index::Bm25Index;
use codeindex_vector_store::{CodeChunk, FlatIndex, VectorIndex};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const METADATA_FILE: &str = "metadata.json";
pub const VECTORS_FILE: &str = "vectors.bin";
pub const BM25_FILE: &str = "bm25-index.json";
pub const STATE_FILE: &str = "index-state.json";
pub const BATCH_METADATA_FILE: &str = "batch-metadata.json";

/// Chunks accumulated by batched builds, keyed by global chunk index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    /// Size of the full chunk list the batches slice
    pub total_chunks: usize,
    pub batch_size: usize,
    pub completed_batches: BTreeSet<usize>,
    pub chunks: BTreeMap<usize, CodeChunk>,
}

impl BatchProgress {
    pub fn new(total_chunks: usize, batch_size: usize) -> Self {
        Self {
            total_chunks,
            batch_size,
            ..Default::default()
        }
    }

    pub fn total_batches(&self) -> usize {
        self.total_chunks.div_ceil(self.batch_size.max(1))
    }

    pub fn is_complete(&self) -> bool {
        self.completed_batches.len() == self.total_batches()
    }
}

/// On-disk home of one index: four artifacts written as a unit, plus the
/// batched-build checkpoint.
///
/// Each save writes `metadata.json`, `bm25-index.json` and `vectors.bin` into a
/// fresh `gen-<n>` directory, then renames `index-state.json` into place. The
/// state names its generation and carries digests of the artifacts, so that
/// rename is the single commit point: a save that fails or is interrupted
/// before it leaves the previous build current and loadable.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

const GENERATION_PREFIX: &str = "gen-";

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn generation_dir(&self, generation: u64) -> PathBuf {
        self.dir.join(format!("{GENERATION_PREFIX}{generation}"))
    }

    /// Directory holding the artifacts of the committed build.
    pub fn artifact_dir(&self) -> Result<Option<PathBuf>> {
        Ok(self
            .load_state()?
            .map(|state| self.generation_dir(state.artifacts.generation)))
    }

    /// Whether a completed build has been persisted here.
    pub fn has_index(&self) -> bool {
        self.path(STATE_FILE).exists()
    }

    /// Persist `snapshot`, returning its state with the artifact digests filled
    /// in.
    pub fn save(&self, snapshot: &IndexSnapshot) -> Result<IndexState> {
        fs::create_dir_all(&self.dir)?;
        let previous = self
            .load_state()
            .ok()
            .flatten()
            .map(|state| state.artifacts.generation);
        let generation = self
            .generations()
            .iter()
            .map(|(generation, _)| *generation)
            .max()
            .map_or(1, |latest| latest + 1);

        let metadata: BTreeMap<usize, &CodeChunk> = snapshot.chunks().iter().enumerate().collect();
        let metadata_bytes = serde_json::to_vec(&metadata)?;
        let bm25_bytes = snapshot.bm25().to_json()?;
        let vector_bytes = snapshot.vectors().map(VectorIndex::to_bytes).transpose()?;

        let mut state = snapshot.state().clone();
        state.artifacts = ArtifactDigests {
            generation,
            metadata: digest(&metadata_bytes),
            bm25: digest(&bm25_bytes),
            vectors: vector_bytes.as_deref().map(digest),
        };
        let state_bytes = serde_json::to_vec_pretty(&state)?;

        let mut staged: Vec<(&str, &[u8])> = vec![
            (METADATA_FILE, metadata_bytes.as_slice()),
            (BM25_FILE, bm25_bytes.as_slice()),
        ];
        if let Some(bytes) = vector_bytes.as_deref() {
            staged.push((VECTORS_FILE, bytes));
        }

        let generation_dir = self.generation_dir(generation);
        if let Err(err) = write_generation(&generation_dir, &staged) {
            remove_dir_if_exists(&generation_dir);
            return Err(err);
        }
        if let Err(err) = self.replace_file(STATE_FILE, &state_bytes) {
            remove_if_exists(&self.tmp_path(STATE_FILE));
            remove_dir_if_exists(&generation_dir);
            return Err(err);
        }
        self.prune_generations(generation, previous);

        info!(
            "Persisted index to {:?}: {} chunks, {} files, {} mode, commit {}",
            generation_dir,
            state.chunk_count,
            state.file_count,
            state.mode(),
            state.commit_hash
        );
        Ok(state)
    }

    /// Load the persisted build.
    ///
    /// `Ok(None)` when nothing has been persisted; `CorruptIndex` when the
    /// artifacts are unreadable, do not match the state's digests, or disagree
    /// on the number of documents.
    pub fn load(&self) -> Result<Option<IndexSnapshot>> {
        let Some(state) = self.load_state()? else {
            return Ok(None);
        };
        let dir = self.generation_dir(state.artifacts.generation);

        let metadata_bytes = read_verified(&dir, METADATA_FILE, &state.artifacts.metadata)?;
        let bm25_bytes = read_verified(&dir, BM25_FILE, &state.artifacts.bm25)?;
        let vectors = match &state.artifacts.vectors {
            Some(expected) => {
                let bytes = read_verified(&dir, VECTORS_FILE, expected)?;
                Some(FlatIndex::from_bytes(&bytes).map_err(|e| corrupt(VECTORS_FILE, e))?)
            }
            None => None,
        };

        let chunks = parse_metadata(&metadata_bytes)?;
        let bm25 = Bm25Index::from_json(&bm25_bytes).map_err(|e| corrupt(BM25_FILE, e))?;

        if state.chunk_count != chunks.len() {
            return Err(IndexerError::CorruptIndex(format!(
                "state records {} chunks but metadata has {}",
                state.chunk_count,
                chunks.len()
            )));
        }
        let count = chunks.len();
        let snapshot = IndexSnapshot::new(chunks, bm25, vectors, state).ok_or_else(|| {
            IndexerError::CorruptIndex(format!(
                "lexical or vector index does not cover the {count} metadata documents"
            ))
        })?;

        debug!("Loaded {count} chunks from {dir:?}");
        Ok(Some(snapshot))
    }

    /// Read `index-state.json` without touching the other artifacts.
    pub fn load_state(&self) -> Result<Option<IndexState>> {
        let path = self.path(STATE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        let state: IndexState =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(STATE_FILE, e))?;
        if state.version != IndexState::CURRENT_VERSION {
            return Err(IndexerError::CorruptIndex(format!(
                "index format version {} (expected {})",
                state.version,
                IndexState::CURRENT_VERSION
            )));
        }
        Ok(Some(state))
    }

    /// Read the committed `metadata.json` alone, ordered by docId.
    pub fn load_metadata(&self) -> Result<Option<Vec<CodeChunk>>> {
        let Some(state) = self.load_state()? else {
            return Ok(None);
        };
        let dir = self.generation_dir(state.artifacts.generation);
        let bytes = read_verified(&dir, METADATA_FILE, &state.artifacts.metadata)?;
        parse_metadata(&bytes).map(Some)
    }

    pub fn load_batch_progress(&self) -> Result<Option<BatchProgress>> {
        let path = self.path(BATCH_METADATA_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        match serde_json::from_slice(&bytes) {
            Ok(progress) => Ok(Some(progress)),
            Err(err) => {
                warn!("Batch metadata at {path:?} is unreadable ({err}); starting over");
                Ok(None)
            }
        }
    }

    pub fn save_batch_progress(&self, progress: &BatchProgress) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let bytes = serde_json::to_vec(progress)?;
        self.replace_file(BATCH_METADATA_FILE, &bytes)
    }

    pub fn clear_batch_progress(&self) -> Result<()> {
        let path = self.path(BATCH_METADATA_FILE);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn tmp_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.tmp"))
    }

    /// Write `name` through a synced `.tmp` sibling and rename it into place.
    fn replace_file(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let tmp = self.tmp_path(name);
        write_synced(&tmp, bytes)?;
        fs::rename(&tmp, self.path(name))?;
        Ok(())
    }

    /// Generation directories present on disk, committed or not.
    fn generations(&self) -> Vec<(u64, PathBuf)> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name();
                let generation = name.to_str()?.strip_prefix(GENERATION_PREFIX)?.parse().ok()?;
                Some((generation, entry.path()))
            })
            .collect()
    }

    /// Drop every generation except the committed one and the one it
    /// replaced, which readers may still have open.
    fn prune_generations(&self, committed: u64, previous: Option<u64>) {
        for (_, path) in self
            .generations()
            .into_iter()
            .filter(|(generation, _)| *generation != committed && Some(*generation) != previous)
        {
            debug!("Removing superseded index generation {path:?}");
            remove_dir_if_exists(&path);
        }
    }
}

fn write_generation(dir: &Path, staged: &[(&str, &[u8])]) -> Result<()> {
    fs::create_dir_all(dir)?;
    for (name, bytes) in staged {
        write_synced(&dir.join(name), bytes)?;
    }
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn read_verified(dir: &Path, name: &str, expected: &str) -> Result<Vec<u8>> {
    let bytes = fs::read(dir.join(name))
        .map_err(|e| IndexerError::CorruptIndex(format!("{name}: {e}")))?;
    if digest(&bytes) != expected {
        return Err(IndexerError::CorruptIndex(format!(
            "{name} does not match the digest in {STATE_FILE}"
        )));
    }
    Ok(bytes)
}

fn parse_metadata(bytes: &[u8]) -> Result<Vec<CodeChunk>> {
    let map: BTreeMap<usize, CodeChunk> =
        serde_json::from_slice(bytes).map_err(|e| corrupt(METADATA_FILE, e))?;
    if let Some((position, doc_id)) = map
        .keys()
        .enumerate()
        .find(|(position, doc_id)| *position != **doc_id)
    {
        return Err(IndexerError::CorruptIndex(format!(
            "{METADATA_FILE} docIds are not dense: expected {position}, found {doc_id}"
        )));
    }
    Ok(map.into_values().collect())
}

fn corrupt(name: &str, err: impl std::fmt::Display) -> IndexerError {
    IndexerError::CorruptIndex(format!("{name}: {err}"))
}

fn remove_if_exists(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!("Failed to remove {path:?}: {err}"),
    }
}

fn remove_dir_if_exists(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!("Failed to remove {path:?}: {err}"),
    }
}
