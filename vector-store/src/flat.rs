use crate::error::VectorStoreError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

/// Dense per-build document identifier; the row number in the vector index.
pub type DocId = u32;

const MAGIC: [u8; 4] = *b"CIVX";
const FORMAT_VERSION: u32 = 1;

/// A similarity index over fixed-dimension vectors, addressed by insertion
/// order.
///
/// Implementations store vectors L2-normalized so that the inner product is the
/// cosine similarity. The brute-force [`FlatIndex`] is the only backend today;
/// an ANN structure can be slotted in behind the same trait.
pub trait VectorIndex: Send + Sync {
    /// Vector dimension fixed at construction
    fn dimension(&self) -> usize;

    /// Number of stored vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append vectors; the i-th appended vector gets docId `len() + i`.
    ///
    /// Either every vector is inserted or none is.
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), VectorStoreError>;

    /// Top `k` `(docId, cosine)` pairs, best first, ties broken by docId.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(DocId, f32)>, VectorStoreError>;

    /// Opaque serialized form understood by [`VectorIndex::from_bytes`].
    fn to_bytes(&self) -> Result<Vec<u8>, VectorStoreError>;

    fn from_bytes(bytes: &[u8]) -> Result<Self, VectorStoreError>
    where
        Self: Sized;

    fn save(&self, path: &Path) -> Result<(), VectorStoreError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn load(path: &Path) -> Result<Self, VectorStoreError>
    where
        Self: Sized,
    {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

/// Scale `vector` to unit length. Zero vectors are returned unchanged.
pub fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|x| x / norm).collect()
}

#[derive(Serialize, Deserialize)]
struct FlatIndexFile {
    magic: [u8; 4],
    version: u32,
    dimension: u32,
    data: Vec<f32>,
}

/// Flat, append-only, brute-force inner-product index.
///
/// Vectors live in one contiguous row-major buffer; a query is a full scan.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Stored (normalized) vector for `doc_id`.
    pub fn vector(&self, doc_id: DocId) -> Option<&[f32]> {
        let start = doc_id as usize * self.dimension;
        self.data.get(start..start + self.dimension)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), VectorStoreError> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), VectorStoreError> {
        if self.dimension == 0 {
            return Err(VectorStoreError::AdditionFailed(
                "index has zero dimension".to_string(),
            ));
        }
        for vector in vectors {
            self.check_dimension(vector)?;
        }
        if self.len() + vectors.len() > DocId::MAX as usize {
            return Err(VectorStoreError::AdditionFailed(
                "docId space exhausted".to_string(),
            ));
        }

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend(normalize(vector));
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(DocId, f32)>, VectorStoreError> {
        self.check_dimension(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query = normalize(query);
        let mut scored: Vec<(DocId, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(idx, row)| {
                let dot: f32 = row.iter().zip(&query).map(|(a, b)| a * b).sum();
                (idx as DocId, dot)
            })
            .collect();

        scored.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        scored.truncate(k);

        debug!("Flat search scanned {} vectors", self.len());
        Ok(scored)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, VectorStoreError> {
        let dimension = u32::try_from(self.dimension)
            .map_err(|_| VectorStoreError::Corrupt("dimension exceeds u32".to_string()))?;
        let file = FlatIndexFile {
            magic: MAGIC,
            version: FORMAT_VERSION,
            dimension,
            data: self.data.clone(),
        };
        Ok(bincode::serialize(&file)?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, VectorStoreError> {
        let file: FlatIndexFile = bincode::deserialize(bytes)?;
        if file.magic != MAGIC {
            return Err(VectorStoreError::Corrupt("bad magic".to_string()));
        }
        if file.version != FORMAT_VERSION {
            return Err(VectorStoreError::Corrupt(format!(
                "unsupported format version {}",
                file.version
            )));
        }
        let dimension = file.dimension as usize;
        if dimension == 0 || file.data.len() % dimension != 0 {
            return Err(VectorStoreError::Corrupt(format!(
                "{} floats do not divide into {dimension}-d rows",
                file.data.len()
            )));
        }
        Ok(Self {
            dimension,
            data: file.data,
        })
    }
}
