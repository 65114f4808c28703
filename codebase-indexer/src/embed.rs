use crate::error::{IndexerError, Result};
use crate::progress::{IndexPhase, ProgressReporter};
use codeindex_embeddings::Embedder;
use codeindex_vector_store::{CodeChunk, FlatIndex, VectorIndex};
use futures::StreamExt;
use futures::stream;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

/// Outcome of embedding one build's chunk list.
pub(crate) struct EmbeddedChunks {
    /// Vector index in chunk order, or `None` when the build is lexical-only
    pub index: Option<FlatIndex>,
    pub embedded: usize,
    pub failed: usize,
}

pub(crate) struct EmbedRequest<'a> {
    pub embedder: &'a dyn Embedder,
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
    pub cancel: &'a CancellationToken,
    pub progress: &'a ProgressReporter,
}

/// Embed `chunks` in fixed-size batches and assemble a flat index.
///
/// Batches run concurrently but are merged in order, so docId `i` is always
/// chunk `i`. A chunk that cannot be embedded gets a zero vector; if nothing
/// embeds, or the vectors disagree on dimension, the vector index is dropped.
pub(crate) async fn embed_chunks(
    request: EmbedRequest<'_>,
    chunks: &[CodeChunk],
) -> Result<EmbeddedChunks> {
    let EmbedRequest {
        embedder,
        batch_size,
        max_concurrent_batches,
        cancel,
        progress,
    } = request;
    let total = chunks.len();
    progress.report(IndexPhase::Embedding, 0, total, None);

    let mut batches = stream::iter(chunks.chunks(batch_size.max(1)))
        .map(|batch| async move {
            if cancel.is_cancelled() {
                return Err(IndexerError::Cancelled);
            }
            Ok(embed_batch(embedder, batch).await)
        })
        .buffered(max_concurrent_batches.max(1));

    let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(total);
    while let Some(batch) = batches.next().await {
        vectors.extend(batch?);
        progress.report(IndexPhase::Embedding, vectors.len(), total, None);
        tokio::task::yield_now().await;
    }

    let failed = vectors.iter().filter(|v| v.is_none()).count();
    let embedded = total - failed;
    let index = build_index(vectors);
    debug!("Embedded {embedded} of {total} chunks ({failed} failed)");

    Ok(EmbeddedChunks {
        index,
        embedded,
        failed,
    })
}

async fn embed_batch(embedder: &dyn Embedder, batch: &[CodeChunk]) -> Vec<Option<Vec<f32>>> {
    let texts: Vec<String> = batch.iter().map(CodeChunk::embedding_text).collect();
    match embedder.embed_batch(&texts).await {
        Ok(vectors) if vectors.len() == texts.len() => {
            return vectors.into_iter().map(Some).collect();
        }
        Ok(vectors) => warn!(
            "Embedder returned {} vectors for {} texts; retrying chunk by chunk",
            vectors.len(),
            texts.len()
        ),
        Err(err) => warn!("Batch embedding failed ({err}); retrying chunk by chunk"),
    }

    let mut vectors = Vec::with_capacity(batch.len());
    for (chunk, text) in batch.iter().zip(&texts) {
        match embedder.embed(text).await {
            Ok(vector) => vectors.push(Some(vector)),
            Err(err) => {
                warn!("Embedding failed for {}: {err}; using a zero vector", chunk.id);
                vectors.push(None);
            }
        }
    }
    vectors
}

fn build_index(vectors: Vec<Option<Vec<f32>>>) -> Option<FlatIndex> {
    let Some(dimension) = vectors.iter().flatten().map(Vec::len).find(|d| *d > 0) else {
        if !vectors.is_empty() {
            warn!("No chunk could be embedded; falling back to lexical-only search");
        }
        return None;
    };

    let rows: Vec<Vec<f32>> = vectors
        .into_iter()
        .map(|v| v.unwrap_or_else(|| vec![0.0; dimension]))
        .collect();
    let mut index = FlatIndex::new(dimension);
    match index.add(&rows) {
        Ok(()) => Some(index),
        Err(err) => {
            warn!("Vector index build failed ({err}); falling back to lexical-only search");
            None
        }
    }
}
