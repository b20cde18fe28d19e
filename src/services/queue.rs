//! Hand-off of stored documents to downstream analysis.
//!
//! Archives are never queued; only the files extracted from them are.

use std::sync::Arc;

use tracing::info;

use super::error::PipelineError;
use crate::models::{Document, ProcessingStatus};
use crate::repository::DocumentStore;

/// Marks documents as ready for analysis.
#[derive(Clone)]
pub struct AnalysisQueue {
    documents: Arc<dyn DocumentStore>,
}

impl AnalysisQueue {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Queue a single document.
    ///
    /// Fails with [`PipelineError::ArchiveNotQueueable`] for zip/rar files.
    pub async fn enqueue(&self, document_id: i64) -> Result<Document, PipelineError> {
        let mut doc = self
            .documents
            .get_document(document_id)
            .await?
            .ok_or(PipelineError::DocumentNotFound(document_id))?;

        if doc.is_archive() {
            return Err(PipelineError::ArchiveNotQueueable {
                id: doc.id,
                name: doc.original_filename,
            });
        }

        let queued = self.documents.mark_queued(&[document_id]).await?;
        if queued.contains(&document_id) {
            doc.processing_status = ProcessingStatus::Queued;
        }
        Ok(doc)
    }

    /// Queue many documents at once, silently leaving archives out.
    /// Returns the ids that were queued.
    pub async fn enqueue_many(&self, document_ids: &[i64]) -> Result<Vec<i64>, PipelineError> {
        let queued = self.documents.mark_queued(document_ids).await?;
        if queued.len() < document_ids.len() {
            info!(
                "Skipped {} documents from queue (archives or unknown ids), queued {}",
                document_ids.len() - queued.len(),
                queued.len()
            );
        }
        Ok(queued)
    }
}
