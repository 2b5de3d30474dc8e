use std::path::Path;
use std::sync::Arc;
use chrono::Utc;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_BATCH_SIZE;
use crate::domain::{error::KnowledgeError, models::UploadReport, ports::DocumentSink};

pub struct BulkUploader {
    sink: Arc<dyn DocumentSink>,
    batch_size: usize,
}

impl BulkUploader {
    pub fn new(sink: Arc<dyn DocumentSink>) -> Self {
        Self::with_batch_size(sink, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(sink: Arc<dyn DocumentSink>, batch_size: usize) -> Self {
        Self { sink, batch_size: batch_size.max(1) }
    }

    pub async fn upload_file(&self, path: &Path) -> Result<UploadReport, KnowledgeError> {
        info!("Starting bulk upload from: {}", path.display());
        let file = File::open(path).await.map_err(|e| {
            error!("Failed to open {}: {}", path.display(), e);
            KnowledgeError::Io(e)
        })?;
        self.upload_reader(BufReader::new(file)).await
    }

    pub async fn upload_reader<R>(&self, reader: R) -> Result<UploadReport, KnowledgeError>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let started_at = Utc::now();
        let mut lines = reader.lines();
        let mut buffer: Vec<Value> = Vec::with_capacity(self.batch_size);
        let mut total_uploaded = 0usize;
        let mut batches = 0usize;
        let mut decode_errors = 0usize;
        let mut line_number = 0u64;

        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            match serde_json::from_str::<Value>(&line) {
                Ok(record) => buffer.push(record),
                Err(e) => {
                    warn!("Skipping malformed record on line {}: {}", line_number, e);
                    decode_errors += 1;
                    continue;
                }
            }

            if buffer.len() == self.batch_size {
                self.flush(&mut buffer, &mut total_uploaded, &mut batches).await?;
            }
        }

        // Partial final batch, if any records remain past the last full flush
        if !buffer.is_empty() {
            self.flush(&mut buffer, &mut total_uploaded, &mut batches).await?;
        }

        let report = UploadReport {
            total_uploaded,
            batches,
            decode_errors,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "✅ Bulk upload complete: {} records in {} batches ({} decode errors)",
            report.total_uploaded, report.batches, report.decode_errors
        );
        Ok(report)
    }

    async fn flush(
        &self,
        buffer: &mut Vec<Value>,
        total_uploaded: &mut usize,
        batches: &mut usize,
    ) -> Result<(), KnowledgeError> {
        debug!("Submitting batch {} with {} records", *batches + 1, buffer.len());
        self.sink.upload_documents(buffer).await.map_err(|e| {
            error!(
                "Batch {} failed after {} records uploaded: {}",
                *batches + 1,
                *total_uploaded,
                e
            );
            e
        })?;
        *total_uploaded += buffer.len();
        *batches += 1;
        buffer.clear();
        Ok(())
    }
}
