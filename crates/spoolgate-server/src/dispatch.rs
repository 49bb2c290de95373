// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The dispatcher: validate → stage → submit under a deadline → release.
//
// Every request that gets past validation becomes a `PrintJob` that ends in
// `Completed` or `Failed`, and its staged file is gone by the time
// `dispatch` returns.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use spoolgate_core::config::ServiceConfig;
use spoolgate_core::error::{DispatchError, Result};
use spoolgate_core::options::PrintOptions;
use spoolgate_core::types::{
    FailureReason, JobReceipt, JobStatus, PrintJob, RejectReason, SpoolResult,
};
use spoolgate_print::PrinterRouter;
use spoolgate_store::integrity::short_hash;
use spoolgate_store::{AuditLog, AuditRecord, StagingArea, hash_bytes};

/// Standard alphabet; padding may be present or absent.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One caller submission.
#[derive(Debug, Clone)]
pub struct PrintRequest {
    /// Base64-encoded document, optionally as a `data:` URL.
    pub document: String,
    /// Destination; the configured default when absent or blank.
    pub printer: Option<String>,
    pub options: PrintOptions,
}

#[derive(Clone)]
pub struct Dispatcher {
    staging: StagingArea,
    router: PrinterRouter,
    default_printer: String,
    max_payload_bytes: u64,
    submit_timeout: Duration,
    max_in_flight: usize,
    permits: Arc<Semaphore>,
    audit: Option<Arc<Mutex<AuditLog>>>,
}

impl Dispatcher {
    pub fn new(config: &ServiceConfig, staging: StagingArea, router: PrinterRouter) -> Self {
        Self {
            staging,
            router,
            default_printer: config.default_printer.clone(),
            max_payload_bytes: config.max_payload_bytes,
            submit_timeout: config.submit_timeout(),
            max_in_flight: config.max_in_flight,
            permits: Arc::new(Semaphore::new(config.max_in_flight)),
            audit: None,
        }
    }

    /// Append every job outcome to `audit`.
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(Arc::new(Mutex::new(audit)));
        self
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn router(&self) -> &PrinterRouter {
        &self.router
    }

    pub fn default_printer(&self) -> &str {
        &self.default_printer
    }

    /// Jobs currently between staging and release.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight
            .saturating_sub(self.permits.available_permits())
    }

    /// Run one request to a terminal outcome.
    ///
    /// # Errors
    ///
    /// `InvalidPayload` before anything is written; otherwise the error
    /// carries the id of the job that failed.
    pub async fn dispatch(&self, request: PrintRequest) -> Result<JobReceipt> {
        let started = Instant::now();
        let payload = decode_document(&request.document, self.max_payload_bytes)?;

        let destination = request
            .printer
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.default_printer)
            .to_owned();
        let document_hash = hash_bytes(&payload);
        let mut job = PrintJob::new(destination, request.options, payload, document_hash);

        debug!(
            job_id = %job.id,
            destination = %job.destination,
            bytes = job.document_size,
            options = ?job.options,
            "job received"
        );

        // The job runs to its terminal state on its own task, so a caller
        // that goes away cannot leave it unrecorded.
        let job_id = job.id;
        let worker = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = worker.run(&mut job).await;
            worker.record(&job, &outcome, started.elapsed()).await;
            outcome
        });

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(DispatchError::PrinterUnavailable {
                job_id,
                reason: RejectReason::Spooler(format!("dispatch task ended early: {e}")),
            }),
        }
    }

    async fn run(&self, job: &mut PrintJob) -> Result<JobReceipt> {
        let Ok(_permit) = self.permits.try_acquire() else {
            let reason = RejectReason::QueueFull;
            transition(job, JobStatus::Failed(FailureReason::Rejected(reason.clone())));
            return Err(DispatchError::PrinterUnavailable {
                job_id: job.id,
                reason,
            });
        };

        let payload = job.take_payload().unwrap_or_default();
        let staged = self.staging.stage(job.id, &payload).await;
        drop(payload);

        let mut staged = match staged {
            Ok(staged) => staged,
            Err(source) => {
                transition(job, JobStatus::Failed(FailureReason::Storage(source.to_string())));
                return Err(DispatchError::Storage {
                    job_id: job.id,
                    source,
                });
            }
        };
        transition(job, JobStatus::Staged);

        let ticket = job.ticket();
        let submitted = tokio::time::timeout(
            self.submit_timeout,
            self.router
                .submit(&job.destination, staged.path(), &job.options, &ticket),
        )
        .await;

        // On failure the handle is still live and its Drop retries removal.
        if let Err(e) = staged.release().await {
            warn!(job_id = %job.id, error = %e, "could not release staged document");
        }

        match submitted {
            Err(_elapsed) => {
                let after_ms = duration_ms(self.submit_timeout);
                transition(
                    job,
                    JobStatus::Failed(FailureReason::Rejected(RejectReason::Timeout { after_ms })),
                );
                Err(DispatchError::Timeout {
                    job_id: job.id,
                    after_ms,
                })
            }
            Ok(SpoolResult::Rejected(reason)) => {
                transition(job, JobStatus::Failed(FailureReason::Rejected(reason.clone())));
                Err(DispatchError::PrinterUnavailable {
                    job_id: job.id,
                    reason,
                })
            }
            Ok(SpoolResult::Accepted { spooler_job }) => {
                transition(job, JobStatus::Spooled);
                transition(job, JobStatus::Completed);
                Ok(JobReceipt {
                    job_id: job.id,
                    destination: job.destination.clone(),
                    status: job.status().clone(),
                    spooler_job,
                })
            }
        }
    }

    /// Log the terminal outcome and append it to the audit trail.
    async fn record(&self, job: &PrintJob, outcome: &Result<JobReceipt>, elapsed: Duration) {
        let elapsed_ms = duration_ms(elapsed);
        let hash = short_hash(&job.document_hash);

        let (label, details) = match outcome {
            Ok(receipt) => {
                info!(
                    job_id = %job.id,
                    destination = %job.destination,
                    document_hash = %hash,
                    spooler_job = ?receipt.spooler_job,
                    elapsed_ms,
                    "job spooled"
                );
                ("completed", receipt.spooler_job.clone())
            }
            Err(e) => {
                warn!(
                    job_id = %job.id,
                    destination = %job.destination,
                    document_hash = %hash,
                    elapsed_ms,
                    error = %e,
                    "job failed"
                );
                (outcome_label(e), Some(e.to_string()))
            }
        };

        let Some(audit) = &self.audit else {
            return;
        };
        let record = AuditRecord {
            job_id: job.id.to_string(),
            destination: job.destination.clone(),
            document_hash: job.document_hash.clone(),
            outcome: label.to_owned(),
            success: outcome.is_ok(),
            details,
        };
        let audit = Arc::clone(audit);
        let written = tokio::task::spawn_blocking(move || {
            audit
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record(&record)
        })
        .await;

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(job_id = %job.id, error = %e, "audit write failed"),
            Err(e) => warn!(job_id = %job.id, error = %e, "audit task failed"),
        }
    }
}

/// Decode a caller-supplied document.
///
/// Tolerates surrounding and embedded whitespace, missing padding, and a
/// `data:<mime>;base64,` prefix.  Empty, undecodable, or oversized input is
/// `InvalidPayload`.
pub fn decode_document(raw: &str, max_bytes: u64) -> Result<Vec<u8>> {
    let mut encoded = raw.trim();
    if let Some(data_url) = encoded.strip_prefix("data:") {
        let (meta, body) = data_url
            .split_once(',')
            .ok_or_else(|| DispatchError::InvalidPayload("data URL has no payload".into()))?;
        if !meta.ends_with(";base64") {
            return Err(DispatchError::InvalidPayload(
                "data URL is not base64-encoded".into(),
            ));
        }
        encoded = body;
    }

    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if compact.is_empty() {
        return Err(DispatchError::InvalidPayload("document is empty".into()));
    }

    // Every 4 characters decode to at most 3 bytes; refuse before decoding.
    let upper_bound = (compact.len() as u64).div_ceil(4) * 3;
    if upper_bound > max_bytes.saturating_add(2) {
        return Err(too_large(upper_bound, max_bytes));
    }

    let bytes = LENIENT_BASE64
        .decode(compact.as_bytes())
        .map_err(|e| DispatchError::InvalidPayload(format!("document is not valid base64: {e}")))?;

    if bytes.is_empty() {
        return Err(DispatchError::InvalidPayload("document is empty".into()));
    }
    if bytes.len() as u64 > max_bytes {
        return Err(too_large(bytes.len() as u64, max_bytes));
    }
    Ok(bytes)
}

fn too_large(size: u64, limit: u64) -> DispatchError {
    DispatchError::InvalidPayload(format!(
        "document is {size} bytes, limit is {limit}"
    ))
}

fn outcome_label(error: &DispatchError) -> &'static str {
    match error {
        DispatchError::InvalidPayload(_) => "invalid",
        DispatchError::Storage { .. } => "storage_failed",
        DispatchError::PrinterUnavailable {
            reason: RejectReason::QueueFull,
            ..
        } => "queue_full",
        DispatchError::PrinterUnavailable { .. } => "rejected",
        DispatchError::Timeout { .. } => "timeout",
    }
}

fn transition(job: &mut PrintJob, next: JobStatus) {
    if let Err(e) = job.advance(next) {
        warn!(error = %e, "ignored invalid job transition");
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid(result: Result<Vec<u8>>) -> String {
        match result {
            Err(DispatchError::InvalidPayload(message)) => message,
            other => panic!("expected InvalidPayload, got {other:?}"),
        }
    }

    #[test]
    fn decodes_padded_and_unpadded() {
        assert_eq!(decode_document("aGVsbG8=", 100).unwrap(), b"hello");
        assert_eq!(decode_document("aGVsbG8", 100).unwrap(), b"hello");
    }

    #[test]
    fn tolerates_whitespace_and_data_url() {
        assert_eq!(decode_document("  aGVs\nbG8=\r\n", 100).unwrap(), b"hello");
        assert_eq!(
            decode_document("data:application/pdf;base64,aGVsbG8=", 100).unwrap(),
            b"hello"
        );
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(invalid(decode_document("", 100)).contains("empty"));
        assert!(invalid(decode_document("   \n", 100)).contains("empty"));
        assert!(invalid(decode_document("not base64!!", 100)).contains("base64"));
        assert!(invalid(decode_document("data:text/plain,hello", 100)).contains("base64"));
    }

    #[test]
    fn enforces_size_limit() {
        // 10 bytes of payload.
        let ten = "MDEyMzQ1Njc4OQ==";
        assert_eq!(decode_document(ten, 10).unwrap(), b"0123456789");
        assert!(invalid(decode_document(ten, 9)).contains("limit is 9"));
        // Rejected before decoding.
        let huge = "A".repeat(4000);
        assert!(invalid(decode_document(&huge, 100)).contains("limit is 100"));
    }

    #[test]
    fn outcome_labels() {
        let job_id = spoolgate_core::JobId::new();
        assert_eq!(
            outcome_label(&DispatchError::PrinterUnavailable {
                job_id,
                reason: RejectReason::QueueFull
            }),
            "queue_full"
        );
        assert_eq!(
            outcome_label(&DispatchError::Timeout { job_id, after_ms: 5 }),
            "timeout"
        );
    }
}
