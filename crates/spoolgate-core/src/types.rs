// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Spoolgate dispatch service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::InvalidTransition;
use crate::options::PrintOptions;

/// Unique identifier for a print job.
///
/// Always generated server-side; never derived from caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why the spooler (or the adapter in front of it) refused a job.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
    #[error("printer '{0}' is not known to the spooler")]
    UnknownPrinter(String),

    #[error("printer is offline: {0}")]
    PrinterOffline(String),

    #[error("printer queue is full")]
    QueueFull,

    #[error("printer rejected the document: {0}")]
    MalformedDocument(String),

    #[error("printer did not respond within {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("spooler refused the job: {0}")]
    Spooler(String),
}

/// Outcome reported by a printer driver for a single submission.
///
/// `Accepted` only means the spooler took ownership of the job; whether paper
/// actually came out is not observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpoolResult {
    Accepted {
        /// Identifier assigned by the spooler, when it reports one.
        spooler_job: Option<String>,
    },
    Rejected(RejectReason),
}

impl SpoolResult {
    pub fn accepted() -> Self {
        Self::Accepted { spooler_job: None }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Why a job ended in the `failed` state.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "stage", content = "cause", rename_all = "snake_case")]
pub enum FailureReason {
    /// The document could not be staged; the printer was never contacted.
    #[error("staging failed: {0}")]
    Storage(String),

    #[error(transparent)]
    Rejected(RejectReason),
}

/// Lifecycle states of a print job.
///
/// `Received → Staged → Spooled → Completed`, or `Failed` from any
/// non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum JobStatus {
    Received,
    Staged,
    Spooled,
    Completed,
    Failed(FailureReason),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }

    /// Short lowercase label used in logs and the audit trail.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Staged => "staged",
            Self::Spooled => "spooled",
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Received => 0,
            Self::Staged => 1,
            Self::Spooled => 2,
            Self::Completed => 3,
            Self::Failed(_) => u8::MAX,
        }
    }
}

/// Job metadata handed to a driver alongside the staged file.
#[derive(Debug, Clone)]
pub struct JobTicket {
    pub job_id: JobId,
    /// Logical destination name as requested by the caller.
    pub destination: String,
    /// Human-readable title shown in the spooler queue.
    pub title: String,
}

/// The unit of work: one caller submission travelling through staging and
/// spooling.
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub id: JobId,
    pub destination: String,
    pub options: PrintOptions,
    /// SHA-256 hex digest of the decoded document.
    pub document_hash: String,
    pub document_size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    payload: Option<Vec<u8>>,
    status: JobStatus,
}

impl PrintJob {
    pub fn new(
        destination: String,
        options: PrintOptions,
        payload: Vec<u8>,
        document_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            destination,
            options,
            document_hash,
            document_size: payload.len() as u64,
            created_at: now,
            updated_at: now,
            payload: Some(payload),
            status: JobStatus::Received,
        }
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    /// Document bytes, until they have been handed off with
    /// [`take_payload`](Self::take_payload).
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Move the document bytes out of the record once they are staged.
    pub fn take_payload(&mut self) -> Option<Vec<u8>> {
        self.payload.take()
    }

    /// Build the driver ticket for this job.
    pub fn ticket(&self) -> JobTicket {
        JobTicket {
            job_id: self.id,
            destination: self.destination.clone(),
            title: format!("spoolgate-{}", self.id),
        }
    }

    /// Move the job forward in its lifecycle.
    ///
    /// Only the next state in sequence, or `Failed` from a non-terminal
    /// state, is accepted.
    pub fn advance(&mut self, next: JobStatus) -> Result<(), InvalidTransition> {
        let allowed = !self.status.is_terminal()
            && match next {
                JobStatus::Failed(_) => true,
                _ => next.rank() == self.status.rank() + 1,
            };

        if !allowed {
            return Err(InvalidTransition {
                job_id: self.id,
                from: self.status.label(),
                to: next.label(),
            });
        }

        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Transition to `Failed`, unless the job already reached a terminal
    /// state.
    pub fn fail(&mut self, reason: FailureReason) -> Result<(), InvalidTransition> {
        self.advance(JobStatus::Failed(reason))
    }
}

/// What the caller gets back for a dispatched job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReceipt {
    pub job_id: JobId,
    pub destination: String,
    pub status: JobStatus,
    pub spooler_job: Option<String>,
}
