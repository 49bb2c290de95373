// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spoolgate Store: everything the dispatch service keeps on local disk:
// short-lived staged documents, their fingerprints, and the optional audit
// trail of dispatch outcomes.  Document bytes never leave the staging
// directory and never outlive their job.

pub mod audit;
pub mod integrity;
pub mod staging;

pub use audit::{AuditEntry, AuditError, AuditLog, AuditRecord};
pub use integrity::hash_bytes;
pub use staging::{StagedDocument, StagingArea, StagingLimits};
