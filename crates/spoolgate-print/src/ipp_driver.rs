// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP Print-Job driver (RFC 8011 §4.2.1) for `ipp://` and `ipps://` printers.
//
// Options travel as job template attributes:
//   orientation-requested  enum     3 = portrait, 4 = landscape
//   print-color-mode       keyword  monochrome | color
//   print-scaling          keyword  fit | none

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use ipp::prelude::*;
use tracing::{debug, error, info, instrument};

use spoolgate_core::options::{PrintOptions, Scale};
use spoolgate_core::types::{JobTicket, RejectReason, SpoolResult};

use crate::driver::{PrinterDriver, read_document};
use crate::error::DriverError;

const USER_NAME: &str = "spoolgate";

/// Sends documents to one IPP printer URI.
pub struct IppDriver {
    uri: Uri,
}

impl IppDriver {
    /// Create a driver for `uri` (`ipp://host[:port]/path` or `ipps://…`).
    pub fn new(uri: &str) -> Result<Self, DriverError> {
        let parsed: Uri = uri.parse().map_err(|e| DriverError::InvalidAddress {
            address: uri.to_owned(),
            reason: format!("{e}"),
        })?;
        match parsed.scheme_str() {
            Some("ipp" | "ipps" | "http" | "https") => Ok(Self { uri: parsed }),
            other => Err(DriverError::InvalidAddress {
                address: uri.to_owned(),
                reason: format!("unsupported scheme {other:?}"),
            }),
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }
}

#[async_trait]
impl PrinterDriver for IppDriver {
    #[instrument(skip_all, fields(uri = %self.uri, job_id = %ticket.job_id))]
    async fn submit(&self, file: &Path, options: &PrintOptions, ticket: &JobTicket) -> SpoolResult {
        let bytes = match read_document(file).await {
            Ok(bytes) => bytes,
            Err(reason) => return SpoolResult::Rejected(reason),
        };

        let payload = IppPayload::new(Cursor::new(bytes));
        let operation = IppOperationBuilder::print_job(self.uri.clone(), payload)
            .job_title(job_title(ticket, options))
            .user_name(USER_NAME)
            .attribute(IppAttribute::new(
                "orientation-requested",
                IppValue::Enum(options.orientation.ipp_enum_value()),
            ))
            .attribute(IppAttribute::new(
                "print-color-mode",
                IppValue::Keyword(options.color_mode.ipp_keyword().into()),
            ))
            .attribute(IppAttribute::new(
                "print-scaling",
                IppValue::Keyword(options.scale.ipp_keyword().into()),
            ))
            .build();

        let client = AsyncIppClient::new(self.uri.clone());

        debug!("sending Print-Job");
        let response = match client.send(operation).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Print-Job transport failure");
                return SpoolResult::Rejected(RejectReason::PrinterOffline(format!(
                    "{}: {e}",
                    self.uri
                )));
            }
        };

        let code = response.header().status_code();
        if !code.is_success() {
            error!(status = ?code, "Print-Job refused");
            return SpoolResult::Rejected(classify_status(code));
        }

        let spooler_job = extract_job_id(response.attributes()).map(|id| id.to_string());
        info!(spooler_job = ?spooler_job, "print job accepted by printer");
        SpoolResult::Accepted { spooler_job }
    }

    fn describe(&self) -> String {
        format!("ipp {}", self.uri)
    }
}

/// Job title; a custom scale factor rides along since IPP has no
/// standard attribute for it.
fn job_title(ticket: &JobTicket, options: &PrintOptions) -> String {
    match options.scale {
        Scale::Custom(_) => match options.scale.percent() {
            Some(pct) => format!("{} @{pct}%", ticket.title),
            None => ticket.title.clone(),
        },
        _ => ticket.title.clone(),
    }
}

/// Map a non-success IPP status to a reject reason.
fn classify_status(code: StatusCode) -> RejectReason {
    match code {
        StatusCode::ServerErrorBusy | StatusCode::ServerErrorTemporaryError => {
            RejectReason::QueueFull
        }
        StatusCode::ClientErrorNotFound
        | StatusCode::ClientErrorGone
        | StatusCode::ClientErrorNotPossible
        | StatusCode::ServerErrorNotAcceptingJobs
        | StatusCode::ServerErrorServiceUnavailable
        | StatusCode::ServerErrorDeviceError => RejectReason::PrinterOffline(code.to_string()),
        StatusCode::ClientErrorDocumentFormatNotSupported
        | StatusCode::ClientErrorDocumentFormatError
        | StatusCode::ClientErrorDocumentAccessError
        | StatusCode::ClientErrorRequestEntityTooLong
        | StatusCode::ClientErrorCompressionNotSupported
        | StatusCode::ClientErrorCompressionError
        | StatusCode::ClientErrorBadRequest
        | StatusCode::ClientErrorAttributesOrValuesNotSupported
        | StatusCode::ClientErrorConflictingAttributes => {
            RejectReason::MalformedDocument(code.to_string())
        }
        other => RejectReason::Spooler(format!("IPP status {other} ({other:?})")),
    }
}

/// Extract the `job-id` integer from a response's Job Attributes group.
fn extract_job_id(attrs: &IppAttributes) -> Option<i32> {
    for group in attrs.groups_of(DelimiterTag::JobAttributes) {
        if let Some(attr) = group.attributes().get("job-id")
            && let IppValue::Integer(id) = attr.value()
        {
            return Some(*id);
        }
    }
    None
}
