// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The driver contract every print mechanism implements.

use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;

use spoolgate_core::options::PrintOptions;
use spoolgate_core::types::{JobTicket, RejectReason, SpoolResult};

/// Hands one staged document to a print spooler.
///
/// Drivers hold connection settings only.  They are called once per job,
/// read the file during `submit`, and never move or delete it; the staged
/// file belongs to the dispatcher.
#[async_trait]
pub trait PrinterDriver: Send + Sync {
    /// Submit the document at `file` with `options`.
    ///
    /// `Accepted` means the spooler took ownership of the job.  Every
    /// failure, including transport errors, comes back as `Rejected`.
    async fn submit(&self, file: &Path, options: &PrintOptions, ticket: &JobTicket) -> SpoolResult;

    /// Short human-readable description for logs, e.g. `ipp://10.0.0.7/ipp/print`.
    fn describe(&self) -> String;
}

/// Read a staged document for drivers that send bytes over the wire.
pub(crate) async fn read_document(file: &Path) -> Result<Vec<u8>, RejectReason> {
    match tokio::fs::read(file).await {
        Ok(bytes) if bytes.is_empty() => {
            Err(RejectReason::MalformedDocument("document is empty".into()))
        }
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(RejectReason::Spooler(format!(
            "staged document {} is missing",
            file.display()
        ))),
        Err(e) => Err(RejectReason::Spooler(format!(
            "cannot read staged document: {e}"
        ))),
    }
}

/// Append `default_port` to `address` unless it already names one.
pub(crate) fn with_default_port(address: &str, default_port: u16) -> String {
    let has_port = match address.rsplit_once(':') {
        // `[::1]:9100` or `host:9100`; a bare IPv6 literal has several colons.
        Some((host, port)) => {
            port.parse::<u16>().is_ok() && (host.ends_with(']') || !host.contains(':'))
        }
        None => false,
    };
    if has_port {
        address.to_owned()
    } else {
        format!("{address}:{default_port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_added_when_missing() {
        assert_eq!(with_default_port("10.0.0.7", 9100), "10.0.0.7:9100");
        assert_eq!(with_default_port("printer.lan:9101", 9100), "printer.lan:9101");
        assert_eq!(with_default_port("[fe80::1]:515", 9100), "[fe80::1]:515");
    }

    #[tokio::test]
    async fn missing_document_is_a_spooler_rejection() {
        let err = read_document(Path::new("/nonexistent/job.job")).await.unwrap_err();
        assert!(matches!(err, RejectReason::Spooler(_)));
    }

    #[tokio::test]
    async fn empty_document_is_malformed() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = read_document(file.path()).await.unwrap_err();
        assert!(matches!(err, RejectReason::MalformedDocument(_)));
    }
}
