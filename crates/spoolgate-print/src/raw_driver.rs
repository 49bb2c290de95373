// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP driver (JetDirect, port 9100).
//
// Open a socket and stream the bytes.  No settings, no job id, no feedback:
// the printer must understand the document format natively, and a clean
// shutdown is the only acceptance signal there is.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

use spoolgate_core::options::PrintOptions;
use spoolgate_core::types::{JobTicket, RejectReason, SpoolResult};

use crate::driver::{PrinterDriver, read_document, with_default_port};

/// Default raw TCP port (HP JetDirect).
pub const RAW_PORT: u16 = 9100;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Chunk size for progress logging.
const CHUNK_SIZE: usize = 8192;

pub struct RawSocketDriver {
    addr: String,
}

impl RawSocketDriver {
    /// `address` is `host[:port]`; the port defaults to 9100.
    pub fn new(address: &str) -> Self {
        Self {
            addr: with_default_port(address, RAW_PORT),
        }
    }

    async fn send(&self, document: &[u8]) -> Result<(), RejectReason> {
        let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| {
                RejectReason::PrinterOffline(format!(
                    "raw TCP connection to {} timed out after {}s",
                    self.addr,
                    CONNECT_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| {
                RejectReason::PrinterOffline(format!("raw TCP connect to {}: {e}", self.addr))
            })?;

        let mut sent = 0;
        for chunk in document.chunks(CHUNK_SIZE) {
            stream.write_all(chunk).await.map_err(|e| {
                RejectReason::PrinterOffline(format!("raw TCP send failed at byte {sent}: {e}"))
            })?;
            sent += chunk.len();
            debug!(sent, total = document.len(), "raw TCP progress");
        }

        stream
            .flush()
            .await
            .map_err(|e| RejectReason::PrinterOffline(format!("raw TCP flush: {e}")))?;
        stream
            .shutdown()
            .await
            .map_err(|e| RejectReason::PrinterOffline(format!("raw TCP shutdown: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl PrinterDriver for RawSocketDriver {
    /// Options are ignored; the document is sent as-is.
    #[instrument(skip_all, fields(addr = %self.addr, job_id = %ticket.job_id))]
    async fn submit(
        &self,
        file: &Path,
        _options: &PrintOptions,
        ticket: &JobTicket,
    ) -> SpoolResult {
        let document = match read_document(file).await {
            Ok(bytes) => bytes,
            Err(reason) => return SpoolResult::Rejected(reason),
        };

        match self.send(&document).await {
            Ok(()) => {
                info!(total = document.len(), "raw TCP print job sent");
                SpoolResult::accepted()
            }
            Err(reason) => SpoolResult::Rejected(reason),
        }
    }

    fn describe(&self) -> String {
        format!("raw {}", self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spoolgate_core::types::JobId;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn ticket() -> JobTicket {
        JobTicket {
            job_id: JobId::new(),
            destination: "kitchen".into(),
            title: "spoolgate-test".into(),
        }
    }

    #[tokio::test]
    async fn streams_document_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let document: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), &document).unwrap();

        let result = RawSocketDriver::new(&addr)
            .submit(file.path(), &PrintOptions::default(), &ticket())
            .await;

        assert_eq!(result, SpoolResult::accepted());
        assert_eq!(server.await.unwrap(), document);
        assert!(file.path().exists(), "driver must not delete the staged file");
    }

    #[test]
    fn describe_includes_default_port() {
        assert_eq!(RawSocketDriver::new("10.0.0.7").describe(), "raw 10.0.0.7:9100");
    }
}
