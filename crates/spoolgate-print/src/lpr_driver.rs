// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// LPR/LPD driver (RFC 1179) for printers and print servers on port 515.
//
// Exchange: "receive job" command (0x02), control file (job metadata), then
// the data file.  Each step is acknowledged with a single byte, 0 meaning ok.
// LPR has no option channel, so orientation is only hinted in the job name.

use std::path::Path;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

use spoolgate_core::options::{Orientation, PrintOptions};
use spoolgate_core::types::{JobTicket, RejectReason, SpoolResult};

use crate::driver::{PrinterDriver, read_document, with_default_port};

/// Default LPR port.
pub const LPR_PORT: u16 = 515;

/// Queue used when none is configured.
pub const DEFAULT_QUEUE: &str = "lp";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Host name announced in control files.
const HOSTNAME: &str = "spoolgate";

/// Sends documents to one LPD queue.
pub struct LprDriver {
    addr: String,
    queue: String,
}

impl LprDriver {
    /// `address` is `host[:port]`; the port defaults to 515.
    pub fn new(address: &str, queue: Option<&str>) -> Self {
        Self {
            addr: with_default_port(address, LPR_PORT),
            queue: queue.unwrap_or(DEFAULT_QUEUE).to_owned(),
        }
    }

    async fn send(
        &self,
        document: &[u8],
        options: &PrintOptions,
        ticket: &JobTicket,
        job_num: u16,
    ) -> Result<(), RejectReason> {
        let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| {
                RejectReason::PrinterOffline(format!(
                    "LPR connection to {} timed out after {}s",
                    self.addr,
                    CONNECT_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| offline(&self.addr, "connect", e))?;

        // 0x02 <queue> LF
        write(&mut stream, &self.addr, format!("\x02{}\n", self.queue).as_bytes()).await?;
        let ack = read_ack(&mut stream, &self.addr).await?;
        if ack != 0 {
            return Err(RejectReason::Spooler(format!(
                "LPD at {} refused queue '{}' (ack {ack})",
                self.addr, self.queue
            )));
        }

        let name = job_name(ticket, options);
        let control_file = control_file(&name, job_num);

        // 0x02 <count> SP cfA<nnn><host> LF, then the control file and a 0 byte.
        let cf_header = format!("\x02{} cfA{job_num:03}{HOSTNAME}\n", control_file.len());
        write(&mut stream, &self.addr, cf_header.as_bytes()).await?;
        expect_ok(&mut stream, &self.addr, "control file header").await?;
        write(&mut stream, &self.addr, control_file.as_bytes()).await?;
        write(&mut stream, &self.addr, &[0]).await?;
        expect_ok(&mut stream, &self.addr, "control file").await?;

        // 0x03 <count> SP dfA<nnn><host> LF, then the document and a 0 byte.
        let df_header = format!("\x03{} dfA{job_num:03}{HOSTNAME}\n", document.len());
        write(&mut stream, &self.addr, df_header.as_bytes()).await?;
        expect_ok(&mut stream, &self.addr, "data file header").await?;
        write(&mut stream, &self.addr, document).await?;
        write(&mut stream, &self.addr, &[0]).await?;

        let ack = read_ack(&mut stream, &self.addr).await?;
        if ack != 0 {
            warn!(ack, "LPD returned non-zero ack after data transfer");
            return Err(RejectReason::QueueFull);
        }
        Ok(())
    }
}

#[async_trait]
impl PrinterDriver for LprDriver {
    #[instrument(skip_all, fields(addr = %self.addr, queue = %self.queue, job_id = %ticket.job_id))]
    async fn submit(&self, file: &Path, options: &PrintOptions, ticket: &JobTicket) -> SpoolResult {
        let document = match read_document(file).await {
            Ok(bytes) => bytes,
            Err(reason) => return SpoolResult::Rejected(reason),
        };

        let job_num = next_job_number();
        info!(bytes = document.len(), job_num, "sending LPR job");
        match self.send(&document, options, ticket, job_num).await {
            Ok(()) => {
                info!("LPR job accepted");
                SpoolResult::Accepted {
                    spooler_job: Some(format!("{job_num:03}")),
                }
            }
            Err(reason) => SpoolResult::Rejected(reason),
        }
    }

    fn describe(&self) -> String {
        format!("lpr {}/{}", self.addr, self.queue)
    }
}

/// RFC 1179 job numbers are three digits; they cycle through 000-999 in
/// submission order so concurrent jobs get distinct file names.
fn next_job_number() -> u16 {
    static NEXT: AtomicU16 = AtomicU16::new(0);
    let mut current = NEXT.load(Ordering::Relaxed);
    loop {
        let next = (current + 1) % 1000;
        match NEXT.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return current,
            Err(actual) => current = actual,
        }
    }
}

fn job_name(ticket: &JobTicket, options: &PrintOptions) -> String {
    match options.orientation {
        Orientation::Landscape => format!("{} (landscape)", ticket.title),
        Orientation::Portrait => ticket.title.clone(),
    }
}

/// H host, P user, J job name, l print data file as-is, U unlink after
/// printing, N source name.
fn control_file(name: &str, job_num: u16) -> String {
    let data_file = format!("dfA{job_num:03}{HOSTNAME}");
    format!("H{HOSTNAME}\nP{HOSTNAME}\nJ{name}\nl{data_file}\nU{data_file}\nN{name}\n")
}

async fn write(stream: &mut TcpStream, addr: &str, bytes: &[u8]) -> Result<(), RejectReason> {
    stream
        .write_all(bytes)
        .await
        .map_err(|e| offline(addr, "send", e))
}

async fn read_ack(stream: &mut TcpStream, addr: &str) -> Result<u8, RejectReason> {
    let mut ack = [0u8; 1];
    stream
        .read_exact(&mut ack)
        .await
        .map_err(|e| offline(addr, "ack", e))?;
    Ok(ack[0])
}

async fn expect_ok(stream: &mut TcpStream, addr: &str, step: &str) -> Result<(), RejectReason> {
    match read_ack(stream, addr).await? {
        0 => {
            debug!(step, "LPD ack");
            Ok(())
        }
        ack => Err(RejectReason::Spooler(format!(
            "LPD at {addr} rejected {step} (ack {ack})"
        ))),
    }
}

fn offline(addr: &str, step: &str, e: std::io::Error) -> RejectReason {
    RejectReason::PrinterOffline(format!("LPR {step} {addr}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use spoolgate_core::types::JobId;
    use tokio::net::TcpListener;

    fn ticket() -> JobTicket {
        JobTicket {
            job_id: JobId::new(),
            destination: "back-office".into(),
            title: "spoolgate-test".into(),
        }
    }

    #[test]
    fn address_defaults_to_lpd_port() {
        let driver = LprDriver::new("10.0.0.9", None);
        assert_eq!(driver.describe(), "lpr 10.0.0.9:515/lp");
    }

    #[test]
    fn control_file_names_job() {
        let cf = control_file("receipt", 7);
        assert!(cf.starts_with("Hspoolgate\n"));
        assert!(cf.contains("Jreceipt\n"));
        assert!(cf.contains("ldfA007spoolgate\n"));
    }

    #[test]
    fn landscape_is_hinted_in_name() {
        let options = PrintOptions {
            orientation: Orientation::Landscape,
            ..Default::default()
        };
        assert_eq!(job_name(&ticket(), &options), "spoolgate-test (landscape)");
    }

    #[test]
    fn consecutive_job_numbers_do_not_repeat() {
        let numbers: std::collections::HashSet<u16> =
            (0..500).map(|_| next_job_number()).collect();
        assert_eq!(numbers.len(), 500);
        assert!(numbers.iter().all(|n| *n < 1000));
    }

    /// Minimal LPD: acks every step with `acks` in order and returns the
    /// bytes it received.
    async fn fake_lpd(acks: Vec<u8>) -> (String, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            for ack in acks {
                let n = socket.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
                socket.write_all(&[ack]).await.unwrap();
                if ack != 0 {
                    break;
                }
            }
            received
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn refused_queue_is_rejected() {
        let (addr, server) = fake_lpd(vec![1]).await;
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"hello").unwrap();

        let driver = LprDriver::new(&addr, Some("raw"));
        let result = driver
            .submit(file.path(), &PrintOptions::default(), &ticket())
            .await;

        assert!(matches!(result, SpoolResult::Rejected(RejectReason::Spooler(_))));
        let received = server.await.unwrap();
        assert_eq!(received, b"\x02raw\n");
    }

    #[tokio::test]
    async fn connection_refused_is_offline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"hello").unwrap();
        let result = LprDriver::new(&addr, None)
            .submit(file.path(), &PrintOptions::default(), &ticket())
            .await;
        assert!(matches!(
            result,
            SpoolResult::Rejected(RejectReason::PrinterOffline(_))
        ));
    }
}
