// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared fixtures: a scriptable printer driver and a dispatcher wired to a
// temporary staging directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Notify;

use spoolgate_core::{JobTicket, PrintOptions, RejectReason, ServiceConfig, SpoolResult};
use spoolgate_print::{PrinterDriver, PrinterRouter, StaticDirectory};
use spoolgate_server::Dispatcher;
use spoolgate_store::{AuditLog, StagingArea, StagingLimits};

pub const PRINTER: &str = "XP-80C";

pub enum Behaviour {
    Accept,
    Reject(RejectReason),
    /// Never answers.
    Hang,
    /// Signals `entered`, then waits for `release`.
    Gate { entered: Arc<Notify>, release: Arc<Notify> },
}

/// What the driver observed for one submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub path: PathBuf,
    pub contents: Vec<u8>,
    pub options: PrintOptions,
    pub destination: String,
}

pub struct FakeDriver {
    behaviour: Behaviour,
    calls: AtomicUsize,
    seen: Mutex<Vec<Submission>>,
}

impl FakeDriver {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn accepting() -> Arc<Self> {
        Self::new(Behaviour::Accept)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Submission> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl PrinterDriver for FakeDriver {
    async fn submit(&self, file: &Path, options: &PrintOptions, ticket: &JobTicket) -> SpoolResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let contents = tokio::fs::read(file).await.expect("staged file readable during submit");
        self.seen.lock().unwrap().push(Submission {
            path: file.to_path_buf(),
            contents,
            options: *options,
            destination: ticket.destination.clone(),
        });

        match &self.behaviour {
            Behaviour::Accept => SpoolResult::Accepted {
                spooler_job: Some(format!("{PRINTER}-{}", self.calls())),
            },
            Behaviour::Reject(reason) => SpoolResult::Rejected(reason.clone()),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                SpoolResult::accepted()
            }
            Behaviour::Gate { entered, release } => {
                entered.notify_one();
                release.notified().await;
                SpoolResult::accepted()
            }
        }
    }

    fn describe(&self) -> String {
        "fake".into()
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub config: ServiceConfig,
    pub driver: Arc<FakeDriver>,
    pub dispatcher: Arc<Dispatcher>,
}

impl Harness {
    pub fn new(driver: Arc<FakeDriver>) -> Self {
        Self::with_config(driver, |_| {})
    }

    pub fn with_config(driver: Arc<FakeDriver>, tweak: impl FnOnce(&mut ServiceConfig)) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut config = ServiceConfig {
            staging_dir: dir.path().join("staging"),
            max_payload_bytes: 1024 * 1024,
            staging_capacity_bytes: 8 * 1024 * 1024,
            submit_timeout_ms: 2_000,
            ..Default::default()
        };
        tweak(&mut config);
        config.validate().expect("test config is valid");

        let staging = StagingArea::open(
            &config.staging_dir,
            StagingLimits {
                max_payload_bytes: config.max_payload_bytes,
                capacity_bytes: config.staging_capacity_bytes,
            },
        )
        .expect("staging area");
        let directory = StaticDirectory::new().with(PRINTER, driver.clone());
        let router = PrinterRouter::new(Arc::new(directory));

        let mut dispatcher = Dispatcher::new(&config, staging, router);
        if let Some(path) = &config.audit_db {
            dispatcher = dispatcher.with_audit(AuditLog::open(path).expect("audit log"));
        }

        Self {
            dir,
            config,
            driver,
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Files currently present in the staging directory.
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(&self.config.staging_dir)
            .expect("staging dir")
            .count()
    }
}
