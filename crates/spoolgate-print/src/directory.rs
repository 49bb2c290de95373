// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Destination lookup: which driver serves a printer name.
//
// Directories are consulted in order by `ChainedDirectory`; `PrinterRouter`
// is what the dispatcher talks to, and turns an unresolvable name into a
// `Rejected(UnknownPrinter)` result rather than an error.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use spoolgate_core::config::{PrinterEntry, PrinterProtocol};
use spoolgate_core::options::PrintOptions;
use spoolgate_core::types::{JobTicket, RejectReason, SpoolResult};

use crate::command_driver::CommandDriver;
use crate::driver::PrinterDriver;
use crate::error::DriverError;
use crate::ipp_driver::IppDriver;
use crate::lpr_driver::LprDriver;
use crate::raw_driver::RawSocketDriver;

/// A source of printer destinations.
pub trait PrinterDirectory: Send + Sync {
    /// The driver for `name`, if this directory knows it.
    fn resolve(&self, name: &str) -> Option<Arc<dyn PrinterDriver>>;

    /// Names currently resolvable, for listing.
    fn names(&self) -> Vec<String>;
}

/// Printers fixed at start-up from configuration.
#[derive(Default)]
pub struct StaticDirectory {
    printers: BTreeMap<String, Arc<dyn PrinterDriver>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a driver for every configured entry.
    pub fn from_config(entries: &[PrinterEntry]) -> Result<Self, DriverError> {
        let mut directory = Self::new();
        for entry in entries {
            let driver = driver_for(entry)?;
            info!(printer = %entry.name, driver = %driver.describe(), "printer configured");
            directory.insert(entry.name.clone(), driver);
        }
        Ok(directory)
    }

    pub fn insert(&mut self, name: impl Into<String>, driver: Arc<dyn PrinterDriver>) {
        self.printers.insert(name.into(), driver);
    }

    pub fn with(mut self, name: impl Into<String>, driver: Arc<dyn PrinterDriver>) -> Self {
        self.insert(name, driver);
        self
    }

    pub fn len(&self) -> usize {
        self.printers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.printers.is_empty()
    }
}

impl PrinterDirectory for StaticDirectory {
    fn resolve(&self, name: &str) -> Option<Arc<dyn PrinterDriver>> {
        self.printers.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        self.printers.keys().cloned().collect()
    }
}

/// Build the driver a configuration entry describes.
pub fn driver_for(entry: &PrinterEntry) -> Result<Arc<dyn PrinterDriver>, DriverError> {
    let address = || {
        entry
            .address
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| DriverError::MissingAddress(entry.name.clone()))
    };

    let driver: Arc<dyn PrinterDriver> = match entry.protocol {
        PrinterProtocol::Ipp => Arc::new(IppDriver::new(address()?)?),
        PrinterProtocol::Lpr => Arc::new(LprDriver::new(address()?, entry.queue.as_deref())),
        PrinterProtocol::Raw => Arc::new(RawSocketDriver::new(address()?)),
        PrinterProtocol::Command => Arc::new(CommandDriver::new(
            entry.command.clone(),
            entry.queue.clone().unwrap_or_else(|| entry.name.clone()),
        )),
    };
    Ok(driver)
}

/// Tries each directory in order; the first match wins.
#[derive(Default)]
pub struct ChainedDirectory {
    links: Vec<Arc<dyn PrinterDirectory>>,
}

impl ChainedDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, directory: Arc<dyn PrinterDirectory>) -> Self {
        self.links.push(directory);
        self
    }
}

impl PrinterDirectory for ChainedDirectory {
    fn resolve(&self, name: &str) -> Option<Arc<dyn PrinterDriver>> {
        self.links.iter().find_map(|d| d.resolve(name))
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.links.iter().flat_map(|d| d.names()).collect();
        names.sort();
        names.dedup();
        names
    }
}

/// The adapter the dispatcher submits through.
#[derive(Clone)]
pub struct PrinterRouter {
    directory: Arc<dyn PrinterDirectory>,
}

impl PrinterRouter {
    pub fn new(directory: Arc<dyn PrinterDirectory>) -> Self {
        Self { directory }
    }

    pub fn printers(&self) -> Vec<String> {
        self.directory.names()
    }

    pub fn knows(&self, destination: &str) -> bool {
        self.directory.resolve(destination).is_some()
    }

    /// Resolve `destination` and submit through its driver.
    pub async fn submit(
        &self,
        destination: &str,
        file: &Path,
        options: &PrintOptions,
        ticket: &JobTicket,
    ) -> SpoolResult {
        let Some(driver) = self.directory.resolve(destination) else {
            warn!(destination, job_id = %ticket.job_id, "no driver for destination");
            return SpoolResult::Rejected(RejectReason::UnknownPrinter(destination.to_owned()));
        };
        debug!(destination, driver = %driver.describe(), job_id = %ticket.job_id, "routing job");
        driver.submit(file, options, ticket).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use spoolgate_core::types::JobId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingDriver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PrinterDriver for CountingDriver {
        async fn submit(&self, _: &Path, _: &PrintOptions, _: &JobTicket) -> SpoolResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            SpoolResult::accepted()
        }

        fn describe(&self) -> String {
            "counting".into()
        }
    }

    fn ticket(destination: &str) -> JobTicket {
        JobTicket {
            job_id: JobId::new(),
            destination: destination.into(),
            title: "t".into(),
        }
    }

    #[test]
    fn from_config_builds_each_protocol() {
        let entries = vec![
            PrinterEntry::local("XP-80C"),
            PrinterEntry {
                name: "front".into(),
                protocol: PrinterProtocol::Ipp,
                address: Some("ipp://10.0.0.7/ipp/print".into()),
                queue: None,
                command: None,
            },
            PrinterEntry {
                name: "back".into(),
                protocol: PrinterProtocol::Lpr,
                address: Some("10.0.0.8".into()),
                queue: Some("raw".into()),
                command: None,
            },
            PrinterEntry {
                name: "kitchen".into(),
                protocol: PrinterProtocol::Raw,
                address: Some("10.0.0.9:9100".into()),
                queue: None,
                command: None,
            },
        ];
        let directory = StaticDirectory::from_config(&entries).expect("directory");
        assert_eq!(directory.len(), 4);
        assert_eq!(directory.names(), ["XP-80C", "back", "front", "kitchen"]);
        assert_eq!(
            directory.resolve("back").map(|d| d.describe()).as_deref(),
            Some("lpr 10.0.0.8:515/raw")
        );
        assert_eq!(
            directory.resolve("XP-80C").map(|d| d.describe()).as_deref(),
            Some("lp -d XP-80C")
        );
    }

    #[test]
    fn missing_address_fails() {
        let entry = PrinterEntry {
            name: "kitchen".into(),
            protocol: PrinterProtocol::Raw,
            address: None,
            queue: None,
            command: None,
        };
        assert!(matches!(
            driver_for(&entry),
            Err(DriverError::MissingAddress(name)) if name == "kitchen"
        ));
    }

    #[test]
    fn chain_prefers_earlier_links() {
        let first = Arc::new(CountingDriver::default());
        let second = Arc::new(CountingDriver::default());
        let chain = ChainedDirectory::new()
            .then(Arc::new(StaticDirectory::new().with("a", first.clone())))
            .then(Arc::new(
                StaticDirectory::new()
                    .with("a", second.clone())
                    .with("b", second.clone()),
            ));

        assert_eq!(chain.names(), ["a", "b"]);
        let resolved = chain.resolve("a").expect("a resolves");
        assert!(Arc::ptr_eq(
            &resolved,
            &(first.clone() as Arc<dyn PrinterDriver>)
        ));
        assert!(chain.resolve("c").is_none());
    }

    #[tokio::test]
    async fn router_rejects_unknown_destination() {
        let driver = Arc::new(CountingDriver::default());
        let directory = StaticDirectory::new().with("XP-80C", driver.clone());
        let router = PrinterRouter::new(Arc::new(directory));
        let file = Path::new("/tmp/x.job");
        let options = PrintOptions::default();

        let result = router
            .submit("UNKNOWN-PRINTER", file, &options, &ticket("UNKNOWN-PRINTER"))
            .await;
        assert_eq!(
            result,
            SpoolResult::Rejected(RejectReason::UnknownPrinter("UNKNOWN-PRINTER".into()))
        );
        assert_eq!(driver.calls.load(Ordering::SeqCst), 0);

        let result = router
            .submit("XP-80C", file, &options, &ticket("XP-80C"))
            .await;
        assert!(result.is_accepted());
        assert_eq!(driver.calls.load(Ordering::SeqCst), 1);
        assert!(router.knows("XP-80C"));
    }
}
