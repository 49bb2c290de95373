// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// mDNS printer directory.
//
// Browses `_ipp._tcp.local.` and `_ipps._tcp.local.` with `mdns-sd` and
// keeps a live map from advertised instance name (e.g. "Front Desk") to the
// printer's IPP URI.  A destination resolves to an `IppDriver` for that URI.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, PoisonError, RwLock};

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tracing::{debug, info, warn};

use crate::directory::PrinterDirectory;
use crate::driver::PrinterDriver;
use crate::error::DriverError;
use crate::ipp_driver::IppDriver;

/// mDNS service type for plain IPP.
const IPP_SERVICE: &str = "_ipp._tcp.local.";

/// mDNS service type for TLS-secured IPP.
const IPPS_SERVICE: &str = "_ipps._tcp.local.";

type PrinterMap = Arc<RwLock<HashMap<String, String>>>;

/// Printers currently advertised on the local network.
pub struct MdnsDirectory {
    daemon: ServiceDaemon,
    printers: PrinterMap,
}

impl MdnsDirectory {
    /// Start the mDNS daemon and begin browsing immediately.
    pub fn start() -> Result<Self, DriverError> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| DriverError::Discovery(format!("failed to start mDNS daemon: {e}")))?;
        let printers: PrinterMap = Arc::default();

        for (service_type, tls) in [(IPP_SERVICE, false), (IPPS_SERVICE, true)] {
            let receiver = daemon
                .browse(service_type)
                .map_err(|e| DriverError::Discovery(format!("browse {service_type}: {e}")))?;
            spawn_listener(service_type, tls, receiver, Arc::clone(&printers))?;
        }

        info!("mDNS printer discovery started");
        Ok(Self { daemon, printers })
    }

    /// Stop browsing and shut the daemon down.
    pub fn shutdown(self) -> Result<(), DriverError> {
        for service_type in [IPP_SERVICE, IPPS_SERVICE] {
            if let Err(e) = self.daemon.stop_browse(service_type) {
                debug!(service_type, error = %e, "stop browse failed");
            }
        }
        self.daemon
            .shutdown()
            .map_err(|e| DriverError::Discovery(format!("daemon shutdown: {e}")))?;
        info!("mDNS daemon shut down");
        Ok(())
    }

    /// URI advertised for `name`, if currently visible.
    pub fn uri_for(&self, name: &str) -> Option<String> {
        self.printers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

impl PrinterDirectory for MdnsDirectory {
    fn resolve(&self, name: &str) -> Option<Arc<dyn PrinterDriver>> {
        let uri = self.uri_for(name)?;
        match IppDriver::new(&uri) {
            Ok(driver) => Some(Arc::new(driver)),
            Err(e) => {
                warn!(printer = name, error = %e, "advertised URI is unusable");
                None
            }
        }
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .printers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

/// Drain browse events on a dedicated thread until the search stops.
fn spawn_listener(
    service_type: &'static str,
    tls: bool,
    receiver: mdns_sd::Receiver<ServiceEvent>,
    printers: PrinterMap,
) -> Result<(), DriverError> {
    std::thread::Builder::new()
        .name(format!("mdns-{service_type}"))
        .spawn(move || {
            while let Ok(event) = receiver.recv() {
                match event {
                    ServiceEvent::SearchStarted(stype) => {
                        debug!(service_type = %stype, "mDNS search started");
                    }
                    ServiceEvent::ServiceFound(stype, fullname) => {
                        debug!(service_type = %stype, name = %fullname, "service found");
                    }
                    ServiceEvent::ServiceResolved(info) => match printer_uri_of(&info, tls) {
                        Some(uri) => {
                            let name = instance_name(info.get_fullname(), service_type).to_owned();
                            info!(printer = %name, uri = %uri, "printer resolved");
                            printers
                                .write()
                                .unwrap_or_else(PoisonError::into_inner)
                                .insert(name, uri);
                        }
                        None => {
                            warn!(
                                fullname = %info.get_fullname(),
                                "resolved printer has no address"
                            );
                        }
                    },
                    ServiceEvent::ServiceRemoved(stype, fullname) => {
                        let name = instance_name(&fullname, service_type);
                        info!(service_type = %stype, printer = %name, "printer removed");
                        printers
                            .write()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(name);
                    }
                    ServiceEvent::SearchStopped(stype) => {
                        debug!(service_type = %stype, "mDNS search stopped");
                        break;
                    }
                }
            }
        })
        .map(|_| ())
        .map_err(|e| DriverError::Discovery(format!("cannot spawn mDNS listener: {e}")))
}

/// IPP URI for a resolved service, preferring an IPv4 address.
fn printer_uri_of(info: &ServiceInfo, tls: bool) -> Option<String> {
    let addresses = info.get_addresses();
    let ip = addresses
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addresses.iter().next())
        .copied()?;
    let resource_path = info.get_property_val_str("rp").unwrap_or("ipp/print");
    Some(printer_uri(ip, info.get_port(), resource_path, tls))
}

fn printer_uri(ip: IpAddr, port: u16, resource_path: &str, tls: bool) -> String {
    let scheme = if tls { "ipps" } else { "ipp" };
    let path = resource_path.trim_start_matches('/');
    match ip {
        IpAddr::V4(v4) => format!("{scheme}://{v4}:{port}/{path}"),
        IpAddr::V6(v6) => format!("{scheme}://[{v6}]:{port}/{path}"),
    }
}

/// `"Front Desk._ipp._tcp.local."` → `"Front Desk"`.
fn instance_name<'a>(fullname: &'a str, service_type: &str) -> &'a str {
    fullname
        .strip_suffix(service_type)
        .and_then(|rest| rest.strip_suffix('.'))
        .unwrap_or(fullname)
}
