// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spoolgate Print: the printer driver adapter.  One `PrinterDriver` per
// print mechanism (IPP, LPR, raw TCP, local spooler command), directories
// that map destination names to drivers, and the router the dispatcher
// submits through.

pub mod command_driver;
pub mod directory;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod ipp_driver;
pub mod lpr_driver;
pub mod raw_driver;

pub use command_driver::CommandDriver;
pub use directory::{ChainedDirectory, PrinterDirectory, PrinterRouter, StaticDirectory, driver_for};
pub use discovery::MdnsDirectory;
pub use driver::PrinterDriver;
pub use error::DriverError;
pub use ipp_driver::IppDriver;
pub use lpr_driver::LprDriver;
pub use raw_driver::RawSocketDriver;
