// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spoolgate Server: the print dispatch service: request validation, the
// stage/submit/release pipeline, and its HTTP front end.

pub mod cli;
pub mod dispatch;
pub mod http;
pub mod services;

pub use dispatch::{Dispatcher, PrintRequest, decode_document};
pub use http::{ApiError, AppState, app};
pub use services::{StartupError, build_dispatcher};
