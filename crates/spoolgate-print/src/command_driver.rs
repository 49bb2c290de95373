// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Local spooler driver: hands the staged file to the OS print command
// (CUPS `lp` by default) and reads the verdict from its exit status.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, instrument, warn};

use spoolgate_core::options::{PrintOptions, Scale};
use spoolgate_core::types::{JobTicket, RejectReason, SpoolResult};

use crate::driver::PrinterDriver;

/// Print command used when none is configured.
pub const DEFAULT_COMMAND: &str = "lp";

/// Submits through a local `lp`-compatible command.
pub struct CommandDriver {
    program: PathBuf,
    queue: String,
}

impl CommandDriver {
    /// `queue` is the local spooler destination passed as `-d`.
    pub fn new(program: Option<PathBuf>, queue: impl Into<String>) -> Self {
        Self {
            program: program.unwrap_or_else(|| PathBuf::from(DEFAULT_COMMAND)),
            queue: queue.into(),
        }
    }

    fn args(&self, file: &Path, options: &PrintOptions, ticket: &JobTicket) -> Vec<String> {
        let mut args = vec![
            "-d".to_owned(),
            self.queue.clone(),
            "-t".to_owned(),
            ticket.title.clone(),
            "-o".to_owned(),
            format!("orientation-requested={}", options.orientation.ipp_enum_value()),
            "-o".to_owned(),
            format!("print-color-mode={}", options.color_mode.ipp_keyword()),
            "-o".to_owned(),
        ];
        args.push(match options.scale {
            Scale::Fit => "fit-to-page".to_owned(),
            other => format!("scaling={}", other.percent().unwrap_or(100)),
        });
        args.push(file.display().to_string());
        args
    }
}

#[async_trait]
impl PrinterDriver for CommandDriver {
    #[instrument(
        skip_all,
        fields(program = %self.program.display(), queue = %self.queue, job_id = %ticket.job_id)
    )]
    async fn submit(&self, file: &Path, options: &PrintOptions, ticket: &JobTicket) -> SpoolResult {
        let output = Command::new(&self.program)
            .args(self.args(file, options, ticket))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out submit drops this future; take the child with it.
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "failed to launch print command");
                return SpoolResult::Rejected(RejectReason::Spooler(format!(
                    "cannot run {}: {e}",
                    self.program.display()
                )));
            }
        };

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            warn!(exit_code = ?exit_code, stderr = %stderr, "print command refused the job");
            return SpoolResult::Rejected(classify_failure(&self.queue, &stderr, exit_code));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let spooler_job = parse_request_id(&stdout);
        info!(spooler_job = ?spooler_job, "job handed to local spooler");
        SpoolResult::Accepted { spooler_job }
    }

    fn describe(&self) -> String {
        format!("{} -d {}", self.program.display(), self.queue)
    }
}

/// `lp` prints `request id is <queue>-<n> (1 file(s))`.
fn parse_request_id(stdout: &str) -> Option<String> {
    let rest = stdout.split("request id is ").nth(1)?;
    rest.split_whitespace().next().map(str::to_owned)
}

fn classify_failure(queue: &str, stderr: &str, exit_code: Option<i32>) -> RejectReason {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("unknown") || lower.contains("does not exist") {
        RejectReason::UnknownPrinter(queue.to_owned())
    } else if lower.contains("not accepting") {
        RejectReason::PrinterOffline(stderr.to_owned())
    } else if stderr.is_empty() {
        RejectReason::Spooler(format!("print command exited with {exit_code:?}"))
    } else {
        RejectReason::Spooler(stderr.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spoolgate_core::options::{ColorMode, Orientation};
    use spoolgate_core::types::JobId;

    fn ticket() -> JobTicket {
        JobTicket {
            job_id: JobId::new(),
            destination: "XP-80C".into(),
            title: "spoolgate-test".into(),
        }
    }

    #[test]
    fn args_carry_every_option() {
        let driver = CommandDriver::new(None, "XP-80C");
        let options = PrintOptions {
            orientation: Orientation::Landscape,
            color_mode: ColorMode::Color,
            scale: Scale::Custom(1.5),
        };
        let args = driver.args(Path::new("/tmp/a.job"), &options, &ticket());
        assert_eq!(
            args,
            [
                "-d", "XP-80C", "-t", "spoolgate-test",
                "-o", "orientation-requested=4",
                "-o", "print-color-mode=color",
                "-o", "scaling=150",
                "/tmp/a.job",
            ]
        );
    }

    #[test]
    fn default_options_fit_to_page() {
        let driver = CommandDriver::new(None, "XP-80C");
        let args = driver.args(Path::new("/tmp/a.job"), &PrintOptions::default(), &ticket());
        assert!(args.contains(&"orientation-requested=3".to_owned()));
        assert!(args.contains(&"print-color-mode=monochrome".to_owned()));
        assert!(args.contains(&"fit-to-page".to_owned()));
    }

    #[test]
    fn request_id_is_parsed() {
        assert_eq!(
            parse_request_id("request id is XP-80C-42 (1 file(s))\n").as_deref(),
            Some("XP-80C-42")
        );
        assert_eq!(parse_request_id(""), None);
    }

    #[test]
    fn stderr_is_classified() {
        assert_eq!(
            classify_failure("NOPE", "lp: The printer or class does not exist.", Some(1)),
            RejectReason::UnknownPrinter("NOPE".into())
        );
        assert!(matches!(
            classify_failure(
                "XP-80C",
                "lp: Destination \"XP-80C\" is not accepting jobs.",
                Some(1)
            ),
            RejectReason::PrinterOffline(_)
        ));
        assert!(matches!(
            classify_failure("XP-80C", "", Some(3)),
            RejectReason::Spooler(_)
        ));
    }

    #[tokio::test]
    async fn missing_program_is_rejected() {
        let driver = CommandDriver::new(Some("/nonexistent/lp".into()), "XP-80C");
        let result = driver
            .submit(Path::new("/tmp/a.job"), &PrintOptions::default(), &ticket())
            .await;
        assert!(matches!(result, SpoolResult::Rejected(RejectReason::Spooler(_))));
    }

    #[cfg(unix)]
    mod fake_lp {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-lp");
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
            let mut perms = fs::metadata(&path).expect("metadata").permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&path, perms).expect("set perms");
            path
        }

        #[tokio::test]
        async fn accepted_job_reports_request_id() {
            let dir = tempfile::tempdir().expect("temp dir");
            let args_log = dir.path().join("args.log");
            let program = script(
                dir.path(),
                &format!(
                    "echo \"$@\" > \"{}\"\necho \"request id is XP-80C-7 (1 file(s))\"",
                    args_log.display()
                ),
            );
            let document = dir.path().join("doc.job");
            fs::write(&document, b"0123456789").unwrap();

            let driver = CommandDriver::new(Some(program), "XP-80C");
            let result = driver
                .submit(&document, &PrintOptions::default(), &ticket())
                .await;

            assert_eq!(
                result,
                SpoolResult::Accepted {
                    spooler_job: Some("XP-80C-7".into())
                }
            );
            let args = fs::read_to_string(&args_log).unwrap();
            assert!(args.contains("-d XP-80C"), "unexpected args: {args}");
            assert!(document.exists(), "driver must not delete the staged file");
        }

        #[tokio::test]
        async fn unknown_destination_is_rejected() {
            let dir = tempfile::tempdir().expect("temp dir");
            let program = script(
                dir.path(),
                "echo 'lp: The printer or class does not exist.' >&2\nexit 1",
            );
            let driver = CommandDriver::new(Some(program), "UNKNOWN-PRINTER");
            let result = driver
                .submit(Path::new("/tmp/a.job"), &PrintOptions::default(), &ticket())
                .await;
            assert_eq!(
                result,
                SpoolResult::Rejected(RejectReason::UnknownPrinter("UNKNOWN-PRINTER".into()))
            );
        }
    }
}
