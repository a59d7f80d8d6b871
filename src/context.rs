//! [`ScanContext`] — the short-lived bundle passed to every scanner.

use crate::config::Config;
use crate::report::Report;

/// Bundles `(Config, Report)` references for one `scan()` invocation (spec
/// §3 "ScanContext"). Scanners borrow this for the duration of their call
/// and must not retain it afterward — it carries no ownership of its own.
pub struct ScanContext<'a> {
    pub config: &'a Config,
    pub report: &'a Report,
}

impl<'a> ScanContext<'a> {
    pub fn new(config: &'a Config, report: &'a Report) -> Self {
        ScanContext { config, report }
    }
}
