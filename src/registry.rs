//! Scanner trait and registry (spec §4.F, §4.G).
//!
//! [`ScannerRegistry`] owns scanner instances for the duration of a run,
//! applies enable/disable filtering, and dispatches either sequentially or
//! over a bounded [rayon] worker pool.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use rayon::ThreadPoolBuilder;

use crate::config::Config;
use crate::context::ScanContext;
use crate::finding::{now_ms, Finding};
use crate::report::Report;

/// A pluggable scanner (spec §3 "Scanner trait", §9 "dynamic dispatch").
///
/// Implementers must be `Send + Sync`: `run_all` may invoke `scan` from a
/// rayon worker thread when `config.parallel` is set.
pub trait Scanner: Send + Sync {
    /// Unique identifier matched against `enable_scanners`/`disable_scanners`.
    fn name(&self) -> &'static str;

    /// Short human-readable description, surfaced by `--help`-adjacent UIs.
    fn description(&self) -> &'static str;

    /// Executes the scanner, appending findings/warnings/errors to
    /// `ctx.report`. Must not retain `ctx` beyond this call.
    fn scan(&self, ctx: &ScanContext<'_>);
}

/// Owns scanner instances and runs them against a [`ScanContext`].
pub struct ScannerRegistry {
    scanners: Vec<Box<dyn Scanner>>,
}

impl Default for ScannerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScannerRegistry {
    pub fn new() -> Self {
        ScannerRegistry {
            scanners: Vec::new(),
        }
    }

    /// Appends a scanner. Panics on a duplicate name — a programming error,
    /// not a runtime condition (spec §4.G: "duplicates by name are rejected").
    pub fn register(&mut self, scanner: Box<dyn Scanner>) {
        let name = scanner.name();
        assert!(
            !self.scanners.iter().any(|s| s.name() == name),
            "scanner {name} already registered"
        );
        self.scanners.push(scanner);
    }

    /// Registers the canonical scanner set in a fixed, documented order —
    /// the order findings appear in a serialized report when run
    /// sequentially or in parallel (spec §4.G: "serializer emits scanners
    /// in registration order").
    pub fn register_all_default(&mut self, _config: &Config) {
        use crate::scanners::*;

        self.register(Box::new(process::ProcessScanner));
        self.register(Box::new(network::NetworkScanner));
        self.register(Box::new(modules::ModuleScanner));
        self.register(Box::new(ioc::IocScanner));
        self.register(Box::new(suid::SuidScanner));
        self.register(Box::new(world_writable::WorldWritableScanner));
        self.register(Box::new(kernel_param::KernelParamScanner));
        self.register(Box::new(mac::MacScanner));
        self.register(Box::new(mount::MountScanner));
        self.register(Box::new(kernel_hardening::KernelHardeningScanner));
        self.register(Box::new(systemd::SystemdUnitScanner));
        self.register(Box::new(auditd::AuditdScanner));
        self.register(Box::new(container::ContainerScanner));
        self.register(Box::new(integrity::IntegrityScanner));
        self.register(Box::new(yara::YaraScanner));
        self.register(Box::new(ebpf::EbpfScanner));
    }

    pub fn scanner_names(&self) -> Vec<&'static str> {
        self.scanners.iter().map(|s| s.name()).collect()
    }

    fn is_eligible(&self, scanner: &dyn Scanner, config: &Config) -> bool {
        config.is_scanner_enabled(scanner.name()) && !config.fast_scan_disables(scanner.name())
    }

    /// Runs every eligible scanner, converting any panic into a single
    /// `operational_error` finding (spec §7) rather than aborting the run.
    pub fn run_all(&self, config: &Config, report: &Report) {
        let eligible: Vec<&Box<dyn Scanner>> = self
            .scanners
            .iter()
            .filter(|s| self.is_eligible(s.as_ref(), config))
            .collect();

        if config.parallel && eligible.len() > 1 {
            let pool_size = (config.parallel_max_threads.max(1) as usize).min(eligible.len());
            let pool = ThreadPoolBuilder::new()
                .num_threads(pool_size)
                .build()
                .expect("failed to build scanner thread pool");
            pool.install(|| {
                use rayon::prelude::*;
                eligible.par_iter().for_each(|scanner| {
                    self.run_one(scanner.as_ref(), config, report);
                });
            });
        } else {
            for scanner in &eligible {
                self.run_one(scanner.as_ref(), config, report);
            }
        }
    }

    fn run_one(&self, scanner: &dyn Scanner, config: &Config, report: &Report) {
        let name = scanner.name();
        report.ensure_scanner(name);
        let ctx = ScanContext::new(config, report);
        let start = Instant::now();

        tracing::debug!(scanner = name, "running scanner");
        let outcome = catch_unwind(AssertUnwindSafe(|| scanner.scan(&ctx)));

        if let Err(panic) = outcome {
            let detail = panic_message(&panic);
            tracing::warn!(scanner = name, detail = %detail, "scanner panicked");
            report.add_finding(name, Finding::operational_error(name, detail));
        }

        report.finalize_scanner_timing(name, now_ms());
        tracing::debug!(scanner = name, elapsed_ms = start.elapsed().as_millis() as u64, "scanner finished");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "scanner panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::DiagnosticCode;
    use crate::severity::Severity;

    struct GoodScanner;
    impl Scanner for GoodScanner {
        fn name(&self) -> &'static str {
            "good"
        }
        fn description(&self) -> &'static str {
            "always succeeds"
        }
        fn scan(&self, ctx: &ScanContext<'_>) {
            ctx.report
                .add_finding("good", Finding::new("x", "t", Severity::Info, "d"));
        }
    }

    struct PanicScanner;
    impl Scanner for PanicScanner {
        fn name(&self) -> &'static str {
            "bad"
        }
        fn description(&self) -> &'static str {
            "always panics"
        }
        fn scan(&self, _ctx: &ScanContext<'_>) {
            panic!("boom");
        }
    }

    struct WarnScanner;
    impl Scanner for WarnScanner {
        fn name(&self) -> &'static str {
            "warny"
        }
        fn description(&self) -> &'static str {
            "emits a warning"
        }
        fn scan(&self, ctx: &ScanContext<'_>) {
            ctx.report
                .add_warning("warny", DiagnosticCode::Unknown, "test warning");
        }
    }

    #[test]
    fn duplicate_registration_panics() {
        let result = std::panic::catch_unwind(|| {
            let mut reg = ScannerRegistry::new();
            reg.register(Box::new(GoodScanner));
            reg.register(Box::new(GoodScanner));
        });
        assert!(result.is_err());
    }

    #[test]
    fn panicking_scanner_becomes_operational_error() {
        let mut reg = ScannerRegistry::new();
        reg.register(Box::new(GoodScanner));
        reg.register(Box::new(PanicScanner));
        let config = Config::default();
        let report = Report::new();
        reg.run_all(&config, &report);

        assert_eq!(report.total_findings(), 2);
        let snap = report.results_snapshot();
        let bad = snap.iter().find(|r| r.scanner == "bad").unwrap();
        assert!(bad.findings[0].operational_error);
        assert_eq!(bad.findings[0].severity, Severity::High);

        let good = snap.iter().find(|r| r.scanner == "good").unwrap();
        assert!(!good.findings[0].operational_error);
    }

    #[test]
    fn disabled_scanner_does_not_run() {
        let mut reg = ScannerRegistry::new();
        reg.register(Box::new(GoodScanner));
        let mut config = Config::default();
        config.disable_scanners = vec!["good".to_string()];
        let report = Report::new();
        reg.run_all(&config, &report);
        assert_eq!(report.total_findings(), 0);
    }

    #[test]
    fn warnings_are_scoped_to_registered_scanners() {
        let mut reg = ScannerRegistry::new();
        reg.register(Box::new(WarnScanner));
        let config = Config::default();
        let report = Report::new();
        reg.run_all(&config, &report);
        let warnings = report.warnings_snapshot();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].scanner, "warny");
    }
}
