//! # hostaudit
//!
//! Read-only Linux host security posture enumerator.
//!
//! `hostaudit` walks kernel, process, filesystem, network, and kernel-module
//! state under `/proc` and `/sys` and emits a structured [`report::Report`]
//! of [`finding::Finding`]s with assigned [`severity::Severity`]. It runs
//! every eligible scanner over a bounded thread pool and never mutates the
//! host: every read is best-effort and every failure degrades to a warning
//! rather than aborting the run.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use hostaudit::{config::Config, context::ScanContext, registry::ScannerRegistry, report::Report};
//!
//! let config = Config::load(None).expect("failed to load config");
//! let mut registry = ScannerRegistry::new();
//! registry.register_all_default(&config);
//!
//! let report = Report::new();
//! registry.run_all(&config, &report);
//!
//! println!("{} findings", report.total_findings());
//! ```
//!
//! ## Architecture
//!
//! 1. **[`config`]** — flat engine configuration, loaded from an optional
//!    TOML file and layered under CLI flags.
//! 2. **[`registry`]** — the [`registry::Scanner`] trait and
//!    [`registry::ScannerRegistry`], which runs every eligible scanner over
//!    a bounded [rayon] pool.
//! 3. **[`scanners`]** — one module per host-posture component: process,
//!    network, kernel modules, IOC heuristics, SUID binaries, world-writable
//!    files, kernel parameters, MAC (SELinux/AppArmor), mounts, kernel
//!    hardening, systemd units, auditd rules, container attribution,
//!    package/IMA integrity, YARA, and eBPF tracing.
//! 4. **[`rules`]** — a post-scan rule engine that can override severity and
//!    attach MITRE ATT&CK technique metadata to matching findings.
//! 5. **[`report`]**/[`finding`]/[`severity`] — the core data model.
//! 6. **[`output`]** — format a finished report as pretty text, JSON,
//!    NDJSON, or SARIF.
//! 7. **[`helpers`]** — shared bounded-I/O primitives: streaming SHA-256,
//!    capped gzip/xz decompression, and a minimal ELF section-header parser.

pub mod config;
pub mod context;
pub mod finding;
pub mod helpers;
pub mod output;
pub mod registry;
pub mod report;
pub mod rules;
pub mod scanners;
pub mod severity;
