mod cli;

use clap::Parser;
use cli::Cli;
use hostaudit::config::Config;
use hostaudit::output::{self, OutputFormat};
use hostaudit::registry::ScannerRegistry;
use hostaudit::report::Report;
use hostaudit::rules::RuleEngine;
use hostaudit::severity::Severity;

fn main() {
    let cli = Cli::parse();
    install_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(2);
    });
    cli.apply_to(&mut config);

    let mut registry = ScannerRegistry::new();
    registry.register_all_default(&config);
    let scanner_order = registry.scanner_names();

    let report = Report::new();
    registry.run_all(&config, &report);

    if config.rules_enable {
        let mut engine = RuleEngine::new();
        let rules_dir = config.rules_dir.as_deref().unwrap_or("rules");
        engine.load_dir(std::path::Path::new(rules_dir), &report, config.rules_allow_legacy);
        for name in &scanner_order {
            report.mutate_findings(Some(name), |finding| engine.apply(name, finding));
        }
    }

    let format = if config.ndjson {
        OutputFormat::Ndjson
    } else if config.sarif {
        OutputFormat::Sarif
    } else if !config.pretty {
        OutputFormat::Json
    } else {
        cli.format
    };

    let formatted = output::format_report(&scanner_order, &report, &config, format);

    match &config.output_file {
        Some(path) => {
            std::fs::write(path, &formatted).unwrap_or_else(|e| {
                eprintln!("Error writing output to {path}: {e}");
                std::process::exit(2);
            });
        }
        None => print!("{formatted}"),
    }

    std::process::exit(exit_code(&report, &config));
}

/// Exit code policy (spec §6.1): non-zero on any scanner operational
/// failure, on any finding at or above `fail_on_severity`, or when total
/// findings reach `fail_on_count`.
fn exit_code(report: &Report, config: &Config) -> i32 {
    let any_operational_error = report.results_snapshot().iter().any(|r| r.findings.iter().any(|f| f.operational_error));
    if any_operational_error {
        return 2;
    }

    let fail_on = Severity::from_str_lenient(&config.fail_on_severity);
    let any_at_or_above = Severity::ALL.iter().filter(|s| **s >= fail_on).map(|s| report.count_by_severity(*s)).sum::<usize>() > 0;
    if any_at_or_above {
        return 1;
    }

    if config.fail_on_count >= 0 && report.total_findings() as i64 >= config.fail_on_count {
        return 1;
    }

    0
}

fn install_tracing(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
