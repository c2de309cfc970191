#![forbid(unsafe_code)]

//! pinmap demo binary entry point.

use std::io;
use std::process;

use pinmap_demo::{app, cli};
use pinmap_runtime::SessionConfig;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() {
    let opts = cli::Opts::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let parsed = SessionConfig::from_env_with_diagnostics();
    for error in &parsed.errors {
        warn!(%error, "ignoring config value");
    }

    let report = match app::run(&opts, parsed.config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("pinmap-demo: {e}");
            process::exit(1);
        }
    };

    let mut out = io::stdout().lock();
    let written = if opts.json {
        app::write_json(&report, &mut out)
    } else {
        app::write_text(&report, &mut out)
    };
    if let Err(e) = written {
        eprintln!("pinmap-demo: {e}");
        process::exit(1);
    }
}
