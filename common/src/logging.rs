//! stderr logging setup shared by the binaries

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::config::OutputConfig;

/// Level implied by `-v` flags: none ERROR, -v INFO, -vv DEBUG, -vvv or more TRACE
pub fn level(verbose: u8) -> tracing::Level {
    match verbose {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(output: &OutputConfig) -> EnvFilter {
    if output.quiet {
        return EnvFilter::new("off");
    }
    EnvFilter::new(level(output.verbose).as_str())
}

/// Install the global subscriber. `RUST_LOG` wins over the verbosity flags.
///
/// Calling this twice is harmless; the second subscriber is ignored.
pub fn init(output: &OutputConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(output));
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_span_events(if output.verbose >= 3 {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .try_init();
    if let Err(error) = result {
        eprintln!("logging already initialized: {}", error);
    }
}
