//! Entry point for the `ag` AirGradient monitor CLI.
//!
//! Startup sequence:
//! - Load a `.env` file if present (may set `AIRGRADIENT_CONFIG`)
//! - Initialize logging/tracing on stderr
//! - Parse arguments, then run the command on a single-threaded runtime
//!
//! # Exit status
//! `0` success, `1` warning and `2` critical (from `ag alerts` only), `3` for
//! every other failure including usage errors.
//!
//! # Environment Variables
//! - `AIRGRADIENT_CONFIG` (optional) – config file path
//! - `AG_LOG_LEVEL` (optional) – log verbosity (default: `warn`)
//! - `AG_SPAN_EVENTS` (optional) – span event mode for tracing
//! - `FORCE_COLOR` (optional) – force ANSI colour on or off
use std::{env, process::ExitCode};

use clap::Parser;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use airgradient::cli::Cli;
use airgradient::render::{self, Painter};
use airgradient::{commands, EXIT_FAILURE};

// ---

fn main() -> ExitCode {
    // ---
    dotenv().ok();
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version are not failures.
            let code = if e.use_stderr() { EXIT_FAILURE } else { 0 };
            e.print().ok();
            return ExitCode::from(code);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => return fail(&anyhow::Error::new(e).context("failed to start runtime")),
    };

    match runtime.block_on(commands::run(cli)) {
        Ok(code) => code,
        Err(e) => fail(&e),
    }
}

fn fail(err: &anyhow::Error) -> ExitCode {
    // ---
    tracing::debug!(error = ?err, "command failed");
    let painter = Painter::new(render::color_for(std::io::stderr().is_terminal()));
    eprintln!("{}", render::failure_line(&painter, &format!("{err:#}")));
    ExitCode::from(EXIT_FAILURE)
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Output on stderr so command output on stdout stays clean
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY on stderr
/// - Span event emission mode controlled by the `AG_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level from `RUST_LOG`, else the `AG_LOG_LEVEL` env var
///
/// Called once at startup before any tracing macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("AG_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AG_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "warn",
        };
        EnvFilter::new(format!("{level},sqlx=warn"))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(render::color_for(std::io::stderr().is_terminal()))
        .compact()
        .init();
}
