//! `sweep` – replay a scanner line stream and print scan reports.
//!
//! Reads transport lines (`index:raw`, `angle:raw`, `angle:tof:light`) from a
//! file or stdin, runs one scan session over them, and prints every report
//! the session publishes, plus a final one at end of input.
//!
//! ```text
//! sweep --mode combined --input capture.txt
//! some-serial-dump | sweep --mode angle --angle 45 --json
//! ```
//!
//! Settings come from `~/.sweep/config.toml`, then `SWEEP_*` environment
//! variables, then command-line flags.  Ctrl-C stops the session.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{info, warn};

use sweep_runtime::driver::{self, DriverConfig, SessionDriver};
use sweep_runtime::{ScanReport, ScanSession, init_tracing};
use sweep_types::{ScanMode, SessionState, SweepError};

#[derive(Parser, Debug)]
#[command(name = "sweep", version)]
#[command(about = "Replay a scanner line stream and print scan reports")]
struct Args {
    /// Scan mode: sonar, angle, light or combined (or menu digit 1-4)
    #[arg(short, long)]
    mode: Option<ScanMode>,

    /// Read lines from this file instead of stdin
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Readout angle for angle mode
    #[arg(short, long)]
    angle: Option<i64>,

    /// Report interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Print one JSON object per report instead of a text summary
    #[arg(long)]
    json: bool,

    /// Write the effective settings to ~/.sweep/config.toml and exit
    #[arg(long)]
    save_config: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = init_tracing("sweep");

    let cfg = resolve_config(&args);

    if args.save_config {
        return match config::save(&cfg) {
            Ok(()) => {
                println!(
                    "  {} Config saved to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {e}", "Error saving config".red());
                ExitCode::FAILURE
            }
        };
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {e}", "Failed to start runtime".red());
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(&args, &cfg));
    // A pending stdin read must not keep the process alive.
    runtime.shutdown_timeout(Duration::from_millis(100));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "Error".red());
            ExitCode::FAILURE
        }
    }
}

/// Config file, then environment, then flags.
fn resolve_config(args: &Args) -> config::Config {
    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            info!(path = %config::config_path().display(), "config loaded");
            cfg
        }
        Ok(None) => config::Config::default(),
        Err(e) => {
            warn!(error = %e, "using default configuration");
            config::Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);
    resolve_config_from(cfg, args)
}

/// Apply command-line flags on top of `cfg`.
fn resolve_config_from(mut cfg: config::Config, args: &Args) -> config::Config {
    if let Some(mode) = args.mode {
        cfg.mode = mode;
    }
    if let Some(ms) = args.tick_ms {
        cfg.tick_ms = ms.max(1);
    }
    cfg
}

async fn run(args: &Args, cfg: &config::Config) -> Result<(), SweepError> {
    let mut session = ScanSession::new(cfg.mode, cfg.pipeline_params());
    session.start();
    if let Some(angle) = args.angle {
        session.select_angle(angle)?;
    }

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &args.input {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let driver_config = DriverConfig {
        tick: Duration::from_millis(cfg.tick_ms),
        read_timeout: Duration::from_millis(cfg.read_timeout_ms),
        ..DriverConfig::default()
    };
    let driver = SessionDriver::spawn(reader, driver::shared(session), driver_config);

    let shutdown = driver.shutdown();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – stopping scan …".yellow().bold());
        shutdown.trigger();
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let json = args.json;
    let mut reports = driver.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(report) = reports.recv().await {
            print_report(&report, json, false);
        }
    });

    let session = driver.session();
    let outcome = driver.join().await?;
    if let Err(e) = printer.await {
        warn!(error = %e, "report printer failed");
    }

    let final_report = driver::lock(&session).report();
    print_report(&final_report, json, true);

    info!(
        lines = outcome.reader.lines,
        accepted = outcome.reader.accepted,
        reports = outcome.reports_published,
        interrupted = !outcome.reader.eof,
        "scan finished"
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Report printing
// ─────────────────────────────────────────────────────────────────────────────

fn print_report(report: &ScanReport, json: bool, last: bool) {
    if json {
        match serde_json::to_string(report) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "failed to serialise report"),
        }
        return;
    }
    if last {
        println!("{}", "── final report ──".bold());
    }
    for line in summary_lines(report) {
        println!("{line}");
    }
}

fn state_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Idle => "idle",
        SessionState::Calibrating => "calibrating",
        SessionState::Measuring => "measuring",
        SessionState::Stopped => "stopped",
    }
}

fn summary_lines(report: &ScanReport) -> Vec<String> {
    let mut lines = Vec::new();

    let calibration = if report.calibration.complete {
        "calibrated".green().to_string()
    } else {
        format!("calibration {}", report.calibration).yellow().to_string()
    };
    let mut header = format!(
        "[{}] {} · {}",
        report.mode.to_string().bold().cyan(),
        state_label(report.state),
        report.sonar.len_present().max(report.light.len_present()),
    );
    header.push_str(" pts");
    if report.mode.needs_calibration() {
        header.push_str(&format!(" · {calibration}"));
    }
    lines.push(header);

    for c in &report.clusters {
        lines.push(format!(
            "  {}  {}°–{}°  center {:.1}°  dist {:.1} cm  width {:.0}°  arc {:.1} cm",
            "object".bold(),
            c.angles.start(),
            c.angles.end(),
            c.center_angle,
            c.mean_distance,
            c.angular_width,
            c.arc_length,
        ));
    }
    for s in &report.light_sources {
        lines.push(format!("  {}   {}°  {:.1} cm", "light".bold(), s.angle, s.distance));
    }
    if let Some(nearest) = report.nearest_light() {
        lines.push(format!(
            "  Detected light at {}°, ≈{:.0} cm",
            nearest.angle, nearest.distance
        ));
    }
    if let Some(readout) = report.readout {
        let distance = match readout.distance {
            Some(d) => format!("{d:.1} cm"),
            None => "--".dimmed().to_string(),
        };
        lines.push(format!("  {} {}°: {distance}", "readout".bold(), readout.angle));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn summary_lists_objects_and_nearest_light() {
        plain();
        let mut session = ScanSession::with_defaults(ScanMode::ObjectAndLight);
        session.start();
        for (i, raw) in (100..=550).step_by(50).enumerate() {
            session.ingest_line(&format!("{i}:{raw}"));
        }
        for angle in 10..70 {
            let light = if angle == 40 { 150 } else { 400 };
            for _ in 0..7 {
                session.ingest_line(&format!("{angle}:2320:{light}"));
            }
        }

        let lines = summary_lines(&session.report());
        assert!(lines[0].starts_with("[combined] measuring · 60 pts"));
        assert!(lines.iter().any(|l| l.contains("object  25°–54°  center 39.5°")));
        assert!(lines.iter().any(|l| l.contains("Detected light at 40°, ≈6 cm")));
    }

    #[test]
    fn summary_shows_calibration_progress() {
        plain();
        let mut session = ScanSession::with_defaults(ScanMode::Light);
        session.start();
        session.ingest_line("0:100");
        let lines = summary_lines(&session.report());
        assert!(lines[0].contains("calibrating"));
        assert!(lines[0].contains("calibration 1/10"));
    }

    #[test]
    fn summary_shows_empty_readout() {
        plain();
        let mut session = ScanSession::with_defaults(ScanMode::AngleReadout);
        session.start();
        let lines = summary_lines(&session.report());
        assert_eq!(lines.last().map(String::as_str), Some("  readout 90°: --"));
    }

    #[test]
    fn flags_override_mode_and_tick() {
        let args = Args::parse_from(["sweep", "--mode", "combined", "--tick-ms", "0"]);
        let base = config::Config {
            mode: ScanMode::Light,
            tick_ms: 500,
            ..config::Config::default()
        };
        let cfg = resolve_config_from(base.clone(), &args);
        assert_eq!(cfg.mode, ScanMode::ObjectAndLight);
        assert_eq!(cfg.tick_ms, 1);

        let untouched = resolve_config_from(base, &Args::parse_from(["sweep"]));
        assert_eq!(untouched.mode, ScanMode::Light);
        assert_eq!(untouched.tick_ms, 500);
    }

    #[test]
    fn mode_accepts_menu_digits() {
        let args = Args::parse_from(["sweep", "-m", "2", "--angle", "45", "--json"]);
        assert_eq!(args.mode, Some(ScanMode::AngleReadout));
        assert_eq!(args.angle, Some(45));
        assert!(args.json);
        assert!(Args::try_parse_from(["sweep", "--mode", "radar"]).is_err());
    }
}
