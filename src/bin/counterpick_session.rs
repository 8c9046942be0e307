//! counterpick_session - reset shared files at session start/stop
//!
//! Launchers call `start` before spawning the capturer, detector and overlay,
//! and `stop` after tearing them down.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use counterpick::session::{reset_session, SessionAction};
use counterpick::CounterpickConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Reset Counterpick shared files for a session")]
struct Args {
    /// TOML configuration file.
    #[arg(long, env = "COUNTERPICK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Empty the detection list, enable the overlay and clear the spool.
    Start,
    /// Empty the detection list, disable the overlay and clear the spool.
    Stop,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let cfg = CounterpickConfig::load_from(args.config.as_deref())?;

    let action = match args.command {
        Command::Start => SessionAction::Start,
        Command::Stop => SessionAction::Stop,
    };
    let report = reset_session(&cfg, action)?;
    println!(
        "session {}: enabled={} detected={}",
        match action {
            SessionAction::Start => "started",
            SessionAction::Stop => "stopped",
        },
        report.state.enabled,
        report.state.detected
    );
    Ok(())
}
