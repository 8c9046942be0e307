//! counterpick_overlay - counter grid renderer
//!
//! Polls the detection list and visibility state and publishes the overlay
//! frame while the session is enabled, the last frame had detections and the
//! game window has focus.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use counterpick::overlay::{
    CommandFocusProbe, FixedFocusProbe, FocusProbe, FrameFileWindow, Overlay,
};
use counterpick::{exit_code, install_shutdown_flag, CounterpickConfig, InstanceLock};

#[derive(Parser, Debug)]
#[command(author, version, about = "Draw counter icons beside drafted subjects")]
struct Args {
    /// TOML configuration file.
    #[arg(long, env = "COUNTERPICK_CONFIG")]
    config: Option<PathBuf>,

    /// Where to publish the rendered overlay frame (overrides the config file).
    #[arg(long)]
    frame_output: Option<PathBuf>,

    /// Treat the game as always focused instead of running the focus command.
    #[arg(long)]
    assume_focused: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match run(args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            log::error!("overlay failed to start: {:#}", err);
            ExitCode::from(exit_code::RESOURCE_UNAVAILABLE)
        }
    }
}

fn run(args: Args) -> Result<u8> {
    let mut cfg = CounterpickConfig::load_from(args.config.as_deref())?;
    if let Some(path) = args.frame_output {
        cfg.paths.frame_output = path;
    }

    let _lock = match InstanceLock::acquire(&cfg.paths.lock_dir, "overlay")? {
        Some(lock) => lock,
        None => {
            log::info!("another overlay is already running");
            return Ok(exit_code::OK);
        }
    };

    if args.assume_focused {
        let probe = FixedFocusProbe::new(Some(cfg.overlay.game_title.clone()));
        run_overlay(&cfg, probe)
    } else {
        let probe = CommandFocusProbe::new(&cfg.overlay.focus_command)?;
        run_overlay(&cfg, probe)
    }
}

fn run_overlay<P: FocusProbe>(cfg: &CounterpickConfig, probe: P) -> Result<u8> {
    let window = FrameFileWindow::new(
        &cfg.paths.frame_output,
        cfg.overlay.screen_width,
        cfg.overlay.screen_height,
        cfg.publish,
    );
    let shutdown = install_shutdown_flag()?;
    let mut overlay = Overlay::new(cfg, window, probe);

    log::info!(
        "overlay running. reading {} and {}, publishing {}",
        cfg.paths.detections.display(),
        cfg.paths.visibility.display(),
        cfg.paths.frame_output.display()
    );
    overlay.run(&shutdown);
    log::info!("shutdown signal received, overlay stopped");
    Ok(exit_code::OK)
}
