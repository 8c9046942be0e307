//! counterpick_detector - spool consumer and detection publisher
//!
//! This daemon:
//! 1. Takes the single-instance detector lock (exits quietly if held)
//! 2. Selects and warms up the configured inference backend
//! 3. Resets the detection list and the `detected` flag for a new run
//! 4. Consumes spool images oldest first until interrupted
//! 5. Clears `detected` on the way out

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use counterpick::detect::{BackendRegistry, StubBackend};
use counterpick::{
    exit_code, install_shutdown_flag, CounterpickConfig, CountersDb, DetectorPipeline,
    InstanceLock, Notifier,
};

const NOTIFY_TITLE: &str = "Counterpick detector";

#[derive(Parser, Debug)]
#[command(author, version, about = "Detect drafted subjects and publish their counters")]
struct Args {
    /// TOML configuration file.
    #[arg(long, env = "COUNTERPICK_CONFIG")]
    config: Option<PathBuf>,

    /// Inference backend to use (overrides the config file).
    #[arg(long)]
    backend: Option<String>,

    /// Print the available backends and exit.
    #[arg(long)]
    list_backends: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match run(args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            log::error!("detector failed to start: {:#}", err);
            ExitCode::from(exit_code::RESOURCE_UNAVAILABLE)
        }
    }
}

fn run(args: Args) -> Result<u8> {
    let mut cfg = CounterpickConfig::load_from(args.config.as_deref())?;
    if let Some(backend) = args.backend {
        cfg.detector.backend = backend;
    }
    let notifier = Notifier::new(cfg.detector.notify_command.clone());

    let mut registry = build_registry(&cfg);
    if args.list_backends {
        for name in registry.list() {
            println!("{name}");
        }
        return Ok(exit_code::OK);
    }

    let _lock = match InstanceLock::acquire(&cfg.paths.lock_dir, "detector") {
        Ok(Some(lock)) => lock,
        Ok(None) => {
            log::info!("another detector is already running");
            return Ok(exit_code::OK);
        }
        Err(err) => {
            log::error!("cannot take detector lock: {:#}", err);
            return Ok(exit_code::RESOURCE_UNAVAILABLE);
        }
    };

    let backend = match registry
        .set_default(&cfg.detector.backend)
        .and_then(|_| registry.take_default())
    {
        Ok(backend) => backend,
        Err(err) => {
            notifier.notify_fatal(NOTIFY_TITLE, &format!("{:#}", err));
            return Ok(exit_code::BACKEND_UNAVAILABLE);
        }
    };
    let counters = CountersDb::load(&cfg.paths.counters_db)?;
    log::info!(
        "{} subject(s) in counters database {}",
        counters.len(),
        cfg.paths.counters_db.display()
    );

    // Must precede warm-up: a signal during model load ends the run before the loop.
    let shutdown = install_shutdown_flag()?;
    let mut pipeline = DetectorPipeline::new(&cfg, backend, counters);
    if let Err(err) = pipeline.ensure_ready() {
        notifier.notify_fatal(NOTIFY_TITLE, &format!("{:#}", err));
        return Ok(exit_code::BACKEND_UNAVAILABLE);
    }
    if shutdown.load(Ordering::SeqCst) {
        log::info!("shutdown signal received during warm-up, detector stopped");
        pipeline.finish();
        return Ok(exit_code::OK);
    }
    pipeline.prepare()?;

    log::info!(
        "detector running with backend '{}'. watching {}",
        pipeline.backend_name(),
        cfg.paths.spool_dir.display()
    );
    match pipeline.run(&shutdown) {
        Ok(()) => {
            log::info!("shutdown signal received, detector stopped");
            Ok(exit_code::OK)
        }
        Err(err) => {
            notifier.notify_fatal(NOTIFY_TITLE, &format!("{:#}", err));
            Ok(exit_code::INFERENCE_FAILED)
        }
    }
}

fn build_registry(cfg: &CounterpickConfig) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::new());

    #[cfg(feature = "backend-tract")]
    {
        use counterpick::detect::TractBackend;
        match TractBackend::new(
            &cfg.paths.model,
            &cfg.paths.labels,
            cfg.detector.params.input_size,
        ) {
            Ok(backend) => registry.register(backend),
            Err(err) => log::warn!("tract backend unavailable: {:#}", err),
        }
    }
    #[cfg(not(feature = "backend-tract"))]
    let _ = cfg;

    registry
}
