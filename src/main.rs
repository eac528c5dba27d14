use std::process::ExitCode;

use config::{Config, LogFormat};
use errors::{RotationError, CONFIG_EXIT_CODE};
use services::{logger::RotationLog, Crontab, InitSystem};
use stores::KeytoolStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use workflow::{schedule, Outcome, RotationSettings, Workflow};

mod certificates;
mod config;
mod errors;
mod services;
mod stores;
mod tools;
mod workflow;

fn main() -> ExitCode {
    // Loads configuration from command-line, YAML or HCL sources
    let config = match config::load("/etc/unifi-cert-rotate") {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            return ExitCode::from(CONFIG_EXIT_CODE);
        }
    };

    setup_logging(&config);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

/// Creates a tracing/logging subscriber based on the configuration provided
fn setup_logging(config: &Config) {
    let writer = RotationLog::new(&config.logging);
    let to_file = writer.has_file();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(&config.logging.level).into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!to_file)
        .with_writer(writer);

    match config.logging.format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.compact().init(),
    }
}

fn run(config: &Config) -> Result<(), RotationError> {
    let uid = nix::unistd::geteuid();
    if !uid.is_root() {
        return Err(RotationError::Privilege { uid: uid.as_raw() });
    }

    if config.schedule.enabled {
        register_schedule(config);
    }

    let settings = RotationSettings::from_config(config);
    if settings.dry_run {
        tracing::info!("Test mode: the service and keystore will not be modified");
    }

    let keystore = KeytoolStore::new(&config.keystore.keytool);
    let service = InitSystem::new(config.service.manager, config.service.command.clone());

    match Workflow::new(&settings, &keystore, &service).run()? {
        Outcome::UpToDate { fingerprint } => {
            tracing::info!("certificate {fingerprint} is already installed");
        }
        Outcome::Updated {
            previous, current, ..
        } => match previous {
            Some(previous) => tracing::info!("certificate rotated from {previous} to {current}"),
            None => tracing::info!("certificate {current} installed"),
        },
    }

    Ok(())
}

/// A broken crontab never prevents the rotation itself.
fn register_schedule(config: &Config) {
    let executable = match std::env::current_exe() {
        Ok(executable) => executable,
        Err(err) => {
            tracing::warn!("unable to resolve own executable, not scheduling: {err}");
            return;
        }
    };

    let args: Vec<String> = config
        .config_path
        .iter()
        .flat_map(|path| ["--config-path".to_string(), path.to_string()])
        .collect();

    let crontab = Crontab::new(&config.schedule.crontab);
    if let Err(err) = schedule::ensure_scheduled(
        &crontab,
        &executable,
        &config.schedule.expression,
        &args,
    ) {
        tracing::warn!("unable to schedule recurring run: {err}");
    }
}
