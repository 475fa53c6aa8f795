// The console host binding only exists on Windows; elsewhere the overlay
// engine is built and tested but never driven.
#![cfg_attr(not(windows), allow(dead_code))]

mod config;
mod graphic;
mod overlay;
mod process;
mod terminal;
mod utils;

use anyhow::Context;
use clap::Parser;
use config::{Config, load_config};
use process::ExitWatcher;
use std::fs::File;
use std::path::PathBuf;

/// terminlay - draws the images named by `[img=<path>]` markers over the console text
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Process owning the console to overlay; omit to start a detached
    /// watcher for the current console
    pid: Option<u32>,

    /// Config file path (default: ~/.config/terminlay/config.yaml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log file for the detached watcher (overrides log.file)
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    /// Options forwarded to the detached watcher
    fn passthrough(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(config) = &self.config {
            args.push("--config".to_string());
            args.push(config.display().to_string());
        }
        if let Some(log_file) = &self.log_file {
            args.push("--log-file".to_string());
            args.push(log_file.display().to_string());
        }
        args
    }
}

fn init_logger(config: &Config, log_file: Option<&PathBuf>) {
    let level = config
        .log
        .level
        .parse::<log::LevelFilter>()
        .unwrap_or(log::LevelFilter::Info);

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();

    // The detached watcher has no console to print to
    if let Some(path) = log_file {
        match File::create(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Failed to open log file {}: {}", path.display(), e),
        }
    }

    builder.init();
}

/// Start the watcher for the console we were launched from, then return
fn launch(args: &Args) -> anyhow::Result<()> {
    let pid = process::console_owner_pid().context("Failed to find the console owner")?;
    let exe = std::env::current_exe().context("Failed to locate the terminlay executable")?;

    process::spawn_watcher(&exe, pid, &args.passthrough())
        .context("Failed to start the overlay watcher")?;
    Ok(())
}

/// Overlay the console of `pid` until that process exits
fn watch(pid: u32, config: &Config) -> anyhow::Result<()> {
    let watcher = ExitWatcher::spawn(pid);

    if let Err(e) = run_overlay(pid, config, &watcher) {
        // keep following the process so we exit with it
        log::error!("{}", e);
    }

    watcher
        .join()
        .with_context(|| format!("Failed to wait for process {}", pid))?;

    log::info!("Process {} is gone, exiting", pid);
    Ok(())
}

#[cfg(windows)]
fn run_overlay(pid: u32, config: &Config, watcher: &ExitWatcher) -> utils::Result<()> {
    use overlay::OverlaySession;
    use terminal::console::WindowsConsole;

    let mut session = OverlaySession::new(config.overlay.clone());
    session.attach_with(|| WindowsConsole::attach(pid))?;

    session.run_until(&|| watcher.exited());
    session.close();
    Ok(())
}

#[cfg(not(windows))]
fn run_overlay(pid: u32, _config: &Config, _watcher: &ExitWatcher) -> utils::Result<()> {
    Err(utils::OverlayError::attach(format!(
        "cannot attach to the console of {}: no console host binding on this platform",
        pid
    )))
}

fn main() {
    let args = Args::parse();

    let config = match load_config(args.config.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let result = match args.pid {
        None => {
            init_logger(&config, None);
            launch(&args)
        }
        Some(pid) => {
            let log_file = args.log_file.clone().unwrap_or_else(|| config.log.file.clone());
            init_logger(&config, Some(&log_file));
            log::info!("Starting terminlay watcher for pid {}", pid);
            watch(pid, &config)
        }
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}
