//! # tankpack: The Main Entry Point
//!
//! This module handles Command Line Interface (CLI) parsing, logging initialization,
//! config resolution and dispatching to the packager and launcher.
//!
//! Both workflows are meant for a human at a console: they print banners and wait for
//! Enter before exiting so the window stays readable. Pass `--no-pause` for unattended runs.

use std::path::{Path, PathBuf};
use clap::{Parser, Subcommand};
use log::{debug, error, LevelFilter};
use simplelog::{Config as LogConfig, SimpleLogger};

mod config;
mod doctor;
mod invariant_ppt;
mod launcher;
mod packager;
mod system;

use config::Config;
use system::HostSystem;

#[derive(Parser)]
#[command(name = "tankpack")]
#[command(about = "Package the tank game into a standalone executable and smoke-test it", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Turn on verbose logging.
    ///
    /// - `-v`: Debug
    /// - `-vv`: Trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON config file. Defaults to ./tankpack.json, then the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Don't wait for Enter before exiting.
    #[arg(long, global = true)]
    no_pause: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean old build output and run the packaging tool.
    ///
    /// Removes the build, dist and bytecode-cache directories, then runs the
    /// packaging tool with --clean --noconfirm against the spec file.
    Package {
        /// Fail when the packaging tool fails, instead of always reporting completion.
        #[arg(long)]
        strict: bool,
    },
    /// Check the packaged executable exists and start it for a visual check.
    Launch,
    /// Remove the build, dist and bytecode-cache directories only.
    Clean,
    /// Report on the packaging workspace without changing anything.
    Doctor,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // Logging failure shouldn't stop the workflow.
    let _ = SimpleLogger::init(log_level, LogConfig::default());

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        let _ = Cli::command().print_help();
        return;
    };

    let (mut config, source) = match Config::load(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };
    debug!("Using config from {}", source);

    let system = HostSystem { interactive: !cli.no_pause };
    let mut out = std::io::stdout();

    let result = match command {
        Commands::Package { strict } => {
            config.strict |= strict;
            packager::package(&system, &config, &mut out).map(|report| {
                debug!("Cleaned {:?}, tool status {:?}", report.removed, report.status);
            })
        }
        Commands::Launch => launcher::launch(&system, &config, &mut out).map(|report| {
            debug!("Started {:?} ({} bytes)", report.artifact.path, report.artifact.size);
        }),
        Commands::Clean => packager::clean(&system, &config, &mut out).map(|removed| {
            debug!("Clean finished: {:?}", removed);
        }),
        Commands::Doctor => {
            doctor::doctor(&system, &config, &source, Path::is_file, Path::is_dir, &mut out).map(|report| {
                debug!(
                    "spec present: {}, stale dirs: {:?}, ready: {}",
                    report.spec_present, report.stale_dirs, report.ready_to_launch()
                );
            })
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
