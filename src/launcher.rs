//! # Launcher (smoke test)
//!
//! Checks that packaging produced the artifact, reports it, then starts it detached so
//! the operator can confirm by eye that a game window comes up. Nothing here watches
//! the game after it starts: whether the smoke test passed is the operator's call.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Context, Result};
use log::{debug, info};
use thiserror::Error;
use crate::config::Config;
use crate::invariant_ppt::{LAUNCH_TARGET_IS_FILE, assert_invariant};
use crate::packager::PAUSE_PROMPT;
use crate::system::{ArtifactEntry, SystemOps};

/// The one failure the launcher recognizes on its own.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{} not found", .0.display())]
    ArtifactMissing(PathBuf),
}

/// Control scheme of the packaged game, shown for the operator's reference.
const CONTROLS: &[(&str, &str)] = &[
    ("Move", "W A S D or arrow keys"),
    ("Fire", "SPACE or left CTRL"),
    ("Quit", "ESC or Q once the round is over"),
];

#[derive(Debug)]
pub struct LaunchReport {
    pub artifact: ArtifactEntry,
}

pub fn launch(system: &impl SystemOps, config: &Config, out: &mut impl Write) -> Result<LaunchReport> {
    writeln!(out, "Checking for {} ...", config.artifact.display())?;

    let Some(entry) = system.artifact_listing(&config.artifact) else {
        writeln!(out)?;
        writeln!(out, "ERROR: {} not found!", config.artifact.display())?;
        writeln!(out, "Run 'tankpack package' first to build the executable.")?;
        writeln!(out)?;
        out.flush()?;
        system.wait_for_key(PAUSE_PROMPT);
        return Err(LaunchError::ArtifactMissing(config.artifact.clone()).into());
    };
    assert_invariant(entry.name == config.artifact_name(), LAUNCH_TARGET_IS_FILE, Some("Launcher"));

    writeln!(out, "Found: {}", entry.path.display())?;
    writeln!(out, "Size:  {} bytes  {}", group_digits(entry.size), entry.name)?;
    writeln!(out)?;
    writeln!(out, "Controls:")?;
    for (action, keys) in CONTROLS {
        writeln!(out, "  {:<5} {}", action, keys)?;
    }
    writeln!(out)?;
    writeln!(out, "Launching in {} seconds...", config.launch_delay_secs)?;
    out.flush()?;

    system.sleep(Duration::from_secs(config.launch_delay_secs));

    info!("Starting {:?} as '{}'", config.artifact, config.window_title);
    match system.spawn_detached(&config.artifact, &config.window_title) {
        Ok(()) => {}
        // Deleted between the check and the start.
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Start failed: {}", e);
            return Err(LaunchError::ArtifactMissing(config.artifact.clone()).into());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to start {}", config.artifact.display()));
        }
    }

    writeln!(out)?;
    writeln!(out, "Game launched! Check that a '{}' window appeared.", config.window_title)?;
    writeln!(out)?;
    out.flush()?;
    system.wait_for_key(PAUSE_PROMPT);

    Ok(LaunchReport { artifact: entry })
}

/// `1234567` -> `1,234,567`, as a directory listing prints sizes.
pub fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}
