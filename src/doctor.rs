//! # Doctor
//!
//! Read-only report on the packaging workspace: which config is active, whether the spec
//! file is there, which build directories are lying around, and whether an artifact is
//! ready to launch. Nothing is modified.

use std::io::Write;
use std::path::{Path, PathBuf};
use anyhow::Result;
use crate::config::{Config, ConfigSource};
use crate::launcher::group_digits;
use crate::system::{ArtifactEntry, SystemOps};

const RULE: &str = "═══════════════════════════════════════════════════════════════";

#[derive(Debug)]
pub struct DoctorReport {
    pub spec_present: bool,
    /// Cleanup directories that currently exist.
    pub stale_dirs: Vec<PathBuf>,
    pub artifact: Option<ArtifactEntry>,
}

impl DoctorReport {
    pub fn ready_to_launch(&self) -> bool {
        self.artifact.is_some()
    }
}

/// `is_file` and `is_dir` are supplied by the caller, so the report can be produced
/// against a mock system in tests.
pub fn doctor(
    system: &impl SystemOps,
    config: &Config,
    source: &ConfigSource,
    is_file: impl Fn(&Path) -> bool,
    is_dir: impl Fn(&Path) -> bool,
    out: &mut impl Write,
) -> Result<DoctorReport> {
    writeln!(out)?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "                  Packaging Workspace Report")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;
    writeln!(out, "Config: {}", source)?;
    writeln!(out, "Tool:   {} {}", config.packager, config.packager_args.join(" "))?;
    writeln!(out)?;
    writeln!(out, "Effective config:")?;
    for line in serde_json::to_string_pretty(config)?.lines() {
        writeln!(out, "  {}", line)?;
    }
    writeln!(out)?;

    let spec_present = is_file(&config.spec_file);
    if spec_present {
        writeln!(out, "✓ Spec file {} found", config.spec_file.display())?;
    } else {
        writeln!(out, "⚠ Spec file {} is missing; packaging will fail", config.spec_file.display())?;
    }

    let stale_dirs: Vec<PathBuf> = config
        .cleanup_dirs()
        .iter()
        .filter(|d| is_dir(d))
        .map(|d| d.to_path_buf())
        .collect();
    if stale_dirs.is_empty() {
        writeln!(out, "✓ No build directories present")?;
    } else {
        writeln!(out, "  Build directories present (removed by the next 'package'):")?;
        for d in &stale_dirs {
            writeln!(out, "    - {}", d.display())?;
        }
    }

    let artifact = system.artifact_listing(&config.artifact);
    writeln!(out)?;
    writeln!(out, "───────────────────────────────────────────────────────────────")?;
    writeln!(out)?;
    match &artifact {
        Some(entry) => {
            writeln!(out, "✓ {} is ready ({} bytes).", entry.path.display(), group_digits(entry.size))?;
            writeln!(out, "Run 'tankpack launch' to smoke-test it.")?;
        }
        None => {
            writeln!(out, "✕ {} has not been built.", config.artifact.display())?;
            writeln!(out, "Run 'tankpack package' to build it.")?;
        }
    }
    writeln!(out)?;

    Ok(DoctorReport { spec_present, stale_dirs, artifact })
}
