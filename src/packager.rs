//! # Packager
//!
//! Produces the standalone game executable by driving the external packaging tool.
//!
//! 1. Wipes the build-intermediate, output and bytecode-cache directories (`clean_dirs`).
//! 2. Runs the packaging tool in forced-clean, no-confirm mode against the spec file.
//! 3. Prints the completion banner with the expected artifact path.
//! 4. Waits for the operator.
//!
//! By default the banner says "complete" whatever the tool did, and the run succeeds.
//! With `strict` enabled a failing tool turns into an error once the banner is out.

use std::io::Write;
use std::path::Path;
use anyhow::{Result, bail};
use log::{debug, info, warn};
use crate::config::Config;
use crate::invariant_ppt::{CLEANUP_PRECEDES_PACKAGING, assert_invariant};
use crate::system::{RemoveOutcome, SystemOps, ToolStatus};

pub const PAUSE_PROMPT: &str = "Press Enter to continue . . . ";

const RULE: &str = "═══════════════════════════════════════════════════════════════";

/// What a packaging run did.
#[derive(Debug)]
pub struct PackageReport {
    pub removed: Vec<RemoveOutcome>,
    /// `None` if the tool could not be started at all.
    pub status: Option<ToolStatus>,
}

impl PackageReport {
    pub fn tool_succeeded(&self) -> bool {
        self.status.is_some_and(|s| s.success())
    }
}

/// Runs the whole packaging workflow.
pub fn package(system: &impl SystemOps, config: &Config, out: &mut impl Write) -> Result<PackageReport> {
    writeln!(out, "Packaging {} ...", config.artifact_name())?;
    writeln!(out)?;

    let attempts = clean_dirs(system, config);
    let attempted: Vec<&Path> = attempts.iter().map(|(dir, _)| *dir).collect();
    assert_invariant(attempted == config.cleanup_dirs(), CLEANUP_PRECEDES_PACKAGING, Some("Packager"));

    let mut removed = Vec::new();
    for (_, attempt) in attempts {
        match attempt {
            Ok(outcome) => {
                print_outcome(out, &outcome)?;
                removed.push(outcome);
            }
            // Removal failures are not fatal here.
            Err(e) => warn!("{:#}", e),
        }
    }

    let mut args = config.packager_args.clone();
    args.push(config.spec_file.to_string_lossy().to_string());
    info!("Running {} {}", config.packager, args.join(" "));

    let status = match system.run_packager(&config.packager, &args) {
        Ok(status) => {
            debug!("{} exited with {:?}", config.packager, status.code);
            if !status.success() {
                warn!("{} exited with code {:?}", config.packager, status.code);
            }
            Some(status)
        }
        Err(e) => {
            warn!("{:#}", e);
            None
        }
    };

    writeln!(out)?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "  Build complete!")?;
    writeln!(out, "  Executable: {}", config.artifact.display())?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;
    out.flush()?;

    system.wait_for_key(PAUSE_PROMPT);

    let report = PackageReport { removed, status };
    if config.strict && !report.tool_succeeded() {
        match report.status {
            Some(s) => bail!("{} failed with exit code {:?}", config.packager, s.code),
            None => bail!("{} could not be started", config.packager),
        }
    }
    Ok(report)
}

/// Removes the build artifacts without packaging. Every directory is attempted;
/// the first failure is returned afterwards.
pub fn clean(system: &impl SystemOps, config: &Config, out: &mut impl Write) -> Result<Vec<RemoveOutcome>> {
    let mut removed = Vec::new();
    let mut first_error = None;

    for (_, attempt) in clean_dirs(system, config) {
        match attempt {
            Ok(outcome) => {
                print_outcome(out, &outcome)?;
                removed.push(outcome);
            }
            Err(e) => {
                writeln!(out, "  ✕ {:#}", e)?;
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(removed),
    }
}

/// Attempts removal of every cleanup directory, in order, whether or not it exists.
/// A failure does not stop the remaining attempts.
fn clean_dirs<'a>(system: &impl SystemOps, config: &'a Config) -> Vec<(&'a Path, Result<RemoveOutcome>)> {
    config
        .cleanup_dirs()
        .into_iter()
        .map(|dir| {
            debug!("Removing {:?}", dir);
            (dir, system.remove_dir_all(dir))
        })
        .collect()
}

fn print_outcome(out: &mut impl Write, outcome: &RemoveOutcome) -> Result<()> {
    match outcome {
        RemoveOutcome::Removed { path, entries } => {
            writeln!(out, "  Removed {} ({} entries)", path.display(), entries)?
        }
        RemoveOutcome::Absent { path } => writeln!(out, "  {} not present", path.display())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use proptest::prelude::*;
    use crate::invariant_ppt::contract_test;
    use crate::system::{MockSystem, MockTool};

    fn run(system: &MockSystem, config: &Config) -> (Result<PackageReport>, String) {
        let mut out = Vec::new();
        let result = package(system, config, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    fn banner_count(output: &str) -> usize {
        output.matches("Build complete!").count()
    }

    #[test]
    fn cleans_all_three_dirs_before_the_tool_even_when_absent() {
        let system = MockSystem::new();
        let (result, _) = run(&system, &Config::default());
        assert!(result.is_ok());

        let events = system.events.lock().unwrap().clone();
        assert_eq!(
            &events[..4],
            &["remove build", "remove dist", "remove __pycache__", "packager pyinstaller"]
        );
        contract_test("package", &[CLEANUP_PRECEDES_PACKAGING]);
    }

    #[test]
    fn locked_dir_does_not_stop_cleanup_or_packaging() {
        let system = MockSystem::new();
        system.add_dir("dist");
        system.locked_dirs.lock().unwrap().push(PathBuf::from("build"));

        let (result, output) = run(&system, &Config::default());
        let report = result.unwrap();

        assert_eq!(
            *system.removals.lock().unwrap(),
            vec![PathBuf::from("build"), PathBuf::from("dist"), PathBuf::from("__pycache__")]
        );
        assert_eq!(report.removed.len(), 2);
        assert_eq!(system.packager_calls.lock().unwrap().len(), 1);
        assert_eq!(banner_count(&output), 1);
        contract_test("package with a locked dir", &[CLEANUP_PRECEDES_PACKAGING]);
    }

    #[test]
    fn clean_returns_the_first_failure_after_trying_everything() {
        let system = MockSystem::new();
        system.locked_dirs.lock().unwrap().push(PathBuf::from("dist"));
        let mut out = Vec::new();

        let err = clean(&system, &Config::default(), &mut out).unwrap_err();
        assert!(err.to_string().contains("dist"));
        assert_eq!(system.removals.lock().unwrap().len(), 3);
    }

    #[test]
    fn invokes_the_tool_with_clean_noconfirm_and_the_spec_file() {
        let system = MockSystem::new();
        let (_, _) = run(&system, &Config::default());

        let calls = system.packager_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "pyinstaller");
        assert_eq!(calls[0].1, vec!["--clean", "--noconfirm", "tank_game.spec"]);
    }

    #[test]
    fn previous_artifact_is_gone_before_the_tool_runs() {
        let system = MockSystem::with_file(PathBuf::from("dist").join("TankGame.exe"), 99);
        system.add_dir("build");
        *system.tool.lock().unwrap() = MockTool::Exit(1);

        let (result, output) = run(&system, &Config::default());
        let report = result.unwrap();

        assert!(system.files.lock().unwrap().is_empty());
        assert!(output.contains("Removed build (0 entries)"));
        assert!(output.contains("Removed dist (1 entries)"));
        assert!(output.contains("__pycache__ not present"));
        assert!(!report.tool_succeeded());
    }

    #[test]
    fn banner_names_the_expected_artifact_and_pauses_once() {
        let system = MockSystem::new();
        let (_, output) = run(&system, &Config::default());

        let artifact = Config::default().artifact;
        assert!(output.contains(&format!("Executable: {}", artifact.display())));
        assert_eq!(*system.prompts.lock().unwrap(), vec![PAUSE_PROMPT.to_string()]);
        assert_eq!(system.events.lock().unwrap().last().unwrap(), "pause");
    }

    #[test]
    fn missing_tool_still_reports_completion_by_default() {
        let system = MockSystem::new();
        *system.tool.lock().unwrap() = MockTool::Missing;

        let (result, output) = run(&system, &Config::default());
        let report = result.unwrap();
        assert!(report.status.is_none());
        assert_eq!(banner_count(&output), 1);
    }

    #[test]
    fn strict_mode_surfaces_tool_failure_after_the_banner() {
        let system = MockSystem::new();
        *system.tool.lock().unwrap() = MockTool::Exit(2);
        let config = Config { strict: true, ..Config::default() };

        let (result, output) = run(&system, &config);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("exit code Some(2)"));
        assert_eq!(banner_count(&output), 1);
    }

    #[test]
    fn strict_mode_surfaces_missing_tool() {
        let system = MockSystem::new();
        *system.tool.lock().unwrap() = MockTool::Missing;
        let config = Config { strict: true, ..Config::default() };

        let (result, _) = run(&system, &config);
        assert!(result.unwrap_err().to_string().contains("could not be started"));
    }

    #[test]
    fn strict_mode_passes_when_the_tool_succeeds() {
        let system = MockSystem::new();
        system.tool_outputs.lock().unwrap().push((PathBuf::from("dist").join("TankGame.exe"), 4096));
        let config = Config { strict: true, ..Config::default() };

        let (result, _) = run(&system, &config);
        assert!(result.unwrap().tool_succeeded());
        assert!(system.artifact_listing(&config.artifact).is_some());
    }

    #[test]
    fn clean_reports_each_directory() {
        let system = MockSystem::new();
        system.add_dir("__pycache__");
        let mut out = Vec::new();

        let removed = clean(&system, &Config::default(), &mut out).unwrap();
        let output = String::from_utf8(out).unwrap();

        assert_eq!(removed.len(), 3);
        assert_eq!(removed[2], RemoveOutcome::Removed { path: PathBuf::from("__pycache__"), entries: 0 });
        assert!(output.contains("build not present"));
        assert!(system.packager_calls.lock().unwrap().is_empty());
        assert!(system.prompts.lock().unwrap().is_empty());
        assert_eq!(removed[0].path(), Path::new("build"));
    }

    proptest! {
        #[test]
        fn banner_printed_exactly_once_regardless_of_exit_code(code in any::<i32>()) {
            let system = MockSystem::new();
            *system.tool.lock().unwrap() = MockTool::Exit(code);

            let (result, output) = run(&system, &Config::default());
            prop_assert!(result.is_ok());
            prop_assert_eq!(banner_count(&output), 1);
            prop_assert_eq!(system.removals.lock().unwrap().len(), 3);
        }
    }
}
