//! # Configuration
//!
//! Every path and command the packager and launcher touch lives here. The defaults
//! reproduce the classic layout of a PyInstaller project:
//!
//! - `tank_game.spec` is the configuration descriptor handed to the packaging tool.
//! - `build/`, `dist/` and `__pycache__/` are wiped before each packaging run.
//! - `dist/TankGame.exe` is the artifact the launcher smoke-tests.
//!
//! A JSON file can override any subset of these. Missing fields keep their defaults.

use std::fmt;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, bail};
use log::debug;
use serde::{Deserialize, Serialize};

/// Name of the project-local config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "tankpack.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration descriptor passed as the last argument to the packaging tool.
    pub spec_file: PathBuf,
    /// Build-intermediate directory.
    pub build_dir: PathBuf,
    /// Output directory containing the artifact.
    pub dist_dir: PathBuf,
    /// Bytecode-cache directory.
    pub cache_dir: PathBuf,
    /// The packaged executable.
    pub artifact: PathBuf,
    /// Packaging tool program name or path.
    pub packager: String,
    /// Flags forcing a clean rebuild without confirmation prompts.
    pub packager_args: Vec<String>,
    /// Title of the window the game is started under.
    pub window_title: String,
    /// Pause before launching, so the operator can read the report.
    pub launch_delay_secs: u64,
    /// Propagate the packaging tool's failure instead of always reporting completion.
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spec_file: PathBuf::from("tank_game.spec"),
            build_dir: PathBuf::from("build"),
            dist_dir: PathBuf::from("dist"),
            cache_dir: PathBuf::from("__pycache__"),
            artifact: PathBuf::from("dist").join("TankGame.exe"),
            packager: "pyinstaller".to_string(),
            packager_args: vec!["--clean".to_string(), "--noconfirm".to_string()],
            window_title: "Tank Game".to_string(),
            launch_delay_secs: 3,
            strict: false,
        }
    }
}

/// Where the active configuration came from. Reported by `doctor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Local(PathBuf),
    User(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Explicit(p) => write!(f, "{} (--config)", p.display()),
            ConfigSource::Local(p) => write!(f, "{} (working directory)", p.display()),
            ConfigSource::User(p) => write!(f, "{} (user config)", p.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

impl Config {
    /// Resolves the configuration.
    ///
    /// Order: the explicit `--config` file (which must exist), then `tankpack.json` in
    /// the working directory, then `config.json` in the per-user config directory,
    /// then the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<(Config, ConfigSource)> {
        Self::load_from(explicit, Path::new("."), user_config_path())
    }

    /// `load` with the working directory and user config file supplied by the caller.
    pub fn load_from(explicit: Option<&Path>, cwd: &Path, user: Option<PathBuf>) -> Result<(Config, ConfigSource)> {
        if let Some(path) = explicit {
            if !path.is_file() {
                bail!("Config file {:?} does not exist", path);
            }
            let config = Self::from_file(path)?;
            return Ok((config, ConfigSource::Explicit(path.to_path_buf())));
        }

        let local = cwd.join(LOCAL_CONFIG_FILE);
        if local.is_file() {
            let config = Self::from_file(&local)?;
            return Ok((config, ConfigSource::Local(local)));
        }

        if let Some(user) = user.filter(|p| p.is_file()) {
            let config = Self::from_file(&user)?;
            return Ok((config, ConfigSource::User(user)));
        }

        debug!("No config file found, using defaults");
        Ok((Config::default(), ConfigSource::Defaults))
    }

    /// Parses a JSON config file.
    pub fn from_file(path: &Path) -> Result<Config> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed config file {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file {:?}", path))?;
        debug!("Loaded config from {:?}: {:?}", path, config);
        Ok(config)
    }

    /// Rejects values the launcher cannot pass through safely.
    pub fn validate(&self) -> Result<()> {
        // `start` parses the title as a quoted argument.
        if self.window_title.contains('"') {
            bail!("window_title must not contain '\"': {}", self.window_title);
        }
        if self.artifact.file_name().is_none() {
            bail!("artifact {:?} does not name a file", self.artifact);
        }
        Ok(())
    }

    /// The artifact's file name, used to filter the directory listing.
    pub fn artifact_name(&self) -> String {
        self.artifact
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.artifact.to_string_lossy().to_string())
    }

    /// Directories removed before packaging, in removal order.
    pub fn cleanup_dirs(&self) -> [&Path; 3] {
        [self.build_dir.as_path(), self.dist_dir.as_path(), self.cache_dir.as_path()]
    }
}

/// `<config dir>/tankpack/config.json`, if the platform has a config directory.
fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "tankpack")
        .map(|dirs| dirs.config_dir().join("config.json"))
}
