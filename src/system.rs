use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;
use anyhow::{Context, Result};
use log::{debug, trace};
use walkdir::WalkDir;

/// What happened to a directory we were asked to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The directory existed and was deleted together with `entries` children.
    Removed { path: PathBuf, entries: usize },
    /// Nothing was there.
    Absent { path: PathBuf },
}

impl RemoveOutcome {
    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        match self {
            RemoveOutcome::Removed { path, .. } | RemoveOutcome::Absent { path } => path,
        }
    }
}

/// One line of a directory listing, filtered down to the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

/// Exit status of the packaging tool. `code` is `None` when it was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStatus {
    pub code: Option<i32>,
}

impl ToolStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Abstraction for every side effect the packager and launcher perform.
/// This lets the operator-facing workflows run against a mock in tests.
pub trait SystemOps {
    /// Recursively remove a directory. A missing directory is not an error.
    fn remove_dir_all(&self, path: &Path) -> Result<RemoveOutcome>;

    /// List the artifact's parent directory and return the entry matching its file name.
    /// Only regular files count.
    fn artifact_listing(&self, path: &Path) -> Option<ArtifactEntry>;

    /// Run the packaging tool to completion with inherited stdio.
    /// Failing to start it is an error; a non-zero exit is just a status.
    fn run_packager(&self, program: &str, args: &[String]) -> Result<ToolStatus>;

    /// Start `path` as a detached background process under `title`. Never waits.
    fn spawn_detached(&self, path: &Path, title: &str) -> io::Result<()>;

    fn sleep(&self, duration: Duration);

    /// Block until the operator presses Enter.
    fn wait_for_key(&self, prompt: &str);
}

/// The real host (production).
#[derive(Debug, Clone, Copy)]
pub struct HostSystem {
    /// When false, key-press prompts return immediately.
    pub interactive: bool,
}

impl SystemOps for HostSystem {
    fn remove_dir_all(&self, path: &Path) -> Result<RemoveOutcome> {
        if !path.is_dir() {
            debug!("{:?} not present, nothing to remove", path);
            return Ok(RemoveOutcome::Absent { path: path.to_path_buf() });
        }

        let entries = WalkDir::new(path)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .count();

        std::fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove {:?}", path))?;
        Ok(RemoveOutcome::Removed { path: path.to_path_buf(), entries })
    }

    fn artifact_listing(&self, path: &Path) -> Option<ArtifactEntry> {
        let name = path.file_name()?.to_string_lossy().to_string();
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        trace!("Listing {:?} for {}", parent, name);

        WalkDir::new(parent)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .find(|e| e.file_name().to_string_lossy() == name)
            .and_then(|e| e.metadata().ok())
            .map(|meta| ArtifactEntry {
                path: path.to_path_buf(),
                name,
                size: meta.len(),
            })
    }

    fn run_packager(&self, program: &str, args: &[String]) -> Result<ToolStatus> {
        let status = Command::new(program)
            .args(args)
            .status()
            .with_context(|| format!("Failed to execute {}", program))?;
        Ok(ToolStatus { code: status.code() })
    }

    fn spawn_detached(&self, path: &Path, title: &str) -> io::Result<()> {
        let program = launch_path(path);

        // The child handle is dropped straight away. Dropping does not kill it.
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            use windows::Win32::System::Threading::CREATE_NO_WINDOW;

            // `start` takes the first quoted argument as the window title, so both
            // are passed pre-quoted.
            Command::new("cmd")
                .arg("/C")
                .arg("start")
                .raw_arg(format!("\"{}\"", title.replace('"', "")))
                .raw_arg(format!("\"{}\"", program.display()))
                .creation_flags(CREATE_NO_WINDOW.0)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;

            debug!("Window title {:?} is advisory on this platform", title);
            Command::new(&program)
                .process_group(0)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()?;
        }

        #[cfg(not(any(windows, unix)))]
        {
            debug!("Window title {:?} is advisory on this platform", title);
            Command::new(&program)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()?;
        }

        Ok(())
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn wait_for_key(&self, prompt: &str) {
        if !self.interactive {
            return;
        }
        print!("{}", prompt);
        let _ = io::stdout().flush();
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
    }
}

/// The path handed to the OS when starting the artifact.
///
/// A bare file name gets a `./` prefix, otherwise the OS would search `PATH` for it
/// instead of starting the file the listing found in the working directory.
pub fn launch_path(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => path.to_path_buf(),
        _ => Path::new(".").join(path),
    }
}

/// What the mock packaging tool does when invoked.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockTool {
    Exit(i32),
    /// Program not on PATH.
    Missing,
}

impl Default for MockTool {
    fn default() -> Self {
        MockTool::Exit(0)
    }
}

/// A Mock System for Testing.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct MockSystem {
    /// Regular files and their sizes.
    pub files: Mutex<HashMap<PathBuf, u64>>,
    pub dirs: Mutex<Vec<PathBuf>>,
    pub tool: Mutex<MockTool>,
    /// Files the tool "produces" when it runs, like the real packager writing dist/.
    pub tool_outputs: Mutex<Vec<(PathBuf, u64)>>,
    pub spawn_error: Mutex<Option<io::ErrorKind>>,
    /// Directories whose removal fails, like a locked `dist/` on Windows.
    pub locked_dirs: Mutex<Vec<PathBuf>>,

    pub removals: Mutex<Vec<PathBuf>>,
    pub packager_calls: Mutex<Vec<(String, Vec<String>)>>,
    pub spawns: Mutex<Vec<(PathBuf, String)>>,
    pub sleeps: Mutex<Vec<Duration>>,
    pub prompts: Mutex<Vec<String>>,
    /// Every call in order, as a short tag.
    pub events: Mutex<Vec<String>>,
}

impl MockSystem {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn with_file(path: impl Into<PathBuf>, size: u64) -> Self {
        let system = Self::default();
        system.add_file(path, size);
        system
    }

    #[allow(dead_code)]
    pub fn add_file(&self, path: impl Into<PathBuf>, size: u64) {
        self.files.lock().unwrap().insert(path.into(), size);
    }

    #[allow(dead_code)]
    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        self.dirs.lock().unwrap().push(path.into());
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl SystemOps for MockSystem {
    fn remove_dir_all(&self, path: &Path) -> Result<RemoveOutcome> {
        self.record(format!("remove {}", path.display()));
        self.removals.lock().unwrap().push(path.to_path_buf());
        if self.locked_dirs.lock().unwrap().iter().any(|d| d == path) {
            anyhow::bail!("Failed to remove {:?}", path);
        }

        let mut dirs = self.dirs.lock().unwrap();
        let mut files = self.files.lock().unwrap();
        let before = files.len();
        files.retain(|f, _| !f.starts_with(path));
        let entries = before - files.len();

        let existed = dirs.iter().any(|d| d == path) || entries > 0;
        dirs.retain(|d| !d.starts_with(path));

        if existed {
            Ok(RemoveOutcome::Removed { path: path.to_path_buf(), entries })
        } else {
            Ok(RemoveOutcome::Absent { path: path.to_path_buf() })
        }
    }

    fn artifact_listing(&self, path: &Path) -> Option<ArtifactEntry> {
        self.record(format!("list {}", path.display()));
        let files = self.files.lock().unwrap();
        files.get(path).map(|&size| ArtifactEntry {
            path: path.to_path_buf(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            size,
        })
    }

    fn run_packager(&self, program: &str, args: &[String]) -> Result<ToolStatus> {
        self.record(format!("packager {}", program));
        self.packager_calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));

        match *self.tool.lock().unwrap() {
            MockTool::Missing => anyhow::bail!("Failed to execute {}", program),
            MockTool::Exit(code) => {
                if code == 0 {
                    let outputs = self.tool_outputs.lock().unwrap();
                    let mut files = self.files.lock().unwrap();
                    for (p, size) in outputs.iter() {
                        files.insert(p.clone(), *size);
                    }
                }
                Ok(ToolStatus { code: Some(code) })
            }
        }
    }

    fn spawn_detached(&self, path: &Path, title: &str) -> io::Result<()> {
        self.record(format!("spawn {}", path.display()));
        if let Some(kind) = *self.spawn_error.lock().unwrap() {
            return Err(io::Error::from(kind));
        }
        self.spawns
            .lock()
            .unwrap()
            .push((path.to_path_buf(), title.to_string()));
        Ok(())
    }

    fn sleep(&self, duration: Duration) {
        self.record(format!("sleep {}ms", duration.as_millis()));
        self.sleeps.lock().unwrap().push(duration);
    }

    fn wait_for_key(&self, prompt: &str) {
        self.record("pause".to_string());
        self.prompts.lock().unwrap().push(prompt.to_string());
    }
}
