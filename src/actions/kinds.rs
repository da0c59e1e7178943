//! Configurable action kinds
//!
//! Actions are data (`ActionSpec`, loaded from `[actions.<id>]` tables) that
//! the registry turns into handlers once, before a run starts.

use super::process::run_command;
use super::{ActionHandler, EffectReport};
use crate::errors::{Result, TuneError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-step bound when a command step declares none
pub const DEFAULT_STEP_TIMEOUT_SEC: u64 = 12;

/// One external command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStep {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_step_timeout")]
    pub timeout_sec: u64,
}

fn default_step_timeout() -> u64 {
    DEFAULT_STEP_TIMEOUT_SEC
}

impl CommandStep {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout_sec: DEFAULT_STEP_TIMEOUT_SEC,
        }
    }

    fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// How a list of command steps decides success
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandMode {
    /// Run every step; fail if any step failed
    #[default]
    All,
    /// Stop at the first step that succeeds; fail if none did
    FirstSuccess,
}

/// Action definition as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionSpec {
    /// Delete files below each path, counting freed bytes
    Purge {
        paths: Vec<String>,
        /// Only delete files whose name ends with this suffix
        #[serde(default)]
        suffix: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        timeout_sec: Option<u64>,
    },
    /// Run external commands
    Commands {
        #[serde(default)]
        steps: Vec<CommandStep>,
        #[serde(default)]
        mode: CommandMode,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        timeout_sec: Option<u64>,
    },
    /// Succeeds without side effects
    Noop {
        #[serde(default)]
        description: Option<String>,
    },
}

impl ActionSpec {
    pub fn purge(paths: &[&str], description: &str) -> Self {
        ActionSpec::Purge {
            paths: paths.iter().map(|p| p.to_string()).collect(),
            suffix: None,
            description: Some(description.to_string()),
            timeout_sec: None,
        }
    }

    pub fn commands(steps: Vec<CommandStep>, mode: CommandMode, description: &str) -> Self {
        ActionSpec::Commands {
            steps,
            mode,
            description: Some(description.to_string()),
            timeout_sec: None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            ActionSpec::Purge { description, .. }
            | ActionSpec::Commands { description, .. }
            | ActionSpec::Noop { description } => description.as_deref(),
        }
    }

    /// Bound for the whole action. Command lists default to the sum of
    /// their step bounds so a full run of steps always fits.
    pub fn timeout(&self, default: Duration) -> Duration {
        match self {
            ActionSpec::Purge { timeout_sec, .. } => {
                timeout_sec.map(Duration::from_secs).unwrap_or(default)
            }
            ActionSpec::Commands {
                timeout_sec, steps, ..
            } => match timeout_sec {
                Some(secs) => Duration::from_secs(*secs),
                None if steps.is_empty() => default,
                None => Duration::from_secs(steps.iter().map(|s| s.timeout_sec).sum::<u64>() + 1),
            },
            ActionSpec::Noop { .. } => default,
        }
    }

    /// Build the runtime handler for this definition
    pub fn into_handler(self) -> Box<dyn ActionHandler> {
        match self {
            ActionSpec::Purge {
                paths,
                suffix,
                description,
                ..
            } => Box::new(PurgeAction {
                paths: paths.iter().map(|p| expand_path(p)).collect(),
                suffix,
                description,
            }),
            ActionSpec::Commands {
                steps,
                mode,
                description,
                ..
            } => Box::new(CommandAction {
                steps,
                mode,
                description,
            }),
            ActionSpec::Noop { description } => Box::new(NoopAction { description }),
        }
    }
}

/// Expand `~/`, `{temp}`, `{cache}` and `{local_data}` prefixes
pub fn expand_path(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if let Some(rest) = raw.strip_prefix("{temp}") {
        return join_rest(std::env::temp_dir(), rest);
    }
    if let Some(rest) = raw.strip_prefix("{cache}") {
        if let Some(cache) = dirs::cache_dir() {
            return join_rest(cache, rest);
        }
    }
    if let Some(rest) = raw.strip_prefix("{local_data}") {
        if let Some(local) = dirs::data_local_dir() {
            return join_rest(local, rest);
        }
    }
    PathBuf::from(raw)
}

fn join_rest(base: PathBuf, rest: &str) -> PathBuf {
    let rest = rest.trim_start_matches(['/', '\\']);
    if rest.is_empty() {
        base
    } else {
        base.join(rest)
    }
}

/// Delete files below `root` bottom-up, returning freed bytes.
///
/// Best effort: unreadable entries and locked files are skipped, emptied
/// sub-directories are removed, `root` itself is kept. Only regular files
/// are deleted; sockets, pipes and symlinks are left alone.
pub fn purge_dir(root: &Path, suffix: Option<&str>) -> u64 {
    let Ok(entries) = fs::read_dir(root) else {
        return 0;
    };

    let mut freed = 0u64;
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            freed += purge_dir(&path, suffix);
            let _ = fs::remove_dir(&path);
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let matches = suffix
            .map(|s| entry.file_name().to_string_lossy().ends_with(s))
            .unwrap_or(true);
        if !matches {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if fs::remove_file(&path).is_ok() {
            freed += size;
        }
    }
    freed
}

struct PurgeAction {
    paths: Vec<PathBuf>,
    suffix: Option<String>,
    description: Option<String>,
}

#[async_trait]
impl ActionHandler for PurgeAction {
    async fn run(&self) -> Result<EffectReport> {
        if self.paths.is_empty() {
            return Ok(EffectReport::new()
                .with_bytes(0)
                .with_detail("Nothing configured for this platform"));
        }

        let paths = self.paths.clone();
        let suffix = self.suffix.clone();

        let (freed, visited) = tokio::task::spawn_blocking(move || {
            let mut freed = 0u64;
            let mut visited = 0usize;
            for path in paths.iter().filter(|p| p.is_dir()) {
                visited += 1;
                freed += purge_dir(path, suffix.as_deref());
            }
            (freed, visited)
        })
        .await?;

        let detail = self.description.clone().unwrap_or_else(|| {
            format!(
                "Purged {} MB from {} location(s)",
                freed / (1024 * 1024),
                visited
            )
        });
        Ok(EffectReport::new().with_bytes(freed).with_detail(detail))
    }
}

struct CommandAction {
    steps: Vec<CommandStep>,
    mode: CommandMode,
    description: Option<String>,
}

impl CommandAction {
    async fn run_step(step: &CommandStep) -> std::result::Result<(), String> {
        match run_command(
            &step.program,
            &step.args,
            Duration::from_secs(step.timeout_sec),
        )
        .await
        {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => Err(format!("'{}' exited with code {}", step.display(), output.exit_code)),
            Err(e) => Err(format!("'{}': {}", step.display(), e)),
        }
    }
}

#[async_trait]
impl ActionHandler for CommandAction {
    async fn run(&self) -> Result<EffectReport> {
        if self.steps.is_empty() {
            return Ok(EffectReport::new().with_detail("Nothing configured for this platform"));
        }

        let mut failures = Vec::new();
        for step in &self.steps {
            match Self::run_step(step).await {
                Ok(()) => {
                    tracing::debug!(command = %step.display(), "Command step succeeded");
                    if self.mode == CommandMode::FirstSuccess {
                        return Ok(self.report());
                    }
                }
                Err(reason) => {
                    tracing::debug!("Command step failed: {}", reason);
                    failures.push(reason);
                }
            }
        }

        if failures.is_empty() {
            Ok(self.report())
        } else {
            Err(TuneError::Generic(failures.join("; ")))
        }
    }
}

impl CommandAction {
    fn report(&self) -> EffectReport {
        match &self.description {
            Some(detail) => EffectReport::new().with_detail(detail.clone()),
            None => EffectReport::new(),
        }
    }
}

struct NoopAction {
    description: Option<String>,
}

#[async_trait]
impl ActionHandler for NoopAction {
    async fn run(&self) -> Result<EffectReport> {
        let detail = self.description.clone().unwrap_or_else(|| "No-op".to_string());
        Ok(EffectReport::new().with_detail(detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_purge_dir_counts_bytes_and_keeps_root() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(temp.path().join("a.tmp"), vec![0u8; 100]).unwrap();
        fs::write(nested.join("b.tmp"), vec![0u8; 50]).unwrap();

        let freed = purge_dir(temp.path(), None);
        assert_eq!(freed, 150);
        assert!(temp.path().exists());
        assert!(!nested.exists());
    }

    #[test]
    fn test_purge_dir_suffix_filter() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("crash.dmp"), vec![0u8; 64]).unwrap();
        fs::write(temp.path().join("keep.txt"), vec![0u8; 10]).unwrap();

        let freed = purge_dir(temp.path(), Some(".dmp"));
        assert_eq!(freed, 64);
        assert!(temp.path().join("keep.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_purge_dir_skips_sockets_and_symlinks() {
        use std::os::unix::net::UnixListener;

        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("owned.lock"), b"pid").unwrap();

        let socket = temp.path().join("app.sock");
        let _listener = UnixListener::bind(&socket).unwrap();
        let link = temp.path().join("linked");
        std::os::unix::fs::symlink(outside.path(), &link).unwrap();
        fs::write(temp.path().join("stale.tmp"), vec![0u8; 32]).unwrap();

        let freed = purge_dir(temp.path(), None);
        assert_eq!(freed, 32);
        assert!(socket.exists());
        assert!(fs::symlink_metadata(&link).is_ok());
        assert!(outside.path().join("owned.lock").exists());
        assert!(!temp.path().join("stale.tmp").exists());
    }

    #[tokio::test]
    async fn test_purge_without_paths_is_nothing_configured() {
        let spec = ActionSpec::Purge {
            paths: Vec::new(),
            suffix: None,
            description: Some("Removing temp residue".to_string()),
            timeout_sec: None,
        };
        let report = spec.into_handler().run().await.unwrap();
        assert_eq!(report.bytes_freed, Some(0));
        assert_eq!(report.detail.as_deref(), Some("Nothing configured for this platform"));
    }

    #[test]
    fn test_purge_missing_dir_is_zero() {
        assert_eq!(purge_dir(Path::new("/definitely/not/here/tunekit"), None), 0);
    }

    #[tokio::test]
    async fn test_purge_handler_reports_bytes() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("x.log"), vec![0u8; 2048]).unwrap();

        let spec = ActionSpec::Purge {
            paths: vec![temp.path().to_string_lossy().to_string()],
            suffix: None,
            description: None,
            timeout_sec: None,
        };
        let report = spec.into_handler().run().await.unwrap();
        assert_eq!(report.bytes_freed, Some(2048));
        assert!(report.detail.unwrap().contains("1 location"));
    }

    #[tokio::test]
    async fn test_empty_commands_succeed() {
        let spec = ActionSpec::commands(vec![], CommandMode::All, "Flush DNS");
        let report = spec.into_handler().run().await.unwrap();
        assert!(report.detail.unwrap().contains("Nothing configured"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_all_mode_fails_if_any_step_fails() {
        let spec = ActionSpec::commands(
            vec![CommandStep::new("true", &[]), CommandStep::new("false", &[])],
            CommandMode::All,
            "two steps",
        );
        assert!(spec.into_handler().run().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_first_success_falls_back() {
        let spec = ActionSpec::commands(
            vec![CommandStep::new("false", &[]), CommandStep::new("true", &[])],
            CommandMode::FirstSuccess,
            "fallback",
        );
        let report = spec.into_handler().run().await.unwrap();
        assert_eq!(report.detail.as_deref(), Some("fallback"));
    }

    #[test]
    fn test_timeout_defaults() {
        let default = Duration::from_secs(30);
        let steps = vec![CommandStep::new("a", &[]), CommandStep::new("b", &[])];
        let spec = ActionSpec::commands(steps, CommandMode::All, "x");
        assert_eq!(spec.timeout(default), Duration::from_secs(25));

        let noop = ActionSpec::Noop { description: None };
        assert_eq!(noop.timeout(default), default);
    }

    #[test]
    fn test_expand_temp_token() {
        assert_eq!(expand_path("{temp}"), std::env::temp_dir());
        assert_eq!(expand_path("{temp}/sub"), std::env::temp_dir().join("sub"));
        assert_eq!(expand_path("/var/log"), PathBuf::from("/var/log"));
        if let Some(local) = dirs::data_local_dir() {
            assert_eq!(expand_path("{local_data}/CrashDumps"), local.join("CrashDumps"));
        }
    }

    #[test]
    fn test_spec_from_toml() {
        let spec: ActionSpec = toml::from_str(
            r#"
kind = "commands"
mode = "first_success"
steps = [
  { program = "powercfg", args = ["-setactive", "ultimate"] },
  { program = "powercfg", args = ["-setactive", "high"], timeout_sec = 5 },
]
"#,
        )
        .unwrap();
        match spec {
            ActionSpec::Commands { steps, mode, .. } => {
                assert_eq!(mode, CommandMode::FirstSuccess);
                assert_eq!(steps[0].timeout_sec, DEFAULT_STEP_TIMEOUT_SEC);
                assert_eq!(steps[1].timeout_sec, 5);
            }
            other => panic!("unexpected spec: {:?}", other),
        }
    }
}
