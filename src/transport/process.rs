//! Command-server subprocess spawning and supervision.
//!
//! Spawns `hg serve --cmdserver pipe` with all three standard streams
//! redirected to pipes, no shell and no console window. The child's own
//! stderr (distinct from the `e` channel multiplexed over stdout) is
//! drained by a detached thread and forwarded through `tracing`.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use tracing::warn;

use crate::error::{HgwireError, Result};

/// Fallback executable name when no explicit path is configured.
pub const DEFAULT_HG_BINARY: &str = "hg";

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// How to launch the command server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Repository working directory. Must exist and contain `.hg`.
    pub repository: PathBuf,
    /// Path to the `hg` executable, or just `"hg"` to use `PATH`.
    pub hg_binary: PathBuf,
    /// Value for `HGENCODING`, when an override is requested.
    pub encoding: Option<String>,
    /// Configuration overrides, passed as one `--config k1=v1,k2=v2,…`.
    pub config_overrides: Vec<(String, String)>,
}

impl ServerConfig {
    /// Config for a repository at `repository` with all defaults.
    pub fn new(repository: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
            hg_binary: PathBuf::from(DEFAULT_HG_BINARY),
            encoding: None,
            config_overrides: Vec::new(),
        }
    }
}

/// A running command-server subprocess with its pipes.
///
/// Dropping a `ServerProcess` kills the child and reaps it, so the
/// subprocess is released deterministically on every exit path.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr_drain: Option<JoinHandle<()>>,
}

impl ServerProcess {
    /// Validate the repository path and spawn the server.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the repository path is empty
    /// - `InvalidRepository` if it is missing or lacks a `.hg` directory
    /// - `ServerUnavailable` if the executable cannot be started
    pub fn spawn(config: &ServerConfig) -> Result<Self> {
        validate_repository(&config.repository)?;

        let mut cmd = Command::new(&config.hg_binary);
        cmd.arg("serve")
            .arg("--cmdserver")
            .arg("pipe")
            .arg("--cwd")
            .arg(&config.repository)
            .arg("--repository")
            .arg(&config.repository)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if !config.config_overrides.is_empty() {
            let joined = config
                .config_overrides
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(",");
            cmd.arg("--config").arg(joined);
        }

        if let Some(encoding) = &config.encoding {
            cmd.env("HGENCODING", encoding);
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = cmd.spawn().map_err(HgwireError::ServerUnavailable)?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr_drain = child.stderr.take().map(spawn_stderr_drain);

        tracing::debug!(
            repository = %config.repository.display(),
            pid = child.id(),
            "command server started"
        );

        Ok(Self {
            child,
            stdin,
            stdout,
            stderr_drain,
        })
    }

    /// Take ownership of the write end of the duplex pipe.
    ///
    /// Returns `None` if already taken.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    /// Take ownership of the read end of the duplex pipe.
    ///
    /// Returns `None` if already taken.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Process id of the child.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Kill the child and wait for it to exit.
    ///
    /// Idempotent: killing an already-dead child is not an error.
    pub fn shutdown(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
        tracing::debug!(pid = self.child.id(), "command server stopped");
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Check that `path` names an existing Mercurial repository.
fn validate_repository(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(HgwireError::InvalidArgument(
            "repository path must not be empty".to_string(),
        ));
    }
    if !path.is_dir() || !path.join(".hg").is_dir() {
        return Err(HgwireError::InvalidRepository(path.to_path_buf()));
    }
    Ok(())
}

/// Forward the child's stderr lines through `tracing` until EOF.
fn spawn_stderr_drain(stderr: std::process::ChildStderr) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let reader = BufReader::new(stderr);
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    let line = line.trim_end();
                    if !line.is_empty() {
                        warn!(target: "hgwire::server", "{line}");
                    }
                }
                Err(_) => break,
            }
        }
    })
}
