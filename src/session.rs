//! Session builder and command submission.
//!
//! A [`Session`] owns one command-server subprocess and serializes every
//! command over its duplex pipe. The lifecycle:
//! 1. Validate the repository and spawn `hg serve --cmdserver pipe`
//! 2. Read and parse the hello frame (encoding + capabilities)
//! 3. Accept commands via [`run_command`]/[`output`] until [`close`]
//!
//! One `std::sync::Mutex` guards the subprocess and all three pipes as a
//! unit: at most one command is in flight per session, and consecutive
//! commands observe a strict before/after ordering on the wire. Input
//! providers run inline on the calling thread while the lock is held.
//!
//! [`run_command`]: Session::run_command
//! [`output`]: Session::output
//! [`close`]: Session::close
//!
//! # Example
//!
//! ```ignore
//! use hgwire::Session;
//!
//! let session = Session::builder("/path/to/repo")
//!     .encoding("UTF-8")
//!     .config("ui.username", "hgwire <hgwire@example.com>")
//!     .start()?;
//!
//! let result = session.output(&["status", "-m"])?;
//! println!("{}", result.stdout);
//! session.close()?;
//! ```

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::process::{ChildStdin, ChildStdout};
use std::sync::{Mutex, PoisonError};

use crate::command::{execute, CommandIo, CommandResult};
use crate::error::{HgwireError, Result};
use crate::handshake::ServerHello;
use crate::protocol::FrameReader;
use crate::transport::{ServerConfig, ServerProcess};
use crate::version::HgVersion;

/// Builder for configuring and starting a [`Session`].
pub struct SessionBuilder {
    config: ServerConfig,
}

impl SessionBuilder {
    /// Builder for a session bound to the repository at `repository`.
    pub fn new(repository: impl Into<PathBuf>) -> Self {
        Self {
            config: ServerConfig::new(repository),
        }
    }

    /// Use an explicit `hg` executable instead of the one on `PATH`.
    pub fn hg_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.hg_binary = path.into();
        self
    }

    /// Request an encoding via `HGENCODING`.
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.config.encoding = Some(encoding.into());
        self
    }

    /// Add a configuration override, passed to the server as `--config`.
    pub fn config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .config_overrides
            .push((key.into(), value.into()));
        self
    }

    /// Spawn the server, complete the handshake, and return the session.
    pub fn start(self) -> Result<Session> {
        Session::start_with(self.config)
    }
}

/// The duplex link to a running server: process handle plus both pipe ends.
#[derive(Debug)]
struct ServerLink {
    reader: FrameReader<ChildStdout>,
    writer: ChildStdin,
    // Held for its Drop: killing the child releases the pipes.
    _process: ServerProcess,
}

/// A connection to one Mercurial command server, bound to one repository.
///
/// `Session` is `Sync`: it may be shared across threads, and commands from
/// different threads are serialized by the internal lock. For parallelism,
/// open one session per repository clone.
#[derive(Debug)]
pub struct Session {
    server: Mutex<Option<ServerLink>>,
    encoding: String,
    capabilities: HashSet<String>,
    root: Mutex<Option<String>>,
    configuration: Mutex<Option<HashMap<String, String>>>,
    version: Mutex<Option<HgVersion>>,
}

impl Session {
    /// Builder for a session on the repository at `repository`.
    pub fn builder(repository: impl Into<PathBuf>) -> SessionBuilder {
        SessionBuilder::new(repository)
    }

    /// Start a session with all defaults (`hg` from `PATH`, no encoding
    /// override, no configuration overrides).
    pub fn start(repository: impl Into<PathBuf>) -> Result<Self> {
        SessionBuilder::new(repository).start()
    }

    fn start_with(config: ServerConfig) -> Result<Self> {
        let mut process = ServerProcess::spawn(&config)?;

        let writer = process.take_stdin().ok_or_else(|| {
            HgwireError::ServerUnavailable(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stdin unavailable",
            ))
        })?;
        let stdout = process.take_stdout().ok_or_else(|| {
            HgwireError::ServerUnavailable(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stdout unavailable",
            ))
        })?;
        let mut reader = FrameReader::new(stdout);

        // Exactly one frame precedes command traffic: the hello.
        let frame = reader.read_frame().map_err(|err| {
            HgwireError::HandshakeFailed(format!("no hello frame from server: {err}"))
        })?;
        let hello = ServerHello::from_frame(&frame)?;

        tracing::debug!(
            encoding = %hello.encoding,
            capabilities = hello.capabilities.len(),
            "handshake complete"
        );

        Ok(Self {
            server: Mutex::new(Some(ServerLink {
                reader,
                writer,
                _process: process,
            })),
            encoding: hello.encoding,
            capabilities: hello.capabilities,
            root: Mutex::new(None),
            configuration: Mutex::new(None),
            version: Mutex::new(None),
        })
    }

    /// The encoding announced in the hello frame. Never changes.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// The capability set announced in the hello frame. Never changes.
    pub fn capabilities(&self) -> &HashSet<String> {
        &self.capabilities
    }

    /// Whether the server announced the given capability.
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Run one command and return its exit code.
    ///
    /// `args` is the ordered argv, subcommand name first. Output channels
    /// are routed to the sinks in `io`; `I`/`L` requests are answered by
    /// its providers. Blocks until the result frame arrives.
    ///
    /// Transport and protocol failures poison the session: the subprocess
    /// is torn down and subsequent calls fail with `SessionClosed`.
    pub fn run_command<A: AsRef<[u8]>>(&self, args: &[A], io: &mut CommandIo<'_>) -> Result<i32> {
        if args.is_empty() {
            return Err(HgwireError::InvalidArgument(
                "command argv must not be empty".to_string(),
            ));
        }

        let mut guard = self.server.lock().unwrap_or_else(PoisonError::into_inner);
        let link = guard.as_mut().ok_or(HgwireError::SessionClosed)?;

        match execute(&mut link.reader, &mut link.writer, args, io) {
            Ok(code) => Ok(code),
            Err(err) => {
                // The pipe state is indeterminate mid-command; tear the
                // server down so the next call fails cleanly.
                *guard = None;
                Err(err)
            }
        }
    }

    /// Run one command capturing `o` and `e` into memory.
    ///
    /// The exit code is returned raw inside [`CommandResult`], never
    /// raised: callers interpret command-specific codes (e.g. `commit`
    /// exiting 1 when nothing changed). Captured bytes are decoded as
    /// UTF-8, the command server's canonical wire encoding.
    pub fn output<A: AsRef<[u8]>>(&self, args: &[A]) -> Result<CommandResult> {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let mut io = CommandIo::new();
        io.output = Some(&mut stdout);
        io.error = Some(&mut stderr);
        let exit_code = self.run_command(args, &mut io)?;
        drop(io);

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
        })
    }

    /// The repository root path, trailing whitespace trimmed. Memoized.
    ///
    /// # Errors
    ///
    /// `CommandFailed` if `root` exits non-zero.
    pub fn root(&self) -> Result<String> {
        let mut cache = self.root.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(root) = cache.as_ref() {
            return Ok(root.clone());
        }

        let result = self.checked_output(&["root"])?;
        let root = result.stdout.trim_end().to_string();
        *cache = Some(root.clone());
        Ok(root)
    }

    /// The effective configuration as reported by `showconfig`. Memoized.
    ///
    /// Lines without a `=` delimiter are skipped.
    ///
    /// # Errors
    ///
    /// `CommandFailed` if `showconfig` exits non-zero.
    pub fn configuration(&self) -> Result<HashMap<String, String>> {
        let mut cache = self
            .configuration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(configuration) = cache.as_ref() {
            return Ok(configuration.clone());
        }

        let result = self.checked_output(&["showconfig"])?;
        let configuration = parse_config(&result.stdout);
        *cache = Some(configuration.clone());
        Ok(configuration)
    }

    /// The server's Mercurial version, parsed from the `version` banner.
    /// Memoized.
    ///
    /// # Errors
    ///
    /// `CommandFailed` if `version` exits non-zero; `Parse` if the banner
    /// does not match the expected shape.
    pub fn version(&self) -> Result<HgVersion> {
        let mut cache = self.version.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(version) = cache.as_ref() {
            return Ok(version.clone());
        }

        let result = self.checked_output(&["version"])?;
        let version = HgVersion::parse(&result.stdout)?;
        *cache = Some(version.clone());
        Ok(version)
    }

    /// Terminate the subprocess and release the pipes.
    ///
    /// The session is single-use: after `close`, every call (including a
    /// second `close`) fails with `SessionClosed`.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.server.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.take() {
            Some(link) => {
                drop(link);
                Ok(())
            }
            None => Err(HgwireError::SessionClosed),
        }
    }

    /// Capture a command that is expected to succeed.
    fn checked_output(&self, args: &[&str]) -> Result<CommandResult> {
        let result = self.output(args)?;
        if !result.success() {
            return Err(HgwireError::CommandFailed {
                exit_code: result.exit_code,
                stdout: result.stdout,
                stderr: result.stderr,
            });
        }
        Ok(result)
    }
}

/// Parse `showconfig` output: one `key=value` per line, delimiter-less
/// lines skipped.
fn parse_config(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
