//! # hgwire
//!
//! Rust client for the Mercurial command server.
//!
//! This crate keeps a single `hg serve --cmdserver pipe` subprocess alive
//! and speaks its framed pipe protocol, so repeated operations skip the
//! interpreter startup cost of one `hg` invocation per command.
//!
//! ## Architecture
//!
//! - **Process supervisor** (`transport`): spawn, pipe wiring, teardown
//! - **Frame codec** (`protocol`): 5-byte channel headers, big-endian
//!   lengths, `runcommand` submissions, input replies
//! - **Command loop + router** (`command`): one serial command at a time,
//!   frames dispatched to caller sinks and providers
//! - **Session** (`session`): handshake, the `run_command` primitive,
//!   capture convenience, memoized accessors
//!
//! The protocol is strictly serial per server: one command in flight,
//! frames delivered in order, a result frame ending each command. Within a
//! [`Session`] that discipline is enforced by an internal lock; run
//! multiple sessions for parallelism.
//!
//! ## Example
//!
//! ```ignore
//! use hgwire::Session;
//!
//! fn main() -> hgwire::Result<()> {
//!     let session = Session::start("/path/to/repo")?;
//!
//!     let status = session.output(&["status", "-m"])?;
//!     if status.success() {
//!         print!("{}", status.stdout);
//!     }
//!
//!     println!("root: {}", session.root()?);
//!     println!("hg version: {}", session.version()?);
//!     session.close()
//! }
//! ```

pub mod error;
pub mod protocol;
pub mod transport;

mod command;
mod handshake;
mod session;
mod version;

pub use command::{CommandIo, CommandResult, InputProvider};
pub use error::{HgwireError, Result};
pub use handshake::ServerHello;
pub use session::{Session, SessionBuilder};
pub use version::HgVersion;
