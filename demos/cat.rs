//! Cat demo - streaming command output to a sink.
//!
//! This demo demonstrates:
//! - Running the `run_command` primitive directly
//! - Routing the `o` channel to an arbitrary writer (here: stdout)
//! - Reading the raw exit code
//!
//! # Running
//!
//! ```sh
//! cargo run --example cat -- /path/to/repo FILE [REV]
//! ```

use hgwire::{CommandIo, Session};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let repo = args.next().ok_or("usage: cat REPO FILE [REV]")?;
    let file = args.next().ok_or("usage: cat REPO FILE [REV]")?;
    let rev = args.next().unwrap_or_else(|| "tip".to_string());

    let session = Session::start(repo)?;

    let stdout = std::io::stdout();
    let mut lock = stdout.lock();

    let mut io = CommandIo::new();
    io.output = Some(&mut lock);

    let exit_code = session.run_command(&["cat", "-r", rev.as_str(), file.as_str()], &mut io)?;
    drop(io);

    session.close()?;
    std::process::exit(exit_code);
}
