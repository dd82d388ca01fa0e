//! Showconfig demo - session lifecycle and captured output.
//!
//! This demo demonstrates:
//! - Starting a session with the builder pattern
//! - Reading the handshake fields
//! - Capturing command output and using the memoized accessors
//!
//! # Running
//!
//! ```sh
//! cargo run --example showconfig -- /path/to/repo
//! ```

use hgwire::Session;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let repo = std::env::args()
        .nth(1)
        .unwrap_or_else(|| ".".to_string());

    // Start the server with an override so output is stable
    let session = Session::builder(repo)
        .config("ui.verbose", "false")
        .start()?;

    println!("encoding:     {}", session.encoding());
    println!("capabilities: {}", session.capabilities().len());
    println!("root:         {}", session.root()?);
    println!("hg version:   {}", session.version()?);

    // The same bytes, two ways: raw capture and the parsed accessor
    let raw = session.output(&["showconfig"])?;
    let parsed = session.configuration()?;
    println!(
        "showconfig:   {} lines, {} parsed keys",
        raw.stdout.lines().count(),
        parsed.len()
    );

    session.close()?;
    Ok(())
}
