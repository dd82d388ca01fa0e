//! Command loop and channel routing.
//!
//! One logical command is a strictly serial exchange: write the submission,
//! then decode frames and dispatch each one until the result frame arrives.
//! Output channels append to caller-supplied sinks; input channels pull
//! bytes from caller-supplied providers, inline on the calling thread.
//!
//! The loop is generic over `Read`/`Write` so it can be exercised against
//! in-memory transcripts as well as live subprocess pipes.

use std::io::{Read, Write};

use crate::error::{HgwireError, Result};
use crate::protocol::{encode_command, encode_input_chunk, Frame, FrameReader};

/// Callback answering an `I`/`L` request: given the number of bytes the
/// server is willing to receive, return the bytes to send. An empty return
/// signals EOF. Called inline while the session lock is held.
pub type InputProvider<'a> = &'a mut dyn FnMut(usize) -> Vec<u8>;

/// Per-command routing tables: one optional sink per output channel, one
/// optional provider per input channel. Anything left as `None` means
/// "discard" for outputs and "answer EOF" for inputs.
#[derive(Default)]
pub struct CommandIo<'a> {
    /// Sink for the `o` channel.
    pub output: Option<&'a mut dyn Write>,
    /// Sink for the `e` channel.
    pub error: Option<&'a mut dyn Write>,
    /// Sink for the `d` channel.
    pub debug: Option<&'a mut dyn Write>,
    /// Provider for `I` requests.
    pub input: Option<InputProvider<'a>>,
    /// Provider for `L` requests.
    pub line_input: Option<InputProvider<'a>>,
}

impl<'a> CommandIo<'a> {
    /// Routing tables that discard all output and answer EOF to all input.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Result of a captured command: decoded output streams plus exit code.
///
/// Exit code 0 is success. Exit code 1 has command-specific meaning (e.g.
/// `commit` with nothing to commit); it is surfaced raw and interpretation
/// is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Captured `o` channel bytes, decoded as UTF-8.
    pub stdout: String,
    /// Captured `e` channel bytes, decoded as UTF-8.
    pub stderr: String,
    /// Exit code from the result frame.
    pub exit_code: i32,
}

impl CommandResult {
    /// Whether the command exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run one command over an established duplex pipe.
///
/// Writes the submission, then reads and dispatches frames until the
/// result frame yields the exit code. The caller is responsible for
/// serialization; this function assumes it has the pipe to itself.
///
/// # Errors
///
/// - `InvalidArgument` on an empty argv or an oversized provider chunk
/// - `Transport` / `Protocol` from the frame layer; the pipe is in an
///   indeterminate state afterwards and must not be reused
pub(crate) fn execute<R, W, A>(
    reader: &mut FrameReader<R>,
    writer: &mut W,
    args: &[A],
    io: &mut CommandIo<'_>,
) -> Result<i32>
where
    R: Read,
    W: Write,
    A: AsRef<[u8]>,
{
    let submission = encode_command(args)?;
    writer.write_all(&submission)?;
    writer.flush()?;

    loop {
        match reader.read_frame()? {
            Frame::Result(code) => {
                tracing::debug!(exit_code = code, "command finished");
                return Ok(code);
            }
            Frame::Output(payload) => sink_write(&mut io.output, &payload)?,
            Frame::Error(payload) => sink_write(&mut io.error, &payload)?,
            Frame::Debug(payload) => sink_write(&mut io.debug, &payload)?,
            Frame::InputRequest(size) => answer_request(writer, &mut io.input, size)?,
            Frame::LineRequest(size) => answer_request(writer, &mut io.line_input, size)?,
        }
    }
}

/// Append payload bytes to a sink, or discard when none is registered.
fn sink_write(sink: &mut Option<&mut dyn Write>, payload: &[u8]) -> Result<()> {
    if let Some(sink) = sink {
        sink.write_all(payload)?;
    }
    Ok(())
}

/// Answer one `I`/`L` request: pull up to `size` bytes from the provider
/// (EOF when none is registered) and send them length-prefixed.
fn answer_request<W: Write>(
    writer: &mut W,
    provider: &mut Option<InputProvider<'_>>,
    size: usize,
) -> Result<()> {
    let chunk = match provider {
        Some(provider) => provider(size),
        None => Vec::new(),
    };
    if chunk.len() > size {
        return Err(HgwireError::InvalidArgument(format!(
            "input provider returned {} bytes, server requested at most {size}",
            chunk.len()
        )));
    }
    writer.write_all(&encode_input_chunk(&chunk))?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::protocol::FrameHeader;

    use super::*;

    /// Append one wire frame to a server transcript.
    fn push_frame(script: &mut Vec<u8>, channel: u8, payload: &[u8]) {
        script.extend(FrameHeader::new(channel, payload.len() as u32).encode());
        script.extend_from_slice(payload);
    }

    /// Append an `I`/`L` request to a server transcript.
    fn push_request(script: &mut Vec<u8>, channel: u8, size: u32) {
        script.extend(FrameHeader::new(channel, size).encode());
    }

    fn push_result(script: &mut Vec<u8>, code: i32) {
        push_frame(script, b'r', &code.to_be_bytes());
    }

    /// Run `execute` against a scripted server, returning the exit code and
    /// everything the client wrote.
    fn run_scripted<A: AsRef<[u8]>>(
        script: Vec<u8>,
        args: &[A],
        io: &mut CommandIo<'_>,
    ) -> (Result<i32>, Vec<u8>) {
        let mut reader = FrameReader::new(Cursor::new(script));
        let mut written = Vec::new();
        let code = execute(&mut reader, &mut written, args, io);
        (code, written)
    }

    #[test]
    fn test_output_routed_to_sink() {
        let mut script = Vec::new();
        push_frame(&mut script, b'o', b"changeset: 0\n");
        push_frame(&mut script, b'o', b"user: alice\n");
        push_result(&mut script, 0);

        let mut stdout = Vec::new();
        let mut io = CommandIo::new();
        io.output = Some(&mut stdout);

        let (code, _) = run_scripted(script, &["log"], &mut io);
        assert_eq!(code.unwrap(), 0);
        assert_eq!(stdout, b"changeset: 0\nuser: alice\n");
    }

    #[test]
    fn test_channels_routed_independently() {
        let mut script = Vec::new();
        push_frame(&mut script, b'o', b"out");
        push_frame(&mut script, b'e', b"err");
        push_frame(&mut script, b'd', b"dbg");
        push_result(&mut script, 0);

        let (mut stdout, mut stderr, mut debug) = (Vec::new(), Vec::new(), Vec::new());
        let mut io = CommandIo::new();
        io.output = Some(&mut stdout);
        io.error = Some(&mut stderr);
        io.debug = Some(&mut debug);

        run_scripted(script, &["status"], &mut io).0.unwrap();
        assert_eq!(stdout, b"out");
        assert_eq!(stderr, b"err");
        assert_eq!(debug, b"dbg");
    }

    #[test]
    fn test_unregistered_channels_discarded() {
        let mut script = Vec::new();
        push_frame(&mut script, b'o', b"dropped");
        push_frame(&mut script, b'e', b"also dropped");
        push_result(&mut script, 0);

        let (code, _) = run_scripted(script, &["status"], &mut CommandIo::new());
        assert_eq!(code.unwrap(), 0);
    }

    #[test]
    fn test_sink_receives_bytes_in_receipt_order() {
        let mut script = Vec::new();
        for chunk in [&b"a"[..], b"b", b"c", b"d"] {
            push_frame(&mut script, b'o', chunk);
        }
        push_result(&mut script, 0);

        let mut stdout = Vec::new();
        let mut io = CommandIo::new();
        io.output = Some(&mut stdout);
        run_scripted(script, &["cat", "f"], &mut io).0.unwrap();
        assert_eq!(stdout, b"abcd");
    }

    #[test]
    fn test_exit_code_surfaced_raw() {
        let mut script = Vec::new();
        push_frame(&mut script, b'e', b"nothing changed\n");
        push_result(&mut script, 1);

        let (code, _) = run_scripted(script, &["commit", "-m", "x"], &mut CommandIo::new());
        assert_eq!(code.unwrap(), 1);
    }

    #[test]
    fn test_submission_layout_written_first() {
        let mut script = Vec::new();
        push_result(&mut script, 0);

        let (_, written) = run_scripted(script, &["root"], &mut CommandIo::new());
        let expected = encode_command(&["root"]).unwrap();
        assert_eq!(written, expected);
    }

    #[test]
    fn test_input_request_answered_by_provider() {
        let mut script = Vec::new();
        push_request(&mut script, b'I', 4096);
        push_result(&mut script, 0);

        let mut served = false;
        let mut provider = |size: usize| {
            assert_eq!(size, 4096);
            if served {
                Vec::new()
            } else {
                served = true;
                b"patch data".to_vec()
            }
        };
        let mut io = CommandIo::new();
        io.input = Some(&mut provider);

        let (code, written) = run_scripted(script, &["import", "-"], &mut io);
        assert_eq!(code.unwrap(), 0);

        let submission = encode_command(&["import", "-"]).unwrap();
        let mut expected = submission;
        expected.extend(encode_input_chunk(b"patch data"));
        assert_eq!(written, expected);
    }

    #[test]
    fn test_input_request_without_provider_answers_eof() {
        let mut script = Vec::new();
        push_request(&mut script, b'L', 80);
        push_result(&mut script, 0);

        let (code, written) = run_scripted(script, &["import", "-"], &mut CommandIo::new());
        assert_eq!(code.unwrap(), 0);

        let submission = encode_command(&["import", "-"]).unwrap();
        let mut expected = submission;
        expected.extend(encode_input_chunk(b""));
        assert_eq!(written, expected);
    }

    #[test]
    fn test_oversized_provider_chunk_rejected() {
        let mut script = Vec::new();
        push_request(&mut script, b'I', 4);
        push_result(&mut script, 0);

        let mut provider = |_size: usize| b"way too many bytes".to_vec();
        let mut io = CommandIo::new();
        io.input = Some(&mut provider);

        let (code, _) = run_scripted(script, &["import", "-"], &mut io);
        assert!(matches!(code, Err(HgwireError::InvalidArgument(_))));
    }

    #[test]
    fn test_line_requests_use_line_provider() {
        let mut script = Vec::new();
        push_request(&mut script, b'L', 80);
        push_request(&mut script, b'L', 80);
        push_result(&mut script, 0);

        let mut lines = vec![b"y\n".to_vec(), b"n\n".to_vec()];
        let mut provider = move |_size: usize| {
            if lines.is_empty() {
                Vec::new()
            } else {
                lines.remove(0)
            }
        };
        let mut io = CommandIo::new();
        io.line_input = Some(&mut provider);

        let (code, written) = run_scripted(script, &["resolve"], &mut io);
        assert_eq!(code.unwrap(), 0);

        let mut expected = encode_command(&["resolve"]).unwrap();
        expected.extend(encode_input_chunk(b"y\n"));
        expected.extend(encode_input_chunk(b"n\n"));
        assert_eq!(written, expected);
    }

    #[test]
    fn test_empty_argv_rejected_before_any_write() {
        let args: [&str; 0] = [];
        let (code, written) = run_scripted(Vec::new(), &args, &mut CommandIo::new());
        assert!(matches!(code, Err(HgwireError::InvalidArgument(_))));
        assert!(written.is_empty());
    }

    #[test]
    fn test_eof_before_result_is_transport_error() {
        let mut script = Vec::new();
        push_frame(&mut script, b'o', b"partial");
        // No result frame; the server "died".

        let (code, _) = run_scripted(script, &["log"], &mut CommandIo::new());
        assert!(matches!(code, Err(HgwireError::Transport(_))));
    }

    #[test]
    fn test_command_result_success() {
        let ok = CommandResult {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
        };
        assert!(ok.success());

        let benign = CommandResult {
            exit_code: 1,
            ..ok.clone()
        };
        assert!(!benign.success());
    }
}
