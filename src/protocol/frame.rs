//! Typed frames and the blocking frame reader.
//!
//! A [`Frame`] is one decoded unit of the server→client protocol. The set
//! of variants is closed: data channels carry payload bytes (zero-copy via
//! `bytes::Bytes`), the result channel carries a signed exit code, and the
//! input channels carry only the number of bytes the server is requesting.
//!
//! [`FrameReader`] pulls frames off the server's stdout with blocking I/O.
//! A single underlying read may return short, so every payload is read
//! through a loop until the advertised length has been fully consumed;
//! stream end before that point is a transport failure.

use std::io::Read;

use bytes::Bytes;

use super::channel::{is_mandatory_letter, Channel};
use super::wire_format::{FrameHeader, HEADER_SIZE, RESULT_PAYLOAD_SIZE};
use crate::error::{HgwireError, Result};

/// Chunk size for payload reads and unknown-channel skips.
const READ_CHUNK: usize = 64 * 1024;

/// One decoded unit of the server→client protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `o` - command standard output bytes.
    Output(Bytes),
    /// `e` - command standard error bytes.
    Error(Bytes),
    /// `d` - debug output bytes.
    Debug(Bytes),
    /// `r` - command finished with this exit code.
    Result(i32),
    /// `I` - server requests up to this many bytes of raw input.
    InputRequest(usize),
    /// `L` - server requests up to this many bytes of line input.
    LineRequest(usize),
}

impl Frame {
    /// The channel this frame arrived on.
    pub fn channel(&self) -> Channel {
        match self {
            Frame::Output(_) => Channel::Output,
            Frame::Error(_) => Channel::Error,
            Frame::Debug(_) => Channel::Debug,
            Frame::Result(_) => Channel::Result,
            Frame::InputRequest(_) => Channel::Input,
            Frame::LineRequest(_) => Channel::LineInput,
        }
    }
}

/// Blocking reader that decodes frames from the server's stdout.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
}

impl<R: Read> FrameReader<R> {
    /// Wrap a readable stream (the subprocess's stdout).
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next frame, blocking until one is available.
    ///
    /// Unknown channel letters follow Mercurial's documented rule: an
    /// uppercase letter is mandatory and aborts with a protocol error,
    /// while a lowercase letter is optional - its payload is consumed and
    /// discarded and reading continues with the next frame.
    ///
    /// # Errors
    ///
    /// - `Transport` on pipe errors or EOF before a frame is complete
    /// - `Protocol` on an unknown mandatory channel or a malformed result
    ///   frame
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            let header = self.read_header()?;

            let channel = match Channel::from_letter(header.channel) {
                Some(ch) => ch,
                None if is_mandatory_letter(header.channel) => {
                    return Err(HgwireError::Protocol(format!(
                        "unknown mandatory channel {:?}",
                        header.channel as char
                    )));
                }
                None => {
                    tracing::debug!(
                        channel = %(header.channel as char),
                        length = header.length,
                        "skipping unknown optional channel"
                    );
                    self.skip_payload(header.length)?;
                    continue;
                }
            };

            return match channel {
                Channel::Input => Ok(Frame::InputRequest(header.length as usize)),
                Channel::LineInput => Ok(Frame::LineRequest(header.length as usize)),
                Channel::Output => Ok(Frame::Output(self.read_payload(header.length)?)),
                Channel::Error => Ok(Frame::Error(self.read_payload(header.length)?)),
                Channel::Debug => Ok(Frame::Debug(self.read_payload(header.length)?)),
                Channel::Result => {
                    if header.length != RESULT_PAYLOAD_SIZE {
                        return Err(HgwireError::Protocol(format!(
                            "result frame advertises {} payload bytes, expected {}",
                            header.length, RESULT_PAYLOAD_SIZE
                        )));
                    }
                    let payload = self.read_payload(header.length)?;
                    let code = i32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                    Ok(Frame::Result(code))
                }
            };
        }
    }

    /// Read exactly one 5-byte header.
    fn read_header(&mut self) -> Result<FrameHeader> {
        let mut buf = [0u8; HEADER_SIZE];
        self.inner.read_exact(&mut buf)?;
        Ok(FrameHeader::decode(&buf).expect("buffer holds a full header"))
    }

    /// Read exactly `length` payload bytes.
    ///
    /// Reads in bounded chunks so the full advertised length is consumed
    /// even when the underlying reader delivers short reads.
    fn read_payload(&mut self, length: u32) -> Result<Bytes> {
        let length = length as usize;
        let mut buf = vec![0u8; length];
        let mut filled = 0;
        while filled < length {
            let end = (filled + READ_CHUNK).min(length);
            let n = self.inner.read(&mut buf[filled..end])?;
            if n == 0 {
                return Err(HgwireError::Transport(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("server closed the pipe {filled}/{length} bytes into a payload"),
                )));
            }
            filled += n;
        }
        Ok(Bytes::from(buf))
    }

    /// Consume and discard `length` bytes from an ignorable channel.
    fn skip_payload(&mut self, length: u32) -> Result<()> {
        let mut remaining = length as usize;
        let mut scratch = vec![0u8; READ_CHUNK.min(remaining)];
        while remaining > 0 {
            let want = remaining.min(READ_CHUNK);
            let n = self.inner.read(&mut scratch[..want])?;
            if n == 0 {
                return Err(HgwireError::Transport(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "server closed the pipe while skipping an unknown channel",
                )));
            }
            remaining -= n;
        }
        Ok(())
    }

    /// Consume the reader, returning the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}
