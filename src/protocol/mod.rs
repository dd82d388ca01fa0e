//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the command-server binary protocol:
//! - 5-byte header encoding/decoding and client→server message encoding
//! - `Channel` letters and the mandatory/optional rule for unknown ones
//! - `Frame` sum type and the blocking `FrameReader`

mod channel;
mod frame;
mod wire_format;

pub use channel::{is_mandatory_letter, Channel};
pub use frame::{Frame, FrameReader};
pub use wire_format::{
    encode_command, encode_input_chunk, FrameHeader, COMMAND_PREAMBLE, HEADER_SIZE,
    RESULT_PAYLOAD_SIZE,
};
