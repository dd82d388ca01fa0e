//! Hello-frame parsing.
//!
//! Immediately after spawn the server emits exactly one frame on the `o`
//! channel: a newline-separated list of `key: value` pairs announcing the
//! session encoding and the server's capabilities. Both fields are
//! required; a session cannot operate without them.

use std::collections::HashSet;

use crate::error::{HgwireError, Result};
use crate::protocol::Frame;

/// The server's handshake announcement.
#[derive(Debug, Clone)]
pub struct ServerHello {
    /// Negotiated encoding, e.g. `UTF-8`.
    pub encoding: String,
    /// Capability tokens, e.g. `runcommand`, `getencoding`.
    pub capabilities: HashSet<String>,
}

impl ServerHello {
    /// Parse the first frame the server emits.
    ///
    /// # Errors
    ///
    /// `HandshakeFailed` if the frame is not on the `o` channel, or if the
    /// payload lacks an `encoding` or `capabilities` field.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let payload = match frame {
            Frame::Output(payload) => payload,
            other => {
                return Err(HgwireError::HandshakeFailed(format!(
                    "expected the hello frame on the 'o' channel, got {:?}",
                    other.channel()
                )));
            }
        };

        let text = std::str::from_utf8(payload)
            .map_err(|_| HgwireError::HandshakeFailed("hello frame is not UTF-8".to_string()))?;
        Self::parse(text)
    }

    /// Parse the hello payload text.
    ///
    /// Lines without a `: ` delimiter and unknown keys are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut encoding = None;
        let mut capabilities = None;

        for line in text.lines() {
            let Some((key, value)) = line.split_once(": ") else {
                continue;
            };
            match key {
                "encoding" => encoding = Some(value.to_string()),
                "capabilities" => {
                    capabilities =
                        Some(value.split_whitespace().map(str::to_string).collect());
                }
                _ => {}
            }
        }

        let encoding = encoding.ok_or_else(|| {
            HgwireError::HandshakeFailed("hello frame is missing the encoding field".to_string())
        })?;
        let capabilities = capabilities.ok_or_else(|| {
            HgwireError::HandshakeFailed(
                "hello frame is missing the capabilities field".to_string(),
            )
        })?;

        Ok(Self {
            encoding,
            capabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    const HELLO: &str = "capabilities: getencoding runcommand\nencoding: UTF-8";

    #[test]
    fn test_parse_extracts_both_fields() {
        let hello = ServerHello::parse(HELLO).unwrap();
        assert_eq!(hello.encoding, "UTF-8");
        assert_eq!(hello.capabilities.len(), 2);
        assert!(hello.capabilities.contains("runcommand"));
        assert!(hello.capabilities.contains("getencoding"));
    }

    #[test]
    fn test_parse_ignores_unknown_keys() {
        let text = format!("{HELLO}\npid: 12345\nfuture-field: whatever");
        let hello = ServerHello::parse(&text).unwrap();
        assert_eq!(hello.encoding, "UTF-8");
    }

    #[test]
    fn test_parse_ignores_lines_without_delimiter() {
        let text = format!("garbage line\n{HELLO}");
        assert!(ServerHello::parse(&text).is_ok());
    }

    #[test]
    fn test_missing_encoding_fails() {
        let err = ServerHello::parse("capabilities: runcommand").unwrap_err();
        assert!(matches!(err, HgwireError::HandshakeFailed(_)));
    }

    #[test]
    fn test_missing_capabilities_fails() {
        let err = ServerHello::parse("encoding: UTF-8").unwrap_err();
        assert!(matches!(err, HgwireError::HandshakeFailed(_)));
    }

    #[test]
    fn test_from_output_frame() {
        let frame = Frame::Output(Bytes::from_static(HELLO.as_bytes()));
        let hello = ServerHello::from_frame(&frame).unwrap();
        assert_eq!(hello.encoding, "UTF-8");
    }

    #[test]
    fn test_from_non_output_frame_fails() {
        let err = ServerHello::from_frame(&Frame::Result(0)).unwrap_err();
        assert!(matches!(err, HgwireError::HandshakeFailed(_)));
    }
}
