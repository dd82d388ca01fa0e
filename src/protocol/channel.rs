//! Channel letters of the command-server protocol.
//!
//! Every frame the server emits is tagged with a single ASCII letter that
//! selects the logical stream it belongs to. The set is fixed by the
//! Mercurial protocol, so it is modeled as a closed enum.
//!
//! Mercurial documents a rule for letters outside this set: an unknown
//! *uppercase* channel is mandatory and the client must abort, while an
//! unknown *lowercase* channel is optional and may be skipped.

/// A logical stream multiplexed over the server's stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// `I` - server requests up to N bytes of raw input.
    Input,
    /// `L` - server requests up to N bytes of line-oriented input.
    LineInput,
    /// `o` - command standard output.
    Output,
    /// `e` - command standard error.
    Error,
    /// `r` - command result (4-byte big-endian signed exit code).
    Result,
    /// `d` - debug output.
    Debug,
}

impl Channel {
    /// Map a header letter to its channel, or `None` for letters outside
    /// the protocol's fixed set.
    pub fn from_letter(letter: u8) -> Option<Self> {
        match letter {
            b'I' => Some(Channel::Input),
            b'L' => Some(Channel::LineInput),
            b'o' => Some(Channel::Output),
            b'e' => Some(Channel::Error),
            b'r' => Some(Channel::Result),
            b'd' => Some(Channel::Debug),
            _ => None,
        }
    }

    /// The wire letter for this channel.
    pub fn letter(self) -> u8 {
        match self {
            Channel::Input => b'I',
            Channel::LineInput => b'L',
            Channel::Output => b'o',
            Channel::Error => b'e',
            Channel::Result => b'r',
            Channel::Debug => b'd',
        }
    }

    /// Whether this channel requests data *from* the client (`I`/`L`).
    ///
    /// For these the header length is the number of bytes the server is
    /// willing to receive and no payload follows.
    pub fn is_input(self) -> bool {
        matches!(self, Channel::Input | Channel::LineInput)
    }
}

/// Whether an unrecognized channel letter is mandatory.
///
/// Uppercase letters must abort the command; lowercase ones may be ignored
/// after their payload has been consumed.
pub fn is_mandatory_letter(letter: u8) -> bool {
    letter.is_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_letters_roundtrip() {
        for ch in [
            Channel::Input,
            Channel::LineInput,
            Channel::Output,
            Channel::Error,
            Channel::Result,
            Channel::Debug,
        ] {
            assert_eq!(Channel::from_letter(ch.letter()), Some(ch));
        }
    }

    #[test]
    fn test_unknown_letters_rejected() {
        assert_eq!(Channel::from_letter(b'x'), None);
        assert_eq!(Channel::from_letter(b'X'), None);
        assert_eq!(Channel::from_letter(0), None);
    }

    #[test]
    fn test_input_channels() {
        assert!(Channel::Input.is_input());
        assert!(Channel::LineInput.is_input());
        assert!(!Channel::Output.is_input());
        assert!(!Channel::Result.is_input());
    }

    #[test]
    fn test_mandatory_letter_rule() {
        assert!(is_mandatory_letter(b'X'));
        assert!(is_mandatory_letter(b'A'));
        assert!(!is_mandatory_letter(b'x'));
        assert!(!is_mandatory_letter(b'q'));
        assert!(!is_mandatory_letter(b'0'));
    }
}
