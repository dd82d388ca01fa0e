//! Mercurial version banner parsing.
//!
//! `hg version` prints a human-readable banner whose first line carries the
//! version in parentheses, e.g.
//! `Mercurial Distributed SCM (version 6.5.1)`. The parenthesized part is
//! matched as `<non-digits><major>.<minor>[.<trivial>][<extra>]`; a banner
//! that does not match is an error, never a guess.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{HgwireError, Result};

/// Parsed and normalized Mercurial version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HgVersion {
    /// First version component.
    pub major: u32,
    /// Second version component.
    pub minor: u32,
    /// Third version component; 0 when the banner omits it.
    pub trivial: u32,
    /// Trailing non-numeric part, e.g. `rc1` or `+20180427`.
    pub extra: String,
}

fn banner_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\(\D*(\d+)\.(\d+)(?:\.(\d+))?([^)]*)\)").expect("static pattern compiles")
    })
}

impl HgVersion {
    /// Parse the banner printed by `hg version`.
    ///
    /// # Errors
    ///
    /// `Parse` when the banner does not contain a parenthesized version of
    /// the expected shape (pre-release banners may not).
    ///
    /// # Example
    ///
    /// ```
    /// use hgwire::HgVersion;
    ///
    /// let v = HgVersion::parse("Mercurial Distributed SCM (version 6.5.1)").unwrap();
    /// assert_eq!((v.major, v.minor, v.trivial), (6, 5, 1));
    /// ```
    pub fn parse(banner: &str) -> Result<Self> {
        let captures = banner_regex().captures(banner).ok_or_else(|| {
            HgwireError::Parse(format!("unrecognized version banner: {banner:?}"))
        })?;

        let component = |i: usize| -> Result<u32> {
            match captures.get(i) {
                Some(m) => m.as_str().parse::<u32>().map_err(|_| {
                    HgwireError::Parse(format!("version component out of range in {banner:?}"))
                }),
                None => Ok(0),
            }
        };

        Ok(Self {
            major: component(1)?,
            minor: component(2)?,
            trivial: component(3)?,
            extra: captures
                .get(4)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        })
    }
}

impl fmt::Display for HgVersion {
    /// Normalized `major.minor.trivial[extra]` form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}{}",
            self.major, self.minor, self.trivial, self.extra
        )
    }
}
