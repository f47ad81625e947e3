//! Parsing of MDXfind result lines.
//!
//! The engine interleaves results with diagnostics on one stream. A result
//! looks like `HASHTYPE hash:plaintext` or `HASHTYPE hash:salt:plaintext`:
//!
//! ```text
//! MD5x01 5f4dcc3b5aa765d61d8327deb882cf99:password
//! MD5SALT 5192d8813bbef9b620dd91a757834dc2:vl1A*):zhurA123
//! ```
//!
//! Anything else is noise and is dropped without error.
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static RESULT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z0-9\-x]+)\s+([a-fA-F0-9]+):(.+)$").expect("result pattern is valid")
});

/// A recovered credential as reported to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrackedRecord {
    pub hash: String,
    pub plaintext: String,
    pub hash_type: String,
}

/// Controller wire format: `hash:plaintext:hashtype`. The salt is left out,
/// the controller already has it.
impl fmt::Display for CrackedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.hash, self.plaintext, self.hash_type)
    }
}

/// All parts of a result line, salt included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultLine<'a> {
    pub hash_type: &'a str,
    pub hash: &'a str,
    pub salt: Option<&'a str>,
    pub plaintext: &'a str,
}

impl ResultLine<'_> {
    pub fn to_record(&self) -> CrackedRecord {
        CrackedRecord {
            hash: self.hash.to_string(),
            plaintext: self.plaintext.to_string(),
            hash_type: self.hash_type.to_string(),
        }
    }
}

/// Split one engine line into its result fields.
pub fn parse_result_line(line: &str) -> Option<ResultLine<'_>> {
    if line.is_empty() || !line.contains(':') {
        return None;
    }
    let caps = RESULT_LINE.captures(line)?;
    let hash_type = caps.get(1)?.as_str();
    let hash = caps.get(2)?.as_str();
    let rest = caps.get(3)?.as_str();
    let (salt, plaintext) = match rest.find(':') {
        // A leading colon leaves no salt; the whole rest is the plaintext.
        Some(pos) if pos > 0 => (Some(&rest[..pos]), &rest[pos + 1..]),
        _ => (None, rest),
    };
    Some(ResultLine {
        hash_type,
        hash,
        salt,
        plaintext,
    })
}

/// Normalize one engine line. Returns `None` for non-result lines.
pub fn parse_engine_line(line: &str) -> Option<CrackedRecord> {
    parse_result_line(line.trim()).map(|r| r.to_record())
}
