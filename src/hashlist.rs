//! Credential-list preprocessing.
//!
//! MDXfind takes hashes and salts as two separate, line-aligned files. This
//! module splits a colon-delimited credential list into `<list>.hashes` and
//! `<list>.salts`, writing exactly one line to each per non-blank input line.
//!
//! Two-field lines are ambiguous (`hash:salt` vs `hash:plaintext`). They are
//! classified by the shape of the second field only, see [`looks_like_salt`].
//! Short plaintexts are therefore read as salts; that behavior is relied on by
//! existing controllers and is kept as is.
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{JobError, Result};
use crate::io::open_lines;

/// Second fields longer than this are never salts.
pub const MAX_SALT_LEN: usize = 64;
/// Second fields up to this length are salts regardless of content.
pub const SHORT_SALT_LEN: usize = 16;

/// One non-blank line of the credential list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecord {
    pub hash: String,
    pub salt: Option<String>,
    /// 1-based line number in the source file.
    pub line_number: usize,
    pub shape: RecordShape,
}

/// Which grammar rule classified a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    HashOnly,
    HashSalt,
    HashPlaintext,
    HashSaltPlaintext,
}

/// Decide whether the second field of a `a:b` line is a salt.
pub fn looks_like_salt(field: &str) -> bool {
    let len = field.chars().count();
    len <= MAX_SALT_LEN && (is_hex(field) || len <= SHORT_SALT_LEN)
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Classify one raw line. Returns `None` for blank lines.
pub fn classify_line(line: &str, line_number: usize) -> Option<HashRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let mut fields = line.split(':');
    let hash = fields.next().unwrap_or_default().to_string();
    let (salt, shape) = match (fields.next(), fields.next()) {
        (None, _) => (None, RecordShape::HashOnly),
        (Some(second), None) if looks_like_salt(second) => {
            (Some(second.to_string()), RecordShape::HashSalt)
        }
        (Some(_), None) => (None, RecordShape::HashPlaintext),
        (Some(second), Some(_)) => (Some(second.to_string()), RecordShape::HashSaltPlaintext),
    };
    Some(HashRecord {
        hash,
        salt,
        line_number,
        shape,
    })
}

/// Per-shape counts gathered while preprocessing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessStats {
    pub blank: usize,
    pub hash_only: usize,
    pub hash_salt: usize,
    pub hash_plaintext: usize,
    pub hash_salt_plaintext: usize,
}

impl PreprocessStats {
    fn record(&mut self, shape: RecordShape) {
        match shape {
            RecordShape::HashOnly => self.hash_only += 1,
            RecordShape::HashSalt => self.hash_salt += 1,
            RecordShape::HashPlaintext => self.hash_plaintext += 1,
            RecordShape::HashSaltPlaintext => self.hash_salt_plaintext += 1,
        }
    }

    /// Number of records written, i.e. lines in each derived file.
    pub fn records(&self) -> usize {
        self.hash_only + self.hash_salt + self.hash_plaintext + self.hash_salt_plaintext
    }
}

/// Derived files ready to hand to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedHashlist {
    pub hash_file: PathBuf,
    pub salt_file: PathBuf,
    pub has_salts: bool,
    pub stats: PreprocessStats,
}

/// `<path>.<suffix>`, appended to the full file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(".");
    s.push(suffix);
    PathBuf::from(s)
}

pub fn hash_file_for(hashlist: &Path) -> PathBuf {
    sibling(hashlist, "hashes")
}

pub fn salt_file_for(hashlist: &Path) -> PathBuf {
    sibling(hashlist, "salts")
}

struct DerivedFile {
    path: PathBuf,
    out: BufWriter<File>,
}

impl DerivedFile {
    fn create(path: PathBuf) -> Result<Self> {
        match File::create(&path) {
            Ok(f) => Ok(Self {
                path,
                out: BufWriter::new(f),
            }),
            Err(source) => Err(JobError::WriteDerived { path, source }),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{}", line).map_err(|source| JobError::WriteDerived {
            path: self.path.clone(),
            source,
        })
    }

    fn finish(mut self) -> Result<()> {
        self.out.flush().map_err(|source| JobError::WriteDerived {
            path: self.path,
            source,
        })
    }
}

/// Split `hashlist` into its `.hashes` and `.salts` siblings.
///
/// Files at or above `mmap_threshold_bytes` are memory-mapped while reading.
pub fn preprocess(hashlist: &Path, mmap_threshold_bytes: u64) -> Result<PreparedHashlist> {
    let lines = open_lines(hashlist, mmap_threshold_bytes).map_err(|source| {
        JobError::OpenHashlist {
            path: hashlist.to_path_buf(),
            source,
        }
    })?;

    let mut hashes = DerivedFile::create(hash_file_for(hashlist))?;
    let mut salts = DerivedFile::create(salt_file_for(hashlist))?;
    let mut stats = PreprocessStats::default();

    for (idx, line) in lines.enumerate() {
        let line = line.map_err(|source| JobError::ReadHashlist {
            path: hashlist.to_path_buf(),
            source,
        })?;
        let Some(record) = classify_line(&line, idx + 1) else {
            stats.blank += 1;
            continue;
        };
        stats.record(record.shape);
        hashes.write_line(&record.hash)?;
        salts.write_line(record.salt.as_deref().unwrap_or(""))?;
    }

    let prepared = PreparedHashlist {
        hash_file: hashes.path.clone(),
        salt_file: salts.path.clone(),
        has_salts: stats.hash_salt + stats.hash_salt_plaintext > 0,
        stats,
    };
    hashes.finish()?;
    salts.finish()?;

    info!(
        "prepared {} records from {} (salted: {})",
        stats.records(),
        hashlist.display(),
        prepared.has_salts
    );
    debug!("hashlist shapes: {:?}", stats);
    Ok(prepared)
}
