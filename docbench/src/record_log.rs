//! The persisted record log and random sampling of search terms from it.
//!
//! The log is an append-only text file that records every document confirmed by the service. Each
//! field of a record becomes one line of the form `data7:7:<value>`: the field name, the field
//! index and the [`VALUE_LEN`]-character value. A later `search` run samples random lines of this
//! file to build term queries that are expected to match exactly one document.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::record::{Record, VALUE_LEN, field_name};

/// How many bytes are read at a random offset. Fits two complete lines.
const SAMPLE_WINDOW: u64 = 320;

/// How many random offsets are tried before giving up on a log without valid lines.
const MAX_SAMPLE_ATTEMPTS: usize = 10_000;

/// Appends confirmed records to the log file.
#[derive(Debug)]
pub struct RecordLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl RecordLog {
    /// Opens the log for appending, creating it if necessary.
    pub fn open_append(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let file = options.open(path)?;
        Ok(Self {
            path: path.to_owned(),
            writer: BufWriter::new(file),
        })
    }

    /// The path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends all fields of the record, one line per field.
    pub fn append(&mut self, record: &Record) -> io::Result<()> {
        for (index, value) in record.values() {
            writeln!(self.writer, "{}:{index}:{value}", field_name(index))?;
        }
        Ok(())
    }

    /// Flushes buffered lines to the file.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// A single-field exact-match constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    /// The field name, such as `data7`.
    pub field: String,
    /// The exact value the field must have.
    pub value: String,
}

/// Parses one log line into a [`Term`].
///
/// The field name is derived from the index, so a line cut off somewhere within its leading name
/// still yields the right field. Lines that do not split into exactly three parts, have a
/// non-numeric index or a value of the wrong length are rejected.
pub fn parse_line(line: &str) -> Option<Term> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut parts = line.splitn(3, ':');
    let (_name, index, value) = (parts.next()?, parts.next()?, parts.next()?);

    if value.len() != VALUE_LEN || value.contains(':') {
        return None;
    }
    let index: usize = index.parse().ok()?;

    Some(Term {
        field: field_name(index),
        value: value.to_owned(),
    })
}

/// Picks a term from a window of bytes read at an arbitrary offset.
///
/// The line at the start of the window is usually cut off, so when it is malformed exactly one
/// adjacent line is tried before giving up.
pub fn pick_term(window: &[u8]) -> Option<Term> {
    let mut lines = window.split(|&b| b == b'\n');
    let mut attempt = || {
        let line = std::str::from_utf8(lines.next()?).ok()?;
        parse_line(line)
    };

    attempt().or_else(attempt)
}

/// Errors that can happen while sampling terms from the record log.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// Reading the log failed.
    #[error("failed to read record log: {0}")]
    Io(#[from] io::Error),
    /// The log has no content to sample from.
    #[error("record log is empty")]
    EmptyLog,
    /// None of the sampled offsets yielded a well-formed line.
    #[error("no valid line found after {0} attempts")]
    NoValidLine(usize),
}

/// Samples random [`Term`]s from a record log.
#[derive(Debug)]
pub struct RecordSampler {
    file: File,
    len: u64,
    rng: SmallRng,
    buf: Vec<u8>,
}

impl RecordSampler {
    /// Opens the record log for sampling.
    ///
    /// Fails with [`SampleError::EmptyLog`] if the file has no content.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SampleError> {
        let file = File::open(path)?;
        Self::from_file(file, SmallRng::from_os_rng())
    }

    /// Creates a sampler over an open file with the given randomness source.
    pub fn from_file(file: File, rng: SmallRng) -> Result<Self, SampleError> {
        let len = file.metadata()?.len();
        if len == 0 {
            return Err(SampleError::EmptyLog);
        }

        Ok(Self {
            file,
            len,
            rng,
            buf: Vec::with_capacity(SAMPLE_WINDOW as usize),
        })
    }

    /// Picks a uniformly random offset and returns the first well-formed term found there.
    ///
    /// Malformed or truncated lines are skipped by retrying at a fresh offset, up to a fixed
    /// number of attempts.
    pub fn sample(&mut self) -> Result<Term, SampleError> {
        for _ in 0..MAX_SAMPLE_ATTEMPTS {
            let offset = self.rng.random_range(0..self.len);
            self.file.seek(SeekFrom::Start(offset))?;

            self.buf.clear();
            (&mut self.file).take(SAMPLE_WINDOW).read_to_end(&mut self.buf)?;

            if let Some(term) = pick_term(&self.buf) {
                return Ok(term);
            }
        }

        Err(SampleError::NoValidLine(MAX_SAMPLE_ATTEMPTS))
    }
}
