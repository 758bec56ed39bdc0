//! Shared I/O for phrase tables and language models.
//!
//! Compiled files share one frame layout:
//! magic(4) + version(1) + crc32(4) + payload_len(4) + bincode payload.
//! Text inputs may be gzip-compressed (detected by a `.gz` extension).

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use memmap2::Mmap;

pub(crate) const HEADER_SIZE: usize = 4 + 1 + 4 + 4;

/// Unified error type for loading and compiling phrase tables and
/// language models.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header (too short)")]
    InvalidHeader,

    #[error("invalid magic bytes (expected {0})")]
    InvalidMagic(&'static str),

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("checksum mismatch (file is corrupt)")]
    Checksum,

    #[error("serialization error: {0}")]
    Serialize(bincode::Error),

    #[error("deserialization error: {0}")]
    Deserialize(bincode::Error),

    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

impl ModelError {
    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        ModelError::Parse {
            line,
            reason: reason.into(),
        }
    }
}

pub(crate) fn write_frame(magic: &[u8; 4], version: u8, payload: &[u8]) -> Result<Vec<u8>, ModelError> {
    let payload_len: u32 = payload
        .len()
        .try_into()
        .map_err(|_| ModelError::parse(0, "payload exceeds u32::MAX"))?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(magic);
    buf.push(version);
    buf.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Validate the frame header and return the payload slice.
pub(crate) fn read_frame<'a>(
    data: &'a [u8],
    magic: &'static [u8; 4],
    version: u8,
) -> Result<&'a [u8], ModelError> {
    if data.len() < HEADER_SIZE {
        return Err(ModelError::InvalidHeader);
    }
    if &data[0..4] != magic {
        return Err(ModelError::InvalidMagic(magic_name(magic)));
    }
    if data[4] != version {
        return Err(ModelError::UnsupportedVersion(data[4]));
    }
    let crc = u32::from_le_bytes([data[5], data[6], data[7], data[8]]);
    let len = u32::from_le_bytes([data[9], data[10], data[11], data[12]]) as usize;
    let payload = data
        .get(HEADER_SIZE..HEADER_SIZE + len)
        .ok_or(ModelError::InvalidHeader)?;
    if crc32fast::hash(payload) != crc {
        return Err(ModelError::Checksum);
    }
    Ok(payload)
}

fn magic_name(magic: &'static [u8; 4]) -> &'static str {
    std::str::from_utf8(magic).unwrap_or("????")
}

/// Memory-map a compiled file for reading.
pub(crate) fn map_file(path: &Path) -> Result<Mmap, ModelError> {
    let file = File::open(path)?;
    // SAFETY: the mapping is read-only and only lives for the duration of
    // a single deserialization call.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

/// Whether the file at `path` starts with `magic`. Short files do not.
pub(crate) fn has_magic(path: &Path, magic: &[u8; 4]) -> Result<bool, ModelError> {
    let mut head = [0u8; 4];
    let mut file = File::open(path)?;
    match file.read_exact(&mut head) {
        Ok(()) => Ok(&head == magic),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Open a text model file, transparently decompressing `.gz`.
pub(crate) fn open_text(path: &Path) -> Result<Box<dyn BufRead>, ModelError> {
    let file = File::open(path)?;
    if path.extension().and_then(|ext| ext.to_str()) == Some("gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
