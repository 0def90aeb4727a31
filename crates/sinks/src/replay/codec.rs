//! Replay record codec and container formats
//!
//! A replay file is a compressed stream of newline-delimited records:
//!
//! ```text
//! <YYYY/MM/DD HH:MM:SS.mmm>\t<session bytes>\t<bones bytes>\n
//! ```
//!
//! Two containers carry that stream, chosen by file extension:
//!
//! - `.echoreplay` - a ZIP archive with a single DEFLATE-compressed entry
//!   named after the archive's basename
//! - `.nevrcap` - a bare zstd stream, no outer framing
//!
//! Both round-trip: [`ReplayReader`] re-opens either container and yields
//! the original records.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, NaiveDateTime, Utc};
use evrcap_protocol::Frame;
use thiserror::Error;

/// Record timestamp layout (UTC, millisecond precision)
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.3f";

/// zstd level used for `.nevrcap`. Levels past 19 need window-log settings
/// the decoder side would have to opt into.
const ZSTD_BEST_LEVEL: i32 = 19;

/// DEFLATE level used for `.echoreplay` entries (flate2 "best")
const DEFLATE_BEST_LEVEL: i64 = 9;

/// Codec and container errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// A record line had fewer than three tab-separated fields
    #[error("record has fewer than three tab-separated fields")]
    MissingField,

    /// The timestamp field failed to parse
    #[error("invalid timestamp field {0:?}")]
    BadTimestamp(String),

    /// Path has no recognised replay extension
    #[error("unsupported replay extension in {0:?} (expected .echoreplay or .nevrcap)")]
    UnsupportedExtension(String),

    /// `.echoreplay` archive held no entry
    #[error("replay archive contains no entries")]
    EmptyArchive,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// ZIP container error
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// One decoded replay record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub session: Vec<u8>,
    pub bones: Vec<u8>,
}

/// Append one frame to `buf` as a record line; returns the bytes added.
pub fn encode_record(buf: &mut BytesMut, frame: &Frame) -> usize {
    let start = buf.len();
    let timestamp = frame.timestamp.format(TIMESTAMP_FORMAT).to_string();

    buf.reserve(timestamp.len() + frame.session.len() + frame.bones.len() + 3);
    buf.put_slice(timestamp.as_bytes());
    buf.put_u8(b'\t');
    buf.put_slice(&frame.session);
    buf.put_u8(b'\t');
    buf.put_slice(&frame.bones);
    buf.put_u8(b'\n');

    buf.len() - start
}

/// Decode one record line (without its trailing newline).
pub fn decode_record(line: &[u8]) -> Result<Record, CodecError> {
    let first = line
        .iter()
        .position(|&b| b == b'\t')
        .ok_or(CodecError::MissingField)?;
    let rest = &line[first + 1..];
    let second = rest
        .iter()
        .position(|&b| b == b'\t')
        .ok_or(CodecError::MissingField)?;

    let timestamp_field = &line[..first];
    let timestamp_str = std::str::from_utf8(timestamp_field)
        .map_err(|_| CodecError::BadTimestamp(String::from_utf8_lossy(timestamp_field).into_owned()))?;
    let timestamp = NaiveDateTime::parse_from_str(timestamp_str, TIMESTAMP_FORMAT)
        .map_err(|_| CodecError::BadTimestamp(timestamp_str.to_string()))?
        .and_utc();

    Ok(Record {
        timestamp,
        session: rest[..second].to_vec(),
        bones: rest[second + 1..].to_vec(),
    })
}

/// The write side of a replay container.
///
/// `finish` consumes the writer, finalises the compression stream and the
/// container framing, and hands back the file so the caller can fsync it.
pub trait ContainerWrite: Send {
    /// Write one chunk of record bytes through the compressor
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Finalise the container; returns the underlying file for syncing
    fn finish(self: Box<Self>) -> io::Result<File>;
}

impl std::fmt::Debug for dyn ContainerWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ContainerWrite")
    }
}

/// Open a container writer for `path`, selected by extension.
pub fn open_container(path: &Path) -> Result<Box<dyn ContainerWrite>, CodecError> {
    match extension(path)? {
        ReplayExtension::EchoReplay => Ok(Box::new(EchoReplayContainer::create(path)?)),
        ReplayExtension::NevrCap => Ok(Box::new(NevrCapContainer::create(path)?)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplayExtension {
    EchoReplay,
    NevrCap,
}

fn extension(path: &Path) -> Result<ReplayExtension, CodecError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("echoreplay") => Ok(ReplayExtension::EchoReplay),
        Some("nevrcap") => Ok(ReplayExtension::NevrCap),
        _ => Err(CodecError::UnsupportedExtension(
            path.display().to_string(),
        )),
    }
}

/// `.echoreplay`: ZIP archive, one DEFLATE entry named after the basename.
struct EchoReplayContainer {
    zip: zip::ZipWriter<File>,
}

impl EchoReplayContainer {
    fn create(path: &Path) -> Result<Self, CodecError> {
        let entry_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CodecError::UnsupportedExtension(path.display().to_string()))?;

        let file = File::create(path)?;
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .compression_level(Some(DEFLATE_BEST_LEVEL))
            .large_file(true);
        zip.start_file(entry_name, options)?;

        Ok(Self { zip })
    }
}

impl ContainerWrite for EchoReplayContainer {
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.zip.write_all(chunk)
    }

    fn finish(self: Box<Self>) -> io::Result<File> {
        self.zip.finish().map_err(io::Error::other)
    }
}

/// `.nevrcap`: bare zstd stream.
struct NevrCapContainer {
    encoder: zstd::Encoder<'static, File>,
}

impl NevrCapContainer {
    fn create(path: &Path) -> Result<Self, CodecError> {
        let file = File::create(path)?;
        let encoder = zstd::Encoder::new(file, ZSTD_BEST_LEVEL)?;
        Ok(Self { encoder })
    }
}

impl ContainerWrite for NevrCapContainer {
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.encoder.write_all(chunk)
    }

    fn finish(self: Box<Self>) -> io::Result<File> {
        self.encoder.finish()
    }
}

/// Re-opens replay containers and decodes their records.
pub struct ReplayReader;

impl ReplayReader {
    /// Read and decode every record in the file.
    pub fn read_records(path: &Path) -> Result<Vec<Record>, CodecError> {
        let raw = Self::read_raw(path)?;
        raw.split(|&b| b == b'\n')
            .filter(|line| !line.is_empty())
            .map(decode_record)
            .collect()
    }

    /// Read the decompressed record stream without decoding.
    pub fn read_raw(path: &Path) -> Result<Vec<u8>, CodecError> {
        let mut raw = Vec::new();
        match extension(path)? {
            ReplayExtension::EchoReplay => {
                let mut archive = zip::ZipArchive::new(File::open(path)?)?;
                if archive.is_empty() {
                    return Err(CodecError::EmptyArchive);
                }
                archive.by_index(0)?.read_to_end(&mut raw)?;
            }
            ReplayExtension::NevrCap => {
                zstd::Decoder::new(File::open(path)?)?.read_to_end(&mut raw)?;
            }
        }
        Ok(raw)
    }
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod codec_test;
