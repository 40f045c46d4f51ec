/// Snapshot providers let the store survive restarts: the persister writes a
/// snapshot of every collection and the store is hydrated from the latest one
/// on startup.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Encoded documents per collection name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    // seconds since 1970-01-01 00:00:00 UTC
    pub taken_at: u64,
    pub collections: BTreeMap<String, Vec<u8>>,
}

pub trait SnapshotProvider: Send + Sync {
    fn load(&self) -> Result<Option<Snapshot>, SnapshotError>;
    /// Returns the number of uncompressed bytes written.
    fn store(&self, snapshot: &Snapshot) -> Result<usize, SnapshotError>;
}

/// Bincode encoded and zstd compressed.
struct Codec {
    level: i32,
    config: bincode::config::Configuration,
}

impl Codec {
    fn new(level: i32) -> Self {
        let range = zstd::compression_level_range();
        let clamped = level.clamp(*range.start(), *range.end());
        if clamped != level {
            tracing::warn!(level, clamped, "Snapshot compression level out of range");
        }
        Codec {
            level: clamped,
            // standard defaults to little-endian + varint
            config: bincode::config::standard(),
        }
    }

    fn write<W: Write>(&self, writer: &mut W, snapshot: &Snapshot) -> Result<usize, SnapshotError> {
        let mut encoder = zstd::stream::write::Encoder::new(writer, self.level)?;
        let size = bincode::serde::encode_into_std_write(snapshot, &mut encoder, self.config)?;
        encoder.finish()?.flush()?;
        Ok(size)
    }

    fn read<R: Read>(&self, reader: R) -> Result<Snapshot, SnapshotError> {
        let mut decoder = zstd::stream::read::Decoder::new(reader)?;
        Ok(bincode::serde::decode_from_std_read(
            &mut decoder,
            self.config,
        )?)
    }
}

/// Keeps nothing. Used when the store is configured as memory only.
pub struct NoopSnapshotProvider;

impl SnapshotProvider for NoopSnapshotProvider {
    fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        Ok(None)
    }

    fn store(&self, _snapshot: &Snapshot) -> Result<usize, SnapshotError> {
        Ok(0)
    }
}

pub struct FilesystemSnapshotProvider {
    path: PathBuf,
    codec: Codec,
}

impl FilesystemSnapshotProvider {
    /// `compression_level` is a zstd level. Values outside the range zstd
    /// supports are clamped.
    pub fn new(base_dir: &str, filename: &str, compression_level: i32) -> Self {
        FilesystemSnapshotProvider {
            path: Path::new(base_dir).join(filename),
            codec: Codec::new(compression_level),
        }
    }
}

impl SnapshotProvider for FilesystemSnapshotProvider {
    fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let reader = io::BufReader::new(file);
        self.codec.read(reader).map(Some)
    }

    fn store(&self, snapshot: &Snapshot) -> Result<usize, SnapshotError> {
        // Write next to the target and rename so a crash never leaves a truncated snapshot
        let tmp_path = self.path.with_extension("tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = io::BufWriter::new(file);
        let size = self.codec.write(&mut writer, snapshot)?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(path = ?self.path, bytes = size, "Stored snapshot");
        Ok(size)
    }
}
