//! Snapshot file format: MessagePack, LZ4-compressed, SHA-256 trailer.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use rmp_serde::{from_slice, to_vec_named};
use sha2::{Digest, Sha256};

use super::error::PersistenceError;
use super::repository::RepositorySnapshot;
use super::SNAPSHOT_VERSION;

const CHECKSUM_LEN: usize = 32;

pub fn encode_snapshot(snapshot: &RepositorySnapshot) -> Result<Vec<u8>, PersistenceError> {
    let msgpack = to_vec_named(snapshot)?;
    let mut bytes = compress_prepend_size(&msgpack);

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let checksum = hasher.finalize();

    bytes.extend_from_slice(&checksum);
    Ok(bytes)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<RepositorySnapshot, PersistenceError> {
    // size header + checksum
    if bytes.len() < 4 + CHECKSUM_LEN {
        return Err(PersistenceError::Corrupted(format!("snapshot too short: {} bytes", bytes.len())));
    }

    let (payload, checksum_bytes) = bytes.split_at(bytes.len() - CHECKSUM_LEN);

    let mut hasher = Sha256::new();
    hasher.update(payload);
    if hasher.finalize()[..] != *checksum_bytes {
        return Err(PersistenceError::ChecksumMismatch);
    }

    let msgpack = decompress_size_prepended(payload).map_err(|_| PersistenceError::Decompression)?;
    let snapshot: RepositorySnapshot = from_slice(&msgpack)?;

    if snapshot.version > SNAPSHOT_VERSION {
        return Err(PersistenceError::VersionMismatch {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }

    snapshot.validate()?;
    Ok(snapshot)
}
