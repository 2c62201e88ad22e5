//! Streaming content checksums (manifest) and fingerprints (duplicates).

use crate::config::{ChecksumAlgorithm, DuplicateSettings, Fingerprint};
use crate::error::{IoResultExt, Result};
use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUFFER_SIZE: usize = 64 * 1024;

fn stream<R: Read>(mut reader: R, mut update: impl FnMut(&[u8])) -> io::Result<()> {
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        update(&buffer[..n]);
    }
    Ok(())
}

fn digest<D: Digest, R: Read>(reader: R) -> io::Result<String> {
    let mut hasher = D::new();
    stream(reader, |chunk| hasher.update(chunk))?;
    Ok(hex::encode(hasher.finalize()))
}

fn blake3_hex<R: Read>(reader: R) -> io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    stream(reader, |chunk| {
        hasher.update(chunk);
    })?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hex checksum of the whole file.
pub fn checksum_file(path: &Path, algorithm: ChecksumAlgorithm) -> Result<String> {
    let file = File::open(path).at(path)?;
    match algorithm {
        ChecksumAlgorithm::Md5 => digest::<Md5, _>(file),
        ChecksumAlgorithm::Sha256 => digest::<Sha256, _>(file),
        ChecksumAlgorithm::Blake3 => blake3_hex(file),
    }
    .at(path)
}

/// Fingerprint of the file (or its prefix) for duplicate detection.
pub fn fingerprint_file(path: &Path, settings: &DuplicateSettings) -> Result<String> {
    let file = File::open(path).at(path)?;
    let reader: Box<dyn Read> = match settings.prefix_bytes {
        Some(limit) => Box::new(file.take(limit)),
        None => Box::new(file),
    };
    match settings.fingerprint {
        Fingerprint::Crc32 => {
            let mut hasher = crc32fast::Hasher::new();
            stream(reader, |chunk| hasher.update(chunk)).at(path)?;
            Ok(format!("{:08x}", hasher.finalize()))
        }
        Fingerprint::Blake3 => blake3_hex(reader).at(path),
    }
}
