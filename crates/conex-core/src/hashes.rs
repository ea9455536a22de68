//! File checksums as Artifactory reports them

use std::fs::File;
use std::io::Read;
use std::path::Path;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::Result;

const BUFFER_SIZE: usize = 64 * 1024;

/// md5, sha1 and sha256 of one file, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksums {
    pub sha256: String,
    pub sha1: String,
    pub md5: String,
}

impl Checksums {
    /// Hash a file in a single streaming pass
    pub fn of_file(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut md5 = Md5::new();
        let mut sha1 = Sha1::new();
        let mut sha256 = Sha256::new();
        let mut buf = vec![0u8; BUFFER_SIZE];

        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            md5.update(&buf[..n]);
            sha1.update(&buf[..n]);
            sha256.update(&buf[..n]);
        }

        Ok(Self {
            sha256: hex::encode(sha256.finalize()),
            sha1: hex::encode(sha1.finalize()),
            md5: hex::encode(md5.finalize()),
        })
    }

    /// Hash an in-memory buffer
    pub fn of_bytes(data: &[u8]) -> Self {
        Self {
            sha256: hex::encode(Sha256::digest(data)),
            sha1: hex::encode(Sha1::digest(data)),
            md5: hex::encode(Md5::digest(data)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_known_digests() {
        let sums = Checksums::of_bytes(b"hello world");
        assert_eq!(sums.md5, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(sums.sha1, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
        assert_eq!(
            sums.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_file_matches_bytes_across_buffer_boundary() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big.bin");
        let data: Vec<u8> = (0..(BUFFER_SIZE * 2 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        assert_eq!(Checksums::of_file(&path).unwrap(), Checksums::of_bytes(&data));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        assert!(Checksums::of_file(&temp.path().join("nope")).is_err());
    }
}
