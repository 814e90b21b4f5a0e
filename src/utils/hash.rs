use md5::{Digest, Md5};
use serde::Serialize;
use sha1::Sha1;
use sha2::Sha256;

/// Hex digests of a file content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checksums {
    pub sha1: String,
    pub md5: String,
    pub sha256: String,
}

impl Checksums {
    pub fn of(content: &[u8]) -> Self {
        Self {
            sha1: format!("{:x}", Sha1::digest(content)),
            md5: format!("{:x}", Md5::digest(content)),
            sha256: format!("{:x}", Sha256::digest(content)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksums_of_empty_content() {
        let checksums = Checksums::of(b"");
        assert_eq!(checksums.sha1, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(checksums.md5, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            checksums.sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
