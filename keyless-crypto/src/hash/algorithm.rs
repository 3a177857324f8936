use std::{fmt, str::FromStr};

use super::Error;

/// Hash algorithms understood by the signature structures.
///
/// The declaration order is the storage order used by sets of algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha2_256,
    Ripemd160,
    Sha2_384,
    Sha2_512,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 5] = [
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha2_256,
        HashAlgorithm::Ripemd160,
        HashAlgorithm::Sha2_384,
        HashAlgorithm::Sha2_512,
    ];

    /// Byte prefix identifying the algorithm inside an imprint
    pub const fn id(&self) -> u8 {
        match self {
            HashAlgorithm::Sha1 => 0x00,
            HashAlgorithm::Sha2_256 => 0x01,
            HashAlgorithm::Ripemd160 => 0x02,
            HashAlgorithm::Sha2_384 => 0x04,
            HashAlgorithm::Sha2_512 => 0x05,
        }
    }

    /// Digest length in bytes
    pub const fn length(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha2_256 => 32,
            HashAlgorithm::Ripemd160 => 20,
            HashAlgorithm::Sha2_384 => 48,
            HashAlgorithm::Sha2_512 => 64,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha2_256 => "SHA-256",
            HashAlgorithm::Ripemd160 => "RIPEMD-160",
            HashAlgorithm::Sha2_384 => "SHA-384",
            HashAlgorithm::Sha2_512 => "SHA-512",
        }
    }

    pub fn from_id(id: u8) -> Result<Self, Error> {
        Self::ALL
            .into_iter()
            .find(|x| x.id() == id)
            .ok_or(Error::UnknownAlgorithm(id))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    /// Accepts the canonical names plus the dash-less / `SHA2-` spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "SHA1" => Ok(HashAlgorithm::Sha1),
            "SHA256" | "SHA2256" => Ok(HashAlgorithm::Sha2_256),
            "RIPEMD160" => Ok(HashAlgorithm::Ripemd160),
            "SHA384" | "SHA2384" => Ok(HashAlgorithm::Sha2_384),
            "SHA512" | "SHA2512" => Ok(HashAlgorithm::Sha2_512),
            _ => Err(Error::UnknownAlgorithmName(s.to_owned())),
        }
    }
}
