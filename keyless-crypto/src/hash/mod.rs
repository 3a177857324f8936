//! Cryptographic hashes for keyless signatures
//!
//! we expose three helper objects:
//!
//! * [`HashAlgorithm`] the registry of algorithms a signature may reference,
//!   identified on the wire by a single byte
//! * [`DataHash`] a digest tagged with its algorithm; its binary form, the
//!   *imprint*, is the algorithm id followed by the digest bytes
//! * [`Hasher`] to stream bytes (or whole TLV elements) into any of the
//!   supported algorithms
//!
//! # Example
//!
//! ```
//! use keyless_crypto::hash::{HashAlgorithm, Hasher};
//!
//! let mut hasher = Hasher::new(HashAlgorithm::Sha2_256);
//! hasher.input(b"abc");
//!
//! let digest = hasher.finalize();
//! # assert_eq!(
//! #   "01ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
//! #   digest.to_string()
//! # );
//! ```

use thiserror::Error;

mod algorithm;
#[allow(clippy::module_inception)]
mod hash;
mod hasher;
mod serde;

pub use self::{algorithm::HashAlgorithm, hash::DataHash, hasher::Hasher};

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown hash algorithm id {0:#04x}")]
    UnknownAlgorithm(u8),

    #[error("unknown hash algorithm name {0}")]
    UnknownAlgorithmName(String),

    #[error("{algorithm} digest must be {expected} bytes, found {found}")]
    InvalidLength {
        algorithm: HashAlgorithm,
        expected: usize,
        found: usize,
    },

    #[error("imprint is empty")]
    EmptyImprint,

    #[error("invalid hex imprint")]
    Hex(#[from] hex::FromHexError),
}
