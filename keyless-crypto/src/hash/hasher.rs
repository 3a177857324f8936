use std::io;

use cryptoxide::{
    digest::Digest,
    ripemd160::Ripemd160,
    sha1::Sha1,
    sha2::{Sha256, Sha384, Sha512},
};

use super::{DataHash, HashAlgorithm};

enum Inner {
    Sha1(Sha1),
    Sha2_256(Sha256),
    Ripemd160(Ripemd160),
    Sha2_384(Sha384),
    Sha2_512(Sha512),
}

macro_rules! with_digest {
    ($inner:expr, $digest:ident => $body:expr) => {
        match $inner {
            Inner::Sha1($digest) => $body,
            Inner::Sha2_256($digest) => $body,
            Inner::Ripemd160($digest) => $body,
            Inner::Sha2_384($digest) => $body,
            Inner::Sha2_512($digest) => $body,
        }
    };
}

/// Streaming hasher over any [`HashAlgorithm`].
///
/// ```
/// # use keyless_crypto::hash::{HashAlgorithm, Hasher};
///
/// let digest = Hasher::hash(HashAlgorithm::Sha1, b"");
/// # assert_eq!(
/// #   "00da39a3ee5e6b4b0d3255bfef95601890afd80709",
/// #   digest.to_string()
/// # );
/// ```
pub struct Hasher {
    algorithm: HashAlgorithm,
    inner: Inner,
}

impl Hasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let inner = match algorithm {
            HashAlgorithm::Sha1 => Inner::Sha1(Sha1::new()),
            HashAlgorithm::Sha2_256 => Inner::Sha2_256(Sha256::new()),
            HashAlgorithm::Ripemd160 => Inner::Ripemd160(Ripemd160::new()),
            HashAlgorithm::Sha2_384 => Inner::Sha2_384(Sha384::new()),
            HashAlgorithm::Sha2_512 => Inner::Sha2_512(Sha512::new()),
        };

        Self { algorithm, inner }
    }

    /// convenient function to directly hash the given bytes
    #[inline]
    pub fn hash(algorithm: HashAlgorithm, bytes: &[u8]) -> DataHash {
        let mut hasher = Self::new(algorithm);
        hasher.input(bytes);
        hasher.finalize()
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// update the [`Hasher`] with the given inputs
    #[inline]
    pub fn input(&mut self, bytes: &[u8]) {
        with_digest!(&mut self.inner, x => x.input(bytes));
    }

    /// feeds the imprint (algorithm id and digest) of another hash
    #[inline]
    pub fn input_imprint(&mut self, hash: &DataHash) {
        self.input(&[hash.algorithm().id()]);
        self.input(hash.digest());
    }

    /// consume the [`Hasher`] and returns the computed digest
    pub fn finalize(mut self) -> DataHash {
        let mut out = vec![0u8; self.algorithm.length()];
        with_digest!(&mut self.inner, x => x.result(&mut out));

        DataHash::new(self.algorithm, out)
            .expect("digest buffer is sized from the algorithm length")
    }
}

/// Lets TLV elements be written straight into the hasher
impl io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.input(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
