use keyless_codec::Element;
use std::{fmt, str::FromStr};

use super::{Error, HashAlgorithm};

/// A digest together with the algorithm that produced it.
///
/// Values are only built through validated constructors, so the digest
/// length always matches [`HashAlgorithm::length`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataHash {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl DataHash {
    pub fn new(algorithm: HashAlgorithm, digest: Vec<u8>) -> Result<Self, Error> {
        if digest.len() != algorithm.length() {
            return Err(Error::InvalidLength {
                algorithm,
                expected: algorithm.length(),
                found: digest.len(),
            });
        }

        Ok(Self { algorithm, digest })
    }

    /// Parses `algorithm id || digest`
    pub fn from_imprint(imprint: &[u8]) -> Result<Self, Error> {
        let (id, digest) = imprint.split_first().ok_or(Error::EmptyImprint)?;
        let algorithm = HashAlgorithm::from_id(*id)?;

        Self::new(algorithm, digest.to_vec())
    }

    #[inline]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    #[inline]
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    pub fn imprint(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.digest.len() + 1);
        out.push(self.algorithm.id());
        out.extend_from_slice(&self.digest);
        out
    }

    pub fn to_element(&self, tag: u16) -> Element {
        Element::new(tag, self.imprint())
    }

    pub fn from_element(element: &Element) -> Result<Self, keyless_codec::Error> {
        Self::from_imprint(element.content()).map_err(|err| {
            keyless_codec::Error::message(format!(
                "invalid imprint in element {:#x}: {err}",
                element.tag()
            ))
        })
    }
}

impl fmt::Debug for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(&format!("DataHash<{}>", self.algorithm))
            .field(&hex::encode(&self.digest))
            .finish()
    }
}

/// Hex encoding of the whole imprint
impl fmt::Display for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.imprint()))
    }
}

impl FromStr for DataHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let imprint = hex::decode(s)?;
        Self::from_imprint(&imprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA256_ABC: &str = "01ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn from_str() {
        let hash: DataHash = SHA256_ABC.parse().unwrap();

        assert_eq!(hash.algorithm(), HashAlgorithm::Sha2_256);
        assert_eq!(hash.digest().len(), 32);
        assert_eq!(hash.to_string(), SHA256_ABC);
    }

    #[test]
    fn wrong_digest_length_fails() {
        let result = DataHash::new(HashAlgorithm::Sha1, vec![0; 32]);

        assert!(matches!(
            result,
            Err(Error::InvalidLength {
                expected: 20,
                found: 32,
                ..
            })
        ));
    }

    #[test]
    fn empty_imprint_fails() {
        assert!(matches!(
            DataHash::from_imprint(&[]),
            Err(Error::EmptyImprint)
        ));
    }

    #[test]
    fn element_carries_imprint() {
        let hash: DataHash = SHA256_ABC.parse().unwrap();
        let element = hash.to_element(0x05);

        assert_eq!(element.content()[0], 0x01);
        assert_eq!(DataHash::from_element(&element).unwrap(), hash);
    }

    #[test]
    fn element_with_bad_imprint_fails() {
        let element = Element::new(0x05, vec![0x01, 0x02]);
        assert!(DataHash::from_element(&element).is_err());
    }
}
