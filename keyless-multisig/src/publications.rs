use std::path::Path;

use keyless_codec::tlv::Reader;
use keyless_primitives::{tags, PublicationRecord, Timestamp};
use tracing::trace;

use crate::{Error, TrustAnchor};

/// Publications file as distributed by the signing service: a magic prefix
/// followed by TLV elements, of which only the publication records matter
/// here. Headers, certificates and the file signature are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationsFile {
    records: Vec<PublicationRecord>,
}

impl PublicationsFile {
    pub const MAGIC: &'static [u8; 8] = b"KSIPUBLF";

    /// Keeps one record per publication time, the first one seen
    pub fn new(mut records: Vec<PublicationRecord>) -> Self {
        records.sort_by_key(|x| x.publication_time());
        records.dedup_by_key(|x| x.publication_time());

        Self { records }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let body = bytes
            .strip_prefix(Self::MAGIC.as_slice())
            .ok_or(Error::BadPublicationsMagic)?;

        let mut records = vec![];

        for element in Reader::new(body) {
            let element = element?;

            match element.tag() {
                tags::PUBLICATIONS_FILE_RECORD => records.push(
                    PublicationRecord::decode_element_with_tag(
                        &element,
                        tags::PUBLICATIONS_FILE_RECORD,
                    )?,
                ),
                tag => trace!(tag, "skipping publications file element"),
            }
        }

        Ok(Self::new(records))
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, Error> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    /// Encodes only the publication records, unsigned
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut out = Self::MAGIC.to_vec();

        for record in &self.records {
            record
                .encode_element_with_tag(tags::PUBLICATIONS_FILE_RECORD)?
                .write_to(&mut out)?;
        }

        Ok(out)
    }

    /// Sorted by publication time
    pub fn records(&self) -> &[PublicationRecord] {
        &self.records
    }

    pub fn latest(&self) -> Option<&PublicationRecord> {
        self.records.last()
    }
}

impl TrustAnchor for PublicationsFile {
    fn nearest_publication_at_or_after(&self, time: Timestamp) -> Option<PublicationRecord> {
        let idx = self
            .records
            .partition_point(|x| x.publication_time() < time);

        self.records.get(idx).cloned()
    }
}
