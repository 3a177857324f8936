use keyless_codec::{utils::set_once, Element, Fragment};
use keyless_crypto::hash::{DataHash, HashAlgorithm, Hasher};

use crate::{aggregation::decode_algorithm, tags, Timestamp};

const AGGREGATION_TIME: u16 = 0x02;
const CHAIN_INDEX: u16 = 0x03;
const INPUT_HASH: u16 = 0x05;
const TST_INFO_PREFIX: u16 = 0x10;
const TST_INFO_SUFFIX: u16 = 0x11;
const TST_INFO_ALGORITHM: u16 = 0x12;
const SIGNED_ATTRIBUTES_PREFIX: u16 = 0x13;
const SIGNED_ATTRIBUTES_SUFFIX: u16 = 0x14;
const SIGNED_ATTRIBUTES_ALGORITHM: u16 = 0x15;

/// Envelope of a legacy RFC 3161 time-stamp token.
///
/// The token's DER encoding is kept as the bytes around the document hash, so
/// the record can reproduce the hash that entered the aggregation tree without
/// parsing ASN.1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rfc3161Record {
    pub aggregation_time: Timestamp,
    pub chain_index: Vec<u64>,
    pub input_hash: DataHash,
    pub tst_info_prefix: Vec<u8>,
    pub tst_info_suffix: Vec<u8>,
    pub tst_info_algorithm: HashAlgorithm,
    pub signed_attributes_prefix: Vec<u8>,
    pub signed_attributes_suffix: Vec<u8>,
    pub signed_attributes_algorithm: HashAlgorithm,
}

impl Rfc3161Record {
    /// Hash fed into the first aggregation chain, computed with `algorithm`
    pub fn output_hash(&self, algorithm: HashAlgorithm) -> DataHash {
        let mut tst_info = Hasher::new(self.tst_info_algorithm);
        tst_info.input(&self.tst_info_prefix);
        tst_info.input(self.input_hash.digest());
        tst_info.input(&self.tst_info_suffix);
        let tst_info = tst_info.finalize();

        let mut signed_attributes = Hasher::new(algorithm);
        signed_attributes.input(&self.signed_attributes_prefix);
        signed_attributes.input(tst_info.digest());
        signed_attributes.input(&self.signed_attributes_suffix);
        signed_attributes.finalize()
    }
}

impl Fragment for Rfc3161Record {
    fn encode_element(&self) -> Result<Element, keyless_codec::Error> {
        let mut children = vec![Element::from_u64(AGGREGATION_TIME, self.aggregation_time)];

        children.extend(
            self.chain_index
                .iter()
                .map(|x| Element::from_u64(CHAIN_INDEX, *x)),
        );

        children.extend([
            self.input_hash.to_element(INPUT_HASH),
            Element::new(TST_INFO_PREFIX, self.tst_info_prefix.clone()),
            Element::new(TST_INFO_SUFFIX, self.tst_info_suffix.clone()),
            Element::new(TST_INFO_ALGORITHM, vec![self.tst_info_algorithm.id()]),
            Element::new(
                SIGNED_ATTRIBUTES_PREFIX,
                self.signed_attributes_prefix.clone(),
            ),
            Element::new(
                SIGNED_ATTRIBUTES_SUFFIX,
                self.signed_attributes_suffix.clone(),
            ),
            Element::new(
                SIGNED_ATTRIBUTES_ALGORITHM,
                vec![self.signed_attributes_algorithm.id()],
            ),
        ]);

        Element::composite(tags::RFC3161_RECORD, &children)
    }

    fn decode_element(element: &Element) -> Result<Self, keyless_codec::Error> {
        element.expect_tag(tags::RFC3161_RECORD)?;

        let mut aggregation_time = None;
        let mut chain_index = vec![];
        let mut input_hash = None;
        let mut tst_info_prefix = None;
        let mut tst_info_suffix = None;
        let mut tst_info_algorithm = None;
        let mut signed_attributes_prefix = None;
        let mut signed_attributes_suffix = None;
        let mut signed_attributes_algorithm = None;

        for child in element.children()? {
            let tag = child.tag();

            match tag {
                AGGREGATION_TIME => set_once(&mut aggregation_time, child.decode_u64()?, tag)?,
                CHAIN_INDEX => chain_index.push(child.decode_u64()?),
                INPUT_HASH => set_once(&mut input_hash, DataHash::from_element(&child)?, tag)?,
                TST_INFO_PREFIX => set_once(&mut tst_info_prefix, child.into_content(), tag)?,
                TST_INFO_SUFFIX => set_once(&mut tst_info_suffix, child.into_content(), tag)?,
                TST_INFO_ALGORITHM => {
                    set_once(&mut tst_info_algorithm, decode_algorithm(&child)?, tag)?
                }
                SIGNED_ATTRIBUTES_PREFIX => {
                    set_once(&mut signed_attributes_prefix, child.into_content(), tag)?
                }
                SIGNED_ATTRIBUTES_SUFFIX => {
                    set_once(&mut signed_attributes_suffix, child.into_content(), tag)?
                }
                SIGNED_ATTRIBUTES_ALGORITHM => set_once(
                    &mut signed_attributes_algorithm,
                    decode_algorithm(&child)?,
                    tag,
                )?,
                _ => child.ensure_skippable()?,
            }
        }

        use keyless_codec::Error::MissingField;

        Ok(Self {
            aggregation_time: aggregation_time.ok_or(MissingField("aggregation time"))?,
            chain_index,
            input_hash: input_hash.ok_or(MissingField("input hash"))?,
            tst_info_prefix: tst_info_prefix.unwrap_or_default(),
            tst_info_suffix: tst_info_suffix.unwrap_or_default(),
            tst_info_algorithm: tst_info_algorithm.ok_or(MissingField("tst info algorithm"))?,
            signed_attributes_prefix: signed_attributes_prefix.unwrap_or_default(),
            signed_attributes_suffix: signed_attributes_suffix.unwrap_or_default(),
            signed_attributes_algorithm: signed_attributes_algorithm
                .ok_or(MissingField("signed attributes algorithm"))?,
        })
    }
}
