use keyless_codec::{utils::set_once, Element, Fragment};
use keyless_crypto::hash::DataHash;

use crate::{
    tags, AggregationHashChain, CalendarAuthRecord, CalendarHashChain, Error, PublicationRecord,
    Rfc3161Record, Timestamp,
};

/// Loose components of a signature, before or after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParts {
    pub aggregation_chains: Vec<AggregationHashChain>,
    pub calendar_chain: CalendarHashChain,
    pub calendar_auth_record: Option<CalendarAuthRecord>,
    pub publication_record: Option<PublicationRecord>,
    pub rfc3161_record: Option<Rfc3161Record>,
}

/// A keyless signature over a single document hash.
///
/// Only [`Signature::assemble`] builds one, so every instance holds at least
/// one aggregation chain, ordered bottom to top, all chains belong to the
/// round registered by the calendar chain and at most one of publication
/// record or calendar auth record is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    aggregation_chains: Vec<AggregationHashChain>,
    calendar_chain: CalendarHashChain,
    calendar_auth_record: Option<CalendarAuthRecord>,
    publication_record: Option<PublicationRecord>,
    rfc3161_record: Option<Rfc3161Record>,
}

fn is_parent_index(parent: &[u64], child: &[u64]) -> bool {
    parent.len() + 1 == child.len() && child.starts_with(parent)
}

impl Signature {
    /// Validates and orders the parts into a signature.
    ///
    /// Aggregation chains may come in any order; they are sorted from the
    /// longest chain index (closest to the document) to the shortest. An
    /// auth record is discarded when a publication record is also present.
    pub fn assemble(parts: SignatureParts) -> Result<Self, Error> {
        let SignatureParts {
            mut aggregation_chains,
            calendar_chain,
            calendar_auth_record,
            publication_record,
            rfc3161_record,
        } = parts;

        let round = aggregation_chains
            .first()
            .map(|x| x.aggregation_time)
            .ok_or(Error::NoAggregationChains)?;

        if let Some(other) = aggregation_chains
            .iter()
            .find(|x| x.aggregation_time != round)
        {
            return Err(Error::MixedRounds(round, other.aggregation_time));
        }

        aggregation_chains.sort_by(|a, b| b.chain_index.len().cmp(&a.chain_index.len()));

        for pair in aggregation_chains.windows(2) {
            let (child, parent) = (&pair[0].chain_index, &pair[1].chain_index);

            if !is_parent_index(parent, child) {
                return Err(Error::ChainIndexNotNested {
                    child: child.clone(),
                    parent: parent.clone(),
                });
            }
        }

        if let Some(top) = aggregation_chains.last() {
            if top.chain_index.len() > 1 {
                return Err(Error::ChainIndexNotNested {
                    child: top.chain_index.clone(),
                    parent: top.chain_index[..top.chain_index.len() - 1].to_vec(),
                });
            }
        }

        if calendar_chain.aggregation_time != round {
            return Err(Error::CalendarRoundMismatch {
                calendar: calendar_chain.aggregation_time,
                aggregation: round,
            });
        }

        let published = publication_record.as_ref().map(|x| x.publication_time());
        let authenticated = calendar_auth_record.as_ref().map(|x| x.publication_time());

        for record in published.into_iter().chain(authenticated) {
            if record != calendar_chain.publication_time {
                return Err(Error::PublicationTimeMismatch {
                    record,
                    calendar: calendar_chain.publication_time,
                });
            }
        }

        let calendar_auth_record = match publication_record {
            Some(_) => None,
            None => calendar_auth_record,
        };

        Ok(Self {
            aggregation_chains,
            calendar_chain,
            calendar_auth_record,
            publication_record,
            rfc3161_record,
        })
    }

    pub fn into_parts(self) -> SignatureParts {
        SignatureParts {
            aggregation_chains: self.aggregation_chains,
            calendar_chain: self.calendar_chain,
            calendar_auth_record: self.calendar_auth_record,
            publication_record: self.publication_record,
            rfc3161_record: self.rfc3161_record,
        }
    }

    /// Bottom to top
    pub fn aggregation_chains(&self) -> &[AggregationHashChain] {
        &self.aggregation_chains
    }

    pub fn calendar_chain(&self) -> &CalendarHashChain {
        &self.calendar_chain
    }

    pub fn calendar_auth_record(&self) -> Option<&CalendarAuthRecord> {
        self.calendar_auth_record.as_ref()
    }

    pub fn publication_record(&self) -> Option<&PublicationRecord> {
        self.publication_record.as_ref()
    }

    pub fn rfc3161_record(&self) -> Option<&Rfc3161Record> {
        self.rfc3161_record.as_ref()
    }

    /// Input hash of the lowest aggregation chain
    pub fn aggregation_input_hash(&self) -> &DataHash {
        // assemble guarantees at least one chain
        &self.aggregation_chains[0].input_hash
    }

    /// The hash the signature was issued for
    pub fn document_hash(&self) -> &DataHash {
        match &self.rfc3161_record {
            Some(record) => &record.input_hash,
            None => self.aggregation_input_hash(),
        }
    }

    /// Round (aggregation) time
    pub fn aggregation_time(&self) -> Timestamp {
        self.calendar_chain.aggregation_time
    }

    pub fn publication_time(&self) -> Timestamp {
        self.calendar_chain.publication_time
    }

    pub fn is_extended(&self) -> bool {
        self.publication_record.is_some()
    }

    /// Copy of this signature anchored to `publication` through `calendar`.
    ///
    /// The calendar auth record, if any, does not carry over.
    pub fn extend(
        &self,
        calendar_chain: CalendarHashChain,
        publication_record: PublicationRecord,
    ) -> Result<Self, Error> {
        Self::assemble(SignatureParts {
            aggregation_chains: self.aggregation_chains.clone(),
            calendar_chain,
            calendar_auth_record: None,
            publication_record: Some(publication_record),
            rfc3161_record: self.rfc3161_record.clone(),
        })
    }
}

impl Fragment for Signature {
    fn encode_element(&self) -> Result<Element, keyless_codec::Error> {
        let mut children = Vec::with_capacity(self.aggregation_chains.len() + 3);

        for chain in &self.aggregation_chains {
            children.push(chain.encode_element()?);
        }

        children.push(self.calendar_chain.encode_element()?);

        if let Some(record) = &self.publication_record {
            children.push(record.encode_element()?);
        }

        if let Some(record) = &self.calendar_auth_record {
            children.push(record.encode_element()?);
        }

        if let Some(record) = &self.rfc3161_record {
            children.push(record.encode_element()?);
        }

        Element::composite(tags::SIGNATURE, &children)
    }

    fn decode_element(element: &Element) -> Result<Self, keyless_codec::Error> {
        element.expect_tag(tags::SIGNATURE)?;

        let mut aggregation_chains = vec![];
        let mut calendar_chain = None;
        let mut calendar_auth_record = None;
        let mut publication_record = None;
        let mut rfc3161_record = None;

        for child in element.children()? {
            let tag = child.tag();

            match tag {
                tags::AGGREGATION_CHAIN => {
                    aggregation_chains.push(AggregationHashChain::decode_element(&child)?)
                }
                tags::CALENDAR_CHAIN => set_once(
                    &mut calendar_chain,
                    CalendarHashChain::decode_element(&child)?,
                    tag,
                )?,
                tags::PUBLICATION_RECORD => set_once(
                    &mut publication_record,
                    PublicationRecord::decode_element(&child)?,
                    tag,
                )?,
                tags::CALENDAR_AUTH_RECORD => set_once(
                    &mut calendar_auth_record,
                    CalendarAuthRecord::decode_element(&child)?,
                    tag,
                )?,
                tags::RFC3161_RECORD => set_once(
                    &mut rfc3161_record,
                    Rfc3161Record::decode_element(&child)?,
                    tag,
                )?,
                // per-chain auth records are obsolete, nothing reads them
                tags::AGGREGATION_AUTH_RECORD => (),
                _ => child.ensure_skippable()?,
            }
        }

        let parts = SignatureParts {
            aggregation_chains,
            calendar_chain: calendar_chain
                .ok_or(keyless_codec::Error::MissingField("calendar chain"))?,
            calendar_auth_record,
            publication_record,
            rfc3161_record,
        };

        Self::assemble(parts).map_err(|err| keyless_codec::Error::message(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use keyless_crypto::hash::{HashAlgorithm, Hasher};

    use super::*;
    use crate::{PublicationData, SignatureData};

    const ROUND: Timestamp = 1_500_000_000;
    const PUBLISHED: Timestamp = 1_500_076_800;

    fn chain(index: &[u64]) -> AggregationHashChain {
        AggregationHashChain {
            aggregation_time: ROUND,
            chain_index: index.to_vec(),
            input_data: None,
            input_hash: Hasher::hash(HashAlgorithm::Sha2_256, format!("{index:?}").as_bytes()),
            aggregation_algorithm: HashAlgorithm::Sha2_256,
            links: vec![],
        }
    }

    fn calendar(publication_time: Timestamp) -> CalendarHashChain {
        CalendarHashChain {
            publication_time,
            aggregation_time: ROUND,
            input_hash: Hasher::hash(HashAlgorithm::Sha2_256, b"round"),
            links: vec![],
        }
    }

    fn publication_data(publication_time: Timestamp) -> PublicationData {
        PublicationData {
            publication_time,
            published_hash: Hasher::hash(HashAlgorithm::Sha2_256, b"root"),
        }
    }

    fn auth_record(publication_time: Timestamp) -> CalendarAuthRecord {
        CalendarAuthRecord {
            publication_data: publication_data(publication_time),
            signature_data: SignatureData {
                signature_type: "1.2.840.113549.1.1.11".into(),
                signature_value: vec![0xAB; 16],
                certificate_id: vec![1, 2, 3, 4],
                certificate_repository_uri: None,
            },
        }
    }

    fn parts() -> SignatureParts {
        SignatureParts {
            aggregation_chains: vec![chain(&[1]), chain(&[1, 3, 2]), chain(&[1, 3])],
            calendar_chain: calendar(ROUND),
            calendar_auth_record: Some(auth_record(ROUND)),
            publication_record: None,
            rfc3161_record: None,
        }
    }

    #[test]
    fn chains_are_ordered_bottom_to_top() {
        let signature = Signature::assemble(parts()).unwrap();

        let indices: Vec<_> = signature
            .aggregation_chains()
            .iter()
            .map(|x| x.chain_index.clone())
            .collect();

        assert_eq!(indices, vec![vec![1, 3, 2], vec![1, 3], vec![1]]);
        assert_eq!(signature.document_hash(), &chain(&[1, 3, 2]).input_hash);
    }

    #[test]
    fn gap_in_chain_indices_is_rejected() {
        let mut parts = parts();
        parts.aggregation_chains.remove(2);

        assert!(matches!(
            Signature::assemble(parts),
            Err(Error::ChainIndexNotNested { .. })
        ));
    }

    #[test]
    fn mixed_rounds_are_rejected() {
        let mut parts = parts();
        parts.aggregation_chains[1].aggregation_time += 1;

        assert!(matches!(
            Signature::assemble(parts),
            Err(Error::MixedRounds(ROUND, _))
        ));
    }

    #[test]
    fn empty_signature_is_rejected() {
        let mut parts = parts();
        parts.aggregation_chains.clear();

        assert!(matches!(
            Signature::assemble(parts),
            Err(Error::NoAggregationChains)
        ));
    }

    #[test]
    fn foreign_calendar_round_is_rejected() {
        let mut parts = parts();
        parts.calendar_chain.aggregation_time = ROUND - 1;

        assert!(matches!(
            Signature::assemble(parts),
            Err(Error::CalendarRoundMismatch { .. })
        ));
    }

    #[test]
    fn extension_replaces_auth_record() {
        let signature = Signature::assemble(parts()).unwrap();
        assert!(!signature.is_extended());

        let extended = signature
            .extend(
                calendar(PUBLISHED),
                PublicationRecord::new(publication_data(PUBLISHED)),
            )
            .unwrap();

        assert!(extended.is_extended());
        assert!(extended.calendar_auth_record().is_none());
        assert_eq!(extended.publication_time(), PUBLISHED);
        assert_eq!(extended.document_hash(), signature.document_hash());
    }

    #[test]
    fn extension_to_mismatching_publication_fails() {
        let signature = Signature::assemble(parts()).unwrap();

        let result = signature.extend(
            calendar(PUBLISHED),
            PublicationRecord::new(publication_data(PUBLISHED + 1)),
        );

        assert!(matches!(result, Err(Error::PublicationTimeMismatch { .. })));
    }

    #[test]
    fn tlv_encoding_survives_decoding() {
        let signature = Signature::assemble(parts()).unwrap();

        let bytes = signature.encode_fragment().unwrap();
        let decoded = Signature::decode_fragment(&bytes).unwrap();

        assert_eq!(decoded, signature);
    }

    #[test]
    fn aggregation_auth_record_is_skipped() {
        let signature = Signature::assemble(parts()).unwrap();
        let encoded = signature.encode_element().unwrap();

        let mut children = encoded.children().unwrap();
        children.push(Element::new(tags::AGGREGATION_AUTH_RECORD, vec![0x01, 0x00]));

        let element = Element::composite(tags::SIGNATURE, &children).unwrap();

        assert_eq!(Signature::decode_element(&element).unwrap(), signature);
    }
}
