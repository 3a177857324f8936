#![allow(dead_code)]

use keyless_crypto::hash::{DataHash, HashAlgorithm, Hasher};
use keyless_primitives::{
    AggregationHashChain, AggregationLink, CalendarAuthRecord, CalendarHashChain, LinkDirection,
    LinkSibling, PublicationData, PublicationRecord, Rfc3161Record, Signature, SignatureData,
    SignatureParts, Timestamp,
};

pub const ROUND: Timestamp = 1_500_000_000;
pub const PUBLISHED: Timestamp = 1_500_076_800;

/// What anchors the calendar chain of a fixture signature
#[derive(Debug, Clone, Copy)]
pub enum Anchor {
    /// unextended, calendar chain published at the round itself
    Auth,
    Publication(Timestamp),
}

impl Anchor {
    fn publication_time(self, round: Timestamp) -> Timestamp {
        match self {
            Anchor::Auth => round,
            Anchor::Publication(x) => x,
        }
    }
}

/// Routes library events to the test output; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish(),
    );
}

pub fn document(label: &str) -> DataHash {
    Hasher::hash(HashAlgorithm::Sha2_256, label.as_bytes())
}

/// Aggregation chain at `index`; inner chains of a round are identical
/// whichever signature they come from
pub fn aggregation_chain(
    round: Timestamp,
    index: &[u64],
    input_hash: DataHash,
) -> AggregationHashChain {
    AggregationHashChain {
        aggregation_time: round,
        chain_index: index.to_vec(),
        input_data: None,
        input_hash,
        aggregation_algorithm: HashAlgorithm::Sha2_256,
        links: vec![AggregationLink {
            direction: LinkDirection::Left,
            level_correction: 0,
            sibling: LinkSibling::Hash(Hasher::hash(
                HashAlgorithm::Sha2_256,
                format!("{round}{index:?}").as_bytes(),
            )),
        }],
    }
}

fn inner_input(round: Timestamp, index: &[u64]) -> DataHash {
    Hasher::hash(HashAlgorithm::Sha2_256, format!("{round}{index:?}/in").as_bytes())
}

pub fn calendar_chain(round: Timestamp, publication_time: Timestamp) -> CalendarHashChain {
    CalendarHashChain {
        publication_time,
        aggregation_time: round,
        input_hash: Hasher::hash(HashAlgorithm::Sha2_256, &round.to_be_bytes()),
        links: vec![],
    }
}

pub fn publication_data(publication_time: Timestamp) -> PublicationData {
    PublicationData {
        publication_time,
        published_hash: Hasher::hash(HashAlgorithm::Sha2_256, &publication_time.to_be_bytes()),
    }
}

pub fn publication_record(publication_time: Timestamp) -> PublicationRecord {
    let mut record = PublicationRecord::new(publication_data(publication_time));
    record.references.push(format!("ref: {publication_time}"));
    record
}

pub fn auth_record(publication_time: Timestamp) -> CalendarAuthRecord {
    CalendarAuthRecord {
        publication_data: publication_data(publication_time),
        signature_data: SignatureData {
            signature_type: "1.2.840.113549.1.1.11".into(),
            signature_value: vec![0x5A; 32],
            certificate_id: vec![0x9C, 0x3A, 0x11, 0x02],
            certificate_repository_uri: Some("https://example.org/cert".into()),
        },
    }
}

/// Signature of `input` at the bottom of `path`, one aggregation chain per
/// prefix of the path
pub fn signature_with_input(
    round: Timestamp,
    path: &[u64],
    input: DataHash,
    anchor: Anchor,
) -> Signature {
    let aggregation_chains = (1..=path.len())
        .rev()
        .map(|len| {
            let index = &path[..len];

            match len == path.len() {
                true => aggregation_chain(round, index, input.clone()),
                false => aggregation_chain(round, index, inner_input(round, index)),
            }
        })
        .collect();

    let publication_time = anchor.publication_time(round);

    let (calendar_auth_record, publication_record) = match anchor {
        Anchor::Auth => (Some(auth_record(publication_time)), None),
        Anchor::Publication(_) => (None, Some(publication_record(publication_time))),
    };

    Signature::assemble(SignatureParts {
        aggregation_chains,
        calendar_chain: calendar_chain(round, publication_time),
        calendar_auth_record,
        publication_record,
        rfc3161_record: None,
    })
    .unwrap()
}

pub fn signature(round: Timestamp, path: &[u64], label: &str, anchor: Anchor) -> Signature {
    signature_with_input(round, path, document(label), anchor)
}

/// Legacy signature whose lowest chain takes the RFC 3161 output hash
pub fn legacy_signature(round: Timestamp, path: &[u64], label: &str) -> Signature {
    legacy_signature_under(round, path, label, HashAlgorithm::Sha2_256)
}

/// Legacy signature whose lowest chain input is the RFC 3161 output hash
/// computed with `algorithm`
pub fn legacy_signature_under(
    round: Timestamp,
    path: &[u64],
    label: &str,
    algorithm: HashAlgorithm,
) -> Signature {
    let record = Rfc3161Record {
        aggregation_time: round,
        chain_index: path.to_vec(),
        input_hash: document(label),
        tst_info_prefix: vec![0x30, 0x82, 0x01, 0x2C],
        tst_info_suffix: vec![0x18, 0x0F],
        tst_info_algorithm: HashAlgorithm::Sha2_256,
        signed_attributes_prefix: vec![0x31, 0x81, 0xA4],
        signed_attributes_suffix: vec![],
        signed_attributes_algorithm: HashAlgorithm::Sha2_256,
    };

    let plain = signature_with_input(
        round,
        path,
        record.output_hash(algorithm),
        Anchor::Auth,
    );

    let mut parts = plain.into_parts();
    parts.rfc3161_record = Some(record);

    Signature::assemble(parts).unwrap()
}

/// Three signatures sharing round [`ROUND`]: five aggregation chains, three
/// leaves, one calendar chain and one auth record once stored
pub fn shared_round() -> Vec<Signature> {
    vec![
        signature(ROUND, &[1, 1], "first", Anchor::Auth),
        signature(ROUND, &[1, 2], "second", Anchor::Auth),
        signature(ROUND, &[1, 3, 1], "third", Anchor::Auth),
    ]
}
