//! Signature structures and TLV codec for the keyless signature infrastructure
//!
//! A signature is a composition of independently shareable parts: a path of
//! aggregation hash chains, one calendar hash chain and, optionally, a
//! calendar authentication record or a publication record plus an RFC 3161
//! legacy record. Each part maps to one TLV element (see [`tags`]).

use thiserror::Error;

mod aggregation;
mod calendar;
mod publication;
mod rfc3161;
mod signature;

pub use aggregation::*;
pub use calendar::*;
pub use publication::*;
pub use rfc3161::*;
pub use signature::*;

pub use keyless_codec::{Element, Fragment};
pub use keyless_crypto::hash::{DataHash, HashAlgorithm, Hasher};

/// Seconds since the unix epoch, the resolution of every time in a signature
pub type Timestamp = u64;

pub mod tags {
    pub const SIGNATURE: u16 = 0x0800;
    pub const AGGREGATION_CHAIN: u16 = 0x0801;
    pub const CALENDAR_CHAIN: u16 = 0x0802;
    pub const PUBLICATION_RECORD: u16 = 0x0803;
    pub const AGGREGATION_AUTH_RECORD: u16 = 0x0804;
    pub const CALENDAR_AUTH_RECORD: u16 = 0x0805;
    pub const RFC3161_RECORD: u16 = 0x0806;

    /// Publication record as it appears in a publications file
    pub const PUBLICATIONS_FILE_RECORD: u16 = 0x0703;

    pub const PUBLICATION_DATA: u16 = 0x10;
    pub const SIGNATURE_DATA: u16 = 0x0B;

    pub const LEFT_LINK: u16 = 0x07;
    pub const RIGHT_LINK: u16 = 0x08;
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("tlv codec error")]
    Codec(#[from] keyless_codec::Error),

    #[error("signature has no aggregation chains")]
    NoAggregationChains,

    #[error("aggregation chains belong to different rounds ({0} and {1})")]
    MixedRounds(Timestamp, Timestamp),

    #[error("chain index {child:?} is not nested directly under {parent:?}")]
    ChainIndexNotNested { child: Vec<u64>, parent: Vec<u64> },

    #[error("calendar chain of round {calendar} doesn't match aggregation round {aggregation}")]
    CalendarRoundMismatch {
        calendar: Timestamp,
        aggregation: Timestamp,
    },

    #[error("record published at {record} doesn't match calendar publication time {calendar}")]
    PublicationTimeMismatch {
        record: Timestamp,
        calendar: Timestamp,
    },

    #[error("aggregation level {0} exceeds 255")]
    LevelOverflow(u64),

    #[error("calendar chain shape is not consistent with publication time {0}")]
    InvalidCalendarShape(Timestamp),
}
