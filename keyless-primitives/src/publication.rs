use keyless_codec::{utils::set_once, Element, Fragment};
use keyless_crypto::hash::DataHash;

use crate::{tags, Timestamp};

const PUBLICATION_TIME: u16 = 0x02;
const PUBLISHED_HASH: u16 = 0x04;
const PUBLICATION_REFERENCE: u16 = 0x09;
const REPOSITORY_URI: u16 = 0x0A;

const SIGNATURE_TYPE: u16 = 0x01;
const SIGNATURE_VALUE: u16 = 0x02;
const CERTIFICATE_ID: u16 = 0x03;
const CERTIFICATE_REPOSITORY_URI: u16 = 0x04;

/// A calendar root hash and the second it covers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicationData {
    pub publication_time: Timestamp,
    pub published_hash: DataHash,
}

impl PublicationData {
    fn encode_element(&self) -> Result<Element, keyless_codec::Error> {
        Element::composite(
            tags::PUBLICATION_DATA,
            &[
                Element::from_u64(PUBLICATION_TIME, self.publication_time),
                self.published_hash.to_element(PUBLISHED_HASH),
            ],
        )
    }

    fn decode_element(element: &Element) -> Result<Self, keyless_codec::Error> {
        element.expect_tag(tags::PUBLICATION_DATA)?;

        let mut publication_time = None;
        let mut published_hash = None;

        for child in element.children()? {
            match child.tag() {
                PUBLICATION_TIME => {
                    set_once(&mut publication_time, child.decode_u64()?, PUBLICATION_TIME)?
                }
                PUBLISHED_HASH => set_once(
                    &mut published_hash,
                    DataHash::from_element(&child)?,
                    PUBLISHED_HASH,
                )?,
                _ => child.ensure_skippable()?,
            }
        }

        Ok(Self {
            publication_time: publication_time
                .ok_or(keyless_codec::Error::MissingField("publication time"))?,
            published_hash: published_hash
                .ok_or(keyless_codec::Error::MissingField("published hash"))?,
        })
    }
}

/// Publication data plus where it was printed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicationRecord {
    pub publication_data: PublicationData,
    pub references: Vec<String>,
    pub repository_uris: Vec<String>,
}

impl PublicationRecord {
    pub fn new(publication_data: PublicationData) -> Self {
        Self {
            publication_data,
            references: vec![],
            repository_uris: vec![],
        }
    }

    pub fn publication_time(&self) -> Timestamp {
        self.publication_data.publication_time
    }

    pub fn published_hash(&self) -> &DataHash {
        &self.publication_data.published_hash
    }

    /// Same record body under a different outer tag, publications files and
    /// signatures disagree on it
    pub fn encode_element_with_tag(&self, tag: u16) -> Result<Element, keyless_codec::Error> {
        let mut children = vec![self.publication_data.encode_element()?];

        children.extend(
            self.references
                .iter()
                .map(|x| Element::from_string(PUBLICATION_REFERENCE, x)),
        );

        children.extend(
            self.repository_uris
                .iter()
                .map(|x| Element::from_string(REPOSITORY_URI, x)),
        );

        Element::composite(tag, &children)
    }

    pub fn decode_element_with_tag(
        element: &Element,
        tag: u16,
    ) -> Result<Self, keyless_codec::Error> {
        element.expect_tag(tag)?;

        let mut publication_data = None;
        let mut references = vec![];
        let mut repository_uris = vec![];

        for child in element.children()? {
            match child.tag() {
                tags::PUBLICATION_DATA => set_once(
                    &mut publication_data,
                    PublicationData::decode_element(&child)?,
                    tags::PUBLICATION_DATA,
                )?,
                PUBLICATION_REFERENCE => references.push(child.decode_string()?),
                REPOSITORY_URI => repository_uris.push(child.decode_string()?),
                _ => child.ensure_skippable()?,
            }
        }

        Ok(Self {
            publication_data: publication_data
                .ok_or(keyless_codec::Error::MissingField("publication data"))?,
            references,
            repository_uris,
        })
    }
}

impl Fragment for PublicationRecord {
    fn encode_element(&self) -> Result<Element, keyless_codec::Error> {
        self.encode_element_with_tag(tags::PUBLICATION_RECORD)
    }

    fn decode_element(element: &Element) -> Result<Self, keyless_codec::Error> {
        Self::decode_element_with_tag(element, tags::PUBLICATION_RECORD)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureData {
    pub signature_type: String,
    pub signature_value: Vec<u8>,
    pub certificate_id: Vec<u8>,
    pub certificate_repository_uri: Option<String>,
}

impl SignatureData {
    fn encode_element(&self) -> Result<Element, keyless_codec::Error> {
        let mut children = vec![
            Element::from_string(SIGNATURE_TYPE, &self.signature_type),
            Element::new(SIGNATURE_VALUE, self.signature_value.clone()),
            Element::new(CERTIFICATE_ID, self.certificate_id.clone()),
        ];

        if let Some(uri) = &self.certificate_repository_uri {
            children.push(Element::from_string(CERTIFICATE_REPOSITORY_URI, uri));
        }

        Element::composite(tags::SIGNATURE_DATA, &children)
    }

    fn decode_element(element: &Element) -> Result<Self, keyless_codec::Error> {
        element.expect_tag(tags::SIGNATURE_DATA)?;

        let mut signature_type = None;
        let mut signature_value = None;
        let mut certificate_id = None;
        let mut certificate_repository_uri = None;

        for child in element.children()? {
            match child.tag() {
                SIGNATURE_TYPE => {
                    set_once(&mut signature_type, child.decode_string()?, SIGNATURE_TYPE)?
                }
                SIGNATURE_VALUE => set_once(
                    &mut signature_value,
                    child.content().to_vec(),
                    SIGNATURE_VALUE,
                )?,
                CERTIFICATE_ID => {
                    set_once(&mut certificate_id, child.content().to_vec(), CERTIFICATE_ID)?
                }
                CERTIFICATE_REPOSITORY_URI => set_once(
                    &mut certificate_repository_uri,
                    child.decode_string()?,
                    CERTIFICATE_REPOSITORY_URI,
                )?,
                _ => child.ensure_skippable()?,
            }
        }

        Ok(Self {
            signature_type: signature_type
                .ok_or(keyless_codec::Error::MissingField("signature type"))?,
            signature_value: signature_value
                .ok_or(keyless_codec::Error::MissingField("signature value"))?,
            certificate_id: certificate_id
                .ok_or(keyless_codec::Error::MissingField("certificate id"))?,
            certificate_repository_uri,
        })
    }
}

/// Calendar root signed by the service, valid until a publication catches up
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalendarAuthRecord {
    pub publication_data: PublicationData,
    pub signature_data: SignatureData,
}

impl CalendarAuthRecord {
    pub fn publication_time(&self) -> Timestamp {
        self.publication_data.publication_time
    }
}

impl Fragment for CalendarAuthRecord {
    fn encode_element(&self) -> Result<Element, keyless_codec::Error> {
        Element::composite(
            tags::CALENDAR_AUTH_RECORD,
            &[
                self.publication_data.encode_element()?,
                self.signature_data.encode_element()?,
            ],
        )
    }

    fn decode_element(element: &Element) -> Result<Self, keyless_codec::Error> {
        element.expect_tag(tags::CALENDAR_AUTH_RECORD)?;

        let mut publication_data = None;
        let mut signature_data = None;

        for child in element.children()? {
            match child.tag() {
                tags::PUBLICATION_DATA => set_once(
                    &mut publication_data,
                    PublicationData::decode_element(&child)?,
                    tags::PUBLICATION_DATA,
                )?,
                tags::SIGNATURE_DATA => set_once(
                    &mut signature_data,
                    SignatureData::decode_element(&child)?,
                    tags::SIGNATURE_DATA,
                )?,
                _ => child.ensure_skippable()?,
            }
        }

        Ok(Self {
            publication_data: publication_data
                .ok_or(keyless_codec::Error::MissingField("publication data"))?,
            signature_data: signature_data
                .ok_or(keyless_codec::Error::MissingField("signature data"))?,
        })
    }
}
