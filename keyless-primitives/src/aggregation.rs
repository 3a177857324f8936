use keyless_codec::{utils::set_once, Element, Fragment};
use keyless_crypto::hash::{DataHash, HashAlgorithm, Hasher};

use crate::{tags, Error, Timestamp};

const AGGREGATION_TIME: u16 = 0x02;
const CHAIN_INDEX: u16 = 0x03;
const INPUT_DATA: u16 = 0x04;
const INPUT_HASH: u16 = 0x05;
const AGGREGATION_ALGORITHM: u16 = 0x06;

const LEVEL_CORRECTION: u16 = 0x01;
const SIBLING_HASH: u16 = 0x02;
const LEGACY_ID: u16 = 0x03;
const METADATA: u16 = 0x04;

/// Side of the hash step the *current* value sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkDirection {
    /// current value is the left operand, sibling on the right
    Left,
    /// sibling is the left operand, current value on the right
    Right,
}

impl LinkDirection {
    pub fn tag(&self) -> u16 {
        match self {
            LinkDirection::Left => tags::LEFT_LINK,
            LinkDirection::Right => tags::RIGHT_LINK,
        }
    }

    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            tags::LEFT_LINK => Some(LinkDirection::Left),
            tags::RIGHT_LINK => Some(LinkDirection::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LinkSibling {
    Hash(DataHash),
    LegacyId(Vec<u8>),
    /// client metadata, hashed as its full TLV encoding
    Metadata(Element),
}

impl LinkSibling {
    fn feed(&self, hasher: &mut Hasher) -> Result<(), Error> {
        match self {
            LinkSibling::Hash(x) => hasher.input_imprint(x),
            LinkSibling::LegacyId(x) => hasher.input(x),
            LinkSibling::Metadata(x) => x.write_to(hasher)?,
        }

        Ok(())
    }

    fn to_element(&self) -> Element {
        match self {
            LinkSibling::Hash(x) => x.to_element(SIBLING_HASH),
            LinkSibling::LegacyId(x) => Element::new(LEGACY_ID, x.clone()),
            LinkSibling::Metadata(x) => x.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregationLink {
    pub direction: LinkDirection,
    pub level_correction: u64,
    pub sibling: LinkSibling,
}

impl AggregationLink {
    fn encode_element(&self) -> Result<Element, keyless_codec::Error> {
        let mut children = Vec::with_capacity(2);

        if self.level_correction > 0 {
            children.push(Element::from_u64(LEVEL_CORRECTION, self.level_correction));
        }

        children.push(self.sibling.to_element());

        Element::composite(self.direction.tag(), &children)
    }

    fn decode_element(
        direction: LinkDirection,
        element: &Element,
    ) -> Result<Self, keyless_codec::Error> {
        let mut level_correction = None;
        let mut sibling = None;

        for child in element.children()? {
            match child.tag() {
                LEVEL_CORRECTION => {
                    set_once(&mut level_correction, child.decode_u64()?, LEVEL_CORRECTION)?
                }
                SIBLING_HASH => set_once(
                    &mut sibling,
                    LinkSibling::Hash(DataHash::from_element(&child)?),
                    SIBLING_HASH,
                )?,
                LEGACY_ID => set_once(
                    &mut sibling,
                    LinkSibling::LegacyId(child.content().to_vec()),
                    LEGACY_ID,
                )?,
                METADATA => set_once(&mut sibling, LinkSibling::Metadata(child), METADATA)?,
                _ => child.ensure_skippable()?,
            }
        }

        Ok(Self {
            direction,
            level_correction: level_correction.unwrap_or_default(),
            sibling: sibling.ok_or(keyless_codec::Error::MissingField("link sibling"))?,
        })
    }
}

/// Proof linking an input hash to the output of one aggregation level.
///
/// `chain_index` locates the chain inside the aggregation forest of its
/// round: chains closer to the document extend the index of the chain they
/// feed into by one element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregationHashChain {
    pub aggregation_time: Timestamp,
    pub chain_index: Vec<u64>,
    pub input_data: Option<Vec<u8>>,
    pub input_hash: DataHash,
    pub aggregation_algorithm: HashAlgorithm,
    pub links: Vec<AggregationLink>,
}

impl AggregationHashChain {
    /// Runs every link over the input hash.
    ///
    /// Each link raises the level by its correction plus one; the level byte
    /// is appended to every step.
    pub fn output_hash(&self) -> Result<DataHash, Error> {
        let mut level = 0u64;
        let mut current = self.input_hash.clone();

        for link in &self.links {
            level = level
                .saturating_add(link.level_correction)
                .saturating_add(1);

            if level > u8::MAX as u64 {
                return Err(Error::LevelOverflow(level));
            }

            let mut hasher = Hasher::new(self.aggregation_algorithm);

            match link.direction {
                LinkDirection::Left => {
                    hasher.input_imprint(&current);
                    link.sibling.feed(&mut hasher)?;
                }
                LinkDirection::Right => {
                    link.sibling.feed(&mut hasher)?;
                    hasher.input_imprint(&current);
                }
            }

            hasher.input(&[level as u8]);
            current = hasher.finalize();
        }

        Ok(current)
    }
}

impl Fragment for AggregationHashChain {
    fn encode_element(&self) -> Result<Element, keyless_codec::Error> {
        let mut children = vec![Element::from_u64(AGGREGATION_TIME, self.aggregation_time)];

        children.extend(
            self.chain_index
                .iter()
                .map(|x| Element::from_u64(CHAIN_INDEX, *x)),
        );

        if let Some(data) = &self.input_data {
            children.push(Element::new(INPUT_DATA, data.clone()));
        }

        children.push(self.input_hash.to_element(INPUT_HASH));
        children.push(Element::new(
            AGGREGATION_ALGORITHM,
            vec![self.aggregation_algorithm.id()],
        ));

        for link in &self.links {
            children.push(link.encode_element()?);
        }

        Element::composite(tags::AGGREGATION_CHAIN, &children)
    }

    fn decode_element(element: &Element) -> Result<Self, keyless_codec::Error> {
        element.expect_tag(tags::AGGREGATION_CHAIN)?;

        let mut aggregation_time = None;
        let mut chain_index = vec![];
        let mut input_data = None;
        let mut input_hash = None;
        let mut aggregation_algorithm = None;
        let mut links = vec![];

        for child in element.children()? {
            match child.tag() {
                AGGREGATION_TIME => {
                    set_once(&mut aggregation_time, child.decode_u64()?, AGGREGATION_TIME)?
                }
                CHAIN_INDEX => chain_index.push(child.decode_u64()?),
                INPUT_DATA => set_once(&mut input_data, child.content().to_vec(), INPUT_DATA)?,
                INPUT_HASH => {
                    set_once(&mut input_hash, DataHash::from_element(&child)?, INPUT_HASH)?
                }
                AGGREGATION_ALGORITHM => {
                    let algorithm = decode_algorithm(&child)?;
                    set_once(&mut aggregation_algorithm, algorithm, AGGREGATION_ALGORITHM)?
                }
                tag => match LinkDirection::from_tag(tag) {
                    Some(direction) => links.push(AggregationLink::decode_element(direction, &child)?),
                    None => child.ensure_skippable()?,
                },
            }
        }

        Ok(Self {
            aggregation_time: aggregation_time
                .ok_or(keyless_codec::Error::MissingField("aggregation time"))?,
            chain_index,
            input_data,
            input_hash: input_hash.ok_or(keyless_codec::Error::MissingField("input hash"))?,
            aggregation_algorithm: aggregation_algorithm
                .ok_or(keyless_codec::Error::MissingField("aggregation algorithm"))?,
            links,
        })
    }
}

/// Algorithm elements hold the id as an unsigned integer
pub(crate) fn decode_algorithm(element: &Element) -> Result<HashAlgorithm, keyless_codec::Error> {
    let id = element.decode_u64()?;

    u8::try_from(id)
        .ok()
        .and_then(|id| HashAlgorithm::from_id(id).ok())
        .ok_or_else(|| {
            keyless_codec::Error::message(format!(
                "unknown hash algorithm {id} in element {:#x}",
                element.tag()
            ))
        })
}
