use keyless_codec::{utils::set_once, Element, Fragment};
use keyless_crypto::hash::{DataHash, Hasher};

use crate::{tags, Error, LinkDirection, Timestamp};

const PUBLICATION_TIME: u16 = 0x01;
const AGGREGATION_TIME: u16 = 0x02;
const INPUT_HASH: u16 = 0x05;

/// Marker byte closing every calendar hash step
const CALENDAR_STEP_MARKER: u8 = 0xFF;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalendarLink {
    pub direction: LinkDirection,
    pub sibling: DataHash,
}

/// Proof linking the output of an aggregation round to the calendar root
/// published at `publication_time`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalendarHashChain {
    pub publication_time: Timestamp,
    /// the round this chain registers, also called registration time
    pub aggregation_time: Timestamp,
    pub input_hash: DataHash,
    pub links: Vec<CalendarLink>,
}

fn high_bit(value: u64) -> u64 {
    1 << (63 - value.leading_zeros())
}

impl CalendarHashChain {
    /// Each step uses the algorithm of its sibling
    pub fn output_hash(&self) -> DataHash {
        let mut current = self.input_hash.clone();

        for link in &self.links {
            let mut hasher = Hasher::new(link.sibling.algorithm());

            match link.direction {
                LinkDirection::Left => {
                    hasher.input_imprint(&current);
                    hasher.input_imprint(&link.sibling);
                }
                LinkDirection::Right => {
                    hasher.input_imprint(&link.sibling);
                    hasher.input_imprint(&current);
                }
            }

            hasher.input(&[CALENDAR_STEP_MARKER]);
            current = hasher.finalize();
        }

        current
    }

    /// Derives the registered second from the publication time and the shape
    /// of the chain.
    ///
    /// The calendar is a binary tree over every second up to the publication
    /// time; walking the links from the root down halves the candidate range
    /// at each step.
    pub fn registration_time(
        publication_time: Timestamp,
        links: &[CalendarLink],
    ) -> Result<Timestamp, Error> {
        let mut remaining = publication_time;
        let mut time = 0u64;

        for link in links.iter().rev() {
            if remaining == 0 {
                return Err(Error::InvalidCalendarShape(publication_time));
            }

            let high = high_bit(remaining);

            match link.direction {
                LinkDirection::Left => remaining = high - 1,
                LinkDirection::Right => {
                    time += high;
                    remaining -= high;
                }
            }
        }

        if remaining != 0 {
            return Err(Error::InvalidCalendarShape(publication_time));
        }

        Ok(time)
    }
}

impl Fragment for CalendarHashChain {
    fn encode_element(&self) -> Result<Element, keyless_codec::Error> {
        let mut children = vec![
            Element::from_u64(PUBLICATION_TIME, self.publication_time),
            Element::from_u64(AGGREGATION_TIME, self.aggregation_time),
            self.input_hash.to_element(INPUT_HASH),
        ];

        children.extend(
            self.links
                .iter()
                .map(|x| x.sibling.to_element(x.direction.tag())),
        );

        Element::composite(tags::CALENDAR_CHAIN, &children)
    }

    fn decode_element(element: &Element) -> Result<Self, keyless_codec::Error> {
        element.expect_tag(tags::CALENDAR_CHAIN)?;

        let mut publication_time = None;
        let mut aggregation_time = None;
        let mut input_hash = None;
        let mut links = vec![];

        for child in element.children()? {
            match child.tag() {
                PUBLICATION_TIME => {
                    set_once(&mut publication_time, child.decode_u64()?, PUBLICATION_TIME)?
                }
                AGGREGATION_TIME => {
                    set_once(&mut aggregation_time, child.decode_u64()?, AGGREGATION_TIME)?
                }
                INPUT_HASH => {
                    set_once(&mut input_hash, DataHash::from_element(&child)?, INPUT_HASH)?
                }
                tag => match LinkDirection::from_tag(tag) {
                    Some(direction) => links.push(CalendarLink {
                        direction,
                        sibling: DataHash::from_element(&child)?,
                    }),
                    None => child.ensure_skippable()?,
                },
            }
        }

        let publication_time =
            publication_time.ok_or(keyless_codec::Error::MissingField("publication time"))?;

        let aggregation_time = match aggregation_time {
            Some(x) => x,
            None => Self::registration_time(publication_time, &links)
                .map_err(|err| keyless_codec::Error::message(err.to_string()))?,
        };

        Ok(Self {
            publication_time,
            aggregation_time,
            input_hash: input_hash.ok_or(keyless_codec::Error::MissingField("input hash"))?,
            links,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyless_crypto::hash::HashAlgorithm;
    use test_case::test_case;

    fn link(direction: LinkDirection) -> CalendarLink {
        CalendarLink {
            direction,
            sibling: Hasher::hash(HashAlgorithm::Sha2_256, b"sibling"),
        }
    }

    #[test_case(0, &[], 0)]
    #[test_case(1, &[LinkDirection::Right], 1)]
    #[test_case(1, &[LinkDirection::Left], 0)]
    #[test_case(2, &[LinkDirection::Right], 2)]
    #[test_case(2, &[LinkDirection::Right, LinkDirection::Left], 1)]
    #[test_case(2, &[LinkDirection::Left, LinkDirection::Left], 0)]
    fn registration_time(publication: u64, shape: &[LinkDirection], expected: u64) {
        let links: Vec<_> = shape.iter().map(|x| link(*x)).collect();

        assert_eq!(
            CalendarHashChain::registration_time(publication, &links).unwrap(),
            expected
        );
    }

    #[test]
    fn inconsistent_shape_is_rejected() {
        assert!(matches!(
            CalendarHashChain::registration_time(5, &[]),
            Err(Error::InvalidCalendarShape(5))
        ));
    }

    #[test]
    fn missing_aggregation_time_is_derived() {
        let element = Element::composite(
            tags::CALENDAR_CHAIN,
            &[
                Element::from_u64(PUBLICATION_TIME, 2),
                Hasher::hash(HashAlgorithm::Sha2_256, b"root").to_element(INPUT_HASH),
                link(LinkDirection::Right).sibling.to_element(tags::RIGHT_LINK),
                link(LinkDirection::Left).sibling.to_element(tags::LEFT_LINK),
            ],
        )
        .unwrap();

        let chain = CalendarHashChain::decode_element(&element).unwrap();

        assert_eq!(chain.aggregation_time, 1);
        assert_eq!(chain.links.len(), 2);
    }

    #[test]
    fn output_uses_sibling_algorithm() {
        let sibling = Hasher::hash(HashAlgorithm::Sha2_512, b"sibling");
        let input = Hasher::hash(HashAlgorithm::Sha2_256, b"round");

        let chain = CalendarHashChain {
            publication_time: 1,
            aggregation_time: 0,
            input_hash: input.clone(),
            links: vec![CalendarLink {
                direction: LinkDirection::Left,
                sibling: sibling.clone(),
            }],
        };

        let mut expected = Hasher::new(HashAlgorithm::Sha2_512);
        expected.input_imprint(&input);
        expected.input_imprint(&sibling);
        expected.input(&[0xFF]);

        assert_eq!(chain.output_hash(), expected.finalize());
    }
}
