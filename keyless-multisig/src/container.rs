use std::{collections::BTreeSet, fs::File, io::BufReader, io::Read};

use keyless_codec::Fragment;
use keyless_crypto::hash::{DataHash, HashAlgorithm};
use keyless_primitives::{
    CalendarAuthRecord, CalendarHashChain, PublicationRecord, Rfc3161Record, Signature,
    SignatureParts, Timestamp,
};
use tracing::{debug, info, warn};

use crate::{
    persist::{write_image, Image},
    ChainIndex, ContainerConfig, DedupStore, Error, FileSink, HierarchicalKey, MemorySink, Sink,
};

/// Many signatures, each substructure stored once.
///
/// Calendar chains are keyed by round, auth and publication records by
/// publication time and RFC 3161 records by the legacy document hash. Every
/// mutating call rewrites the whole image through the container's [`Sink`];
/// the in-memory state is authoritative, the sink only mirrors it.
pub struct Container {
    chains: ChainIndex,
    calendar_chains: DedupStore<Timestamp, CalendarHashChain>,
    auth_records: DedupStore<Timestamp, CalendarAuthRecord>,
    publication_records: DedupStore<Timestamp, PublicationRecord>,
    rfc3161_records: DedupStore<DataHash, Rfc3161Record>,
    sink: Box<dyn Sink>,
}

impl Container {
    pub fn with_sink(sink: impl Sink + 'static) -> Self {
        Self {
            chains: ChainIndex::new(),
            calendar_chains: DedupStore::new(|x: &CalendarHashChain| x.aggregation_time),
            auth_records: DedupStore::new(CalendarAuthRecord::publication_time),
            publication_records: DedupStore::new(PublicationRecord::publication_time),
            rfc3161_records: DedupStore::new(|x: &Rfc3161Record| x.input_hash.clone()),
            sink: Box::new(sink),
        }
    }

    /// An empty container that keeps its image in memory
    pub fn in_memory() -> Self {
        Self::with_sink(MemorySink::default())
    }

    /// Loads the container at `config.path`, creating an empty one if the
    /// file doesn't exist yet.
    pub fn open(config: &ContainerConfig) -> Result<Self, Error> {
        let sink = FileSink::new(&config.path, config.write_mode);

        if !config.path.exists() {
            info!(path = %config.path.display(), "creating empty container");

            let mut container = Self::with_sink(sink);
            container.persist()?;

            return Ok(container);
        }

        let file = File::open(&config.path)?;
        let container = Self::load(BufReader::new(file), sink)?;

        info!(
            path = %config.path.display(),
            signatures = container.leaf_keys().len(),
            "container loaded"
        );

        Ok(container)
    }

    /// Parses a container image; later writes go to `sink`
    pub fn load<R: Read>(reader: R, sink: impl Sink + 'static) -> Result<Self, Error> {
        let image = Image::read_from(reader)?;
        let mut container = Self::with_sink(sink);

        container.chains.add(image.aggregation_chains);

        for chain in image.calendar_chains {
            container.calendar_chains.add(chain);
        }

        for record in image.auth_records {
            container.auth_records.add(record);
        }

        for record in image.publication_records {
            container.publication_records.add(record);
        }

        for record in image.rfc3161_records {
            container.rfc3161_records.add(record);
        }

        debug!(
            aggregation_chains = container.aggregation_chain_count(),
            calendar_chains = container.calendar_chain_count(),
            "container image parsed"
        );

        Ok(container)
    }

    /// Encodes the full container image
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let records = self
            .chains
            .chains()
            .map(|x| x.encode_element())
            .chain(self.calendar_chains.values().map(|x| x.encode_element()))
            .chain(self.auth_records.values().map(|x| x.encode_element()))
            .chain(self.publication_records.values().map(|x| x.encode_element()))
            .chain(self.rfc3161_records.values().map(|x| x.encode_element()));

        let mut out = Vec::new();
        write_image(&mut out, records)?;

        Ok(out)
    }

    /// Rewrites the whole image through the sink
    pub fn persist(&mut self) -> Result<(), Error> {
        let image = self.to_bytes()?;
        self.sink.write_image(&image)?;

        debug!(bytes = image.len(), "container persisted");

        Ok(())
    }

    pub fn add(&mut self, signature: Signature) -> Result<(), Error> {
        self.insert(signature);
        self.persist()
    }

    pub fn get(&self, document_hash: &DataHash) -> Result<Signature, Error> {
        let key = self
            .resolve(document_hash)
            .ok_or_else(|| Error::NotFound(document_hash.clone()))?;

        self.signature_at(&key)
    }

    /// Removes the signature for `document_hash`, returning it
    pub fn remove(&mut self, document_hash: &DataHash) -> Result<Signature, Error> {
        let signature = self.get(document_hash)?;

        self.discard(&signature);
        self.persist()?;

        Ok(signature)
    }

    /// Algorithms of the input hashes of every stored aggregation chain
    pub fn used_hash_algorithms(&self) -> BTreeSet<HashAlgorithm> {
        self.chains
            .chains()
            .map(|x| x.input_hash.algorithm())
            .collect()
    }

    /// Lowest aggregation chain key of every stored signature
    pub fn leaf_keys(&self) -> Vec<HierarchicalKey> {
        self.chains.leaf_keys().to_vec()
    }

    pub fn aggregation_chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn calendar_chain_count(&self) -> usize {
        self.calendar_chains.len()
    }

    pub fn auth_record_count(&self) -> usize {
        self.auth_records.len()
    }

    pub fn publication_record_count(&self) -> usize {
        self.publication_records.len()
    }

    pub fn rfc3161_record_count(&self) -> usize {
        self.rfc3161_records.len()
    }

    /// Legacy documents are looked up through the hash their RFC 3161 record
    /// fed into the aggregation tree; every algorithm in use is a candidate.
    fn resolve(&self, document_hash: &DataHash) -> Option<HierarchicalKey> {
        if let Some(record) = self.rfc3161_records.get(document_hash) {
            let found = self
                .used_hash_algorithms()
                .into_iter()
                .find_map(|algorithm| self.chains.resolve(&record.output_hash(algorithm)));

            if let Some(key) = found {
                return Some(key.clone());
            }
        }

        self.chains.resolve(document_hash).cloned()
    }

    /// Reassembles the signature whose lowest aggregation chain is `key`
    pub fn signature_at(&self, key: &HierarchicalKey) -> Result<Signature, Error> {
        let aggregation_chains = self.chains.chain_path(key)?;

        let round = aggregation_chains
            .last()
            .map(|x| x.aggregation_time)
            .unwrap_or(key.round_time());

        let calendar_chain = self
            .calendar_chains
            .get(&round)
            .cloned()
            .ok_or(Error::MissingCalendarChain(round))?;

        let publication_record = self
            .publication_records
            .get(&calendar_chain.publication_time)
            .cloned();

        let calendar_auth_record = match publication_record {
            Some(_) => None,
            None => self
                .auth_records
                .get(&calendar_chain.publication_time)
                .cloned(),
        };

        let rfc3161_record = self
            .rfc3161_records
            .values()
            .find(|x| x.aggregation_time == key.round_time() && x.chain_index == key.path())
            .cloned();

        let signature = Signature::assemble(SignatureParts {
            aggregation_chains,
            calendar_chain,
            calendar_auth_record,
            publication_record,
            rfc3161_record,
        })?;

        Ok(signature)
    }

    /// Decomposes `signature` into the stores, without persisting
    pub(crate) fn insert(&mut self, signature: Signature) {
        let round = signature.aggregation_time();
        let publication_time = signature.publication_time();
        let parts = signature.into_parts();

        let added = self.chains.add(parts.aggregation_chains);

        if let Some(stored) = self.calendar_chains.get(&round) {
            let stale = stored.publication_time;

            if stale < publication_time {
                warn!(round, stale, publication_time, "superseding calendar chain");

                self.calendar_chains.remove_key(&round);
                self.discard_unreferenced_records(stale);
            }
        }

        self.calendar_chains.add(parts.calendar_chain);

        let current = self.calendar_chains.get(&round).map(|x| x.publication_time);

        if current == Some(publication_time) {
            match (parts.publication_record, parts.calendar_auth_record) {
                (Some(record), _) => {
                    self.publication_records.add(record);
                }
                (None, Some(record)) => {
                    self.auth_records.add(record);
                }
                (None, None) => (),
            }
        } else {
            debug!(round, publication_time, "newer calendar chain already stored");
        }

        if let Some(record) = parts.rfc3161_record {
            self.rfc3161_records.add(record);
        }

        debug!(round, new_chains = added, "signature added");
    }

    /// Deletes every substructure of `signature` no other stored signature
    /// still uses, without persisting.
    ///
    /// Works from the leaves of the dependency graph up so that references
    /// are never counted against something already deleted.
    pub(crate) fn discard(&mut self, signature: &Signature) {
        if let Some(record) = signature.rfc3161_record() {
            self.rfc3161_records.remove(record);
        }

        for chain in signature.aggregation_chains() {
            let key = HierarchicalKey::of_chain(chain);

            if self.chains.count_referencing(&key) < 1 {
                self.chains.remove(&key);
            }
        }

        let round = signature.aggregation_time();

        if self.chains.count_in_round(round) < 1 {
            self.calendar_chains.remove_key(&round);
        }

        self.discard_unreferenced_records(signature.publication_time());
        self.chains.reindex();

        debug!(round, document = %signature.document_hash(), "signature removed");
    }

    /// Drops the calendar chain of `round` regardless of its publication
    /// time, along with the records nothing else references.
    pub(crate) fn evict_calendar_chain(&mut self, round: Timestamp) {
        if let Some(stale) = self.calendar_chains.remove_key(&round) {
            self.discard_unreferenced_records(stale.publication_time);
        }
    }

    fn discard_unreferenced_records(&mut self, publication_time: Timestamp) {
        let references = self
            .calendar_chains
            .count_matching(|_, x| x.publication_time == publication_time);

        if references < 1 {
            self.publication_records.remove_key(&publication_time);
            self.auth_records.remove_key(&publication_time);
        }
    }
}
