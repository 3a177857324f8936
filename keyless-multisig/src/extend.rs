use std::{collections::BTreeMap, sync::Arc};

use futures_util::future::BoxFuture;
use keyless_primitives::{CalendarHashChain, PublicationRecord, Signature, Timestamp};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{Container, Error};

#[derive(thiserror::Error, Debug)]
pub enum ExtendError {
    #[error("extending service is unavailable: {0}")]
    Unavailable(String),

    #[error("extending service refused the request: {0}")]
    Refused(String),

    #[error("invalid response from extending service: {0}")]
    InvalidResponse(String),
}

/// Network service building calendar chains from a round up to a publication.
///
/// The returned future must not borrow the extender, so requests can be
/// dispatched on their own tasks while the caller keeps working.
pub trait Extender: Send + Sync {
    fn extend(
        &self,
        round_time: Timestamp,
        publication_time: Option<Timestamp>,
    ) -> BoxFuture<'static, Result<CalendarHashChain, ExtendError>>;
}

impl<E: Extender + ?Sized> Extender for Arc<E> {
    fn extend(
        &self,
        round_time: Timestamp,
        publication_time: Option<Timestamp>,
    ) -> BoxFuture<'static, Result<CalendarHashChain, ExtendError>> {
        (**self).extend(round_time, publication_time)
    }
}

/// Source of published calendar roots
pub trait TrustAnchor {
    /// Earliest publication at or after `time`
    fn nearest_publication_at_or_after(&self, time: Timestamp) -> Option<PublicationRecord>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtensionReport {
    /// distinct requests sent to the extender
    pub requests: usize,

    /// signatures replaced by their extended copy
    pub extended: usize,
}

/// One extender request and every signature waiting for its answer
struct Request {
    round_time: Timestamp,
    publication: PublicationRecord,
    signatures: Vec<Signature>,
}

type Plan<K> = BTreeMap<K, Request>;

/// Upgrades the signatures of a [`Container`] to newer publications,
/// sending one extender request per distinct target.
pub struct ExtensionCoordinator<E> {
    extender: E,
}

impl<E: Extender> ExtensionCoordinator<E> {
    pub fn new(extender: E) -> Self {
        Self { extender }
    }

    pub fn extender(&self) -> &E {
        &self.extender
    }

    /// Anchors every signature not yet carrying a publication record to the
    /// first publication at or after its round.
    ///
    /// Signatures with no such publication are left untouched.
    pub async fn extend_to_closest_publication<T>(
        &self,
        container: &mut Container,
        trust_anchor: &T,
    ) -> Result<ExtensionReport, Error>
    where
        T: TrustAnchor + ?Sized,
    {
        let mut plan = Plan::new();

        for key in container.leaf_keys() {
            let signature = container.signature_at(&key)?;

            if signature.is_extended() {
                continue;
            }

            let round_time = signature.aggregation_time();

            let publication = match trust_anchor.nearest_publication_at_or_after(round_time) {
                Some(x) => x,
                None => {
                    debug!(round_time, "no publication covers the round yet");
                    continue;
                }
            };

            plan.entry((publication.publication_time(), round_time))
                .or_insert_with(|| Request {
                    round_time,
                    publication,
                    signatures: vec![],
                })
                .signatures
                .push(signature);
        }

        self.execute(container, plan).await
    }

    /// Anchors every signature registered before `publication` to it, even
    /// those already carrying another publication record.
    pub async fn extend_to_specific_publication(
        &self,
        container: &mut Container,
        publication: &PublicationRecord,
    ) -> Result<ExtensionReport, Error> {
        let target = publication.publication_time();
        let mut plan = Plan::new();

        for key in container.leaf_keys() {
            let signature = container.signature_at(&key)?;
            let round_time = signature.aggregation_time();

            if round_time >= target {
                continue;
            }

            if signature.publication_record() == Some(publication) {
                continue;
            }

            plan.entry(round_time)
                .or_insert_with(|| Request {
                    round_time,
                    publication: publication.clone(),
                    signatures: vec![],
                })
                .signatures
                .push(signature);
        }

        self.execute(container, plan).await
    }

    /// Dispatches every request before awaiting any, then swaps the
    /// signatures once every answer is in and persists a single time.
    ///
    /// Any failed request aborts the batch before the container is touched.
    async fn execute<K>(
        &self,
        container: &mut Container,
        plan: Plan<K>,
    ) -> Result<ExtensionReport, Error> {
        let requests = plan.len();

        let in_flight: Vec<(Request, JoinHandle<_>)> = plan
            .into_values()
            .map(|request| {
                let future = self.extender.extend(
                    request.round_time,
                    Some(request.publication.publication_time()),
                );

                (request, tokio::spawn(future))
            })
            .collect();

        debug!(requests, "extension requests dispatched");

        let mut upgrades = vec![];

        for (request, handle) in in_flight {
            let calendar_chain = handle.await?.map_err(|source| Error::Extend {
                round_time: request.round_time,
                source,
            })?;

            let mut swaps = vec![];

            for signature in request.signatures {
                let extended =
                    signature.extend(calendar_chain.clone(), request.publication.clone())?;
                swaps.push((signature, extended));
            }

            upgrades.push((request.round_time, swaps));
        }

        let extended: usize = upgrades.iter().map(|(_, swaps)| swaps.len()).sum();

        // every signature of a round moves together, even to an older publication
        for (round_time, swaps) in upgrades {
            for (old, _) in swaps.iter() {
                container.discard(old);
            }

            container.evict_calendar_chain(round_time);

            for (_, new) in swaps {
                container.insert(new);
            }
        }

        container.persist()?;

        info!(requests, extended, "signatures extended");

        Ok(ExtensionReport { requests, extended })
    }
}
