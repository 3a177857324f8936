//! Deduplicating container for keyless signatures.
//!
//! Signatures issued in the same aggregation round share most of their
//! structure: the upper aggregation chains, the calendar chain and whatever
//! anchors the calendar chain (an auth record or a publication record). The
//! [`Container`] stores each of those substructures once, rebuilds any
//! individual [`Signature`](keyless_primitives::Signature) on demand and only
//! drops a substructure once no remaining signature resolves through it.
//!
//! ```no_run
//! use keyless_multisig::{Container, ContainerConfig};
//!
//! let config = ContainerConfig::new("signatures.bin");
//! let container = Container::open(&config)?;
//!
//! println!("{} signatures", container.leaf_keys().len());
//! # Ok::<(), keyless_multisig::Error>(())
//! ```

use keyless_crypto::hash::DataHash;
use keyless_primitives::Timestamp;
use thiserror::Error;

mod chains;
mod config;
mod container;
mod extend;
mod key;
mod persist;
mod publications;
mod store;

pub use chains::ChainIndex;
pub use config::{ContainerConfig, WriteMode};
pub use container::Container;
pub use extend::{ExtendError, ExtensionCoordinator, ExtensionReport, Extender, TrustAnchor};
pub use key::HierarchicalKey;
pub use persist::{FileSink, MemorySink, Sink, MAGIC};
pub use publications::PublicationsFile;
pub use store::DedupStore;

#[derive(Error, Debug)]
pub enum Error {
    #[error("not a multi-signature container, magic bytes don't match")]
    BadMagic,

    #[error("not a publications file, magic bytes don't match")]
    BadPublicationsMagic,

    #[error("malformed record")]
    Codec(#[from] keyless_codec::Error),

    #[error("inconsistent signature")]
    Signature(#[from] keyless_primitives::Error),

    #[error("no signature for document hash {0}")]
    NotFound(DataHash),

    #[error("aggregation chain {0} is missing from the container")]
    MissingChain(HierarchicalKey),

    #[error("no calendar chain for round {0}")]
    MissingCalendarChain(Timestamp),

    #[error("extending round {round_time} failed")]
    Extend {
        round_time: Timestamp,
        #[source]
        source: ExtendError,
    },

    #[error("extension task didn't complete")]
    Task(#[from] tokio::task::JoinError),

    #[error("invalid configuration")]
    Config(#[from] serde_json::Error),

    #[error("io error")]
    Io(#[from] std::io::Error),
}
