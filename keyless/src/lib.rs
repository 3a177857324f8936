//! Rust-native building blocks for keyless signature infrastructures
//!
//! Keyless signatures prove that a document hash existed at a given second by
//! linking it, through hash chains, to a calendar whose roots are published.
//! This crate doesn't provide any particular application; it bundles the
//! codec, hashing, signature model and multi-signature storage crates.

#![warn(missing_docs)]

#[doc(inline)]
pub use keyless_codec as codec;

#[doc(inline)]
pub use keyless_crypto as crypto;

#[doc(inline)]
pub use keyless_primitives as primitives;

pub mod storage {
    //! Persistence of many signatures sharing the same substructures

    #[doc(inline)]
    pub use keyless_multisig as multisig;
}
