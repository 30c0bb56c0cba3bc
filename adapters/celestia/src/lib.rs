#![doc = include_str!("../README.md")]

pub mod blob;
pub mod blob_tx;
pub mod config;
pub mod consts;
pub mod namespace;
pub mod pfb;
pub mod share_commit;
pub mod shares;
pub mod tx;
mod utils;
pub mod verifier;

pub use blob::{Blob, BlobError};
pub use blob_tx::{is_blob_tx, unwrap, wrap, BlobTx, EnvelopeError};
pub use config::BlobVerifierConfig;
pub use namespace::{Namespace, NamespaceError};
pub use pfb::MsgPayForBlob;
pub use share_commit::{commit, create_commitment, subtree_boundaries, Commitment, Subtree};
pub use shares::{split_blob, Share, ShareError};
#[cfg(feature = "native")]
pub use verifier::parallel::{BlockValidationError, BlockVerifier};
pub use verifier::{
    check_tx, verify_blob, ChainParams, CheckedTx, PlacedBlobTx, SharePlacement, ValidationError,
};
