//! Wire envelopes around a base transaction.
//!
//! A [`BlobTx`] is what users gossip: the signed transaction plus the blobs it pays for. Only the
//! transaction ends up in the block, wrapped in an [`IndexWrapper`] that records where the
//! proposer placed each blob. Both envelopes are a four byte marker followed by a protobuf body,
//! so a plain transaction is told apart by looking at its first bytes.

use bytes::Bytes;
use prost::Message;
use tracing::debug;

use crate::blob::{Blob, BlobError};
use crate::consts::MALLEATED_TX_BYTES;
use crate::namespace::Namespace;

/// Marks a [`BlobTx`] envelope
pub const BLOB_TX_TYPE_ID: &[u8; 4] = b"BLOB";
/// Marks an [`IndexWrapper`] envelope
pub const INDEX_WRAPPER_TYPE_ID: &[u8; 4] = b"INDX";

const MARKER_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] prost::DecodeError),

    #[error("blob envelope carries no blobs")]
    NoBlobs,

    #[error("blob {index} of the envelope is invalid: {source}")]
    InvalidBlob {
        index: usize,
        #[source]
        source: BlobError,
    },
}

mod proto {
    use prost::bytes::Bytes;

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Blob {
        #[prost(bytes = "bytes", tag = "1")]
        pub namespace_id: Bytes,
        #[prost(bytes = "bytes", tag = "2")]
        pub data: Bytes,
        #[prost(uint32, tag = "3")]
        pub share_version: u32,
    }

    /// BlobTx wraps an encoded sdk.Tx with a second field to contain blobs of data.
    /// The raw bytes of the blobs are not signed over, instead we verify each blob
    /// using the relevant MsgPayForBlob that is signed over in the encoded sdk.Tx.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct BlobTx {
        #[prost(bytes = "bytes", tag = "1")]
        pub tx: Bytes,
        #[prost(message, repeated, tag = "2")]
        pub blobs: ::prost::alloc::vec::Vec<Blob>,
    }

    /// IndexWrapper adds the index of the first share of every blob to a paying transaction
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct IndexWrapper {
        #[prost(bytes = "bytes", tag = "1")]
        pub tx: Bytes,
        #[prost(uint32, repeated, tag = "2")]
        pub share_indexes: ::prost::alloc::vec::Vec<u32>,
    }
}

/// A base transaction together with the blobs it pays for, in the order of its paying messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobTx {
    pub tx: Bytes,
    pub blobs: Vec<Blob>,
}

impl BlobTx {
    pub fn new(tx: impl Into<Bytes>, blobs: Vec<Blob>) -> Result<Self, EnvelopeError> {
        if blobs.is_empty() {
            return Err(EnvelopeError::NoBlobs);
        }
        Ok(Self {
            tx: tx.into(),
            blobs,
        })
    }

    /// Serializes the envelope, marker included
    pub fn encode(&self) -> Vec<u8> {
        let message = proto::BlobTx {
            tx: self.tx.clone(),
            blobs: self
                .blobs
                .iter()
                .map(|blob| proto::Blob {
                    namespace_id: Bytes::copy_from_slice(blob.namespace().as_bytes()),
                    data: blob.data().clone(),
                    share_version: blob.share_version() as u32,
                })
                .collect(),
        };
        let mut out = Vec::with_capacity(MARKER_LEN + message.encoded_len());
        out.extend_from_slice(BLOB_TX_TYPE_ID);
        message
            .encode(&mut out)
            .expect("a Vec grows to fit the message");
        out
    }
}

/// Returns true if `raw` starts with the blob envelope marker
pub fn is_blob_tx(raw: &[u8]) -> bool {
    raw.starts_with(BLOB_TX_TYPE_ID)
}

/// Wraps a base transaction and the blobs it pays for into an envelope
pub fn wrap(tx: impl Into<Bytes>, blobs: &[Blob]) -> Result<Vec<u8>, EnvelopeError> {
    let blob_tx = BlobTx::new(tx, blobs.to_vec())?;
    let encoded = blob_tx.encode();
    debug!(
        blobs = blob_tx.blobs.len(),
        tx_len = blob_tx.tx.len(),
        envelope_len = encoded.len(),
        "Wrapped blob transaction"
    );
    Ok(encoded)
}

/// Unwraps a blob envelope.
///
/// Returns `Ok(None)` when `raw` is not a blob envelope at all. Every blob is validated before
/// anything is returned.
pub fn unwrap(raw: &[u8]) -> Result<Option<BlobTx>, EnvelopeError> {
    let Some(body) = raw.strip_prefix(BLOB_TX_TYPE_ID.as_slice()) else {
        return Ok(None);
    };
    let message = proto::BlobTx::decode(body)?;
    if message.blobs.is_empty() {
        return Err(EnvelopeError::NoBlobs);
    }

    let blobs = message
        .blobs
        .into_iter()
        .enumerate()
        .map(|(index, blob)| {
            blob_from_proto(blob).map_err(|source| EnvelopeError::InvalidBlob { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        blobs = blobs.len(),
        tx_len = message.tx.len(),
        "Unwrapped blob transaction"
    );
    Ok(Some(BlobTx {
        tx: message.tx,
        blobs,
    }))
}

fn blob_from_proto(blob: proto::Blob) -> Result<Blob, BlobError> {
    let namespace = Namespace::from_slice(&blob.namespace_id)?;
    let share_version = u8::try_from(blob.share_version)
        .map_err(|_| BlobError::UnsupportedShareVersion(blob.share_version))?;
    Blob::new(namespace, blob.data, share_version)
}

/// A paying transaction as recorded in the block, with the index of the first share of each blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexWrapper {
    pub tx: Bytes,
    pub share_indexes: Vec<u32>,
}

/// Wraps a paying transaction with the share indexes assigned to its blobs
pub fn wrap_index(tx: impl Into<Bytes>, share_indexes: &[u32]) -> Vec<u8> {
    let message = proto::IndexWrapper {
        tx: tx.into(),
        share_indexes: share_indexes.to_vec(),
    };
    let mut out = Vec::with_capacity(MARKER_LEN + message.encoded_len());
    out.extend_from_slice(INDEX_WRAPPER_TYPE_ID);
    message
        .encode(&mut out)
        .expect("a Vec grows to fit the message");
    out
}

/// Unwraps an index wrapper. Returns `Ok(None)` when `raw` is not one.
pub fn unwrap_index(raw: &[u8]) -> Result<Option<IndexWrapper>, EnvelopeError> {
    let Some(body) = raw.strip_prefix(INDEX_WRAPPER_TYPE_ID.as_slice()) else {
        return Ok(None);
    };
    let message = proto::IndexWrapper::decode(body)?;
    Ok(Some(IndexWrapper {
        tx: message.tx,
        share_indexes: message.share_indexes,
    }))
}

/// Upper bound on the size of a paying transaction of `tx_len` bytes once recorded in the block
/// with `blob_count` share indexes. Every blob costs at most [`MALLEATED_TX_BYTES`].
pub fn recorded_tx_size_bound(tx_len: usize, blob_count: usize) -> usize {
    MARKER_LEN
        + 1
        + prost::length_delimiter_len(tx_len)
        + tx_len
        + blob_count.saturating_mul(MALLEATED_TX_BYTES)
}
