use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub mod address;
#[cfg(feature = "native")]
pub mod parallel;

use crate::blob::{Blob, BlobError};
use crate::blob_tx::{self, recorded_tx_size_bound, BlobTx, EnvelopeError};
use crate::consts::{DEFAULT_MAX_SQUARE_SIZE, DEFAULT_MAX_TX_BYTES, DEFAULT_MIN_SQUARE_SIZE};
use crate::namespace::Namespace;
use crate::pfb::MsgPayForBlob;
use crate::share_commit::{create_commitment_within, subtree_alignment, Commitment};
use crate::tx::{decode_tx_messages, Tx, TxMessage};

use self::address::AddressError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("share commitment {expected} does not match the blob, which commits to {actual}")]
    CommitmentMismatch {
        expected: Commitment,
        actual: Commitment,
    },

    #[error("paying messages and their blobs must be submitted together in a blob transaction")]
    BloblessPayingMessage,

    #[error("transaction pays for {messages} blobs but carries {blobs}")]
    BlobCountMismatch { messages: usize, blobs: usize },

    #[error("transaction records {share_indexes} share indexes for {blobs} blobs")]
    ShareIndexCountMismatch { share_indexes: usize, blobs: usize },

    #[error("message pays for namespace {message} but the blob is in namespace {blob}")]
    NamespaceMismatch { message: Namespace, blob: Namespace },

    #[error("message pays for {message} bytes but the blob is {blob} bytes long")]
    BlobSizeMismatch { message: u32, blob: u32 },

    #[error("message uses share version {message} but the blob uses {blob}")]
    ShareVersionMismatch { message: u32, blob: u8 },

    #[error("message pays for an empty blob")]
    ZeroBlobSize,

    #[error("share commitment must be 32 bytes long, got {0}")]
    InvalidCommitmentLength(usize),

    #[error("invalid signer: {0}")]
    InvalidSigner(AddressError),

    #[error("square size {square_size} is not a power of two between {min} and {max}")]
    InvalidSquareSize {
        square_size: usize,
        min: usize,
        max: usize,
    },

    #[error("invalid chain parameters: {0}")]
    InvalidChainParams(&'static str),

    #[error("blob starting at share {start_index} is not aligned to {alignment} shares")]
    MisalignedBlob { start_index: usize, alignment: usize },

    #[error("blob of {share_count} shares starting at share {start_index} does not fit in a square of width {square_size}")]
    BlobOutOfSquare {
        start_index: usize,
        share_count: usize,
        square_size: usize,
    },

    #[error("recorded transaction may take {size} bytes, more than the limit of {max}")]
    TxTooLarge { size: usize, max: usize },

    #[error("failed to decode transaction: {0}")]
    InvalidTx(#[from] prost::DecodeError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

/// Consensus parameters the verifier checks against. Passed explicitly to every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainParams {
    /// Narrowest original data square a block may use
    pub min_square_size: usize,
    /// Widest original data square a block may use
    pub max_square_size: usize,
    /// Largest transaction, as recorded in the block
    pub max_tx_bytes: usize,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            min_square_size: DEFAULT_MIN_SQUARE_SIZE,
            max_square_size: DEFAULT_MAX_SQUARE_SIZE,
            max_tx_bytes: DEFAULT_MAX_TX_BYTES,
        }
    }
}

impl ChainParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.min_square_size.is_power_of_two() || !self.max_square_size.is_power_of_two() {
            return Err(ValidationError::InvalidChainParams(
                "square sizes must be powers of two",
            ));
        }
        if self.min_square_size > self.max_square_size {
            return Err(ValidationError::InvalidChainParams(
                "min_square_size exceeds max_square_size",
            ));
        }
        if self.max_square_size.checked_mul(self.max_square_size).is_none() {
            return Err(ValidationError::InvalidChainParams(
                "max_square_size squared overflows",
            ));
        }
        if self.max_tx_bytes == 0 {
            return Err(ValidationError::InvalidChainParams(
                "max_tx_bytes must be positive",
            ));
        }
        Ok(())
    }

    /// The most shares a single blob may span. One share of the widest square is always left
    /// for the paying transaction.
    pub fn max_blob_shares(&self) -> usize {
        self.max_square_size
            .saturating_mul(self.max_square_size)
            .saturating_sub(1)
    }

    /// Returns the number of shares in a square of width `square_size`
    fn check_square_size(&self, square_size: usize) -> Result<usize, ValidationError> {
        let total_shares = square_size.checked_mul(square_size);
        match total_shares {
            Some(total)
                if square_size.is_power_of_two()
                    && square_size >= self.min_square_size
                    && square_size <= self.max_square_size =>
            {
                Ok(total)
            }
            _ => Err(ValidationError::InvalidSquareSize {
                square_size,
                min: self.min_square_size,
                max: self.max_square_size,
            }),
        }
    }
}

/// Where the proposer put the first share of a blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePlacement {
    /// Width of the original data square
    pub square_size: usize,
    /// Row-major index of the first share of the blob
    pub start_index: usize,
}

/// Checks that `blob`, placed at `placement` in a finished square, is the blob `msg` paid for.
///
/// The placement is checked first. A legal placement never changes the commitment, so the
/// commitment is recomputed with the same subtrees the signer used.
pub fn verify_blob(
    msg: &MsgPayForBlob,
    blob: &Blob,
    placement: SharePlacement,
    params: &ChainParams,
) -> Result<(), ValidationError> {
    let SharePlacement {
        square_size,
        start_index,
    } = placement;
    let total_shares = params.check_square_size(square_size)?;

    let share_count = blob.share_count();
    let max_shares = params.max_blob_shares();
    if share_count > max_shares {
        return Err(BlobError::BlobTooLarge {
            share_count,
            max_shares,
        }
        .into());
    }

    let fits = start_index
        .checked_add(share_count)
        .map_or(false, |end| end <= total_shares);
    if !fits {
        return Err(ValidationError::BlobOutOfSquare {
            start_index,
            share_count,
            square_size,
        });
    }

    let alignment = subtree_alignment(share_count, square_size);
    if start_index % alignment != 0 {
        return Err(ValidationError::MisalignedBlob {
            start_index,
            alignment,
        });
    }

    check_commitment(msg, blob, max_shares)
}

/// Checks that the message describes `blob` and commits to its contents
fn check_commitment(
    msg: &MsgPayForBlob,
    blob: &Blob,
    max_shares: usize,
) -> Result<(), ValidationError> {
    let namespace = msg.namespace()?;
    if namespace != blob.namespace() {
        return Err(ValidationError::NamespaceMismatch {
            message: namespace,
            blob: blob.namespace(),
        });
    }
    if msg.blob_size != blob.size() {
        return Err(ValidationError::BlobSizeMismatch {
            message: msg.blob_size,
            blob: blob.size(),
        });
    }
    if msg.share_version != blob.share_version() as u32 {
        return Err(ValidationError::ShareVersionMismatch {
            message: msg.share_version,
            blob: blob.share_version(),
        });
    }

    let expected = msg.commitment()?;
    let actual = create_commitment_within(blob, max_shares)?;
    if expected != actual {
        return Err(ValidationError::CommitmentMismatch { expected, actual });
    }
    Ok(())
}

/// Extracts the paying messages of a base transaction, in order. Every message kind is matched
/// here so that a new kind has to decide whether it pays for blobs.
fn paying_messages(tx: &[u8]) -> Result<Vec<MsgPayForBlob>, ValidationError> {
    let mut paying = Vec::new();
    for message in decode_tx_messages(tx)? {
        match message {
            TxMessage::PayForBlob(msg) => paying.push(msg),
            TxMessage::Other(_) => {}
        }
    }
    Ok(paying)
}

/// Pairs the paying messages of a blob transaction with its blobs
fn paired_messages(blob_tx: &BlobTx) -> Result<Vec<MsgPayForBlob>, ValidationError> {
    let messages = paying_messages(&blob_tx.tx)?;
    if messages.is_empty() {
        return Err(ValidationError::BloblessPayingMessage);
    }
    if messages.len() != blob_tx.blobs.len() {
        return Err(ValidationError::BlobCountMismatch {
            messages: messages.len(),
            blobs: blob_tx.blobs.len(),
        });
    }
    Ok(messages)
}

/// The outcome of admitting a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckedTx {
    /// A transaction that carries no blobs and pays for none
    Plain,
    /// A blob transaction whose blobs all match their paying messages
    Blob(BlobTx),
}

/// Admission check for a transaction entering the mempool.
///
/// The check is done before the square is known, so commitments are recomputed with the
/// signing-time subtrees only. Rejections are final.
pub fn check_tx(raw: &[u8], params: &ChainParams) -> Result<CheckedTx, ValidationError> {
    let result = check_tx_inner(raw, params);
    match &result {
        Ok(CheckedTx::Blob(blob_tx)) => {
            debug!(blobs = blob_tx.blobs.len(), "Admitted blob transaction")
        }
        Ok(CheckedTx::Plain) => {}
        Err(error) => warn!(%error, tx_len = raw.len(), "Rejected transaction"),
    }
    result
}

fn check_tx_inner(raw: &[u8], params: &ChainParams) -> Result<CheckedTx, ValidationError> {
    let Some(blob_tx) = blob_tx::unwrap(raw)? else {
        return check_plain_tx(raw, params);
    };

    let messages = paired_messages(&blob_tx)?;

    let size = recorded_tx_size_bound(blob_tx.tx.len(), blob_tx.blobs.len());
    if size > params.max_tx_bytes {
        return Err(ValidationError::TxTooLarge {
            size,
            max: params.max_tx_bytes,
        });
    }

    let max_shares = params.max_blob_shares();
    for (msg, blob) in messages.iter().zip(&blob_tx.blobs) {
        msg.validate_basic()?;
        check_commitment(msg, blob, max_shares)?;
    }
    Ok(CheckedTx::Blob(blob_tx))
}

fn check_plain_tx(raw: &[u8], params: &ChainParams) -> Result<CheckedTx, ValidationError> {
    if raw.len() > params.max_tx_bytes {
        return Err(ValidationError::TxTooLarge {
            size: raw.len(),
            max: params.max_tx_bytes,
        });
    }
    // Transactions that are not in the base format pay for nothing
    let Ok(tx) = <Tx as prost::Message>::decode(raw) else {
        return Ok(CheckedTx::Plain);
    };
    for any in tx.body.into_iter().flat_map(|body| body.messages) {
        match TxMessage::from_any(any)? {
            TxMessage::PayForBlob(_) => return Err(ValidationError::BloblessPayingMessage),
            TxMessage::Other(_) => {}
        }
    }
    Ok(CheckedTx::Plain)
}

/// A blob transaction as laid out in a finished block: the envelope contents and the index
/// of the first share of every blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedBlobTx {
    pub blob_tx: BlobTx,
    pub share_indexes: Vec<u32>,
}

/// Checks every blob of a transaction against its actual placement in a square of width
/// `square_size`
pub fn verify_placed_tx(
    placed: &PlacedBlobTx,
    square_size: usize,
    params: &ChainParams,
) -> Result<(), ValidationError> {
    let messages = paired_messages(&placed.blob_tx)?;
    if placed.share_indexes.len() != placed.blob_tx.blobs.len() {
        return Err(ValidationError::ShareIndexCountMismatch {
            share_indexes: placed.share_indexes.len(),
            blobs: placed.blob_tx.blobs.len(),
        });
    }

    for ((msg, blob), start_index) in messages
        .iter()
        .zip(&placed.blob_tx.blobs)
        .zip(&placed.share_indexes)
    {
        let placement = SharePlacement {
            square_size,
            start_index: *start_index as usize,
        };
        verify_blob(msg, blob, placement, params)?;
    }
    Ok(())
}
