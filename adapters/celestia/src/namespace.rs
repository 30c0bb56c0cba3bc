use std::fmt::{Debug, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// The length of a namespace id, in bytes
pub const NAMESPACE_SIZE: usize = 8;

/// An identifier which groups shares in the data square. Every share starts with the
/// namespace of the blob it belongs to, and shares are ordered by namespace in the square.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    BorshDeserialize,
    BorshSerialize,
)]
pub struct Namespace(pub [u8; NAMESPACE_SIZE]);

/// Namespace of ordinary transactions
pub const TX_NAMESPACE: Namespace = Namespace([0, 0, 0, 0, 0, 0, 0, 1]);
/// Namespace of intermediate state roots
pub const INTERMEDIATE_STATE_ROOTS_NAMESPACE: Namespace = Namespace([0, 0, 0, 0, 0, 0, 0, 2]);
/// Namespace of evidence
pub const EVIDENCE_NAMESPACE: Namespace = Namespace([0, 0, 0, 0, 0, 0, 0, 3]);
/// Namespace of the (index wrapped) transactions that pay for blobs
pub const PFB_NAMESPACE: Namespace = Namespace([0, 0, 0, 0, 0, 0, 0, 4]);
/// The highest namespace reserved for the protocol itself
pub const MAX_RESERVED_NAMESPACE: Namespace = Namespace([0, 0, 0, 0, 0, 0, 0, 0xff]);
/// Namespace used to pad the square after the last blob
pub const TAIL_PADDING_NAMESPACE: Namespace =
    Namespace([0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe]);
/// Namespace of the erasure coded parity shares
pub const PARITY_SHARES_NAMESPACE: Namespace = Namespace([0xff; NAMESPACE_SIZE]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NamespaceError {
    #[error("namespace must be 8 bytes long, got {0}")]
    WrongLength(usize),
    #[error("namespace {0} is reserved for protocol use")]
    Reserved(Namespace),
    #[error("namespace {0} is the tail padding namespace")]
    TailPadding(Namespace),
    #[error("namespace {0} is the parity shares namespace")]
    ParityShares(Namespace),
}

impl Namespace {
    /// Builds a namespace from a slice, checking only its width
    pub fn from_slice(bytes: &[u8]) -> Result<Self, NamespaceError> {
        let inner: [u8; NAMESPACE_SIZE] = bytes
            .try_into()
            .map_err(|_| NamespaceError::WrongLength(bytes.len()))?;
        Ok(Self(inner))
    }

    /// Builds a namespace that a user may submit blobs to.
    pub fn new_blob(bytes: &[u8]) -> Result<Self, NamespaceError> {
        let namespace = Self::from_slice(bytes)?;
        namespace.validate_for_blob()?;
        Ok(namespace)
    }

    /// Checks that this namespace lies outside of every reserved range
    pub fn validate_for_blob(&self) -> Result<(), NamespaceError> {
        if *self == TAIL_PADDING_NAMESPACE {
            return Err(NamespaceError::TailPadding(*self));
        }
        if *self == PARITY_SHARES_NAMESPACE {
            return Err(NamespaceError::ParityShares(*self));
        }
        if self.is_reserved() {
            return Err(NamespaceError::Reserved(*self));
        }
        Ok(())
    }

    /// Returns true if this namespace belongs to the protocol rather than to users
    pub fn is_reserved(&self) -> bool {
        *self <= MAX_RESERVED_NAMESPACE
            || *self == TAIL_PADDING_NAMESPACE
            || *self == PARITY_SHARES_NAMESPACE
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Namespace {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; NAMESPACE_SIZE]> for Namespace {
    fn from(value: [u8; NAMESPACE_SIZE]) -> Self {
        Self(value)
    }
}

impl From<Namespace> for nmt_rs::NamespaceId<NAMESPACE_SIZE> {
    fn from(value: Namespace) -> Self {
        nmt_rs::NamespaceId(value.0)
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Debug for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Namespace(0x{})", hex::encode(self.0))
    }
}
