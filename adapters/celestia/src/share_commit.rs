use std::fmt::{Debug, Display, Formatter};
use std::ops::Range;

use borsh::{BorshDeserialize, BorshSerialize};
use nmt_rs::simple_merkle::db::MemDb;
use nmt_rs::{NamespaceMerkleHasher, NamespaceMerkleTree, NamespacedHash, NamespacedSha2Hasher};
use serde::{Deserialize, Serialize};
use tendermint::crypto::default::Sha256;
use tendermint::merkle::simple_hash_from_byte_vectors;
use tracing::debug;

use crate::blob::{Blob, BlobError};
use crate::namespace::NAMESPACE_SIZE;
use crate::shares::{sparse_shares_needed, Share};
use crate::utils::round_down_power_of_two;

/// The length of a share commitment, in bytes
pub const COMMITMENT_LEN: usize = 32;

/// The root of one subtree: its minimum and maximum namespace and a sha256 digest
pub type SubtreeRoot = NamespacedHash<NAMESPACE_SIZE>;

/// A namespaced Merkle tree over 8 byte namespaces. Parity shares never widen the namespace
/// range of a node.
pub type BlobNmt =
    NamespaceMerkleTree<MemDb<SubtreeRoot>, NamespacedSha2Hasher<NAMESPACE_SIZE>, NAMESPACE_SIZE>;

/// The size of a serialized subtree root
pub const SUBTREE_ROOT_LEN: usize = 2 * NAMESPACE_SIZE + 32;

/// The Merkle root over the subtree roots of a blob's shares. A user signs over it before
/// the square the blob lands in is known.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    BorshDeserialize,
    BorshSerialize,
)]
pub struct Commitment(pub [u8; COMMITMENT_LEN]);

impl Commitment {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Commitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<'a> TryFrom<&'a [u8]> for Commitment {
    type Error = std::array::TryFromSliceError;

    fn try_from(value: &'a [u8]) -> Result<Self, Self::Error> {
        Ok(Self(value.try_into()?))
    }
}

impl Display for Commitment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Debug for Commitment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Commitment(0x{})", hex::encode(self.0))
    }
}

/// A run of consecutive shares of a blob whose namespaced Merkle root is one leaf of the
/// share commitment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subtree {
    /// Index of the first share of the subtree, relative to the first share of the blob
    pub start: usize,
    /// Number of shares in the subtree
    pub len: usize,
}

impl Subtree {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Splits a blob of `share_count` shares into subtrees, following the non-interactive default
/// rules: repeatedly peel off the largest power of two that fits in the remaining shares.
///
/// The result depends only on the share count, so the signer and every validator derive the
/// same subtrees no matter where the blob ends up in the square.
pub fn subtree_boundaries(share_count: usize) -> Result<Vec<Subtree>, BlobError> {
    subtree_boundaries_with_max_width(share_count, usize::MAX)
}

/// Like [`subtree_boundaries`], but no subtree is wider than `max_width`. `max_width` is
/// rounded down to a power of two.
pub fn subtree_boundaries_with_max_width(
    share_count: usize,
    max_width: usize,
) -> Result<Vec<Subtree>, BlobError> {
    if share_count == 0 {
        return Err(BlobError::EmptyBlob);
    }
    let max_width = round_down_power_of_two(max_width.max(1));
    Ok(power_of_2_mountain_range(share_count, max_width)
        .into_iter()
        .scan(0, |cursor, len| {
            let start = *cursor;
            *cursor += len;
            Some(Subtree { start, len })
        })
        .collect())
}

// power_of_2_mountain_range returns the heights of the subtrees for binary merkle
// mountain range
fn power_of_2_mountain_range(mut len: usize, max_width: usize) -> Vec<usize> {
    let mut output = Vec::new();

    while len != 0 {
        let p = round_down_power_of_two(len).min(max_width);
        output.push(p);
        len -= p;
    }
    output
}

/// The alignment a blob's first share must honor in a square of width `square_size`.
///
/// Subtrees narrower than a row then sit inside a single row at an aligned position, and
/// wider subtrees cover whole rows, so the commitment signed before placement stays valid.
pub fn subtree_alignment(share_count: usize, square_size: usize) -> usize {
    round_down_power_of_two(share_count)
        .min(square_size)
        .max(1)
}

/// Returns the smallest power of two `k` such that a `k * k` square holds `share_count` shares
pub fn blob_min_square_size(share_count: usize) -> usize {
    let mut square_size = 1usize;
    while square_size.saturating_mul(square_size) < share_count {
        square_size <<= 1;
    }
    square_size
}

/// Computes the namespaced Merkle root of every subtree
pub fn subtree_roots(
    shares: &[Share],
    boundaries: &[Subtree],
) -> Result<Vec<SubtreeRoot>, BlobError> {
    if shares.is_empty() {
        return Err(BlobError::EmptyBlob);
    }
    check_partition(shares.len(), boundaries)?;

    let mut roots = Vec::with_capacity(boundaries.len());
    for subtree in boundaries {
        let mut tree = BlobNmt::with_hasher(NamespacedSha2Hasher::with_ignore_max_ns(true));
        for share in &shares[subtree.range()] {
            tree.push_leaf(share.as_serialized(), share.namespace().into())
                .map_err(|_| BlobError::InvalidSubtrees {
                    share_count: shares.len(),
                })?;
        }
        roots.push(tree.root());
    }
    Ok(roots)
}

/// Serializes a subtree root as `min_namespace || max_namespace || digest`, the leaf format of
/// the commitment tree
pub fn subtree_root_bytes(root: &SubtreeRoot) -> [u8; SUBTREE_ROOT_LEN] {
    let mut out = [0u8; SUBTREE_ROOT_LEN];
    out[..NAMESPACE_SIZE].copy_from_slice(&root.min_namespace().0);
    out[NAMESPACE_SIZE..2 * NAMESPACE_SIZE].copy_from_slice(&root.max_namespace().0);
    out[2 * NAMESPACE_SIZE..].copy_from_slice(&root.hash());
    out
}

fn check_partition(share_count: usize, boundaries: &[Subtree]) -> Result<(), BlobError> {
    let mut cursor = 0;
    for subtree in boundaries {
        if subtree.start != cursor || subtree.len == 0 {
            return Err(BlobError::InvalidSubtrees { share_count });
        }
        cursor += subtree.len;
    }
    if cursor != share_count {
        return Err(BlobError::InvalidSubtrees { share_count });
    }
    Ok(())
}

/// Folds the roots of the given subtrees into a share commitment
pub fn commit(shares: &[Share], boundaries: &[Subtree]) -> Result<Commitment, BlobError> {
    let roots: Vec<_> = subtree_roots(shares, boundaries)?
        .iter()
        .map(subtree_root_bytes)
        .collect();
    Ok(Commitment(simple_hash_from_byte_vectors::<Sha256>(&roots)))
}

/// Computes the share commitment of a blob
pub fn create_commitment(blob: &Blob) -> Commitment {
    let shares = blob.to_shares();
    let boundaries = subtree_boundaries(shares.len())
        .expect("a valid blob always occupies at least one share");
    let commitment = commit(&shares, &boundaries)
        .expect("boundaries derived from the share count partition the shares");
    debug!(
        namespace = %blob.namespace(),
        share_count = shares.len(),
        subtrees = boundaries.len(),
        %commitment,
        "Computed share commitment"
    );
    commitment
}

/// Computes the share commitment of a blob, refusing to hash blobs that span more than
/// `max_shares` shares.
pub fn create_commitment_within(blob: &Blob, max_shares: usize) -> Result<Commitment, BlobError> {
    let share_count = sparse_shares_needed(blob.data().len());
    if share_count > max_shares {
        return Err(BlobError::BlobTooLarge {
            share_count,
            max_shares,
        });
    }
    Ok(create_commitment(blob))
}
