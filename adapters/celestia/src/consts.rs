//! Consensus-critical sizes and limits shared by the share splitter, the commitment builder
//! and the blob transaction codecs.

use crate::namespace::NAMESPACE_SIZE;

/// The size of a share, in bytes
pub const SHARE_SIZE: usize = 512;

/// The length of the "info byte" field in a share. It carries the share version in the
/// upper seven bits and the sequence start indicator in the lowest bit.
pub const SHARE_INFO_BYTES: usize = 1;

/// The length of the "sequence length" field, present only in the first share of a blob
pub const SEQUENCE_LEN_BYTES: usize = 4;

/// The number of blob bytes carried by the first share of a blob
pub const FIRST_SPARSE_SHARE_CONTENT_SIZE: usize =
    SHARE_SIZE - NAMESPACE_SIZE - SHARE_INFO_BYTES - SEQUENCE_LEN_BYTES;

/// The number of blob bytes carried by every share after the first one
pub const CONTINUATION_SPARSE_SHARE_CONTENT_SIZE: usize =
    SHARE_SIZE - NAMESPACE_SIZE - SHARE_INFO_BYTES;

/// The first share version. It is the only one currently understood by this crate.
pub const SHARE_VERSION_ZERO: u8 = 0;

/// Share versions occupy the upper seven bits of the info byte
pub const MAX_SHARE_VERSION: u8 = 127;

/// Share versions a blob may be committed with
pub const SUPPORTED_SHARE_VERSIONS: &[u8] = &[SHARE_VERSION_ZERO];

/// The smallest original data square width a block may use
pub const DEFAULT_MIN_SQUARE_SIZE: usize = 1;

/// The widest original data square a block may use, unless the chain overrides it
pub const DEFAULT_MAX_SQUARE_SIZE: usize = 128;

/// The overhead bytes added to a paying transaction for every blob it references once the
/// transaction is recorded in a block: 32 for the content hash reference, 4 for the uint32
/// share index and 3 for protobuf framing.
pub const MALLEATED_TX_BYTES: usize = 32 + 4 + 3;

/// The default ceiling for a recorded transaction, mirroring the consensus engine's 1MB limit
pub const DEFAULT_MAX_TX_BYTES: usize = 1024 * 1024;

/// Returns `true` if `version` is a share version blobs can be committed with
pub fn is_supported_share_version(version: u8) -> bool {
    SUPPORTED_SHARE_VERSIONS.contains(&version)
}
