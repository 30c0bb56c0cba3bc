use std::io;

use borsh::{BorshDeserialize, BorshSerialize};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::consts::{is_supported_share_version, SHARE_VERSION_ZERO};
use crate::namespace::{Namespace, NamespaceError};
use crate::share_commit::{create_commitment, Commitment};
use crate::shares::{self, sparse_shares_needed, Share, ShareError};

/// Errors produced while turning a blob into shares and a share commitment
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobError {
    #[error("blob data is empty")]
    EmptyBlob,

    #[error("invalid blob namespace: {0}")]
    NamespaceInvalid(#[from] NamespaceError),

    #[error("unsupported share version {0}")]
    UnsupportedShareVersion(u32),

    #[error("blob spans {share_count} shares but at most {max_shares} are allowed")]
    BlobTooLarge { share_count: usize, max_shares: usize },

    #[error("blob length {0} does not fit in the sequence length field")]
    SequenceLengthOverflow(usize),

    #[error("subtrees do not partition the {share_count} shares of the blob")]
    InvalidSubtrees { share_count: usize },
}

/// A namespaced payload that a user pays to have included in a block.
///
/// The fields are private so that every `Blob` in circulation went through [`Blob::new`]:
/// its namespace is a user namespace, its data is non-empty and its share version is supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize)]
#[serde(try_from = "RawBlob")]
pub struct Blob {
    namespace: Namespace,
    data: Bytes,
    share_version: u8,
}

/// The unchecked serde form of a [`Blob`]
#[derive(Deserialize)]
struct RawBlob {
    namespace: Namespace,
    data: Bytes,
    share_version: u8,
}

impl TryFrom<RawBlob> for Blob {
    type Error = BlobError;

    fn try_from(raw: RawBlob) -> Result<Self, Self::Error> {
        Self::new(raw.namespace, raw.data, raw.share_version)
    }
}

impl BorshDeserialize for Blob {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let namespace = Namespace::deserialize_reader(reader)?;
        let data = Bytes::deserialize_reader(reader)?;
        let share_version = u8::deserialize_reader(reader)?;
        Self::new(namespace, data, share_version)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl Blob {
    pub fn new(
        namespace: Namespace,
        data: impl Into<Bytes>,
        share_version: u8,
    ) -> Result<Self, BlobError> {
        let data = data.into();
        validate_blob_parts(&namespace, &data, share_version as u32)?;
        Ok(Self {
            namespace,
            data,
            share_version,
        })
    }

    /// Creates a blob using the first share version
    pub fn with_default_version(
        namespace: Namespace,
        data: impl Into<Bytes>,
    ) -> Result<Self, BlobError> {
        Self::new(namespace, data, SHARE_VERSION_ZERO)
    }

    /// Rebuilds a blob from the ordered shares it was split into
    pub fn from_shares(shares: &[Share]) -> Result<Self, ShareError> {
        let blob_ref = shares::BlobRef::new(shares)?;
        let first = &shares[0];
        let data = shares::reconstruct_blob_data(blob_ref);
        Self::new(first.namespace(), data, first.share_version())
            .map_err(ShareError::InvalidBlob)
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn share_version(&self) -> u8 {
        self.share_version
    }

    /// The length of the blob data, as recorded in the sequence length of its first share
    pub fn size(&self) -> u32 {
        // `Blob::new` guarantees that the length fits in a u32
        self.data.len() as u32
    }

    /// The number of shares this blob occupies in the data square
    pub fn share_count(&self) -> usize {
        sparse_shares_needed(self.data.len())
    }

    /// Splits this blob into the shares it occupies in the data square
    pub fn to_shares(&self) -> Vec<Share> {
        shares::split_validated(self.namespace, &self.data, self.share_version)
    }

    /// Computes the share commitment of this blob
    pub fn commitment(&self) -> Commitment {
        create_commitment(self)
    }
}

pub(crate) fn validate_blob_parts(
    namespace: &Namespace,
    data: &[u8],
    share_version: u32,
) -> Result<(), BlobError> {
    if data.is_empty() {
        return Err(BlobError::EmptyBlob);
    }
    namespace.validate_for_blob()?;
    if share_version > u8::MAX as u32 || !is_supported_share_version(share_version as u8) {
        return Err(BlobError::UnsupportedShareVersion(share_version));
    }
    if u32::try_from(data.len()).is_err() {
        return Err(BlobError::SequenceLengthOverflow(data.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::PFB_NAMESPACE;

    fn namespace() -> Namespace {
        Namespace([1, 2, 3, 4, 5, 6, 7, 8])
    }

    #[test]
    fn rejects_invalid_blobs() {
        assert_eq!(
            Blob::new(namespace(), Vec::new(), 0),
            Err(BlobError::EmptyBlob)
        );
        assert_eq!(
            Blob::new(PFB_NAMESPACE, vec![1], 0),
            Err(BlobError::NamespaceInvalid(NamespaceError::Reserved(
                PFB_NAMESPACE
            )))
        );
        assert_eq!(
            Blob::new(namespace(), vec![1], 1),
            Err(BlobError::UnsupportedShareVersion(1))
        );
    }

    #[test]
    fn share_count_matches_split() {
        for len in [1, 498, 499, 500, 1002, 1003, 3000, 4020, 4021] {
            let blob = Blob::with_default_version(namespace(), vec![7u8; len]).unwrap();
            assert_eq!(blob.share_count(), blob.to_shares().len(), "len {}", len);
        }
    }

    #[test]
    fn rebuilds_from_shares() {
        let blob = Blob::with_default_version(namespace(), vec![42u8; 2000]).unwrap();
        let rebuilt = Blob::from_shares(&blob.to_shares()).unwrap();
        assert_eq!(rebuilt, blob);
    }

    #[test]
    fn borsh_round_trip() {
        let blob = Blob::with_default_version(namespace(), vec![3u8; 10]).unwrap();
        let encoded = blob.try_to_vec().unwrap();
        assert_eq!(Blob::try_from_slice(&encoded).unwrap(), blob);
    }

    #[derive(BorshSerialize)]
    struct UncheckedBlob {
        namespace: Namespace,
        data: Vec<u8>,
        share_version: u8,
    }

    #[test]
    fn borsh_rejects_invalid_blobs() {
        let invalid = [
            UncheckedBlob {
                namespace: Namespace([0, 0, 0, 0, 0, 0, 0, 4]),
                data: vec![],
                share_version: 9,
            },
            UncheckedBlob {
                namespace: namespace(),
                data: vec![],
                share_version: 0,
            },
            UncheckedBlob {
                namespace: namespace(),
                data: vec![1],
                share_version: 1,
            },
        ];
        for unchecked in invalid {
            let encoded = unchecked.try_to_vec().unwrap();
            let err = Blob::try_from_slice(&encoded).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        }
    }

    #[test]
    fn serde_rejects_invalid_blobs() {
        let blob = Blob::with_default_version(namespace(), vec![3u8; 10]).unwrap();
        let value = serde_json::to_value(&blob).unwrap();
        assert_eq!(serde_json::from_value::<Blob>(value.clone()).unwrap(), blob);

        let mut empty = value.clone();
        empty["data"] = serde_json::json!([]);
        assert!(serde_json::from_value::<Blob>(empty).is_err());

        let mut reserved = value.clone();
        reserved["namespace"] = serde_json::json!([0, 0, 0, 0, 0, 0, 0, 1]);
        assert!(serde_json::from_value::<Blob>(reserved).is_err());

        let mut version = value;
        version["share_version"] = serde_json::json!(9);
        assert!(serde_json::from_value::<Blob>(version).is_err());
    }
}
