use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::Error;
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use crate::blob::{validate_blob_parts, BlobError};
use crate::consts::{
    CONTINUATION_SPARSE_SHARE_CONTENT_SIZE, FIRST_SPARSE_SHARE_CONTENT_SIZE, SEQUENCE_LEN_BYTES,
    SHARE_INFO_BYTES, SHARE_SIZE,
};
use crate::namespace::{Namespace, NAMESPACE_SIZE};

/// A fixed size unit of the data square. Every share starts with the namespace of the blob
/// it belongs to, followed by an info byte. The first share of a blob also carries the
/// blob's length, so that readers can discard the zero padding of the last share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Share {
    Continuation(Bytes),
    Start(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShareError {
    #[error("share must be 512 bytes long, got {0}")]
    WrongSize(usize),
    #[error("share at index {0} should start a sequence but is a continuation share")]
    NotAStartShare(usize),
    #[error("share at index {0} starts a new sequence in the middle of a blob")]
    UnexpectedStartShare(usize),
    #[error("share at index {0} has a different namespace than the first share")]
    NamespaceMismatch(usize),
    #[error("share at index {0} has a different share version than the first share")]
    VersionMismatch(usize),
    #[error("a sequence of {sequence_len} bytes needs {expected} shares, got {actual}")]
    SequenceLengthMismatch {
        sequence_len: usize,
        expected: usize,
        actual: usize,
    },
    #[error("no shares provided")]
    NoShares,
    #[error("shares do not describe a valid blob: {0}")]
    InvalidBlob(BlobError),
}

impl AsRef<[u8]> for Share {
    fn as_ref(&self) -> &[u8] {
        self.raw_inner_ref()
    }
}

impl Serialize for Share {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(self.raw_inner_ref())
    }
}

impl<'de> Deserialize<'de> for Share {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let share = <Bytes as Deserialize>::deserialize(deserializer)?;
        if share.len() != SHARE_SIZE {
            return Err(Error::invalid_length(share.len(), &"A share of length 512"));
        }
        Share::new(share).map_err(Error::custom)
    }
}

fn is_sequence_start_unchecked(share: &[u8]) -> bool {
    share[NAMESPACE_SIZE] & 0x01 == 1
}

/// Builds the info byte of a share: the version in the upper seven bits, the sequence start
/// indicator in the lowest one
fn info_byte(share_version: u8, is_sequence_start: bool) -> u8 {
    (share_version << 1) | is_sequence_start as u8
}

impl Share {
    pub fn new(inner: Bytes) -> Result<Self, ShareError> {
        if inner.len() != SHARE_SIZE {
            return Err(ShareError::WrongSize(inner.len()));
        }
        if is_sequence_start_unchecked(inner.as_ref()) {
            Ok(Self::Start(inner))
        } else {
            Ok(Self::Continuation(inner))
        }
    }

    pub fn as_serialized(&self) -> &[u8] {
        self.raw_inner_ref()
    }

    pub fn is_sequence_start(&self) -> bool {
        match self {
            Share::Continuation(_) => false,
            Share::Start(_) => true,
        }
    }

    pub fn share_version(&self) -> u8 {
        self.raw_inner_ref()[NAMESPACE_SIZE] >> 1
    }

    /// The length in bytes of the blob that starts at this share, if it is a start share
    pub fn sequence_length(&self) -> Option<u32> {
        match self {
            Share::Continuation(_) => None,
            Share::Start(inner) => {
                let mut inner = &inner[NAMESPACE_SIZE + SHARE_INFO_BYTES..];
                Some(inner.get_u32())
            }
        }
    }

    /// Returns this share in raw serialized form as a slice
    fn raw_inner_ref(&self) -> &[u8] {
        match self {
            Share::Continuation(inner) => inner.as_ref(),
            Share::Start(inner) => inner.as_ref(),
        }
    }

    fn get_data_offset(&self) -> usize {
        // All shares are prefixed with metadata including the namespace (8 bytes), and info byte (1 byte)
        let mut offset = NAMESPACE_SIZE + SHARE_INFO_BYTES;
        // Start shares are also prefixed with a sequence length
        if let Self::Start(_) = self {
            offset += SEQUENCE_LEN_BYTES;
        }
        offset
    }

    /// Returns the data of this share, including any trailing padding, as &[u8]
    pub fn data_ref(&self) -> &[u8] {
        &self.raw_inner_ref()[self.get_data_offset()..]
    }

    /// Get the namespace associated with this share
    pub fn namespace(&self) -> Namespace {
        let mut out = [0u8; NAMESPACE_SIZE];
        out.copy_from_slice(&self.raw_inner_ref()[..NAMESPACE_SIZE]);
        Namespace(out)
    }
}

/// The number of shares needed to hold a blob of `blob_len` bytes
pub fn sparse_shares_needed(blob_len: usize) -> usize {
    if blob_len == 0 {
        return 0;
    }
    if blob_len <= FIRST_SPARSE_SHARE_CONTENT_SIZE {
        return 1;
    }
    let remaining = blob_len - FIRST_SPARSE_SHARE_CONTENT_SIZE;
    1 + (remaining + CONTINUATION_SPARSE_SHARE_CONTENT_SIZE - 1)
        / CONTINUATION_SPARSE_SHARE_CONTENT_SIZE
}

/// Splits a blob into the ordered sequence of shares it occupies in the data square.
/// The last share is padded with zeroes.
pub fn split_blob(
    namespace: Namespace,
    data: &[u8],
    share_version: u8,
) -> Result<Vec<Share>, BlobError> {
    validate_blob_parts(&namespace, data, share_version as u32)?;
    Ok(split_validated(namespace, data, share_version))
}

/// Splits data whose namespace, length and version were already validated
pub(crate) fn split_validated(namespace: Namespace, data: &[u8], share_version: u8) -> Vec<Share> {
    let share_count = sparse_shares_needed(data.len());
    let mut shares = Vec::with_capacity(share_count);

    let (first, mut rest) = data.split_at(data.len().min(FIRST_SPARSE_SHARE_CONTENT_SIZE));
    let mut share = BytesMut::with_capacity(SHARE_SIZE);
    share.put_slice(namespace.as_bytes());
    share.put_u8(info_byte(share_version, true));
    share.put_u32(data.len() as u32);
    share.put_slice(first);
    share.resize(SHARE_SIZE, 0);
    shares.push(Share::Start(share.freeze()));

    while !rest.is_empty() {
        let (chunk, tail) = rest.split_at(rest.len().min(CONTINUATION_SPARSE_SHARE_CONTENT_SIZE));
        let mut share = BytesMut::with_capacity(SHARE_SIZE);
        share.put_slice(namespace.as_bytes());
        share.put_u8(info_byte(share_version, false));
        share.put_slice(chunk);
        share.resize(SHARE_SIZE, 0);
        shares.push(Share::Continuation(share.freeze()));
        rest = tail;
    }

    debug!(
        %namespace,
        blob_len = data.len(),
        share_count = shares.len(),
        "Split blob into shares"
    );
    shares
}

/// Returns the original bytes of the blob stored in `blob`, with the padding stripped
pub fn reconstruct_blob_data(blob: BlobRef<'_>) -> Bytes {
    let mut data = blob.data();
    data.copy_to_bytes(data.remaining())
}

/// A checked view over the shares of a single blob
#[derive(Debug, Clone, PartialEq)]
pub struct BlobRef<'a>(&'a [Share]);

impl<'a> BlobRef<'a> {
    /// Checks that `shares` form exactly one blob: a start share followed by continuation
    /// shares of the same namespace and version, just enough of them to hold the sequence.
    pub fn new(shares: &'a [Share]) -> Result<Self, ShareError> {
        let first = shares.first().ok_or(ShareError::NoShares)?;
        let sequence_len = first
            .sequence_length()
            .ok_or(ShareError::NotAStartShare(0))? as usize;
        for (idx, share) in shares.iter().enumerate().skip(1) {
            if share.is_sequence_start() {
                return Err(ShareError::UnexpectedStartShare(idx));
            }
            if share.namespace() != first.namespace() {
                return Err(ShareError::NamespaceMismatch(idx));
            }
            if share.share_version() != first.share_version() {
                return Err(ShareError::VersionMismatch(idx));
            }
        }
        let expected = sparse_shares_needed(sequence_len);
        if expected != shares.len() {
            return Err(ShareError::SequenceLengthMismatch {
                sequence_len,
                expected,
                actual: shares.len(),
            });
        }
        Ok(Self(shares))
    }

    pub fn shares(&self) -> &'a [Share] {
        self.0
    }

    pub fn data(&self) -> BlobRefIterator<'a> {
        let sequence_len = self.0[0]
            .sequence_length()
            .expect("BlobRef::new checked the first share is a start share");
        BlobRefIterator {
            sequence_len: sequence_len as usize,
            consumed: 0,
            current: self.0[0].data_ref(),
            current_idx: 0,
            shares: self.0,
        }
    }
}

/// Reads the bytes of a blob out of its shares, skipping share headers and trailing padding
#[derive(Debug, Clone)]
pub struct BlobRefIterator<'a> {
    sequence_len: usize,
    consumed: usize,
    current: &'a [u8],
    current_idx: usize,
    shares: &'a [Share],
}

impl<'a> Iterator for BlobRefIterator<'a> {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_remaining() {
            return None;
        }
        let byte = self.current[0];
        self.advance(1);
        Some(byte)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl<'a> ExactSizeIterator for BlobRefIterator<'a> {}

impl<'a> Buf for BlobRefIterator<'a> {
    fn remaining(&self) -> usize {
        self.sequence_len - self.consumed
    }

    fn chunk(&self) -> &[u8] {
        // Chunks are zero-padded, so truncate if necessary
        let remaining = self.remaining();
        if self.current.len() > remaining {
            return &self.current[..remaining];
        }
        self.current
    }

    fn advance(&mut self, mut cnt: usize) {
        assert!(
            cnt <= self.remaining(),
            "cannot advance past the end of the blob"
        );
        while cnt > 0 {
            let step = cnt.min(self.current.len());
            self.current = &self.current[step..];
            self.consumed += step;
            cnt -= step;
            // Move on to the next share once the current one is exhausted
            if self.current.is_empty() && self.current_idx + 1 < self.shares.len() {
                self.current_idx += 1;
                self.current = self.shares[self.current_idx].data_ref();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::collection::vec;
    use proptest::prelude::*;

    use super::*;

    const NAMESPACE: Namespace = Namespace([1, 2, 3, 4, 5, 6, 7, 8]);

    #[test]
    fn test_first_share_layout() {
        let shares = split_blob(NAMESPACE, b"hello world", 0).unwrap();
        assert_eq!(shares.len(), 1);
        let raw = shares[0].as_serialized();
        assert_eq!(raw.len(), SHARE_SIZE);
        assert_eq!(&raw[..8], NAMESPACE.as_bytes());
        // version 0, sequence start
        assert_eq!(raw[8], 0x01);
        assert_eq!(&raw[9..13], &[0, 0, 0, 11]);
        assert_eq!(&raw[13..24], b"hello world");
        assert!(raw[24..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_continuation_share_layout() {
        let data = vec![0xab; FIRST_SPARSE_SHARE_CONTENT_SIZE + 1];
        let shares = split_blob(NAMESPACE, &data, 0).unwrap();
        assert_eq!(shares.len(), 2);
        assert!(shares[0].is_sequence_start());
        assert!(!shares[1].is_sequence_start());
        let raw = shares[1].as_serialized();
        assert_eq!(&raw[..8], NAMESPACE.as_bytes());
        assert_eq!(raw[8], 0x00);
        assert_eq!(raw[9], 0xab);
        assert!(raw[10..].iter().all(|b| *b == 0));
        assert_eq!(shares[1].sequence_length(), None);
    }

    #[test]
    fn test_split_errors() {
        assert_eq!(split_blob(NAMESPACE, &[], 0), Err(BlobError::EmptyBlob));
        assert!(matches!(
            split_blob(Namespace([0; 8]), &[1], 0),
            Err(BlobError::NamespaceInvalid(_))
        ));
    }

    #[test]
    fn test_sparse_shares_needed() {
        assert_eq!(sparse_shares_needed(0), 0);
        assert_eq!(sparse_shares_needed(1), 1);
        assert_eq!(sparse_shares_needed(499), 1);
        assert_eq!(sparse_shares_needed(500), 2);
        assert_eq!(sparse_shares_needed(1002), 2);
        assert_eq!(sparse_shares_needed(1003), 3);
        assert_eq!(sparse_shares_needed(3000), 6);
    }

    #[test]
    fn test_blob_ref_rejects_bad_sequences() {
        let a = split_blob(NAMESPACE, &[1u8; 1500], 0).unwrap();
        let b = split_blob(Namespace([9; 8]), &[2u8; 1500], 0).unwrap();

        assert_eq!(BlobRef::new(&[]), Err(ShareError::NoShares));
        assert_eq!(BlobRef::new(&a[1..]), Err(ShareError::NotAStartShare(0)));
        assert!(matches!(
            BlobRef::new(&a[..2]),
            Err(ShareError::SequenceLengthMismatch { .. })
        ));

        let mut mixed = a.clone();
        mixed[2] = b[2].clone();
        assert_eq!(BlobRef::new(&mixed), Err(ShareError::NamespaceMismatch(2)));

        let mut restarted = a.clone();
        restarted[1] = b[0].clone();
        assert_eq!(
            BlobRef::new(&restarted),
            Err(ShareError::UnexpectedStartShare(1))
        );
    }

    #[test]
    fn test_buf_chunks_skip_headers() {
        let data: Vec<u8> = (0..1200u32).map(|i| i as u8).collect();
        let shares = split_blob(NAMESPACE, &data, 0).unwrap();
        let mut reader = BlobRef::new(&shares).unwrap().data();
        assert_eq!(reader.chunk().len(), FIRST_SPARSE_SHARE_CONTENT_SIZE);
        reader.advance(FIRST_SPARSE_SHARE_CONTENT_SIZE + 3);
        assert_eq!(reader.chunk()[0], data[FIRST_SPARSE_SHARE_CONTENT_SIZE + 3]);
        assert_eq!(reader.remaining(), 1200 - FIRST_SPARSE_SHARE_CONTENT_SIZE - 3);
        let rest: Vec<u8> = reader.collect();
        assert_eq!(rest, &data[FIRST_SPARSE_SHARE_CONTENT_SIZE + 3..]);
    }

    #[test]
    fn test_share_serde() {
        let share = split_blob(NAMESPACE, b"serialize me", 0).unwrap().remove(0);
        let json = serde_json::to_string(&share).unwrap();
        let decoded: Share = serde_json::from_str(&json).unwrap();
        assert_eq!(share, decoded);

        let too_short = serde_json::to_string(&vec![0u8; 12]).unwrap();
        assert!(serde_json::from_str::<Share>(&too_short).is_err());
    }

    proptest! {
        #[test]
        fn proptest_split_then_reconstruct(data in vec(any::<u8>(), 1..5_000)) {
            let shares = split_blob(NAMESPACE, &data, 0).unwrap();
            prop_assert_eq!(shares.len(), sparse_shares_needed(data.len()));
            for share in &shares {
                prop_assert_eq!(share.as_serialized().len(), SHARE_SIZE);
                prop_assert_eq!(share.namespace(), NAMESPACE);
            }
            let blob = BlobRef::new(&shares).unwrap();
            let reconstructed = reconstruct_blob_data(blob);
            prop_assert_eq!(reconstructed.as_ref(), &data[..]);
        }
    }
}
