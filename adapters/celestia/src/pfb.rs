use prost::bytes::Bytes;
use prost::Message;
use prost_types::Any;

use crate::blob::{validate_blob_parts, Blob};
use crate::namespace::Namespace;
use crate::share_commit::Commitment;
use crate::verifier::address::CelestiaAddress;
use crate::verifier::ValidationError;

/// The type url under which a [`MsgPayForBlob`] is packed into a transaction
pub const PAY_FOR_BLOB_TYPE_URL: &str = "/celestia.blob.v1.MsgPayForBlob";

/// MsgPayForBlob pays for the inclusion of a blob in the block.
///
/// The blob itself is not part of the message. The signer commits to it through
/// `share_commitment`, and the blob travels next to the transaction in a
/// [`BlobTx`](crate::blob_tx::BlobTx) envelope.
#[derive(
    Clone,
    PartialEq,
    ::prost::Message,
    serde::Deserialize,
    serde::Serialize,
    borsh::BorshDeserialize,
    borsh::BorshSerialize,
)]
pub struct MsgPayForBlob {
    /// bech32 encoded account paying for the blob
    #[prost(string, tag = "1")]
    pub signer: ::prost::alloc::string::String,
    #[prost(bytes = "bytes", tag = "2")]
    pub namespace: Bytes,
    #[prost(uint32, tag = "3")]
    pub blob_size: u32,
    /// share_commitment is the commitment to the subtree roots of the blob
    #[prost(bytes = "bytes", tag = "4")]
    pub share_commitment: Bytes,
    /// share_version must match the share version used to compute the commitment
    #[prost(uint32, tag = "8")]
    pub share_version: u32,
}

impl MsgPayForBlob {
    /// Builds the message paying for `blob`, computing its share commitment
    pub fn new(signer: &CelestiaAddress, blob: &Blob) -> Self {
        Self {
            signer: signer.to_string(),
            namespace: Bytes::copy_from_slice(blob.namespace().as_bytes()),
            blob_size: blob.size(),
            share_commitment: Bytes::copy_from_slice(blob.commitment().as_bytes()),
            share_version: blob.share_version() as u32,
        }
    }

    /// Stateless checks on the message fields. Does not look at the blob.
    pub fn validate_basic(&self) -> Result<(), ValidationError> {
        self.signer
            .parse::<CelestiaAddress>()
            .map_err(ValidationError::InvalidSigner)?;

        let namespace = self.namespace()?;
        if self.blob_size == 0 {
            return Err(ValidationError::ZeroBlobSize);
        }
        // Only the namespace and version are checked here; a placeholder byte stands in for the data
        validate_blob_parts(&namespace, &[0], self.share_version)?;
        self.commitment()?;
        Ok(())
    }

    pub fn namespace(&self) -> Result<Namespace, ValidationError> {
        Namespace::from_slice(&self.namespace).map_err(|e| ValidationError::Blob(e.into()))
    }

    pub fn commitment(&self) -> Result<Commitment, ValidationError> {
        Commitment::try_from(self.share_commitment.as_ref())
            .map_err(|_| ValidationError::InvalidCommitmentLength(self.share_commitment.len()))
    }

    /// Packs the message into an `Any` for inclusion in a transaction body
    pub fn to_any(&self) -> Any {
        Any {
            type_url: PAY_FOR_BLOB_TYPE_URL.to_string(),
            value: self.encode_to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobError;
    use crate::namespace::{NamespaceError, PFB_NAMESPACE};
    use crate::share_commit::COMMITMENT_LEN;

    const SIGNER: &str = "celestia1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5wgawu3";

    fn signer() -> CelestiaAddress {
        SIGNER.parse().unwrap()
    }

    fn msg() -> MsgPayForBlob {
        let blob = Blob::with_default_version(Namespace([1, 2, 3, 4, 5, 6, 7, 8]), vec![5u8; 600])
            .unwrap();
        MsgPayForBlob::new(&signer(), &blob)
    }

    #[test]
    fn new_fills_every_field() {
        let msg = msg();
        assert_eq!(msg.signer, SIGNER);
        assert_eq!(msg.namespace.as_ref(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(msg.blob_size, 600);
        assert_eq!(msg.share_commitment.len(), COMMITMENT_LEN);
        assert_eq!(msg.share_version, 0);
        msg.validate_basic().unwrap();
    }

    #[test]
    fn validate_basic_rejects_bad_fields() {
        let mut bad_signer = msg();
        bad_signer.signer = "cosmos1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7xu".to_string();
        assert!(matches!(
            bad_signer.validate_basic(),
            Err(ValidationError::InvalidSigner(_))
        ));

        let mut reserved = msg();
        reserved.namespace = Bytes::copy_from_slice(PFB_NAMESPACE.as_bytes());
        assert_eq!(
            reserved.validate_basic(),
            Err(ValidationError::Blob(BlobError::NamespaceInvalid(
                NamespaceError::Reserved(PFB_NAMESPACE)
            )))
        );

        let mut empty = msg();
        empty.blob_size = 0;
        assert_eq!(empty.validate_basic(), Err(ValidationError::ZeroBlobSize));

        let mut short = msg();
        short.share_commitment = Bytes::from_static(&[1, 2, 3]);
        assert_eq!(
            short.validate_basic(),
            Err(ValidationError::InvalidCommitmentLength(3))
        );

        let mut version = msg();
        version.share_version = 3;
        assert_eq!(
            version.validate_basic(),
            Err(ValidationError::Blob(BlobError::UnsupportedShareVersion(3)))
        );
    }

    #[test]
    fn packs_into_any() {
        let msg = msg();
        let any = msg.to_any();
        assert_eq!(any.type_url, PAY_FOR_BLOB_TYPE_URL);
        assert_eq!(MsgPayForBlob::decode(any.value.as_slice()).unwrap(), msg);
    }
}
