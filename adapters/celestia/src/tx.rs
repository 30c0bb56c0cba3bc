//! The base transaction carried inside a blob envelope. Only the parts needed to find the
//! paying messages are modelled; signatures and auth info are kept as opaque bytes.

use prost::Message;
use prost_types::Any;

use crate::blob::Blob;
use crate::pfb::{MsgPayForBlob, PAY_FOR_BLOB_TYPE_URL};
use crate::verifier::address::CelestiaAddress;

/// Tx is the standard type used for broadcasting transactions.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Tx {
    /// body is the processable content of the transaction
    #[prost(message, optional, tag = "1")]
    pub body: ::core::option::Option<TxBody>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

/// TxBody is the body of a transaction that all signers sign over.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TxBody {
    /// messages is a list of messages to be executed, in order
    #[prost(message, repeated, tag = "1")]
    pub messages: ::prost::alloc::vec::Vec<Any>,
    #[prost(string, tag = "2")]
    pub memo: ::prost::alloc::string::String,
    #[prost(uint64, tag = "3")]
    pub timeout_height: u64,
}

/// A message of a base transaction, as seen by blob admission
#[derive(Debug, Clone, PartialEq)]
pub enum TxMessage {
    PayForBlob(MsgPayForBlob),
    Other(Any),
}

impl TxMessage {
    pub fn from_any(any: Any) -> Result<Self, prost::DecodeError> {
        if any.type_url == PAY_FOR_BLOB_TYPE_URL {
            return Ok(Self::PayForBlob(MsgPayForBlob::decode(any.value.as_slice())?));
        }
        Ok(Self::Other(any))
    }

    pub fn type_url(&self) -> &str {
        match self {
            Self::PayForBlob(_) => PAY_FOR_BLOB_TYPE_URL,
            Self::Other(any) => &any.type_url,
        }
    }
}

impl Tx {
    /// Builds an unsigned transaction carrying `messages`
    pub fn from_messages(messages: Vec<Any>) -> Self {
        Self {
            body: Some(TxBody {
                messages,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Builds an unsigned transaction paying for `blobs`, one message per blob in the same order
    pub fn pay_for_blobs(signer: &CelestiaAddress, blobs: &[Blob]) -> Self {
        Self::from_messages(
            blobs
                .iter()
                .map(|blob| MsgPayForBlob::new(signer, blob).to_any())
                .collect(),
        )
    }

    /// Decodes every message of the body. A transaction without a body has no messages.
    pub fn messages(&self) -> Result<Vec<TxMessage>, prost::DecodeError> {
        self.body
            .iter()
            .flat_map(|body| body.messages.iter().cloned())
            .map(TxMessage::from_any)
            .collect()
    }
}

/// Decodes a base transaction and its messages
pub fn decode_tx_messages(raw: &[u8]) -> Result<Vec<TxMessage>, prost::DecodeError> {
    Tx::decode(raw)?.messages()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;

    fn bank_send() -> Any {
        Any {
            type_url: "/cosmos.bank.v1beta1.MsgSend".to_string(),
            value: vec![1, 2, 3],
        }
    }

    #[test]
    fn decodes_mixed_messages() {
        let blob = Blob::with_default_version(Namespace([1, 2, 3, 4, 5, 6, 7, 8]), vec![1u8; 10])
            .unwrap();
        let signer = "celestia1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5wgawu3".parse().unwrap();
        let pfb = MsgPayForBlob::new(&signer, &blob);

        let tx = Tx::from_messages(vec![bank_send(), pfb.to_any()]);
        let messages = decode_tx_messages(&tx.encode_to_vec()).unwrap();
        assert_eq!(
            messages,
            vec![TxMessage::Other(bank_send()), TxMessage::PayForBlob(pfb)]
        );
        assert_eq!(messages[1].type_url(), PAY_FOR_BLOB_TYPE_URL);
    }

    #[test]
    fn pays_for_every_blob_in_order() {
        let signer = "celestia1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5wgawu3".parse().unwrap();
        let blobs: Vec<_> = [10usize, 3000]
            .iter()
            .map(|len| {
                Blob::with_default_version(Namespace([1, 2, 3, 4, 5, 6, 7, 8]), vec![9u8; *len])
                    .unwrap()
            })
            .collect();
        let messages = Tx::pay_for_blobs(&signer, &blobs).messages().unwrap();
        let sizes: Vec<_> = messages
            .iter()
            .map(|message| match message {
                TxMessage::PayForBlob(pfb) => pfb.blob_size,
                TxMessage::Other(_) => panic!("unexpected message"),
            })
            .collect();
        assert_eq!(sizes, vec![10, 3000]);
    }

    #[test]
    fn tx_without_body_has_no_messages() {
        assert_eq!(Tx::default().messages().unwrap(), vec![]);
    }

    #[test]
    fn rejects_corrupt_pay_for_blob() {
        let corrupt = Any {
            type_url: PAY_FOR_BLOB_TYPE_URL.to_string(),
            value: vec![0x0a, 0xff],
        };
        assert!(TxMessage::from_any(corrupt).is_err());
        assert!(decode_tx_messages(&[0xff, 0xff, 0xff]).is_err());
    }
}
