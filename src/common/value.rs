//! Signed values as delivered by the DHT client.

use bytes::Bytes;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use super::RecordKind;

#[derive(Clone, Debug, PartialEq)]
/// One signed value stored under a DHT key.
///
/// A reflector publishes each part of its document as a separate value, all
/// under the key of its callsign; several replicas may hand back different
/// revisions of the same part.
pub struct Value {
    /// value id, see [RecordKind::value_id]
    id: u64,
    /// schema tag of `data`
    user_type: String,
    /// ed25519 public key of the publisher
    owner: [u8; 32],
    /// encoded payload
    data: Bytes,
    /// ed25519 signature over [encode_signable]
    signature: [u8; 64],
}

impl Value {
    /// Sign a payload as value `id` with schema tag `user_type`.
    pub fn new(signer: &SigningKey, id: u64, user_type: &str, data: &[u8]) -> Self {
        let signable = encode_signable(id, user_type, data);
        let signature = signer.sign(&signable);

        Self::new_signed_unchecked(
            signer.verifying_key().to_bytes(),
            signature.to_bytes(),
            id,
            user_type,
            data,
        )
    }

    /// Create a value from an already signed payload, without verifying it.
    pub fn new_signed_unchecked(
        owner: [u8; 32],
        signature: [u8; 64],
        id: u64,
        user_type: &str,
        data: &[u8],
    ) -> Self {
        Self {
            id,
            user_type: user_type.to_string(),
            owner,
            data: Bytes::copy_from_slice(data),
            signature,
        }
    }

    /// Verify the publisher's signature over the id, schema tag and payload.
    pub fn check_signature(&self) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.owner) else {
            return false;
        };

        let signature = Signature::from_bytes(&self.signature);

        key.verify(
            &encode_signable(self.id, &self.user_type, &self.data),
            &signature,
        )
        .is_ok()
    }

    // === Getters ===

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The record kind, if the value id is one this crate knows.
    pub fn kind(&self) -> Option<RecordKind> {
        RecordKind::from_value_id(self.id)
    }

    pub fn user_type(&self) -> &str {
        &self.user_type
    }

    pub fn owner(&self) -> &[u8; 32] {
        &self.owner
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn signature(&self) -> &[u8; 64] {
        &self.signature
    }
}

pub fn encode_signable(id: u64, user_type: &str, data: &[u8]) -> Box<[u8]> {
    let mut signable = vec![];

    signable.extend(format!("2:idi{}e", id).into_bytes());
    signable.extend(format!("9:user_type{}:", user_type.len()).into_bytes());
    signable.extend(user_type.as_bytes());
    signable.extend(format!("1:v{}:", data.len()).into_bytes());
    signable.extend(data);

    signable.into()
}
