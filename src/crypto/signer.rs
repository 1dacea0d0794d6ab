use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signature, Signer, Verifier};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

use crate::core::errors::{ProofError, ProofResult};
use crate::core::types::CurveId;
use crate::core::utils::derive_key;
use crate::crypto::commitment::{Crs, CurveScalar};

/// Wallet collaborator: signs outbound requests and supplies key material.
pub trait RequestSigner: Send + Sync {
    fn public_key(&self) -> [u8; 32];

    fn sign(&self, message: &[u8]) -> ProofResult<Vec<u8>>;

    /// Deterministic secret-bound material for `(context, info)`
    fn derive_material(&self, context: &[u8], info: &str) -> ProofResult<[u8; 32]>;
}

/// Ed25519 wallet key
pub struct Ed25519Signer {
    keypair: Keypair,
}

impl Ed25519Signer {
    pub fn from_secret_bytes(secret: &[u8]) -> ProofResult<Self> {
        if secret.len() != 32 {
            return Err(ProofError::Signing {
                reason: format!("private key must be 32 bytes, got {}", secret.len()),
            });
        }
        let secret = SecretKey::from_bytes(secret).map_err(|e| ProofError::Signing {
            reason: format!("Invalid private key: {}", e),
        })?;
        let public = PublicKey::from(&secret);
        Ok(Self {
            keypair: Keypair { secret, public },
        })
    }

    pub fn generate() -> Self {
        let mut csprng = OsRng {};
        Self {
            keypair: Keypair::generate(&mut csprng),
        }
    }
}

impl RequestSigner for Ed25519Signer {
    fn public_key(&self) -> [u8; 32] {
        self.keypair.public.to_bytes()
    }

    fn sign(&self, message: &[u8]) -> ProofResult<Vec<u8>> {
        Ok(self.keypair.sign(message).to_bytes().to_vec())
    }

    fn derive_material(&self, context: &[u8], info: &str) -> ProofResult<[u8; 32]> {
        derive_key(self.keypair.secret.as_bytes(), context, info)
    }
}

pub fn verify_signature(public_key: &[u8], data: &[u8], signature: &[u8]) -> ProofResult<bool> {
    if public_key.len() != 32 {
        return Err(ProofError::Signing {
            reason: format!("public key must be 32 bytes, got {}", public_key.len()),
        });
    }
    if signature.len() != 64 {
        return Err(ProofError::Signing {
            reason: format!("signature must be 64 bytes, got {}", signature.len()),
        });
    }

    let public_key = PublicKey::from_bytes(public_key).map_err(|e| ProofError::Signing {
        reason: format!("Invalid public key: {}", e),
    })?;
    let signature = Signature::try_from(signature).map_err(|e| ProofError::Signing {
        reason: format!("Invalid signature: {}", e),
    })?;

    Ok(public_key.verify(data, &signature).is_ok())
}

/// Detached signature attached to an outbound request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSignature {
    pub public_key: String,
    pub signature: String,
}

pub fn sign_payload<S: RequestSigner + ?Sized>(
    signer: &S,
    payload: &[u8],
) -> ProofResult<RequestSignature> {
    Ok(RequestSignature {
        public_key: hex::encode(signer.public_key()),
        signature: hex::encode(signer.sign(payload)?),
    })
}

pub fn verify_payload(envelope: &RequestSignature, payload: &[u8]) -> ProofResult<bool> {
    let public_key = hex::decode(&envelope.public_key).map_err(|e| ProofError::Signing {
        reason: format!("public key hex: {}", e),
    })?;
    let signature = hex::decode(&envelope.signature).map_err(|e| ProofError::Signing {
        reason: format!("signature hex: {}", e),
    })?;
    verify_signature(&public_key, payload, &signature)
}

/// CRS whose trapdoor is bound to the signer's key and `context`
pub fn derive_crs<S: RequestSigner + ?Sized>(
    signer: &S,
    curve: CurveId,
    context: &[u8],
) -> ProofResult<Crs> {
    let material = signer.derive_material(context, "pedersen-crs")?;
    Crs::from_trapdoor(curve, &CurveScalar::from_bytes_reduced(&material))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = Ed25519Signer::from_secret_bytes(&[7u8; 32]).unwrap();
        let envelope = sign_payload(&signer, b"challenge request").unwrap();
        assert!(verify_payload(&envelope, b"challenge request").unwrap());
        assert!(!verify_payload(&envelope, b"tampered request").unwrap());
    }

    #[test]
    fn test_rejects_bad_key_sizes() {
        assert!(Ed25519Signer::from_secret_bytes(&[1u8; 16]).is_err());
        assert!(verify_signature(&[0u8; 31], b"x", &[0u8; 64]).is_err());
        assert!(verify_signature(&[0u8; 32], b"x", &[0u8; 10]).is_err());
    }

    #[test]
    fn test_derived_crs_is_deterministic() {
        let signer = Ed25519Signer::from_secret_bytes(&[9u8; 32]).unwrap();
        let a = derive_crs(&signer, CurveId::Secp256k1, b"round-1").unwrap();
        let b = derive_crs(&signer, CurveId::Secp256k1, b"round-1").unwrap();
        let c = derive_crs(&signer, CurveId::Secp256k1, b"round-2").unwrap();
        assert_eq!(a, b);
        assert_ne!(a.h, c.h);
        assert_eq!(a.g, c.g);

        let other = Ed25519Signer::generate();
        assert_ne!(derive_crs(&other, CurveId::Secp256k1, b"round-1").unwrap().h, a.h);
    }
}
