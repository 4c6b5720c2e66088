//! Digest and public-key primitives used by the verifier.

use md5::Md5;
use pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use signature::hazmat::PrehashVerifier;
use spki::der::Decode;
use spki::SubjectPublicKeyInfoRef;

use super::types::{oids, DigestAlgorithm, KeyAlgorithm, SignatureAlgorithm};
use crate::error::{Error, Result};

/// Hash `data` with the given algorithm.
pub fn digest(algorithm: DigestAlgorithm, data: &[u8]) -> Vec<u8> {
    match algorithm {
        DigestAlgorithm::Md5 => Md5::digest(data).to_vec(),
        DigestAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
        DigestAlgorithm::Sha224 => Sha224::digest(data).to_vec(),
        DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
        DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
    }
}

/// Verify `signature` over `message` with the key in a DER
/// SubjectPublicKeyInfo.
pub fn verify_signature(
    public_key_der: &[u8],
    algorithm: SignatureAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let spki = SubjectPublicKeyInfoRef::from_der(public_key_der)
        .map_err(|e| Error::CertificateParseError(format!("public key: {}", e)))?;
    let hashed = digest(algorithm.digest, message);

    match algorithm.key {
        KeyAlgorithm::Rsa => {
            if spki.algorithm.oid != oids::RSA_ENCRYPTION {
                return Err(Error::UnsupportedAlgorithm(format!(
                    "RSA signature with {} key",
                    spki.algorithm.oid
                )));
            }
            verify_rsa(public_key_der, algorithm.digest, &hashed, signature)
        },
        KeyAlgorithm::Ecdsa => {
            if spki.algorithm.oid != oids::EC_PUBLIC_KEY {
                return Err(Error::UnsupportedAlgorithm(format!(
                    "ECDSA signature with {} key",
                    spki.algorithm.oid
                )));
            }
            let curve = spki
                .algorithm
                .parameters_oid()
                .map_err(|e| Error::CertificateParseError(format!("EC parameters: {}", e)))?;
            match curve {
                oids::CURVE_P256 => verify_p256(public_key_der, &hashed, signature),
                oids::CURVE_P384 => verify_p384(public_key_der, &hashed, signature),
                other => Err(Error::UnsupportedAlgorithm(format!("EC curve {}", other))),
            }
        },
    }
}

fn verify_rsa(
    public_key_der: &[u8],
    digest_algorithm: DigestAlgorithm,
    hashed: &[u8],
    signature: &[u8],
) -> Result<()> {
    let key = RsaPublicKey::from_public_key_der(public_key_der)
        .map_err(|e| Error::CertificateParseError(format!("RSA public key: {}", e)))?;
    let scheme = match digest_algorithm {
        DigestAlgorithm::Md5 => Pkcs1v15Sign::new::<Md5>(),
        DigestAlgorithm::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        DigestAlgorithm::Sha224 => Pkcs1v15Sign::new::<Sha224>(),
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    };
    key.verify(scheme, hashed, signature)
        .map_err(|e| Error::SignatureVerificationFailed(format!("RSA: {}", e)))
}

fn verify_p256(public_key_der: &[u8], hashed: &[u8], signature: &[u8]) -> Result<()> {
    let key = p256::ecdsa::VerifyingKey::from_public_key_der(public_key_der)
        .map_err(|e| Error::CertificateParseError(format!("P-256 public key: {}", e)))?;
    let signature = p256::ecdsa::Signature::from_der(signature)
        .map_err(|e| {
            Error::SignatureVerificationFailed(format!("ECDSA signature encoding: {}", e))
        })?;
    key.verify_prehash(hashed, &signature)
        .map_err(|e| Error::SignatureVerificationFailed(format!("ECDSA P-256: {}", e)))
}

fn verify_p384(public_key_der: &[u8], hashed: &[u8], signature: &[u8]) -> Result<()> {
    let key = p384::ecdsa::VerifyingKey::from_public_key_der(public_key_der)
        .map_err(|e| Error::CertificateParseError(format!("P-384 public key: {}", e)))?;
    let signature = p384::ecdsa::Signature::from_der(signature)
        .map_err(|e| {
            Error::SignatureVerificationFailed(format!("ECDSA signature encoding: {}", e))
        })?;
    key.verify_prehash(hashed, &signature)
        .map_err(|e| Error::SignatureVerificationFailed(format!("ECDSA P-384: {}", e)))
}
