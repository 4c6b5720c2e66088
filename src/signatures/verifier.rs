//! PDF signature integrity verification.
//!
//! Verification recomputes the digest of the signed byte range, checks it
//! against what the signer committed to, and then checks the signature value
//! with the signer certificate's public key. An embedded timestamp token is
//! checked on its own and never changes the primary verdict.
//!
//! No certificate path is built: a valid signature proves the document was not
//! modified since it was signed by the holder of the embedded certificate's key,
//! not that the certificate is trustworthy.

use chrono::{DateTime, Utc};
use const_oid::ObjectIdentifier;
use serde::Serialize;
use x509_parser::prelude::{FromDer, X509Certificate};

use super::container::{SignatureContainer, SignerPayload, TimestampToken, TstInfoSummary};
use super::crypto;
use super::types::{
    digest_algorithm_name, signature_algorithm_name, DigestAlgorithm, IntegrityResult,
    SignatureAlgorithm, SignatureSubFilter, VerificationFailure,
};
use crate::config::InspectConfig;
use crate::error::{Error, Result};

/// Verification outcome of a timestamp token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimestampReport {
    /// Time-stamping authority name
    pub tsa_name: Option<String>,
    /// Time asserted by the authority
    pub time: DateTime<Utc>,
    /// Message imprint algorithm name
    pub imprint_algorithm: String,
    /// False when timestamp verification was disabled
    pub checked: bool,
    /// The authority's signature over the token verified
    pub signature_verified: bool,
    /// The imprint matches the data the token is supposed to cover
    pub imprint_verified: bool,
    /// First problem found, if any
    pub failure: Option<VerificationFailure>,
}

/// Integrity verdict plus timestamp outcome for one signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// Primary integrity verdict
    pub integrity: IntegrityResult,
    /// Timestamp outcome, if the signature carries or is a timestamp
    pub timestamp: Option<TimestampReport>,
}

/// Verifier for PDF digital signatures.
#[derive(Debug, Clone)]
pub struct IntegrityVerifier {
    allow_weak_digests: bool,
    verify_timestamps: bool,
}

impl Default for IntegrityVerifier {
    fn default() -> Self {
        Self::new(&InspectConfig::default())
    }
}

impl IntegrityVerifier {
    /// Create a verifier honouring the digest and timestamp settings of `config`.
    pub fn new(config: &InspectConfig) -> Self {
        Self {
            allow_weak_digests: config.allow_weak_digests,
            verify_timestamps: config.verify_timestamps,
        }
    }

    /// Verify a parsed container against the bytes its ByteRange covers.
    pub fn verify(&self, container: &SignatureContainer, signed_bytes: &[u8]) -> Verification {
        let integrity = match self.check_integrity(container, signed_bytes) {
            Ok(()) => {
                log::info!("Signature integrity verified ({})", container.sub_filter.as_pdf_name());
                IntegrityResult::passed()
            },
            Err(e) => {
                log::info!("Signature integrity check failed: {}", e);
                IntegrityResult::failed(&e)
            },
        };

        let timestamp = match (&container.document_timestamp, &container.timestamp) {
            (Some(info), _) => Some(self.document_timestamp_report(info, &integrity, signed_bytes)),
            (None, Some(token)) => Some(self.check_timestamp(token, &container.payload.signature)),
            (None, None) => None,
        };

        Verification {
            integrity,
            timestamp,
        }
    }

    /// Digest and signature check for the container's signer.
    pub fn check_integrity(
        &self,
        container: &SignatureContainer,
        signed_bytes: &[u8],
    ) -> Result<()> {
        let payload = &container.payload;
        match container.sub_filter {
            SignatureSubFilter::Pkcs7Detached | SignatureSubFilter::CadesDetached => {
                self.verify_signer(payload, signed_bytes)
            },
            SignatureSubFilter::Pkcs7Sha1 => {
                let encapsulated = payload.encapsulated_content.as_deref().ok_or_else(|| {
                    Error::MalformedContainer("no encapsulated digest".to_string())
                })?;
                self.check_digest_allowed(DigestAlgorithm::Sha1)?;
                compare_digest(encapsulated, &crypto::digest(DigestAlgorithm::Sha1, signed_bytes))?;
                self.verify_signer(payload, encapsulated)
            },
            SignatureSubFilter::Rfc3161 => {
                let info = container.document_timestamp.as_ref().ok_or_else(|| {
                    Error::MalformedContainer("document timestamp without TSTInfo".to_string())
                })?;
                let algorithm = self.resolve_digest(&info.imprint_algorithm)?;
                compare_digest(&info.imprint, &crypto::digest(algorithm, signed_bytes))?;
                let tst_info = payload.encapsulated_content.as_deref().ok_or_else(|| {
                    Error::MalformedContainer("timestamp token has no TSTInfo".to_string())
                })?;
                self.verify_signer(payload, tst_info)
            },
        }
    }

    /// Check one CMS signer over `content`.
    ///
    /// With signed attributes, the `messageDigest` attribute must equal the
    /// digest of `content` and the signature covers the DER attribute set.
    /// Without them the signature covers `content` directly.
    fn verify_signer(&self, payload: &SignerPayload, content: &[u8]) -> Result<()> {
        let digest_algorithm = self.resolve_digest(&payload.digest_algorithm)?;

        let message = match (&payload.signed_attributes, &payload.message_digest) {
            (Some(attributes), Some(message_digest)) => {
                compare_digest(message_digest, &crypto::digest(digest_algorithm, content))?;
                attributes.as_slice()
            },
            (Some(_), None) => {
                return Err(Error::MalformedContainer(
                    "signed attributes without a messageDigest".to_string(),
                ))
            },
            (None, _) => content,
        };

        let signature_algorithm =
            SignatureAlgorithm::from_oid(&payload.signature_algorithm, digest_algorithm)
                .ok_or_else(|| {
                    Error::UnsupportedAlgorithm(signature_algorithm_name(
                        &payload.signature_algorithm,
                        &payload.digest_algorithm,
                    ))
                })?;
        self.check_digest_allowed(signature_algorithm.digest)?;

        let certificate = payload
            .certificate
            .as_deref()
            .ok_or_else(|| Error::CertificateParseError("no signer certificate".to_string()))?;
        let (_, cert) = X509Certificate::from_der(certificate)
            .map_err(|e| Error::CertificateParseError(e.to_string()))?;

        crypto::verify_signature(
            cert.public_key().raw,
            signature_algorithm,
            message,
            &payload.signature,
        )
    }

    fn resolve_digest(&self, oid: &ObjectIdentifier) -> Result<DigestAlgorithm> {
        let algorithm = DigestAlgorithm::from_oid(oid)
            .ok_or_else(|| Error::UnsupportedAlgorithm(digest_algorithm_name(oid)))?;
        self.check_digest_allowed(algorithm)?;
        Ok(algorithm)
    }

    fn check_digest_allowed(&self, algorithm: DigestAlgorithm) -> Result<()> {
        if algorithm.is_weak() && !self.allow_weak_digests {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{} rejected by configuration",
                algorithm.name()
            )));
        }
        Ok(())
    }

    /// Check an embedded timestamp token: the authority's signature over the
    /// `TSTInfo`, and the imprint against the outer signature value.
    pub fn check_timestamp(
        &self,
        token: &TimestampToken,
        signature_value: &[u8],
    ) -> TimestampReport {
        let mut report = timestamp_report(&token.info);
        if !self.verify_timestamps {
            return report;
        }
        report.checked = true;

        let signature = token
            .payload
            .encapsulated_content
            .as_deref()
            .ok_or_else(|| Error::MalformedContainer("timestamp token has no TSTInfo".to_string()))
            .and_then(|tst_info| self.verify_signer(&token.payload, tst_info));

        let imprint = self.resolve_digest(&token.info.imprint_algorithm).and_then(|algorithm| {
            if token.info.imprint == crypto::digest(algorithm, signature_value) {
                Ok(())
            } else {
                Err(Error::TimestampBindingFailed(
                    "message imprint does not match the signature value".to_string(),
                ))
            }
        });

        report.signature_verified = signature.is_ok();
        report.imprint_verified = imprint.is_ok();
        report.failure = imprint
            .err()
            .or_else(|| signature.err())
            .map(VerificationFailure::from);

        match &report.failure {
            Some(failure) => log::warn!("Timestamp check failed: {}", failure.message),
            None => log::debug!("Timestamp verified, time {}", report.time),
        }
        report
    }

    /// A document timestamp is its own primary signature; its report mirrors
    /// the integrity result.
    fn document_timestamp_report(
        &self,
        info: &TstInfoSummary,
        integrity: &IntegrityResult,
        signed_bytes: &[u8],
    ) -> TimestampReport {
        let mut report = timestamp_report(info);
        report.checked = true;
        report.imprint_verified = DigestAlgorithm::from_oid(&info.imprint_algorithm)
            .map(|algorithm| info.imprint == crypto::digest(algorithm, signed_bytes))
            .unwrap_or(false);
        report.signature_verified = integrity.valid;
        report.failure = integrity.failure.clone();
        report
    }
}

fn timestamp_report(info: &TstInfoSummary) -> TimestampReport {
    TimestampReport {
        tsa_name: info.tsa_name.clone(),
        time: info.time,
        imprint_algorithm: digest_algorithm_name(&info.imprint_algorithm),
        checked: false,
        signature_verified: false,
        imprint_verified: false,
        failure: None,
    }
}

fn compare_digest(expected: &[u8], computed: &[u8]) -> Result<()> {
    if expected == computed {
        Ok(())
    } else {
        Err(Error::DigestMismatch {
            expected: hex::encode(expected),
            computed: hex::encode(computed),
        })
    }
}
