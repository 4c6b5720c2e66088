//! Error types for PDF signature inspection.
//!
//! This module defines all error types that can occur while opening a document and
//! inspecting its signatures. Per-signature failures are captured into that
//! signature's report (see [`crate::signatures::VerificationFailure`]); only document
//! level failures abort an inspection.

use serde::Serialize;

/// Result type alias for signature inspection operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during signature inspection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document itself could not be opened or parsed
    #[error("Invalid PDF: {0}")]
    Pdf(String),

    /// A signature field or its value dictionary is structurally broken
    #[error("Invalid signature field '{name}': {reason}")]
    InvalidSignatureField {
        /// Fully qualified field name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// No signature with the requested name
    #[error("Signature not found: {0}")]
    SignatureNotFound(String),

    /// ByteRange pairs are non-monotonic, overlapping, negative or out of bounds
    #[error("Malformed ByteRange: {0}")]
    MalformedByteRange(String),

    /// The /SubFilter names a container format this engine does not parse
    #[error("Unsupported signature container format: {0}")]
    UnsupportedContainerFormat(String),

    /// The /Contents value is not a well-formed CMS signed-data structure
    #[error("Malformed signature container: {0}")]
    MalformedContainer(String),

    /// Recomputed digest differs from the one covered by the signature
    #[error("Message digest mismatch: expected {expected}, computed {computed}")]
    DigestMismatch {
        /// Hex digest carried by the signature
        expected: String,
        /// Hex digest of the signed byte range
        computed: String,
    },

    /// The signature value does not verify against the signer's public key
    #[error("Signature verification failed: {0}")]
    SignatureVerificationFailed(String),

    /// Digest, signature or key algorithm not supported
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Signer certificate missing or unparseable
    #[error("Certificate parse error: {0}")]
    CertificateParseError(String),

    /// Timestamp message imprint does not match the signature value
    #[error("Timestamp binding failed: {0}")]
    TimestampBindingFailed(String),

    /// Inspection was cancelled before it completed
    #[error("Inspection cancelled")]
    Cancelled,

    /// Report serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::Pdf(err.to_string())
    }
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Self {
        Error::MalformedContainer(err.to_string())
    }
}

/// Classification of a per-signature failure, as it appears in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// See [`Error::MalformedByteRange`]
    MalformedByteRange,
    /// See [`Error::UnsupportedContainerFormat`]
    UnsupportedContainerFormat,
    /// See [`Error::MalformedContainer`]
    MalformedContainer,
    /// See [`Error::DigestMismatch`]
    DigestMismatch,
    /// See [`Error::SignatureVerificationFailed`]
    SignatureVerificationFailed,
    /// See [`Error::UnsupportedAlgorithm`]
    UnsupportedAlgorithm,
    /// See [`Error::CertificateParseError`]
    CertificateParseError,
    /// See [`Error::TimestampBindingFailed`]
    TimestampBindingFailed,
    /// Anything else (document level errors surfacing through one signature)
    Other,
}

impl Error {
    /// Classify this error for inclusion in a signature report.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::MalformedByteRange(_) => FailureKind::MalformedByteRange,
            Error::UnsupportedContainerFormat(_) => FailureKind::UnsupportedContainerFormat,
            Error::MalformedContainer(_) => FailureKind::MalformedContainer,
            Error::DigestMismatch { .. } => FailureKind::DigestMismatch,
            Error::SignatureVerificationFailed(_) => FailureKind::SignatureVerificationFailed,
            Error::UnsupportedAlgorithm(_) => FailureKind::UnsupportedAlgorithm,
            Error::CertificateParseError(_) => FailureKind::CertificateParseError,
            Error::TimestampBindingFailed(_) => FailureKind::TimestampBindingFailed,
            _ => FailureKind::Other,
        }
    }
}
