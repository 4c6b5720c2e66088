//! PDF Digital Signatures module.
//!
//! This module inspects the digital signatures embedded in a PDF document
//! according to the PDF specification and PAdES (PDF Advanced Electronic
//! Signatures) standards.
//!
//! ## Pipeline
//!
//! For every signature field:
//!
//! - **ByteRange extraction**: validate `/ByteRange` and collect the signed bytes
//! - **Container parsing**: decode the CMS `SignedData` held in `/Contents`
//! - **Integrity verification**: digest, messageDigest attribute and signature value
//! - **Revision accounting**: which incremental update the signature covers
//!
//! Permissions (DocMDP / FieldMDP) are then folded over all signatures in the
//! order they were applied, and one [`SignatureReport`] is produced per field.
//!
//! ## Signature Types Supported
//!
//! - PKCS#7 detached signatures (adbe.pkcs7.detached)
//! - PKCS#7 SHA-1 signatures (adbe.pkcs7.sha1)
//! - PAdES signatures (ETSI.CAdES.detached)
//! - Document timestamps (ETSI.RFC3161)
//!
//! ## Example
//!
//! ```ignore
//! use pdf_sigcheck::document::PdfDocument;
//! use pdf_sigcheck::signatures::ReportBuilder;
//!
//! let doc = PdfDocument::open("signed.pdf")?;
//! for report in ReportBuilder::default().inspect(&doc)? {
//!     println!("{}: valid = {}", report.name, report.integrity.valid);
//! }
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - ISO 32000-2:2020 Section 12.8 - Digital Signatures
//! - ETSI TS 102 778 - PAdES

mod byterange;
mod container;
mod crypto;
mod permissions;
mod report;
mod revision;
mod types;
mod verifier;

pub use byterange::{extract_signed_region, ByteRange, SignedRegion};
pub use container::{
    decode_signed_data, summarize_certificate, ContainerParser, SignatureContainer,
    SignerPayload, TimestampToken, TstInfoSummary,
};
pub use crypto::{digest, verify_signature};
pub use permissions::{
    Permission, PermissionAccumulator, PermissionSnapshot, PermissionState, SignatureType,
    DEFAULT_DOCMDP_LEVEL,
};
pub use report::{CancellationToken, ReportBuilder, SignatureReport};
pub use revision::{RevisionAccountant, RevisionHistory, RevisionInfo};
pub use types::{
    digest_algorithm_name, oids, parse_pdf_date, signature_algorithm_name, AnnotationFlags,
    CertificateSummary, ClaimedSigningTime, DigestAlgorithm, FieldLock, IntegrityResult,
    KeyAlgorithm, LockAction, SignatureAlgorithm, SignatureDictionary, SignatureField,
    SignatureSubFilter, SigningTimeSource, TransformMethod, TransformReference,
    VerificationFailure, WidgetPlacement,
};
pub use verifier::{IntegrityVerifier, TimestampReport, Verification};
