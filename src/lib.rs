// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::match_like_matches_macro)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # PDF Sigcheck
//!
//! Inspection engine for the digital signatures embedded in PDF documents.
//!
//! ## Core Features
//!
//! - **ByteRange Validation**: bounds, ordering and whole-document coverage (§12.8.1)
//! - **CMS Containers**: adbe.pkcs7.detached, adbe.pkcs7.sha1, ETSI.CAdES.detached, ETSI.RFC3161
//! - **Integrity**: message digest and signature value (RSA PKCS#1 v1.5, ECDSA P-256/P-384)
//! - **Timestamps**: RFC 3161 token signature and imprint binding
//! - **Revisions**: which incremental update each signature covers
//! - **Permissions**: DocMDP / FieldMDP restrictions folded in signing order (§12.8.2)
//!
//! Certificate trust (path building, OCSP, CRL) is out of scope: a valid
//! signature means the signed bytes are unchanged and were signed with the key
//! of the embedded certificate.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_sigcheck::{InspectConfig, PdfDocument, ReportBuilder};
//!
//! let doc = PdfDocument::open("contract.pdf")?;
//! let reports = ReportBuilder::new(InspectConfig::default()).inspect(&doc)?;
//!
//! for report in &reports {
//!     println!(
//!         "{}: integrity {}, revision {:?} of {}",
//!         report.name,
//!         report.integrity.valid,
//!         report.revision.revision,
//!         report.revision.total_revisions,
//!     );
//! }
//! # Ok::<(), pdf_sigcheck::Error>(())
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or
//!   <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Document access (lopdf-backed)
pub mod document;

// Geometry primitives
pub mod geometry;

// Signature inspection pipeline
pub mod signatures;

// Configuration
pub mod config;

// Re-exports
pub use config::InspectConfig;
pub use document::{PdfDocument, SignatureSource};
pub use error::{Error, Result};
pub use signatures::{CancellationToken, ReportBuilder, SignatureReport};

/// Open the PDF at `path` and inspect all of its signatures.
///
/// Shorthand for [`PdfDocument::open`] followed by [`ReportBuilder::inspect`].
pub fn inspect_file(
    path: impl AsRef<std::path::Path>,
    config: InspectConfig,
) -> Result<Vec<SignatureReport>> {
    let doc = PdfDocument::open(path)?;
    ReportBuilder::new(config).inspect(&doc)
}

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
