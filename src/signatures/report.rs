//! Per-signature report assembly.
//!
//! The builder analyses every signature field independently (byte range,
//! container, integrity, revision), optionally on the rayon pool, then folds
//! permissions sequentially in the order the signatures were applied to the
//! document. Reports come back in AcroForm order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use super::byterange::extract_signed_region;
use super::container::{ContainerParser, SignatureContainer};
use super::permissions::{PermissionAccumulator, PermissionSnapshot};
use super::revision::{RevisionAccountant, RevisionInfo};
use super::types::{
    digest_algorithm_name, signature_algorithm_name, CertificateSummary, ClaimedSigningTime,
    IntegrityResult, SignatureField, WidgetPlacement,
};
use super::verifier::{IntegrityVerifier, TimestampReport};
use crate::config::InspectConfig;
use crate::document::SignatureSource;
use crate::error::{Error, Result};

/// Cooperative cancellation flag shared between a caller and an inspection.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`cancel`](Self::cancel) was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Everything known about one signature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureReport {
    /// Fully qualified field name
    pub name: String,
    /// Widget position; `None` when the field has no widget
    pub widget: Option<WidgetPlacement>,
    /// Invisible signature (no widget, empty rectangle or hidden)
    pub invisible: bool,
    /// `/Filter`
    pub filter: Option<String>,
    /// `/SubFilter`
    pub sub_filter: Option<String>,
    /// Signer certificate
    pub signer: Option<CertificateSummary>,
    /// Alternative signer name (`/Name`)
    pub signer_name: Option<String>,
    /// Digest algorithm name
    pub digest_algorithm: Option<String>,
    /// Signature algorithm name
    pub signature_algorithm: Option<String>,
    /// Certificates embedded in the container
    pub certificate_count: usize,
    /// Signing time claimed by the signer. Not verified.
    #[serde(rename = "signing_time_untrusted")]
    pub claimed_signing_time: Option<ClaimedSigningTime>,
    /// `/Reason`
    pub reason: Option<String>,
    /// `/Location`
    pub location: Option<String>,
    /// `/ContactInfo`
    pub contact_info: Option<String>,
    /// Primary integrity verdict
    pub integrity: IntegrityResult,
    /// Timestamp outcome
    pub timestamp: Option<TimestampReport>,
    /// Revision coverage
    pub revision: RevisionInfo,
    /// Permissions right after this signature was applied
    pub permissions: PermissionSnapshot,
}

/// Result of analysing one field, before permissions are folded.
struct Analysis<'a> {
    field: &'a SignatureField,
    signed_end: Option<usize>,
    container: Option<SignatureContainer>,
    integrity: IntegrityResult,
    timestamp: Option<TimestampReport>,
    revision: RevisionInfo,
}

/// Drives inspection of every signature in a document.
pub struct ReportBuilder {
    config: InspectConfig,
    verifier: IntegrityVerifier,
    cancellation: CancellationToken,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new(InspectConfig::default())
    }
}

impl ReportBuilder {
    /// Create a builder.
    pub fn new(config: InspectConfig) -> Self {
        Self {
            verifier: IntegrityVerifier::new(&config),
            config,
            cancellation: CancellationToken::new(),
        }
    }

    /// Observe `token` for cancellation.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Inspect every signature of `source`.
    ///
    /// Per-signature failures are recorded in the corresponding report. Only
    /// cancellation aborts, and then no reports are returned.
    pub fn inspect<S>(&self, source: &S) -> Result<Vec<SignatureReport>>
    where
        S: SignatureSource + ?Sized,
    {
        let mut fields = source.signature_fields();
        if fields.len() > self.config.max_signatures {
            log::warn!(
                "Document has {} signatures, inspecting the first {}",
                fields.len(),
                self.config.max_signatures
            );
            fields = &fields[..self.config.max_signatures];
        }
        log::info!("Inspecting {} signature(s)", fields.len());

        let analyses: Vec<Analysis<'_>> = if self.config.parallel {
            fields
                .par_iter()
                .map(|field| self.analyse(source, field))
                .collect::<Result<_>>()?
        } else {
            fields
                .iter()
                .map(|field| self.analyse(source, field))
                .collect::<Result<_>>()?
        };

        let snapshots = self.fold_permissions(&analyses)?;

        Ok(analyses
            .into_iter()
            .zip(snapshots)
            .map(|(analysis, permissions)| build_report(analysis, permissions))
            .collect())
    }

    /// Inspect the document and return the report of the signature `name`.
    ///
    /// All signatures are analysed: a signature's permissions depend on those
    /// applied before it.
    pub fn inspect_one<S>(&self, source: &S, name: &str) -> Result<SignatureReport>
    where
        S: SignatureSource + ?Sized,
    {
        if source.signature_field(name).is_none() {
            return Err(Error::SignatureNotFound(name.to_string()));
        }
        self.inspect(source)?
            .into_iter()
            .find(|report| report.name == name)
            .ok_or_else(|| Error::SignatureNotFound(name.to_string()))
    }

    fn analyse<'a, S>(&self, source: &S, field: &'a SignatureField) -> Result<Analysis<'a>>
    where
        S: SignatureSource + ?Sized,
    {
        self.cancellation.check()?;
        log::debug!("Analysing signature '{}'", field.name);

        let data = source.bytes();
        let history = source.revision_history();

        let region = match extract_signed_region(&field.dictionary.byte_range, data) {
            Ok(region) => region,
            Err(e) => {
                log::info!("Signature '{}': {}", field.name, e);
                return Ok(Analysis {
                    field,
                    signed_end: None,
                    container: None,
                    integrity: IntegrityResult::failed(&e),
                    timestamp: None,
                    revision: RevisionInfo {
                        revision: None,
                        total_revisions: u32::try_from(history.len().max(1)).unwrap_or(u32::MAX),
                        covers_whole_document: false,
                    },
                });
            },
        };

        let signed_end = region.byte_range.end();
        let revision = RevisionAccountant::locate(history, signed_end, data.len());

        let (container, integrity, timestamp) = match ContainerParser::parse(&field.dictionary) {
            Ok(container) => {
                let verification = self.verifier.verify(&container, &region.bytes);
                (Some(container), verification.integrity, verification.timestamp)
            },
            Err(e) => {
                log::info!("Signature '{}': {}", field.name, e);
                (None, IntegrityResult::failed(&e), None)
            },
        };

        Ok(Analysis {
            field,
            signed_end: Some(signed_end),
            container,
            integrity,
            timestamp,
            revision,
        })
    }

    /// Fold permissions oldest signature first and return the snapshots in
    /// enumeration order.
    ///
    /// Signatures are ordered by the end of their signed region; ties keep
    /// enumeration order and signatures without a usable ByteRange go last.
    fn fold_permissions(&self, analyses: &[Analysis<'_>]) -> Result<Vec<PermissionSnapshot>> {
        let mut order: Vec<usize> = (0..analyses.len()).collect();
        order.sort_by_key(|&index| {
            let end = analyses[index].signed_end;
            (end.is_none(), end, index)
        });

        let mut accumulator = PermissionAccumulator::new();
        let mut snapshots: Vec<Option<PermissionSnapshot>> = vec![None; analyses.len()];
        for index in order {
            self.cancellation.check()?;
            snapshots[index] = Some(accumulator.fold(&analyses[index].field.dictionary));
        }

        snapshots
            .into_iter()
            .map(|snapshot| {
                snapshot.ok_or_else(|| {
                    Error::Pdf("permission fold skipped a signature".to_string())
                })
            })
            .collect()
    }
}

fn build_report(analysis: Analysis<'_>, permissions: PermissionSnapshot) -> SignatureReport {
    let Analysis {
        field,
        container,
        integrity,
        timestamp,
        revision,
        ..
    } = analysis;
    let dict = &field.dictionary;

    let invisible = field
        .widget
        .as_ref()
        .map(|widget| widget.is_invisible())
        .unwrap_or(true);

    let mut report = SignatureReport {
        name: field.name.clone(),
        widget: field.widget.clone(),
        invisible,
        filter: dict.filter.clone(),
        sub_filter: dict.raw_sub_filter.clone(),
        signer: None,
        signer_name: dict.name.clone(),
        digest_algorithm: None,
        signature_algorithm: None,
        certificate_count: 0,
        claimed_signing_time: None,
        reason: dict.reason.clone(),
        location: dict.location.clone(),
        contact_info: dict.contact_info.clone(),
        integrity,
        timestamp,
        revision,
        permissions,
    };

    if let Some(container) = container {
        let payload = &container.payload;
        report.digest_algorithm = Some(digest_algorithm_name(&payload.digest_algorithm));
        report.signature_algorithm = Some(signature_algorithm_name(
            &payload.signature_algorithm,
            &payload.digest_algorithm,
        ));
        report.certificate_count = payload.certificate_count;
        report.signer = container.signer;
        report.claimed_signing_time = container.claimed_signing_time;
    }

    report
}
