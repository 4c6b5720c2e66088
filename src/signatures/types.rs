//! Digital signature types and data structures.
//!
//! This module defines the fixed-shape records the inspection pipeline passes
//! around: signature fields and dictionaries as read from the document, the
//! algorithms a container declares, and the failure records that end up in a
//! report.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use const_oid::db::{rfc5912, rfc6268};
use const_oid::ObjectIdentifier;
use serde::{Serialize, Serializer};

use crate::error::{Error, FailureKind};
use crate::geometry::Rect;

/// Object identifiers used by the container parser and the verifier.
pub mod oids {
    use super::*;

    /// id-signedData
    pub const SIGNED_DATA: ObjectIdentifier = rfc6268::ID_SIGNED_DATA;
    /// id-data
    pub const DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
    /// id-contentType signed attribute
    pub const CONTENT_TYPE: ObjectIdentifier = rfc6268::ID_CONTENT_TYPE;
    /// id-messageDigest signed attribute
    pub const MESSAGE_DIGEST: ObjectIdentifier = rfc6268::ID_MESSAGE_DIGEST;
    /// id-signingTime signed attribute
    pub const SIGNING_TIME: ObjectIdentifier = rfc6268::ID_SIGNING_TIME;
    /// id-aa-timeStampToken unsigned attribute
    pub const TIMESTAMP_TOKEN: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.14");
    /// id-ct-TSTInfo
    pub const TST_INFO: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4");
    /// subjectKeyIdentifier certificate extension
    pub const SUBJECT_KEY_IDENTIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.14");

    /// MD5
    pub const MD5: ObjectIdentifier = rfc5912::ID_MD_5;
    /// SHA-1
    pub const SHA1: ObjectIdentifier = rfc5912::ID_SHA_1;
    /// SHA-224
    pub const SHA224: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.4");
    /// SHA-256
    pub const SHA256: ObjectIdentifier = rfc5912::ID_SHA_256;
    /// SHA-384
    pub const SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
    /// SHA-512
    pub const SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

    /// rsaEncryption (digest taken from the signer info)
    pub const RSA_ENCRYPTION: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
    /// md5WithRSAEncryption
    pub const MD5_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.4");
    /// sha1WithRSAEncryption
    pub const SHA1_WITH_RSA: ObjectIdentifier = rfc5912::SHA_1_WITH_RSA_ENCRYPTION;
    /// sha256WithRSAEncryption
    pub const SHA256_WITH_RSA: ObjectIdentifier = rfc5912::SHA_256_WITH_RSA_ENCRYPTION;
    /// sha384WithRSAEncryption
    pub const SHA384_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
    /// sha512WithRSAEncryption
    pub const SHA512_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
    /// sha224WithRSAEncryption
    pub const SHA224_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.14");
    /// id-RSASSA-PSS
    pub const RSASSA_PSS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10");

    /// id-ecPublicKey (also used by some producers as the signature algorithm)
    pub const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
    /// ecdsa-with-SHA1
    pub const ECDSA_WITH_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");
    /// ecdsa-with-SHA224
    pub const ECDSA_WITH_SHA224: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.1");
    /// ecdsa-with-SHA256
    pub const ECDSA_WITH_SHA256: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
    /// ecdsa-with-SHA384
    pub const ECDSA_WITH_SHA384: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
    /// ecdsa-with-SHA512
    pub const ECDSA_WITH_SHA512: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

    /// prime256v1 / secp256r1
    pub const CURVE_P256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
    /// secp384r1
    pub const CURVE_P384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
}

/// Digest algorithm declared by a signature container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DigestAlgorithm {
    /// MD5 (broken, only seen in very old PDFs)
    Md5,
    /// SHA-1 (deprecated, but still common in legacy PDFs)
    Sha1,
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl DigestAlgorithm {
    /// Map a digest algorithm OID.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        match *oid {
            oids::MD5 => Some(DigestAlgorithm::Md5),
            oids::SHA1 => Some(DigestAlgorithm::Sha1),
            oids::SHA224 => Some(DigestAlgorithm::Sha224),
            oids::SHA256 => Some(DigestAlgorithm::Sha256),
            oids::SHA384 => Some(DigestAlgorithm::Sha384),
            oids::SHA512 => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Get the OID for this digest algorithm.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Md5 => oids::MD5,
            DigestAlgorithm::Sha1 => oids::SHA1,
            DigestAlgorithm::Sha224 => oids::SHA224,
            DigestAlgorithm::Sha256 => oids::SHA256,
            DigestAlgorithm::Sha384 => oids::SHA384,
            DigestAlgorithm::Sha512 => oids::SHA512,
        }
    }

    /// Get the name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha224 => "SHA-224",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// MD5 and SHA-1 are no longer collision resistant.
    pub fn is_weak(&self) -> bool {
        matches!(self, DigestAlgorithm::Md5 | DigestAlgorithm::Sha1)
    }

    fn short_name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha1 => "SHA1",
            DigestAlgorithm::Sha224 => "SHA224",
            DigestAlgorithm::Sha256 => "SHA256",
            DigestAlgorithm::Sha384 => "SHA384",
            DigestAlgorithm::Sha512 => "SHA512",
        }
    }
}

/// Public key family of a signature algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum KeyAlgorithm {
    /// RSA with PKCS#1 v1.5 padding
    Rsa,
    /// ECDSA
    Ecdsa,
}

/// Signature algorithm: key family plus the digest fed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SignatureAlgorithm {
    /// Key family
    pub key: KeyAlgorithm,
    /// Digest of the signed message
    pub digest: DigestAlgorithm,
}

impl SignatureAlgorithm {
    /// Resolve the signer-info signature algorithm.
    ///
    /// Bare `rsaEncryption` and `id-ecPublicKey` carry no digest of their own; the
    /// signer-info digest algorithm applies.
    pub fn from_oid(oid: &ObjectIdentifier, digest: DigestAlgorithm) -> Option<Self> {
        let (key, digest) = match *oid {
            oids::RSA_ENCRYPTION => (KeyAlgorithm::Rsa, digest),
            oids::MD5_WITH_RSA => (KeyAlgorithm::Rsa, DigestAlgorithm::Md5),
            oids::SHA1_WITH_RSA => (KeyAlgorithm::Rsa, DigestAlgorithm::Sha1),
            oids::SHA224_WITH_RSA => (KeyAlgorithm::Rsa, DigestAlgorithm::Sha224),
            oids::SHA256_WITH_RSA => (KeyAlgorithm::Rsa, DigestAlgorithm::Sha256),
            oids::SHA384_WITH_RSA => (KeyAlgorithm::Rsa, DigestAlgorithm::Sha384),
            oids::SHA512_WITH_RSA => (KeyAlgorithm::Rsa, DigestAlgorithm::Sha512),
            oids::EC_PUBLIC_KEY => (KeyAlgorithm::Ecdsa, digest),
            oids::ECDSA_WITH_SHA1 => (KeyAlgorithm::Ecdsa, DigestAlgorithm::Sha1),
            oids::ECDSA_WITH_SHA224 => (KeyAlgorithm::Ecdsa, DigestAlgorithm::Sha224),
            oids::ECDSA_WITH_SHA256 => (KeyAlgorithm::Ecdsa, DigestAlgorithm::Sha256),
            oids::ECDSA_WITH_SHA384 => (KeyAlgorithm::Ecdsa, DigestAlgorithm::Sha384),
            oids::ECDSA_WITH_SHA512 => (KeyAlgorithm::Ecdsa, DigestAlgorithm::Sha512),
            _ => return None,
        };
        Some(Self { key, digest })
    }

    /// Java-style name, e.g. `SHA256withRSA`.
    pub fn name(&self) -> String {
        let key = match self.key {
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::Ecdsa => "ECDSA",
        };
        format!("{}with{}", self.digest.short_name(), key)
    }
}

/// Human readable name for a signature algorithm OID, falling back to the dotted form.
pub fn signature_algorithm_name(oid: &ObjectIdentifier, digest_oid: &ObjectIdentifier) -> String {
    if *oid == oids::RSASSA_PSS {
        return "RSASSA-PSS".to_string();
    }
    DigestAlgorithm::from_oid(digest_oid)
        .and_then(|digest| SignatureAlgorithm::from_oid(oid, digest))
        .map(|alg| alg.name())
        .unwrap_or_else(|| oid.to_string())
}

/// Human readable name for a digest algorithm OID, falling back to the dotted form.
pub fn digest_algorithm_name(oid: &ObjectIdentifier) -> String {
    DigestAlgorithm::from_oid(oid)
        .map(|alg| alg.name().to_string())
        .unwrap_or_else(|| oid.to_string())
}

/// Signature sub-filter type (signature format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    Pkcs7Detached,
    /// adbe.pkcs7.sha1 - PKCS#7 with SHA-1 digest
    Pkcs7Sha1,
    /// ETSI.CAdES.detached - PAdES CAdES signature
    CadesDetached,
    /// ETSI.RFC3161 - Document timestamp token
    Rfc3161,
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::Pkcs7Sha1 => "adbe.pkcs7.sha1",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
            SignatureSubFilter::Rfc3161 => "ETSI.RFC3161",
        }
    }

    /// Parse a PDF name into a sub-filter type.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            "adbe.pkcs7.sha1" => Some(SignatureSubFilter::Pkcs7Sha1),
            "ETSI.CAdES.detached" => Some(SignatureSubFilter::CadesDetached),
            "ETSI.RFC3161" => Some(SignatureSubFilter::Rfc3161),
            _ => None,
        }
    }
}

/// Transform method of a signature reference dictionary (`/TransformMethod`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransformMethod {
    /// Document modification detection (certification signature)
    DocMdp,
    /// Field modification detection (field locks)
    FieldMdp,
    /// Usage rights
    Ur3,
    /// Anything else
    Other(String),
}

impl TransformMethod {
    /// Parse from PDF name.
    pub fn from_pdf_name(name: &str) -> Self {
        match name {
            "DocMDP" => TransformMethod::DocMdp,
            "FieldMDP" => TransformMethod::FieldMdp,
            "UR3" | "UR" => TransformMethod::Ur3,
            other => TransformMethod::Other(other.to_string()),
        }
    }
}

/// Field lock action from `/TransformParams /Action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LockAction {
    /// Every field in the document is locked
    All,
    /// Only the listed fields are locked
    Include,
    /// Every field except the listed ones is locked
    Exclude,
}

impl LockAction {
    /// Parse from PDF name.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "All" => Some(LockAction::All),
            "Include" => Some(LockAction::Include),
            "Exclude" => Some(LockAction::Exclude),
            _ => None,
        }
    }
}

/// A field lock imposed by a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldLock {
    /// Lock action
    pub action: LockAction,
    /// Field names the action applies to
    pub fields: Vec<String>,
}

impl std::fmt::Display for FieldLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.action)?;
        if !self.fields.is_empty() {
            write!(f, " [{}]", self.fields.join(", "))?;
        }
        Ok(())
    }
}

/// One entry of a signature dictionary's `/Reference` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformReference {
    /// `/TransformMethod`
    pub method: TransformMethod,
    /// Access permission level `/P` (1, 2 or 3), if present; DocMDP, or FieldMDP since PDF 2.0
    pub permission_level: Option<i64>,
    /// FieldMDP lock, if `/Action` is present
    pub lock: Option<FieldLock>,
}

/// Signature value dictionary (`/V` of a signature field), as a fixed-shape record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureDictionary {
    /// `/Filter` (signature handler), e.g. `Adobe.PPKLite`
    pub filter: Option<String>,
    /// `/SubFilter` exactly as written
    pub raw_sub_filter: Option<String>,
    /// `/ByteRange`
    pub byte_range: Vec<i64>,
    /// `/Contents` (decoded bytes)
    pub contents: Vec<u8>,
    /// `/Name`
    pub name: Option<String>,
    /// `/M`, raw PDF date string
    pub signing_time: Option<String>,
    /// `/Reason`
    pub reason: Option<String>,
    /// `/Location`
    pub location: Option<String>,
    /// `/ContactInfo`
    pub contact_info: Option<String>,
    /// `/Reference` entries
    pub references: Vec<TransformReference>,
}

impl SignatureDictionary {
    /// Parsed sub-filter, `None` for missing or unrecognized values.
    pub fn sub_filter(&self) -> Option<SignatureSubFilter> {
        self.raw_sub_filter
            .as_deref()
            .and_then(SignatureSubFilter::from_pdf_name)
    }

    /// True if any reference is a DocMDP transform.
    pub fn is_certification(&self) -> bool {
        self.references
            .iter()
            .any(|r| r.method == TransformMethod::DocMdp)
    }
}

bitflags! {
    /// Annotation flags (`/F`) relevant to signature widgets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AnnotationFlags: u32 {
        /// Invisible (unknown annotation type)
        const INVISIBLE = 1 << 0;
        /// Hidden
        const HIDDEN = 1 << 1;
        /// Print
        const PRINT = 1 << 2;
        /// No view
        const NO_VIEW = 1 << 5;
        /// Locked
        const LOCKED = 1 << 7;
    }
}

impl Serialize for AnnotationFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

/// Placement of a signature widget annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetPlacement {
    /// 1-based page number, if the widget could be located in the page tree
    pub page: Option<u32>,
    /// Widget rectangle
    pub rect: Rect,
    /// Annotation flags
    pub flags: AnnotationFlags,
}

impl WidgetPlacement {
    /// Invisible signatures have an empty rectangle or are hidden from view.
    pub fn is_invisible(&self) -> bool {
        self.rect.is_empty()
            || self
                .flags
                .intersects(AnnotationFlags::HIDDEN | AnnotationFlags::NO_VIEW)
    }
}

/// A signed signature field of the document's AcroForm.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureField {
    /// Fully qualified field name
    pub name: String,
    /// First widget of the field
    pub widget: Option<WidgetPlacement>,
    /// Signature value dictionary
    pub dictionary: SignatureDictionary,
}

/// Subset of the signer certificate shown in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
    /// Subject CN
    pub common_name: Option<String>,
    /// Subject distinguished name
    pub subject: String,
    /// Issuer distinguished name
    pub issuer: String,
    /// Serial number, hex encoded
    pub serial_number: String,
    /// Start of validity
    pub not_before: Option<DateTime<Utc>>,
    /// End of validity
    pub not_after: Option<DateTime<Utc>>,
}

/// Where a claimed signing time came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningTimeSource {
    /// The CMS `signingTime` signed attribute
    SignedAttribute,
    /// The signature dictionary `/M` entry
    Dictionary,
}

/// Signing time asserted by the signer.
///
/// This value is only as trustworthy as the signer: it is not a verified time.
/// Use the timestamp token time for a trusted time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClaimedSigningTime {
    /// Asserted time, in UTC
    pub time: DateTime<Utc>,
    /// Origin of the assertion
    pub source: SigningTimeSource,
}

/// A per-signature failure as recorded in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationFailure {
    /// Failure class
    pub kind: FailureKind,
    /// Detail message
    pub message: String,
}

impl From<&Error> for VerificationFailure {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<Error> for VerificationFailure {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}

/// Primary integrity verdict for one signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityResult {
    /// True if digest and signature value both verified
    pub valid: bool,
    /// Reason when `valid` is false
    pub failure: Option<VerificationFailure>,
}

impl IntegrityResult {
    /// Passing result.
    pub fn passed() -> Self {
        Self {
            valid: true,
            failure: None,
        }
    }

    /// Failing result carrying the error that caused it.
    pub fn failed(err: &Error) -> Self {
        Self {
            valid: false,
            failure: Some(err.into()),
        }
    }
}

/// Parse a PDF date string (`D:YYYYMMDDHHmmSSOHH'mm'`) into UTC.
///
/// Every component after the year is optional; a missing offset means UTC.
pub fn parse_pdf_date(value: &str) -> Option<DateTime<Utc>> {
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    let s = value.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);
    let digits_end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (digits, rest) = s.split_at(digits_end);
    if digits.len() < 4 {
        return None;
    }

    let field = |start: usize, len: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + len) {
            Some(part) => part.parse().ok(),
            None => Some(default),
        }
    };
    let year: i32 = digits.get(0..4)?.parse().ok()?;
    let month = field(4, 2, 1)?;
    let day = field(6, 2, 1)?;
    let hour = field(8, 2, 0)?;
    let minute = field(10, 2, 0)?;
    let second = field(12, 2, 0)?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;

    let offset_seconds = match rest.chars().next() {
        Some(sign @ ('+' | '-')) => {
            let tz: String = rest[1..].chars().filter(|c| c.is_ascii_digit()).collect();
            let hours: i32 = tz.get(0..2).and_then(|h| h.parse().ok()).unwrap_or(0);
            let minutes: i32 = tz.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
            let total = hours * 3600 + minutes * 60;
            if sign == '-' {
                -total
            } else {
                total
            }
        },
        _ => 0,
    };

    let offset = FixedOffset::east_opt(offset_seconds)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
