//! Test fixtures: signed PDFs built in memory.
//!
//! `SignedPdfBuilder` writes a one-page document and appends incremental
//! updates, each optionally carrying one signature field. Signatures are real
//! CMS structures made with P-256 or RSA keys and self-issued certificates.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use cms::cert::x509::attr::Attribute;
use cms::cert::x509::certificate::{Certificate, TbsCertificate, Version};
use cms::cert::x509::ext::pkix::name::GeneralName;
use cms::cert::x509::name::Name;
use cms::cert::x509::serial_number::SerialNumber;
use cms::cert::x509::time::{Time, Validity};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo, SignerInfos,
};
use const_oid::ObjectIdentifier;
use der::asn1::{Any, BitString, GeneralizedTime, OctetString, SetOfVec, UtcTime};
use der::{Decode, Encode, Sequence};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use pdf_sigcheck::signatures::oids;
use pkcs8::{DecodePrivateKey, EncodePublicKey};
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_tsp::MessageImprint;

/// 2024-03-15T10:30:00Z
pub const SIGNING_TIME: u64 = 1_710_498_600;
/// One minute after [`SIGNING_TIME`]
pub const TSA_TIME: u64 = 1_710_498_660;

const NOT_BEFORE: u64 = 1_700_000_000;
const NOT_AFTER: u64 = 1_900_000_000;

/// Bytes reserved for the DER container in `/Contents`.
const CONTENTS_CAPACITY: usize = 4096;
const BYTE_RANGE_PLACEHOLDER: &str = "/ByteRange [0 ********** ********** **********]";

/// Fixed 2048-bit key, PKCS#8 PEM.
pub const RSA_KEY_PEM: &str = include_str!("../data/rsa_2048.pem");

const CATALOG: u32 = 1;
const PAGES: u32 = 2;
const PAGE: u32 = 3;
const ACROFORM: u32 = 4;

/// RFC 3161 `TSTInfo`, only the fields the fixtures set.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct TstInfoDer {
    version: u8,
    policy: ObjectIdentifier,
    message_imprint: MessageImprint,
    serial_number: u32,
    gen_time: GeneralizedTime,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    tsa: Option<GeneralName>,
}

/// How an embedded timestamp token relates to the signature it stamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimestampBinding {
    /// Imprint is the SHA-256 of the signature value
    Valid,
    /// Imprint covers unrelated bytes
    WrongImprint,
}

/// CMS construction options.
#[derive(Clone, Debug)]
pub struct CmsOptions {
    /// Sign a DER attribute set instead of the content itself
    pub signed_attributes: bool,
    /// `signingTime` attribute, seconds since the epoch
    pub signing_time: Option<u64>,
    /// Embed a timestamp token as an unsigned attribute
    pub timestamp: Option<TimestampBinding>,
    /// Flip a bit in the signature value after signing
    pub corrupt_signature: bool,
}

impl Default for CmsOptions {
    fn default() -> Self {
        Self {
            signed_attributes: true,
            signing_time: Some(SIGNING_TIME),
            timestamp: None,
            corrupt_signature: false,
        }
    }
}

/// Private key behind a [`TestSigner`].
#[derive(Clone)]
enum SignerKey {
    P256(SigningKey),
    Rsa(RsaPrivateKey),
}

impl SignerKey {
    fn public_key_der(&self) -> Vec<u8> {
        let der = match self {
            SignerKey::P256(key) => key.verifying_key().to_public_key_der(),
            SignerKey::Rsa(key) => key.to_public_key().to_public_key_der(),
        };
        der.expect("encode public key").as_bytes().to_vec()
    }

    /// Algorithm written into certificates.
    fn certificate_algorithm(&self) -> ObjectIdentifier {
        match self {
            SignerKey::P256(_) => oids::ECDSA_WITH_SHA256,
            SignerKey::Rsa(_) => oids::SHA256_WITH_RSA,
        }
    }

    /// Algorithm written into signer infos. RSA uses the bare `rsaEncryption`
    /// form most PDF producers emit.
    fn signer_info_algorithm(&self) -> ObjectIdentifier {
        match self {
            SignerKey::P256(_) => oids::ECDSA_WITH_SHA256,
            SignerKey::Rsa(_) => oids::RSA_ENCRYPTION,
        }
    }

    /// SHA-256 signature: DER ECDSA or PKCS#1 v1.5.
    fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            SignerKey::P256(key) => {
                let signature: Signature = key.sign(message);
                signature.to_der().as_bytes().to_vec()
            },
            SignerKey::Rsa(key) => key
                .sign(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(message))
                .expect("RSA signature"),
        }
    }
}

/// A signing key with a self-issued certificate.
#[derive(Clone)]
pub struct TestSigner {
    pub common_name: String,
    key: SignerKey,
    certificate: Certificate,
}

impl TestSigner {
    /// P-256 signer whose private scalar is `seed` repeated.
    pub fn new(common_name: &str, seed: u8) -> Self {
        let key = SigningKey::from_slice(&[seed; 32]).expect("valid P-256 scalar");
        Self::with_key(common_name, SignerKey::P256(key), seed)
    }

    /// RSA signer using [`RSA_KEY_PEM`].
    pub fn rsa(common_name: &str, seed: u8) -> Self {
        let key = RsaPrivateKey::from_pkcs8_pem(RSA_KEY_PEM).expect("valid RSA test key");
        Self::with_key(common_name, SignerKey::Rsa(key), seed)
    }

    fn with_key(common_name: &str, key: SignerKey, seed: u8) -> Self {
        let public_key = key.public_key_der();
        let subject = Name::from_str(&format!("CN={},O=Sigcheck Test", common_name))
            .expect("valid distinguished name");

        let tbs_certificate = TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(&[seed & 0x7f, 0x01]).expect("serial number"),
            signature: algorithm(key.certificate_algorithm()),
            issuer: subject.clone(),
            validity: Validity {
                not_before: Time::UtcTime(utc_time(NOT_BEFORE)),
                not_after: Time::UtcTime(utc_time(NOT_AFTER)),
            },
            subject,
            subject_public_key_info: SubjectPublicKeyInfoOwned::from_der(&public_key)
                .expect("decode public key"),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: None,
        };
        let signature = key.sign(&tbs_certificate.to_der().expect("encode tbs"));
        let certificate = Certificate {
            tbs_certificate,
            signature_algorithm: algorithm(key.certificate_algorithm()),
            signature: BitString::from_bytes(&signature).expect("bit string"),
        };

        Self {
            common_name: common_name.to_string(),
            key,
            certificate,
        }
    }

    pub fn alice() -> Self {
        Self::new("Alice Example", 0x11)
    }

    pub fn bob() -> Self {
        Self::new("Bob Example", 0x12)
    }

    pub fn carol() -> Self {
        Self::rsa("Carol Example", 0x13)
    }

    pub fn tsa() -> Self {
        Self::new("Sigcheck Test TSA", 0x22)
    }

    /// Hex serial number as shown in reports.
    pub fn serial_hex(&self) -> String {
        hex::encode(self.certificate.tbs_certificate.serial_number.as_bytes())
    }

    /// Detached CMS signature over `data` (adbe.pkcs7.detached, ETSI.CAdES.detached).
    pub fn sign_detached(&self, data: &[u8], options: &CmsOptions) -> Vec<u8> {
        self.content_info(oids::DATA, None, data, options)
            .to_der()
            .expect("encode content info")
    }

    /// adbe.pkcs7.sha1: the SHA-1 of `data` is the encapsulated content.
    pub fn sign_sha1(&self, data: &[u8], options: &CmsOptions) -> Vec<u8> {
        let sha1 = Sha1::digest(data).to_vec();
        self.content_info(oids::DATA, Some(sha1.clone()), &sha1, options)
            .to_der()
            .expect("encode content info")
    }

    /// RFC 3161 token whose imprint is the SHA-256 of `imprint_source`.
    pub fn timestamp_token(&self, imprint_source: &[u8], time: u64) -> ContentInfo {
        let tst_info = TstInfoDer {
            version: 1,
            policy: ObjectIdentifier::new_unwrap("1.2.3.4.1"),
            message_imprint: MessageImprint {
                hash_algorithm: algorithm(oids::SHA256),
                hashed_message: OctetString::new(Sha256::digest(imprint_source).to_vec())
                    .expect("imprint"),
            },
            serial_number: 42,
            gen_time: GeneralizedTime::from_unix_duration(Duration::from_secs(time))
                .expect("gen time"),
            tsa: Some(GeneralName::DirectoryName(
                self.certificate.tbs_certificate.subject.clone(),
            )),
        };
        let tst_der = tst_info.to_der().expect("encode TSTInfo");
        let options = CmsOptions {
            signing_time: None,
            ..CmsOptions::default()
        };
        self.content_info(oids::TST_INFO, Some(tst_der.clone()), &tst_der, &options)
    }

    /// ETSI.RFC3161 document timestamp over `data`.
    pub fn document_timestamp(&self, data: &[u8]) -> Vec<u8> {
        self.timestamp_token(data, TSA_TIME)
            .to_der()
            .expect("encode content info")
    }

    fn content_info(
        &self,
        econtent_type: ObjectIdentifier,
        econtent: Option<Vec<u8>>,
        digested: &[u8],
        options: &CmsOptions,
    ) -> ContentInfo {
        let (signed_attrs, signature) = if options.signed_attributes {
            let mut attributes = vec![
                attribute(oids::CONTENT_TYPE, &econtent_type),
                attribute(
                    oids::MESSAGE_DIGEST,
                    &OctetString::new(Sha256::digest(digested).to_vec()).expect("digest"),
                ),
            ];
            if let Some(time) = options.signing_time {
                attributes.push(attribute(oids::SIGNING_TIME, &Time::UtcTime(utc_time(time))));
            }
            let attributes = SetOfVec::try_from(attributes).expect("attribute set");
            let signature = self
                .key
                .sign(&attributes.to_der().expect("encode attributes"));
            (Some(attributes), signature)
        } else {
            (None, self.key.sign(digested))
        };
        let mut signature_value = signature;
        if options.corrupt_signature {
            let last = signature_value.len() - 1;
            signature_value[last] ^= 0x01;
        }

        let unsigned_attrs = options.timestamp.map(|binding| {
            let imprint_source = match binding {
                TimestampBinding::Valid => signature_value.clone(),
                TimestampBinding::WrongImprint => b"some other signature".to_vec(),
            };
            let token = TestSigner::tsa().timestamp_token(&imprint_source, TSA_TIME);
            SetOfVec::try_from(vec![attribute(oids::TIMESTAMP_TOKEN, &token)])
                .expect("unsigned attributes")
        });

        let tbs = &self.certificate.tbs_certificate;
        let signer_info = SignerInfo {
            version: CmsVersion::V1,
            sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
                issuer: tbs.issuer.clone(),
                serial_number: tbs.serial_number.clone(),
            }),
            digest_alg: algorithm(oids::SHA256),
            signed_attrs,
            signature_algorithm: algorithm(self.key.signer_info_algorithm()),
            signature: OctetString::new(signature_value).expect("signature value"),
            unsigned_attrs,
        };

        let signed_data = SignedData {
            version: if econtent_type == oids::DATA {
                CmsVersion::V1
            } else {
                CmsVersion::V3
            },
            digest_algorithms: SetOfVec::try_from(vec![algorithm(oids::SHA256)])
                .expect("digest algorithms"),
            encap_content_info: EncapsulatedContentInfo {
                econtent_type,
                econtent: econtent.map(|bytes| any(&OctetString::new(bytes).expect("econtent"))),
            },
            certificates: Some(CertificateSet(
                SetOfVec::try_from(vec![CertificateChoices::Certificate(self.certificate.clone())])
                    .expect("certificate set"),
            )),
            crls: None,
            signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info]).expect("signer infos")),
        };

        ContentInfo {
            content_type: oids::SIGNED_DATA,
            content: any(&signed_data),
        }
    }
}

fn algorithm(oid: ObjectIdentifier) -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid,
        parameters: None,
    }
}

fn any<T: Encode>(value: &T) -> Any {
    Any::from_der(&value.to_der().expect("encode")).expect("re-decode as ANY")
}

fn attribute<T: Encode>(oid: ObjectIdentifier, value: &T) -> Attribute {
    Attribute {
        oid,
        values: SetOfVec::try_from(vec![any(value)]).expect("attribute values"),
    }
}

fn utc_time(secs: u64) -> UtcTime {
    UtcTime::from_unix_duration(Duration::from_secs(secs)).expect("UTCTime")
}

/// Container format of a fixture signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureKind {
    Pkcs7Detached,
    CadesDetached,
    Pkcs7Sha1,
    DocumentTimestamp,
}

impl SignatureKind {
    fn sub_filter(self) -> &'static str {
        match self {
            SignatureKind::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureKind::CadesDetached => "ETSI.CAdES.detached",
            SignatureKind::Pkcs7Sha1 => "adbe.pkcs7.sha1",
            SignatureKind::DocumentTimestamp => "ETSI.RFC3161",
        }
    }
}

/// One signature to apply in its own incremental update.
#[derive(Clone)]
pub struct SignatureSpec {
    pub field_name: String,
    pub signer: TestSigner,
    pub kind: SignatureKind,
    pub options: CmsOptions,
    /// DocMDP transform: `Some(Some(p))` with /P, `Some(None)` without
    pub docmdp: Option<Option<i64>>,
    /// FieldMDP lock: action name and field names
    pub field_lock: Option<(String, Vec<String>)>,
    /// FieldMDP `/P` (PDF 2.0)
    pub field_lock_level: Option<i64>,
    pub visible: bool,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub contact_info: Option<String>,
}

impl SignatureSpec {
    pub fn approval(field_name: &str, signer: TestSigner) -> Self {
        Self {
            field_name: field_name.to_string(),
            signer,
            kind: SignatureKind::Pkcs7Detached,
            options: CmsOptions::default(),
            docmdp: None,
            field_lock: None,
            field_lock_level: None,
            visible: true,
            reason: None,
            location: None,
            contact_info: None,
        }
    }

    pub fn certification(field_name: &str, signer: TestSigner, level: Option<i64>) -> Self {
        Self {
            docmdp: Some(level),
            ..Self::approval(field_name, signer)
        }
    }

    pub fn document_timestamp(field_name: &str) -> Self {
        Self {
            kind: SignatureKind::DocumentTimestamp,
            visible: false,
            ..Self::approval(field_name, TestSigner::tsa())
        }
    }

    pub fn kind(mut self, kind: SignatureKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn timestamp(mut self, binding: TimestampBinding) -> Self {
        self.options.timestamp = Some(binding);
        self
    }

    pub fn corrupt_signature(mut self) -> Self {
        self.options.corrupt_signature = true;
        self
    }

    pub fn without_signed_attributes(mut self) -> Self {
        self.options.signed_attributes = false;
        self.options.signing_time = None;
        self
    }

    pub fn lock(mut self, action: &str, fields: &[&str]) -> Self {
        self.field_lock = Some((
            action.to_string(),
            fields.iter().map(|f| f.to_string()).collect(),
        ));
        self
    }

    pub fn lock_level(mut self, level: i64) -> Self {
        self.field_lock_level = Some(level);
        self
    }

    pub fn invisible(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    pub fn location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn contact_info(mut self, contact: &str) -> Self {
        self.contact_info = Some(contact.to_string());
        self
    }

    fn dictionary(&self) -> String {
        let mut dict = String::new();
        if self.kind == SignatureKind::DocumentTimestamp {
            dict.push_str("<< /Type /DocTimeStamp /Filter /Adobe.PPKLite");
        } else {
            dict.push_str("<< /Type /Sig /Filter /Adobe.PPKLite");
        }
        dict.push_str(&format!(" /SubFilter /{}", self.kind.sub_filter()));
        dict.push_str(&format!(" {}", BYTE_RANGE_PLACEHOLDER));
        dict.push_str(&format!(" /Contents <{}>", "0".repeat(CONTENTS_CAPACITY * 2)));

        if self.kind != SignatureKind::DocumentTimestamp {
            dict.push_str(" /M (D:20240315103000Z)");
            dict.push_str(&format!(" /Name ({})", self.signer.common_name));
        }
        for (key, value) in [
            ("Reason", &self.reason),
            ("Location", &self.location),
            ("ContactInfo", &self.contact_info),
        ] {
            if let Some(value) = value {
                dict.push_str(&format!(" /{} ({})", key, value));
            }
        }

        let mut references = Vec::new();
        if let Some(level) = self.docmdp {
            let p = level.map(|p| format!(" /P {}", p)).unwrap_or_default();
            references.push(format!(
                concat!(
                    "<< /Type /SigRef /TransformMethod /DocMDP",
                    " /TransformParams << /Type /TransformParams{} /V /1.2 >> >>"
                ),
                p
            ));
        }
        if let Some((action, fields)) = &self.field_lock {
            let fields = fields
                .iter()
                .map(|f| format!("({})", f))
                .collect::<Vec<_>>()
                .join(" ");
            let p = self
                .field_lock_level
                .map(|p| format!(" /P {}", p))
                .unwrap_or_default();
            references.push(format!(
                concat!(
                    "<< /Type /SigRef /TransformMethod /FieldMDP",
                    " /TransformParams << /Type /TransformParams",
                    " /Action /{} /Fields [{}]{} /V /2.0 >> >>"
                ),
                action, fields, p
            ));
        }
        if !references.is_empty() {
            dict.push_str(&format!(" /Reference [{}]", references.join(" ")));
        }

        dict.push_str(" >>");
        dict
    }

    fn container(&self, signed_bytes: &[u8]) -> Vec<u8> {
        match self.kind {
            SignatureKind::Pkcs7Detached | SignatureKind::CadesDetached => {
                self.signer.sign_detached(signed_bytes, &self.options)
            },
            SignatureKind::Pkcs7Sha1 => self.signer.sign_sha1(signed_bytes, &self.options),
            SignatureKind::DocumentTimestamp => self.signer.document_timestamp(signed_bytes),
        }
    }
}

/// Builds a one-page PDF and its incremental updates.
pub struct SignedPdfBuilder {
    buf: Vec<u8>,
    pending: BTreeMap<u32, usize>,
    prev_xref: Option<usize>,
    next_id: u32,
    fields: Vec<u32>,
    annotations: Vec<u32>,
    reverse_field_order: bool,
}

impl Default for SignedPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SignedPdfBuilder {
    /// Original revision: catalog, one page, an empty AcroForm.
    pub fn new() -> Self {
        let mut builder = Self {
            buf: b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec(),
            pending: BTreeMap::new(),
            prev_xref: None,
            next_id: ACROFORM + 1,
            fields: Vec::new(),
            annotations: Vec::new(),
            reverse_field_order: false,
        };
        builder.object(
            CATALOG,
            &format!("<< /Type /Catalog /Pages {} 0 R /AcroForm {} 0 R >>", PAGES, ACROFORM),
        );
        builder.object(PAGES, &format!("<< /Type /Pages /Kids [{} 0 R] /Count 1 >>", PAGE));
        builder.write_page();
        builder.write_acroform();
        builder.finish_revision();
        builder
    }

    /// List AcroForm fields newest first, so enumeration order differs from
    /// signing order.
    pub fn reverse_field_order(mut self) -> Self {
        self.reverse_field_order = true;
        self
    }

    /// Append an incremental update carrying one signed signature field.
    pub fn sign(mut self, spec: SignatureSpec) -> Self {
        let revision_start = self.buf.len();
        let field_id = self.allocate();
        let sig_id = self.allocate();
        self.fields.push(field_id);
        self.annotations.push(field_id);

        let rect = if spec.visible {
            "[100 100 300 150]"
        } else {
            "[0 0 0 0]"
        };
        self.object(
            field_id,
            &format!(
                concat!(
                    "<< /Type /Annot /Subtype /Widget /FT /Sig /T ({}) /V {} 0 R",
                    " /Rect {} /F 132 /P {} 0 R >>"
                ),
                spec.field_name, sig_id, rect, PAGE
            ),
        );
        self.object(sig_id, &spec.dictionary());
        self.write_page();
        self.write_acroform();
        self.finish_revision();
        self.seal(revision_start, &spec);
        self
    }

    /// Append an incremental update that adds a text annotation to the page.
    pub fn append_update(mut self) -> Self {
        let id = self.allocate();
        self.annotations.push(id);
        self.object(
            id,
            "<< /Type /Annot /Subtype /Text /Rect [10 10 30 30] /Contents (added later) >>",
        );
        self.write_page();
        self.finish_revision();
        self
    }

    /// Append bytes after the last `%%EOF`.
    pub fn append_raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn object(&mut self, id: u32, body: &str) {
        self.pending.insert(id, self.buf.len());
        self.buf
            .extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", id, body).as_bytes());
    }

    fn write_page(&mut self) {
        let annots = references(&self.annotations);
        self.object(
            PAGE,
            &format!(
                "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 612 792] /Annots [{}] >>",
                PAGES, annots
            ),
        );
    }

    fn write_acroform(&mut self) {
        let mut fields = self.fields.clone();
        if self.reverse_field_order {
            fields.reverse();
        }
        let sig_flags = if fields.is_empty() { 0 } else { 3 };
        self.object(
            ACROFORM,
            &format!("<< /Fields [{}] /SigFlags {} >>", references(&fields), sig_flags),
        );
    }

    fn finish_revision(&mut self) {
        let xref_offset = self.buf.len();
        let mut xref = String::from("xref\n");
        if self.prev_xref.is_none() {
            xref.push_str("0 1\n0000000000 65535 f \n");
        }
        for (id, offset) in &self.pending {
            xref.push_str(&format!("{} 1\n{:010} 00000 n \n", id, offset));
        }
        xref.push_str(&format!("trailer\n<< /Size {} /Root {} 0 R", self.next_id, CATALOG));
        if let Some(prev) = self.prev_xref {
            xref.push_str(&format!(" /Prev {}", prev));
        }
        xref.push_str(&format!(" >>\nstartxref\n{}\n%%EOF\n", xref_offset));

        self.buf.extend_from_slice(xref.as_bytes());
        self.pending.clear();
        self.prev_xref = Some(xref_offset);
    }

    /// Fill in `/ByteRange` and `/Contents` of the signature written in the
    /// revision starting at `revision_start`.
    fn seal(&mut self, revision_start: usize, spec: &SignatureSpec) {
        let byte_range_at = revision_start
            + find(&self.buf[revision_start..], BYTE_RANGE_PLACEHOLDER.as_bytes())
                .expect("ByteRange placeholder");
        let contents_at = revision_start
            + find(&self.buf[revision_start..], b"/Contents <").expect("Contents placeholder")
            + "/Contents ".len();
        let gap_end = contents_at + CONTENTS_CAPACITY * 2 + 2;
        let len = self.buf.len();

        let byte_range = format!(
            "/ByteRange [0 {:<10} {:<10} {:<10}]",
            contents_at,
            gap_end,
            len - gap_end
        );
        assert_eq!(byte_range.len(), BYTE_RANGE_PLACEHOLDER.len());
        self.buf[byte_range_at..byte_range_at + byte_range.len()]
            .copy_from_slice(byte_range.as_bytes());

        let mut signed = self.buf[..contents_at].to_vec();
        signed.extend_from_slice(&self.buf[gap_end..]);
        let container = spec.container(&signed);
        assert!(
            container.len() <= CONTENTS_CAPACITY,
            "container of {} bytes does not fit",
            container.len()
        );

        let hex = hex::encode_upper(&container);
        self.buf[contents_at + 1..contents_at + 1 + hex.len()].copy_from_slice(hex.as_bytes());
    }
}

fn references(ids: &[u32]) -> String {
    ids.iter()
        .map(|id| format!("{} 0 R", id))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

pub fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

/// Replace the first occurrence of `from` with `to` (same length).
pub fn patch(bytes: &mut [u8], from: &[u8], to: &[u8]) {
    assert_eq!(from.len(), to.len());
    let at = find(bytes, from).expect("pattern to patch");
    bytes[at..at + to.len()].copy_from_slice(to);
}

/// Overwrite the last `/ByteRange` array with `values`, keeping its length.
pub fn overwrite_byte_range(bytes: &mut [u8], values: &[i64]) {
    let start = rfind(bytes, b"/ByteRange [").expect("ByteRange");
    let end = start + find(&bytes[start..], b"]").expect("ByteRange end");
    let width = end - start;

    let numbers = values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let mut replacement = format!("/ByteRange [{}", numbers);
    assert!(replacement.len() <= width, "ByteRange values too long");
    while replacement.len() < width {
        replacement.push(' ');
    }
    bytes[start..end].copy_from_slice(replacement.as_bytes());
}
