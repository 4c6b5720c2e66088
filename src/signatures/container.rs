//! Signature container parsing.
//!
//! The `/Contents` entry of a signature dictionary holds a DER-encoded CMS
//! `ContentInfo` wrapping `SignedData` (RFC 5652). For `ETSI.RFC3161` document
//! timestamps the signed content is itself an RFC 3161 `TSTInfo`. Writers pad the
//! value with zeros up to the size of the reserved placeholder, so exactly one
//! `ContentInfo` is decoded and anything after it is ignored.

use chrono::{DateTime, Utc};
use cms::cert::x509::ext::pkix::name::GeneralName;
use cms::cert::x509::time::Time;
use cms::cert::x509::Certificate;
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use const_oid::ObjectIdentifier;
use der::asn1::{GeneralizedTime, OctetString};
use der::{Decode, Encode, SliceReader};
use x509_parser::prelude::{FromDer, X509Certificate};
use x509_tsp::TstInfo;

use super::types::{
    oids, parse_pdf_date, CertificateSummary, ClaimedSigningTime, SignatureDictionary,
    SignatureSubFilter, SigningTimeSource,
};
use crate::error::{Error, Result};

/// The pieces of one CMS signer needed to check its signature value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerPayload {
    /// Signer-info digest algorithm
    pub digest_algorithm: ObjectIdentifier,
    /// Signer-info signature algorithm
    pub signature_algorithm: ObjectIdentifier,
    /// DER encoding (as a SET) of the signed attributes, if present
    pub signed_attributes: Option<Vec<u8>>,
    /// Value of the signed `messageDigest` attribute
    pub message_digest: Option<Vec<u8>>,
    /// Signature value
    pub signature: Vec<u8>,
    /// Encapsulated content octets (absent for detached signatures)
    pub encapsulated_content: Option<Vec<u8>>,
    /// DER of the certificate matching the signer identifier
    pub certificate: Option<Vec<u8>>,
    /// Number of certificates carried in the container
    pub certificate_count: usize,
}

/// The fields of an RFC 3161 `TSTInfo` an inspection reports on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TstInfoSummary {
    /// Time-stamping authority name, if the token names it
    pub tsa_name: Option<String>,
    /// Time asserted by the authority
    pub time: DateTime<Utc>,
    /// Message imprint hash algorithm
    pub imprint_algorithm: ObjectIdentifier,
    /// Message imprint
    pub imprint: Vec<u8>,
}

/// An RFC 3161 timestamp token: signed data carrying a `TSTInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampToken {
    /// Decoded `TSTInfo`
    pub info: TstInfoSummary,
    /// The authority's signer
    pub payload: SignerPayload,
}

/// A parsed signature container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureContainer {
    /// Container format
    pub sub_filter: SignatureSubFilter,
    /// The signer (the authority itself for document timestamps)
    pub payload: SignerPayload,
    /// Summary of the signer certificate, if it could be parsed
    pub signer: Option<CertificateSummary>,
    /// Alternative signer name (`/Name`)
    pub signer_name: Option<String>,
    /// Signing time asserted by the signer, not verified
    pub claimed_signing_time: Option<ClaimedSigningTime>,
    /// `/Reason`
    pub reason: Option<String>,
    /// `/Location`
    pub location: Option<String>,
    /// `/ContactInfo`
    pub contact_info: Option<String>,
    /// Timestamp token from the `id-aa-timeStampToken` unsigned attribute
    pub timestamp: Option<TimestampToken>,
    /// For document timestamps, the container's own `TSTInfo`
    pub document_timestamp: Option<TstInfoSummary>,
}

/// Parser for `/Contents` signature containers.
pub struct ContainerParser;

impl ContainerParser {
    /// Parse the container of a signature dictionary.
    pub fn parse(dict: &SignatureDictionary) -> Result<SignatureContainer> {
        let raw = dict.raw_sub_filter.as_deref().ok_or_else(|| {
            Error::UnsupportedContainerFormat("missing /SubFilter".to_string())
        })?;
        let sub_filter = SignatureSubFilter::from_pdf_name(raw)
            .ok_or_else(|| Error::UnsupportedContainerFormat(raw.to_string()))?;

        let signed_data = decode_signed_data(&dict.contents)?;
        log::debug!(
            "{}: {} signer(s), {} certificate(s)",
            raw,
            signed_data.signer_infos.0.len(),
            signed_data.certificates.as_ref().map(|c| c.0.len()).unwrap_or(0)
        );

        let (payload, document_timestamp) = match sub_filter {
            SignatureSubFilter::Rfc3161 => {
                let token = TimestampToken::from_signed_data(&signed_data)?;
                (token.payload, Some(token.info))
            },
            SignatureSubFilter::Pkcs7Sha1 => {
                let payload = SignerPayload::from_signed_data(&signed_data)?;
                if payload.encapsulated_content.is_none() {
                    return Err(Error::MalformedContainer(
                        "adbe.pkcs7.sha1 container has no encapsulated digest".to_string(),
                    ));
                }
                (payload, None)
            },
            SignatureSubFilter::Pkcs7Detached | SignatureSubFilter::CadesDetached => {
                (SignerPayload::from_signed_data(&signed_data)?, None)
            },
        };

        let signer_info = first_signer(&signed_data)?;
        let timestamp = timestamp_attribute(signer_info);

        let signer = match payload.certificate.as_deref() {
            Some(der) => match summarize_certificate(der) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    log::warn!("Signer certificate unreadable: {}", e);
                    None
                },
            },
            None => None,
        };

        let claimed_signing_time = signing_time_attribute(signer_info)
            .map(|time| ClaimedSigningTime {
                time,
                source: SigningTimeSource::SignedAttribute,
            })
            .or_else(|| {
                dict.signing_time
                    .as_deref()
                    .and_then(parse_pdf_date)
                    .map(|time| ClaimedSigningTime {
                        time,
                        source: SigningTimeSource::Dictionary,
                    })
            });

        Ok(SignatureContainer {
            sub_filter,
            payload,
            signer,
            signer_name: dict.name.clone(),
            claimed_signing_time,
            reason: dict.reason.clone(),
            location: dict.location.clone(),
            contact_info: dict.contact_info.clone(),
            timestamp,
            document_timestamp,
        })
    }
}

/// Decode one `ContentInfo` holding `SignedData`, ignoring trailing padding.
pub fn decode_signed_data(bytes: &[u8]) -> Result<SignedData> {
    // A reader rather than `from_der`: the placeholder padding would be a
    // trailing data error.
    let mut reader = SliceReader::new(bytes)?;
    let content_info = ContentInfo::decode(&mut reader)?;
    signed_data_from_content_info(&content_info)
}

fn signed_data_from_content_info(content_info: &ContentInfo) -> Result<SignedData> {
    if content_info.content_type != oids::SIGNED_DATA {
        return Err(Error::MalformedContainer(format!(
            "content type {} is not signed-data",
            content_info.content_type
        )));
    }
    Ok(content_info.content.decode_as::<SignedData>()?)
}

fn first_signer(signed_data: &SignedData) -> Result<&SignerInfo> {
    signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .ok_or_else(|| Error::MalformedContainer("no signer info".to_string()))
}

impl SignerPayload {
    /// Extract the first signer of a signed-data structure.
    pub fn from_signed_data(signed_data: &SignedData) -> Result<Self> {
        let signer_info = first_signer(signed_data)?;
        let count = signed_data.signer_infos.0.len();
        if count > 1 {
            log::warn!("Container has {} signer infos, verifying the first only", count);
        }

        let signed_attributes = match &signer_info.signed_attrs {
            Some(attrs) => Some(attrs.to_der()?),
            None => None,
        };

        let message_digest = signer_info.signed_attrs.as_ref().and_then(|attrs| {
            attrs
                .iter()
                .find(|attr| attr.oid == oids::MESSAGE_DIGEST)
                .and_then(|attr| attr.values.iter().next())
                .map(|value| value.value().to_vec())
        });

        if signed_attributes.is_some() && message_digest.is_none() {
            return Err(Error::MalformedContainer(
                "signed attributes without a messageDigest".to_string(),
            ));
        }

        let encapsulated_content = match &signed_data.encap_content_info.econtent {
            Some(econtent) => {
                let octets = OctetString::from_der(&econtent.to_der()?)?;
                Some(octets.as_bytes().to_vec())
            },
            None => None,
        };

        let certificates: Vec<&Certificate> = signed_data
            .certificates
            .as_ref()
            .map(|set| {
                set.0
                    .iter()
                    .filter_map(|choice| match choice {
                        CertificateChoices::Certificate(cert) => Some(cert),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let certificate = match find_signer_certificate(&signer_info.sid, &certificates) {
            Some(cert) => Some(cert.to_der()?),
            None => None,
        };

        Ok(Self {
            digest_algorithm: signer_info.digest_alg.oid,
            signature_algorithm: signer_info.signature_algorithm.oid,
            signed_attributes,
            message_digest,
            signature: signer_info.signature.as_bytes().to_vec(),
            encapsulated_content,
            certificate,
            certificate_count: certificates.len(),
        })
    }
}

/// Match the signer identifier against the embedded certificates, falling back
/// to the first certificate.
fn find_signer_certificate<'a>(
    sid: &SignerIdentifier,
    certificates: &[&'a Certificate],
) -> Option<&'a Certificate> {
    let matched = certificates.iter().copied().find(|cert| match sid {
        SignerIdentifier::IssuerAndSerialNumber(isn) => {
            cert.tbs_certificate.issuer == isn.issuer
                && cert.tbs_certificate.serial_number == isn.serial_number
        },
        SignerIdentifier::SubjectKeyIdentifier(ski) => subject_key_identifier(cert)
            .map(|id| id == ski.0.as_bytes())
            .unwrap_or(false),
    });

    if matched.is_none() && !certificates.is_empty() {
        log::debug!("No certificate matches the signer identifier, using the first one");
    }
    matched.or_else(|| certificates.first().copied())
}

fn subject_key_identifier(cert: &Certificate) -> Option<Vec<u8>> {
    let extension = cert
        .tbs_certificate
        .extensions
        .as_ref()?
        .iter()
        .find(|ext| ext.extn_id == oids::SUBJECT_KEY_IDENTIFIER)?;
    let key_id = OctetString::from_der(extension.extn_value.as_bytes()).ok()?;
    Some(key_id.as_bytes().to_vec())
}

impl TimestampToken {
    /// Decode a timestamp token's signed data and its `TSTInfo`.
    pub fn from_signed_data(signed_data: &SignedData) -> Result<Self> {
        if signed_data.encap_content_info.econtent_type != oids::TST_INFO {
            return Err(Error::MalformedContainer(format!(
                "timestamp token content type {} is not TSTInfo",
                signed_data.encap_content_info.econtent_type
            )));
        }
        let payload = SignerPayload::from_signed_data(signed_data)?;
        let tst_der = payload
            .encapsulated_content
            .as_deref()
            .ok_or_else(|| {
                Error::MalformedContainer("timestamp token has no TSTInfo".to_string())
            })?;
        let tst_info = TstInfo::from_der(tst_der)?;

        let info = TstInfoSummary {
            tsa_name: tst_info.tsa.as_ref().map(general_name_to_string),
            time: generalized_time_to_utc(&tst_info.gen_time)?,
            imprint_algorithm: tst_info.message_imprint.hash_algorithm.oid,
            imprint: tst_info.message_imprint.hashed_message.as_bytes().to_vec(),
        };
        Ok(Self { info, payload })
    }
}

/// Decode the `id-aa-timeStampToken` unsigned attribute, if any.
///
/// A token that does not decode is logged and dropped; it never fails the
/// primary signature.
fn timestamp_attribute(signer_info: &SignerInfo) -> Option<TimestampToken> {
    let attr = signer_info
        .unsigned_attrs
        .as_ref()?
        .iter()
        .find(|attr| attr.oid == oids::TIMESTAMP_TOKEN)?;
    let value = attr.values.iter().next()?;

    let token = value
        .decode_as::<ContentInfo>()
        .map_err(Error::from)
        .and_then(|content_info| signed_data_from_content_info(&content_info))
        .and_then(|signed_data| TimestampToken::from_signed_data(&signed_data));

    match token {
        Ok(token) => {
            log::debug!("Timestamp token from {:?} at {}", token.info.tsa_name, token.info.time);
            Some(token)
        },
        Err(e) => {
            log::warn!("Ignoring undecodable timestamp token: {}", e);
            None
        },
    }
}

fn signing_time_attribute(signer_info: &SignerInfo) -> Option<DateTime<Utc>> {
    let attr = signer_info
        .signed_attrs
        .as_ref()?
        .iter()
        .find(|attr| attr.oid == oids::SIGNING_TIME)?;
    let value = attr.values.iter().next()?;
    let time = Time::from_der(&value.to_der().ok()?).ok()?;
    let since_epoch = time.to_unix_duration();
    DateTime::from_timestamp(i64::try_from(since_epoch.as_secs()).ok()?, 0)
}

fn generalized_time_to_utc(time: &GeneralizedTime) -> Result<DateTime<Utc>> {
    let since_epoch = time.to_unix_duration();
    i64::try_from(since_epoch.as_secs())
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, since_epoch.subsec_nanos()))
        .ok_or_else(|| Error::MalformedContainer("timestamp genTime out of range".to_string()))
}

fn general_name_to_string(name: &GeneralName) -> String {
    match name {
        GeneralName::DirectoryName(dn) => dn.to_string(),
        GeneralName::DnsName(dns) => dns.to_string(),
        GeneralName::Rfc822Name(email) => email.to_string(),
        GeneralName::UniformResourceIdentifier(uri) => uri.to_string(),
        other => format!("{:?}", other),
    }
}

/// Summarize a DER certificate for reporting.
pub fn summarize_certificate(der: &[u8]) -> Result<CertificateSummary> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| Error::CertificateParseError(e.to_string()))?;

    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|cn| cn.to_string());

    let validity = cert.validity();
    Ok(CertificateSummary {
        common_name,
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial_number: hex::encode(cert.raw_serial()),
        not_before: DateTime::from_timestamp(validity.not_before.timestamp(), 0),
        not_after: DateTime::from_timestamp(validity.not_after.timestamp(), 0),
    })
}
