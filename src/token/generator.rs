use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use cms::{
    cert::CertificateChoices,
    content_info::{CmsVersion, ContentInfo},
    revocation::{RevocationInfoChoice, RevocationInfoChoices},
    signed_data::{
        CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo,
        SignerInfos,
    },
};
use der::{
    asn1::{GeneralizedTime, OctetString, SetOfVec},
    oid::{
        db::rfc5911::{
            ID_AA_SIGNING_CERTIFICATE, ID_CONTENT_TYPE, ID_MESSAGE_DIGEST, ID_SIGNED_DATA,
        },
        ObjectIdentifier,
    },
    Any, Encode,
};
use tracing::debug;
use x509_cert::{
    attr::{Attribute, Attributes},
    ext::pkix::name::GeneralName,
    serial_number::SerialNumber,
};

use crate::{
    accuracy::Accuracy,
    asn1_types::{EssCertId, IssuerSerial, SigningCertificate, TspVersion, TstInfo, ID_CT_TST_INFO},
    cert::CertificateStore,
    crypto::{DefaultDigestProvider, DigestProvider, Signer},
    errors::{TspError, TspErrorKind, TspResult},
    policy::PolicyId,
    request::TimeStampRequest,
};

use super::TimeStampToken;

/// Issues time-stamp tokens with one signer under a default policy.
///
/// Configuration is fixed before first use; `generate` takes `&self` and may run
/// from many threads at once.
pub struct TimeStampTokenGenerator {
    signer: Box<dyn Signer>,
    digests: Box<dyn DigestProvider>,
    default_policy: PolicyId,
    certificates_and_crls: Option<Arc<dyn CertificateStore>>,
    accuracy_seconds: Option<u64>,
    accuracy_millis: Option<u16>,
    accuracy_micros: Option<u16>,
    ordering: bool,
    tsa: Option<GeneralName>,
}

impl TimeStampTokenGenerator {
    pub fn new(signer: Box<dyn Signer>, default_policy: PolicyId) -> Self {
        Self {
            signer,
            digests: Box::new(DefaultDigestProvider),
            default_policy,
            certificates_and_crls: None,
            accuracy_seconds: None,
            accuracy_millis: None,
            accuracy_micros: None,
            ordering: false,
            tsa: None,
        }
    }

    /// Certificates and CRLs embedded in tokens whose request set `certReq`.
    pub fn set_certificates_and_crls(
        self: &mut Self,
        store: Arc<dyn CertificateStore>,
    ) -> &mut Self {
        self.certificates_and_crls = Some(store);
        self
    }

    pub fn set_digest_provider(self: &mut Self, digests: Box<dyn DigestProvider>) -> &mut Self {
        self.digests = digests;
        self
    }

    pub fn set_accuracy_seconds(self: &mut Self, seconds: u64) -> &mut Self {
        self.accuracy_seconds = Some(seconds);
        self
    }

    pub fn set_accuracy_millis(self: &mut Self, millis: u16) -> Result<&mut Self, TspError> {
        Accuracy::new(None, Some(millis), None)?;
        self.accuracy_millis = Some(millis);

        Ok(self)
    }

    pub fn set_accuracy_micros(self: &mut Self, micros: u16) -> Result<&mut Self, TspError> {
        Accuracy::new(None, None, Some(micros))?;
        self.accuracy_micros = Some(micros);

        Ok(self)
    }

    pub fn set_ordering(self: &mut Self, ordering: bool) -> &mut Self {
        self.ordering = ordering;
        self
    }

    pub fn set_tsa(self: &mut Self, tsa: GeneralName) -> &mut Self {
        self.tsa = Some(tsa);
        self
    }

    pub fn default_policy(self: &Self) -> &PolicyId {
        &self.default_policy
    }

    pub fn signer(self: &Self) -> &dyn Signer {
        self.signer.as_ref()
    }

    fn accuracy(self: &Self) -> Result<Option<Accuracy>, TspError> {
        let accuracy = Accuracy::new(
            self.accuracy_seconds,
            self.accuracy_millis,
            self.accuracy_micros,
        )?;

        Ok((!accuracy.is_empty()).then_some(accuracy))
    }

    /// Signs a TSTInfo answering `request`.
    ///
    /// `genTime` is truncated to whole seconds. The nonce is echoed only when the request has one,
    /// and certificates/CRLs are embedded only when the request set `certReq`.
    pub fn generate(
        self: &Self,
        request: &TimeStampRequest,
        serial_number: SerialNumber,
        gen_time: DateTime<Utc>,
    ) -> Result<TimeStampToken, TspError> {
        let policy = request
            .req_policy()
            .unwrap_or(&self.default_policy)
            .clone();

        let tst_info = TstInfo {
            version: TspVersion::V1,
            policy: policy.clone(),
            message_imprint: request.message_imprint().clone(),
            serial_number: serial_number.clone(),
            gen_time: to_generalized_time(&gen_time)?,
            accuracy: self.accuracy()?,
            ordering: self.ordering,
            nonce: request.nonce().cloned(),
            tsa: self.tsa.clone(),
            extensions: None,
        };
        let tst_der = tst_info.to_der().map_app_err(TspErrorKind::ExportDerError)?;

        let digest_algorithm = self.signer.digest_algorithm();
        let message_digest = self.digests.digest(&digest_algorithm.oid, &tst_der)?;
        let signed_attrs = self.signed_attributes(&message_digest)?;
        let signature = self
            .signer
            .sign(&signed_attrs.to_der().map_app_err(TspErrorKind::ExportDerError)?)?;

        let signer_cert = self.signer.certificate();
        let signer_info = SignerInfo {
            version: CmsVersion::V1,
            sid: SignerIdentifier::IssuerAndSerialNumber(signer_cert.issuer_and_serial_number()),
            digest_alg: digest_algorithm.clone(),
            signed_attrs: Some(signed_attrs),
            signature_algorithm: self.signer.signature_algorithm(),
            signature: OctetString::new(signature).map_app_err(TspErrorKind::SigningError)?,
            unsigned_attrs: None,
        };

        let (certificates, crls) = match (&self.certificates_and_crls, request.cert_req()) {
            (Some(store), true) => (
                certificate_set(store.as_ref(), &tst_info)?,
                crl_set(store.as_ref(), &tst_info)?,
            ),
            _ => (None, None),
        };
        let certificate_count = certificates.as_ref().map_or(0, |set| set.0.len());

        let signed_data = SignedData {
            version: CmsVersion::V3,
            digest_algorithms: SetOfVec::try_from(vec![digest_algorithm])
                .map_app_err(TspErrorKind::InvalidSignedData)?,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: ID_CT_TST_INFO,
                econtent: Some(
                    Any::encode_from(
                        &OctetString::new(tst_der).map_app_err(TspErrorKind::InvalidTSTInfo)?,
                    )
                    .map_app_err(TspErrorKind::ExportDerError)?,
                ),
            },
            certificates,
            crls,
            signer_infos: SignerInfos::try_from(vec![signer_info])
                .map_app_err(TspErrorKind::InvalidSignedData)?,
        };

        let content_info = ContentInfo {
            content_type: ID_SIGNED_DATA,
            content: Any::encode_from(&signed_data).map_app_err(TspErrorKind::ExportDerError)?,
        };

        debug!(
            serial = %serial_number,
            policy = %policy,
            certificates = certificate_count,
            "issued time-stamp token"
        );

        TimeStampToken::from_content_info(content_info)
    }

    // contentType, messageDigest and ESS signingCertificate
    fn signed_attributes(self: &Self, message_digest: &[u8]) -> Result<Attributes, TspError> {
        let cert = self.signer.certificate();
        let signing_certificate = SigningCertificate {
            certs: vec![EssCertId {
                cert_hash: OctetString::new(cert.ess_cert_hash()?)
                    .map_app_err(TspErrorKind::ExportDerError)?,
                issuer_serial: Some(IssuerSerial {
                    issuer: vec![GeneralName::DirectoryName(cert.issuer.clone())],
                    serial_number: cert.serial().clone(),
                }),
            }],
            policies: None,
        };

        let attributes = vec![
            attribute(ID_CONTENT_TYPE, Any::encode_from(&ID_CT_TST_INFO))?,
            attribute(
                ID_MESSAGE_DIGEST,
                Any::encode_from(
                    &OctetString::new(message_digest).map_app_err(TspErrorKind::ExportDerError)?,
                ),
            )?,
            attribute(
                ID_AA_SIGNING_CERTIFICATE,
                Any::encode_from(&signing_certificate),
            )?,
        ];

        SetOfVec::try_from(attributes).map_app_err(TspErrorKind::ExportDerError)
    }
}

fn attribute(oid: ObjectIdentifier, value: der::Result<Any>) -> Result<Attribute, TspError> {
    let value = value.map_app_err(TspErrorKind::ExportDerError)?;

    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value]).map_app_err(TspErrorKind::ExportDerError)?,
    })
}

fn certificate_set(
    store: &dyn CertificateStore,
    tst_info: &TstInfo,
) -> Result<Option<CertificateSet>, TspError> {
    let mut choices: Vec<CertificateChoices> = vec![];
    for cert in store.certificates_for(tst_info) {
        let choice = CertificateChoices::Certificate(cert.as_x509().clone());
        if !choices.contains(&choice) {
            choices.push(choice);
        }
    }

    match choices.is_empty() {
        true => Ok(None),
        false => Ok(Some(
            CertificateSet::try_from(choices).map_app_err(TspErrorKind::InvalidSignedData)?,
        )),
    }
}

fn crl_set(
    store: &dyn CertificateStore,
    tst_info: &TstInfo,
) -> Result<Option<RevocationInfoChoices>, TspError> {
    let mut choices: Vec<RevocationInfoChoice> = vec![];
    for crl in store.crls_for(tst_info) {
        let choice = RevocationInfoChoice::Crl(crl);
        if !choices.contains(&choice) {
            choices.push(choice);
        }
    }

    match choices.is_empty() {
        true => Ok(None),
        false => Ok(Some(
            RevocationInfoChoices::try_from(choices)
                .map_app_err(TspErrorKind::InvalidSignedData)?,
        )),
    }
}

fn to_generalized_time(time: &DateTime<Utc>) -> Result<GeneralizedTime, TspError> {
    let secs = u64::try_from(time.timestamp()).map_app_err(TspErrorKind::InvalidGenTime)?;

    GeneralizedTime::from_unix_duration(Duration::from_secs(secs))
        .map_app_err(TspErrorKind::InvalidGenTime)
}
