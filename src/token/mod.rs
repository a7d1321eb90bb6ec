mod generator;
mod info;

pub use generator::TimeStampTokenGenerator;
pub use info::TimeStampTokenInfo;

use cms::{content_info::ContentInfo, signed_data::SignerIdentifier};
use der::{
    asn1::OctetString,
    oid::{
        db::rfc5911::{
            ID_AA_SIGNING_CERTIFICATE, ID_CONTENT_TYPE, ID_MESSAGE_DIGEST, ID_SIGNED_DATA,
        },
        ObjectIdentifier,
    },
    Decode, Encode,
};
use tracing::debug;
use x509_cert::ext::pkix::name::GeneralName;

use crate::{
    asn1_types::{SigningCertificate, TstInfo, ID_CT_TST_INFO},
    cert::{Certificate, CertificatesAndCrls},
    crypto::{DefaultDigestProvider, DigestProvider, RsaVerifier, Verifier},
    errors::{TspError, TspErrorKind, TspResult, ValidationFailure},
    signed_data::{Attributes, SignedData},
};

/// A time-stamp token: CMS SignedData over a TSTInfo.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TimeStampToken {
    pub tst_info: TimeStampTokenInfo,
    pub signed_data: SignedData,
    __inner: ContentInfo,
}

impl der::Encode for TimeStampToken {
    fn encoded_len(&self) -> der::Result<der::Length> {
        self.__inner.encoded_len()
    }

    fn encode(&self, encoder: &mut impl der::Writer) -> der::Result<()> {
        self.__inner.encode(encoder)
    }
}

impl<'a> der::Decode<'a> for TimeStampToken {
    fn decode<R: der::Reader<'a>>(decoder: &mut R) -> der::Result<Self> {
        let ci = ContentInfo::decode(decoder)?;

        Self::from_content_info(ci)
            .map_err(|_| der::Error::new(der::ErrorKind::Failed, der::Length::ZERO))
    }
}

impl der::pem::PemLabel for TimeStampToken {
    const PEM_LABEL: &'static str = "PKCS7";
}

impl TimeStampToken {
    pub fn from_content_info(ci: ContentInfo) -> Result<Self, TspError> {
        let __inner = ci.clone();

        // signedData
        match ci.content_type {
            ID_SIGNED_DATA => {
                let signed_data: SignedData = ci
                    .content
                    .decode_as::<cms::signed_data::SignedData>()
                    .map_app_err(TspErrorKind::InvalidSignedData)?
                    .try_into()?;

                match signed_data.encap_content_info.econtent_type {
                    ID_CT_TST_INFO => {
                        let tst_info =
                            TstInfo::from_der(&signed_data.encap_content_info.econtent_value)
                                .map_app_err(TspErrorKind::InvalidTSTInfo)?
                                .try_into()?;

                        Ok(Self {
                            tst_info,
                            signed_data,
                            __inner,
                        })
                    }
                    ct => Err(TspError {
                        kind: TspErrorKind::InvalidEncapsulatedContentType,
                        message: ct.to_string(),
                    }),
                }
            }
            ct => Err(TspError {
                kind: TspErrorKind::InvalidContentType,
                message: ct.to_string(),
            }),
        }
    }

    pub fn from_der(bin: &[u8]) -> Result<Self, TspError> {
        let ci = ContentInfo::from_der(bin).map_app_err(TspErrorKind::InvalidContentInfo)?;

        Self::from_content_info(ci)
    }

    pub fn to_der(self: &Self) -> Result<Vec<u8>, TspError> {
        self.__inner
            .to_der()
            .map_app_err(TspErrorKind::ExportDerError)
    }

    pub fn content_info(self: &Self) -> &ContentInfo {
        &self.__inner
    }

    pub fn time_stamp_info(self: &Self) -> &TimeStampTokenInfo {
        &self.tst_info
    }

    pub fn signer_id(self: &Self) -> &SignerIdentifier {
        &self.signed_data.signer_info.sid
    }

    pub fn signed_attributes(self: &Self) -> Option<&Attributes> {
        self.signed_data.signer_info.signed_attrs.as_ref()
    }

    pub fn unsigned_attributes(self: &Self) -> Option<&Attributes> {
        self.signed_data.signer_info.unsigned_attrs.as_ref()
    }

    /// Embedded certificates and CRLs, empty when the request did not set `certReq`.
    pub fn get_certificates_and_crls(self: &Self) -> CertificatesAndCrls {
        CertificatesAndCrls::new(
            self.signed_data.certificates.clone(),
            self.signed_data.crls.clone(),
        )
    }

    /// Checks the token was signed by `cert`, using the RSA verifier and software digests.
    pub fn validate(self: &Self, cert: &Certificate) -> Result<(), TspError> {
        self.validate_with(cert, &RsaVerifier, &DefaultDigestProvider)
    }

    /// Checks, in order: time-stamping usage of `cert`, validity at genTime, the ESS
    /// signingCertificate binding, the signer identifier, the contentType and messageDigest
    /// attributes, and finally the signature.
    pub fn validate_with(
        self: &Self,
        cert: &Certificate,
        verifier: &dyn Verifier,
        digests: &dyn DigestProvider,
    ) -> Result<(), TspError> {
        cert.check_time_stamping_usage()?;

        let gen_time = self.tst_info.gen_time();
        if !cert.is_valid_at(&gen_time) {
            return Err(TspError::validation(
                ValidationFailure::CertificateExpired,
                format!("certificate not valid at {}", gen_time),
            ));
        }

        let signer_info = &self.signed_data.signer_info;
        let signed_attrs = signer_info.signed_attrs.as_ref().ok_or(TspError::validation(
            ValidationFailure::MissingSigningCertificate,
            "token has no signed attributes",
        ))?;

        self.check_signing_certificate(signed_attrs, cert)?;

        if !signer_info.identifies(cert) {
            return Err(TspError::validation(
                ValidationFailure::CertificateMismatch,
                "signer identifier does not name the certificate",
            ));
        }
        debug!(serial = %cert.serial_hex(), "signer certificate bound to token");

        let content_type: Option<ObjectIdentifier> = match signed_attrs.find(&ID_CONTENT_TYPE) {
            Some(attr) => Some(attr.single_value()?),
            None => None,
        };
        if content_type != Some(ID_CT_TST_INFO) {
            return Err(TspError::validation(
                ValidationFailure::ContentTypeMismatch,
                format!("contentType attribute: {:?}", content_type),
            ));
        }

        let message_digest: OctetString = signed_attrs
            .find(&ID_MESSAGE_DIGEST)
            .ok_or(TspError::validation(
                ValidationFailure::MessageDigestMismatch,
                "no messageDigest attribute",
            ))?
            .single_value()?;
        let digest_oid = signer_info.digest_alg.oid;
        let expected = digests.digest(
            &digest_oid,
            &self.signed_data.encap_content_info.econtent_value,
        )?;
        if message_digest.as_bytes() != expected.as_slice() {
            return Err(TspError::validation(
                ValidationFailure::MessageDigestMismatch,
                "messageDigest does not match the TSTInfo",
            ));
        }

        if !verifier.verify(
            &signed_attrs.to_der()?,
            &signer_info.signature,
            cert,
            &digest_oid,
        )? {
            return Err(TspError::validation(
                ValidationFailure::InvalidSignature,
                "signature does not verify under the certificate key",
            ));
        }
        debug!(
            serial = %self.tst_info.serial_number(),
            "time-stamp token signature verified"
        );

        Ok(())
    }

    fn check_signing_certificate(
        self: &Self,
        signed_attrs: &Attributes,
        cert: &Certificate,
    ) -> Result<(), TspError> {
        let signing_certificate: SigningCertificate = signed_attrs
            .find(&ID_AA_SIGNING_CERTIFICATE)
            .ok_or(TspError::validation(
                ValidationFailure::MissingSigningCertificate,
                "no signingCertificate attribute",
            ))?
            .single_value()?;

        // the first ESSCertID names the signer
        let ess_cert_id = signing_certificate.certs.first().ok_or(TspError::validation(
            ValidationFailure::MissingSigningCertificate,
            "signingCertificate lists no certificate",
        ))?;

        if ess_cert_id.cert_hash.as_bytes() != cert.ess_cert_hash()?.as_slice() {
            return Err(TspError::validation(
                ValidationFailure::CertificateMismatch,
                "certificate hash does not match signingCertificate",
            ));
        }

        if let Some(issuer_serial) = &ess_cert_id.issuer_serial {
            let issuer_matches = issuer_serial.issuer.iter().any(|name| match name {
                GeneralName::DirectoryName(name) => name == &cert.issuer,
                _ => false,
            });
            if !issuer_matches || &issuer_serial.serial_number != cert.serial() {
                return Err(TspError::validation(
                    ValidationFailure::CertificateMismatch,
                    "issuerSerial does not match the certificate",
                ));
            }
        }

        Ok(())
    }
}
