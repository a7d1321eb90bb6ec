use std::{io::Read, time::Duration};

use chrono::{DateTime, Utc};
use der::{Decode, Encode};
use rsa::{pkcs1::DecodeRsaPublicKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use x509_cert::{name::Name, serial_number::SerialNumber};

use crate::{
    crypto::Algorithm,
    errors::{TspError, TspErrorKind, TspResult, ValidationFailure},
    utils::to_hex_str,
};

use super::ext::{ExtendedKeyUsage, Extensions, KeyUsage};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Certificate {
    pub version: u8,
    pub serial_number: Vec<u8>,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key_info: SubjectPublicKeyInfo,
    pub extensions: Option<Extensions>,
    pub signature_algorithm: Algorithm,
    pub signature_value: Vec<u8>,
    __inner: x509_cert::Certificate,
}

impl der::Encode for Certificate {
    fn encoded_len(&self) -> der::Result<der::Length> {
        self.__inner.encoded_len()
    }

    fn encode(&self, encoder: &mut impl der::Writer) -> der::Result<()> {
        self.__inner.encode(encoder)
    }
}

impl<'a> der::Decode<'a> for Certificate {
    fn decode<R: der::Reader<'a>>(decoder: &mut R) -> der::Result<Self> {
        let cert = x509_cert::Certificate::decode(decoder)?;

        cert.try_into()
            .map_err(|_| der::Error::new(der::ErrorKind::Failed, der::Length::ZERO))
    }
}

impl der::pem::PemLabel for Certificate {
    const PEM_LABEL: &'static str = "CERTIFICATE";
}

impl Certificate {
    /// Loads every `CERTIFICATE` block of a PEM bundle, in order.
    pub fn load_pem_chain(input: &str) -> Result<Vec<Self>, TspError> {
        fn find_boundary<T>(haystack: &[T], needle: &[T]) -> Option<usize>
        where
            for<'a> &'a [T]: PartialEq,
        {
            haystack
                .windows(needle.len())
                .position(|window| window == needle)
        }

        let mut certs = Vec::new();
        let mut position: usize = 0;

        let start_boundary = &b"-----BEGIN CERTIFICATE-----"[..];
        let end_boundary = &b"-----END CERTIFICATE-----"[..];

        let input = input.trim_end().as_bytes();

        while position < input.len() {
            let rest = &input[position..];
            let start_pos = find_boundary(rest, start_boundary).ok_or(TspError {
                kind: TspErrorKind::InvalidPEMCertificate,
                message: "missing BEGIN CERTIFICATE boundary".to_owned(),
            })?;
            let end_pos = find_boundary(rest, end_boundary).ok_or(TspError {
                kind: TspErrorKind::InvalidPEMCertificate,
                message: "missing END CERTIFICATE boundary".to_owned(),
            })? + end_boundary.len();
            if end_pos <= start_pos {
                return Err(TspError {
                    kind: TspErrorKind::InvalidPEMCertificate,
                    message: "END CERTIFICATE before BEGIN CERTIFICATE".to_owned(),
                });
            }

            // line width is detected, not assumed to be 64
            let mut decoder = pem_rfc7468::Decoder::new_detect_wrap(&rest[start_pos..end_pos])
                .map_app_err(TspErrorKind::InvalidPEMCertificate)?;
            let mut buf = vec![];
            decoder
                .read_to_end(&mut buf)
                .map_app_err(TspErrorKind::InvalidPEMCertificate)?;
            let cert = x509_cert::Certificate::from_der(&buf)
                .map_app_err(TspErrorKind::InvalidPEMCertificate)?
                .try_into()?;

            certs.push(cert);

            position += end_pos;
        }

        if certs.is_empty() {
            return Err(TspError {
                kind: TspErrorKind::InvalidPEMCertificate,
                message: "no certificate found".to_owned(),
            });
        }

        Ok(certs)
    }

    pub fn as_x509(self: &Self) -> &x509_cert::Certificate {
        &self.__inner
    }

    pub fn serial(self: &Self) -> &SerialNumber {
        &self.__inner.tbs_certificate.serial_number
    }

    pub fn issuer_and_serial_number(self: &Self) -> cms::cert::IssuerAndSerialNumber {
        cms::cert::IssuerAndSerialNumber {
            issuer: self.issuer.clone(),
            serial_number: self.serial().clone(),
        }
    }

    pub fn key_usage(self: &Self) -> Option<&KeyUsage> {
        self.extensions.as_ref().and_then(|exts| exts.key_usage())
    }

    pub fn extended_key_usage(self: &Self) -> Option<&ExtendedKeyUsage> {
        self.extensions
            .as_ref()
            .and_then(|exts| exts.extended_key_usage())
    }

    pub fn subject_key_identifier(self: &Self) -> Option<&[u8]> {
        self.extensions
            .as_ref()
            .and_then(|exts| exts.subject_key_identifier())
            .map(|skid| skid.0.as_slice())
    }

    /// Checks the certificate may sign time-stamp tokens: an exclusive, critical
    /// `id-kp-timeStamping` EKU, and a key usage (when present) allowing signatures.
    pub fn check_time_stamping_usage(self: &Self) -> Result<(), TspError> {
        match self.extended_key_usage() {
            Some(eku) if eku.is_time_stamping_only() => {}
            Some(eku) => {
                return Err(TspError::validation(
                    ValidationFailure::InvalidKeyUsage,
                    format!("extended key usage is not time stamping only: {}", eku),
                ))
            }
            None => {
                return Err(TspError::validation(
                    ValidationFailure::InvalidKeyUsage,
                    "certificate has no extended key usage",
                ))
            }
        }

        match self.key_usage() {
            Some(ku) if !ku.digital_signature() && !ku.non_repudiation() => {
                Err(TspError::validation(
                    ValidationFailure::InvalidKeyUsage,
                    "key usage allows neither digitalSignature nor nonRepudiation",
                ))
            }
            _ => Ok(()),
        }
    }

    pub fn is_valid_at(self: &Self, time: &DateTime<Utc>) -> bool {
        let Ok(secs) = u64::try_from(time.timestamp()) else {
            return false;
        };
        let at = Duration::from_secs(secs);

        self.validity.not_before <= at && at <= self.validity.not_after
    }

    /// SHA-1 over the DER certificate, as carried in ESS `ESSCertID.certHash`.
    pub fn ess_cert_hash(self: &Self) -> Result<Vec<u8>, TspError> {
        let der = self.to_der().map_app_err(TspErrorKind::ExportDerError)?;

        Ok(Sha1::digest(der).to_vec())
    }

    pub fn serial_hex(self: &Self) -> String {
        to_hex_str(&self.serial_number)
    }
}

impl TryFrom<x509_cert::Certificate> for Certificate {
    type Error = TspError;

    fn try_from(value: x509_cert::Certificate) -> Result<Self, Self::Error> {
        let __inner_orginal_cert = value.clone();
        let version = value.tbs_certificate.version as u8;
        let serial_number = value.tbs_certificate.serial_number.as_bytes().to_vec();
        let issuer = value.tbs_certificate.issuer;
        let validity = value.tbs_certificate.validity.into();
        let subject = value.tbs_certificate.subject;
        let subject_public_key_info = value.tbs_certificate.subject_public_key_info.try_into()?;
        let extensions = match value.tbs_certificate.extensions {
            Some(exs) => Some(exs.try_into()?),
            None => None,
        };
        let signature_algorithm = value.signature_algorithm.into();
        let signature_value = value.signature.raw_bytes().to_vec();

        Ok(Self {
            version,
            serial_number,
            issuer,
            validity,
            subject,
            subject_public_key_info,
            extensions,
            signature_algorithm,
            signature_value,
            __inner: __inner_orginal_cert,
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Validity {
    pub not_before: Duration,
    pub not_after: Duration,
}

impl From<x509_cert::time::Validity> for Validity {
    fn from(value: x509_cert::time::Validity) -> Self {
        Self {
            not_before: value.not_before.to_unix_duration(),
            not_after: value.not_after.to_unix_duration(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubjectPublicKeyInfo {
    pub algorithm: Algorithm,
    pub subject_public_key: Vec<u8>,
    __inner_public_key: Option<RsaPublicKey>,
}

impl TryFrom<x509_cert::spki::SubjectPublicKeyInfoOwned> for SubjectPublicKeyInfo {
    type Error = TspError;

    fn try_from(value: x509_cert::spki::SubjectPublicKeyInfoOwned) -> Result<Self, Self::Error> {
        let algorithm = value.algorithm.into();
        let mut rsa_publickey = None;

        if algorithm == Algorithm::RSA {
            rsa_publickey = Some(
                RsaPublicKey::from_pkcs1_der(value.subject_public_key.raw_bytes())
                    .map_app_err(TspErrorKind::InvalidPublicKey)?,
            );
        }

        Ok(Self {
            algorithm,
            subject_public_key: value.subject_public_key.raw_bytes().to_vec(),
            __inner_public_key: rsa_publickey,
        })
    }
}

impl SubjectPublicKeyInfo {
    pub fn rsa_public_key(self: &Self) -> Result<&RsaPublicKey, TspError> {
        self.__inner_public_key.as_ref().ok_or(TspError {
            kind: TspErrorKind::UnsupportedAlgorithm,
            message: format!("public key: {}", self.algorithm),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use der::{DecodePem, EncodePem};

    use super::*;

    #[test]
    fn load_tsa_certificate() {
        let cert = Certificate::from_pem(include_str!("../testdata/tsa.pem")).unwrap();

        assert_eq!(cert.serial_hex(), "1001");
        assert!(cert.subject.to_string().contains("CN=Test TSA"));
        assert_eq!(cert.subject_public_key_info.algorithm, Algorithm::RSA);
        assert!(cert.subject_key_identifier().is_some());
        assert!(cert.check_time_stamping_usage().is_ok());
    }

    #[test]
    fn load_pem_chain_keeps_order() {
        let bundle = format!(
            "{}\n{}\n\n",
            include_str!("../testdata/tsa.pem"),
            include_str!("../testdata/ca.pem")
        );
        let certs = Certificate::load_pem_chain(&bundle).unwrap();

        assert_eq!(certs.len(), 2);
        assert_eq!(certs[0].issuer, certs[1].subject);
    }

    #[test]
    fn load_pem_chain_rejects_garbage() {
        assert_eq!(
            Certificate::load_pem_chain("not a certificate")
                .unwrap_err()
                .kind,
            TspErrorKind::InvalidPEMCertificate
        );
        assert!(Certificate::load_pem_chain("").is_err());
    }

    #[test]
    fn code_signing_certificate_is_not_a_tsa() {
        let cert = Certificate::from_pem(include_str!("../testdata/other.pem")).unwrap();

        assert_eq!(
            cert.check_time_stamping_usage()
                .unwrap_err()
                .validation_failure(),
            Some(ValidationFailure::InvalidKeyUsage)
        );
    }

    #[test]
    fn ca_certificate_has_no_time_stamping_eku() {
        let cert = Certificate::from_pem(include_str!("../testdata/ca.pem")).unwrap();

        assert!(cert.check_time_stamping_usage().is_err());
    }

    #[test]
    fn validity_window() {
        let cert = Certificate::from_pem(include_str!("../testdata/tsa.pem")).unwrap();

        assert!(cert.is_valid_at(&Utc::now()));
        assert!(!cert.is_valid_at(&Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap()));
        assert!(!cert.is_valid_at(&Utc.with_ymd_and_hms(2200, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn ess_hash_is_sha1_of_der() {
        let cert = Certificate::from_pem(include_str!("../testdata/tsa.pem")).unwrap();

        let expected = Sha1::digest(cert.to_der().unwrap()).to_vec();
        assert_eq!(cert.ess_cert_hash().unwrap(), expected);
        assert_eq!(expected.len(), 20);
    }

    #[test]
    fn pem_round_trip() {
        let pem = include_str!("../testdata/tsa.pem");
        let cert = Certificate::from_pem(pem).unwrap();

        let exported = cert.to_pem(Default::default()).unwrap();
        assert_eq!(Certificate::from_pem(&exported).unwrap(), cert);
    }
}
