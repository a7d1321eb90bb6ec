use cms::signed_data::SignerIdentifier;
use der::{asn1::SetOfVec, oid::ObjectIdentifier, Decode, Encode};
use x509_cert::{crl::CertificateList, spki::AlgorithmIdentifierOwned};

use crate::{
    cert::Certificate,
    errors::{TspError, TspErrorKind, TspResult},
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignerInfo {
    pub sid: SignerIdentifier,
    pub signed_attrs: Option<Attributes>, // authenticatedAttributes
    pub unsigned_attrs: Option<Attributes>, // unauthenticatedAttributes
    pub signature: Vec<u8>,               // encryptedDigest
    pub digest_alg: AlgorithmIdentifierOwned, // digestAlgorithm
    pub signature_alg: AlgorithmIdentifierOwned,
}

impl TryFrom<cms::signed_data::SignerInfo> for SignerInfo {
    type Error = TspError;

    fn try_from(signer_info: cms::signed_data::SignerInfo) -> Result<Self, Self::Error> {
        // signed attrs/auth attrs
        let signed_attrs = match signer_info.signed_attrs {
            Some(original_signed_attrs) => Some(original_signed_attrs.try_into()?),
            None => None,
        };
        // unsigned attrs/unauth attrs
        let unsigned_attrs = match signer_info.unsigned_attrs {
            Some(original_unsigned_attrs) => Some(original_unsigned_attrs.try_into()?),
            None => None,
        };

        Ok(Self {
            sid: signer_info.sid,
            signed_attrs,
            unsigned_attrs,
            signature: signer_info.signature.as_bytes().to_vec(),
            digest_alg: signer_info.digest_alg,
            signature_alg: signer_info.signature_algorithm,
        })
    }
}

impl SignerInfo {
    /// True when `sid` names `cert`, by issuer and serial or by subject key identifier.
    pub fn identifies(self: &Self, cert: &Certificate) -> bool {
        match &self.sid {
            SignerIdentifier::IssuerAndSerialNumber(sid) => {
                sid.issuer == cert.issuer && sid.serial_number.as_bytes() == cert.serial_number
            }
            SignerIdentifier::SubjectKeyIdentifier(sid) => {
                cert.subject_key_identifier() == Some(sid.0.as_bytes())
            }
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncapsulatedContentInfo {
    pub econtent_type: ObjectIdentifier,
    pub econtent_value: Vec<u8>,
}

impl TryFrom<cms::signed_data::EncapsulatedContentInfo> for EncapsulatedContentInfo {
    type Error = TspError;

    fn try_from(
        ecap_content_info: cms::signed_data::EncapsulatedContentInfo,
    ) -> Result<Self, Self::Error> {
        let econtent = ecap_content_info.econtent.ok_or(TspError {
            kind: TspErrorKind::EmptyEncapsulatedContent,
            message: ecap_content_info.econtent_type.to_string(),
        })?;

        Ok(Self {
            econtent_type: ecap_content_info.econtent_type,
            econtent_value: econtent.value().to_vec(),
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignedData {
    pub encap_content_info: EncapsulatedContentInfo,
    pub signer_info: SignerInfo,
    pub certificates: Vec<Certificate>,
    pub crls: Vec<CertificateList>,
}

impl TryFrom<cms::signed_data::SignedData> for SignedData {
    type Error = TspError;

    fn try_from(signed_data: cms::signed_data::SignedData) -> Result<Self, Self::Error> {
        let encap_content_info = signed_data.encap_content_info.try_into()?;

        // a time-stamp token has exactly one signer
        let signer_info = match signed_data.signer_infos.0.as_slice() {
            [signer_info] => signer_info.clone().try_into()?,
            [] => {
                return Err(TspError {
                    kind: TspErrorKind::NoFoundSignerInfo,
                    message: "".to_owned(),
                })
            }
            signer_infos => {
                return Err(TspError {
                    kind: TspErrorKind::InvalidSignedData,
                    message: format!("{} signer infos", signer_infos.len()),
                })
            }
        };

        // certificates, absent when certReq was false
        let mut certificates = vec![];
        if let Some(certset) = signed_data.certificates {
            for cert_choice in certset.0.into_vec() {
                match cert_choice {
                    cms::cert::CertificateChoices::Certificate(cert) => {
                        certificates.push(cert.try_into()?)
                    }
                    cms::cert::CertificateChoices::Other(cert) => {
                        return Err(TspError {
                            kind: TspErrorKind::UnsupportedCertificateFormat,
                            message: cert.other_cert_format.to_string(),
                        })
                    }
                }
            }
        }

        let mut crls = vec![];
        if let Some(revocation_infos) = signed_data.crls {
            for choice in revocation_infos.0.into_vec() {
                match choice {
                    cms::revocation::RevocationInfoChoice::Crl(crl) => crls.push(crl),
                    cms::revocation::RevocationInfoChoice::Other(other) => {
                        return Err(TspError {
                            kind: TspErrorKind::InvalidSignedData,
                            message: format!(
                                "unsupported revocation format {}",
                                other.other_format.oid
                            ),
                        })
                    }
                }
            }
        }

        Ok(Self {
            encap_content_info,
            signer_info,
            certificates,
            crls,
        })
    }
}

impl SignedData {
    pub fn signer_certificate(self: &Self) -> Option<&Certificate> {
        self.certificates
            .iter()
            .find(|cert| self.signer_info.identifies(cert))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attributes(pub Vec<Attribute>);

impl TryFrom<x509_cert::attr::Attributes> for Attributes {
    type Error = TspError;

    fn try_from(value: x509_cert::attr::Attributes) -> Result<Self, Self::Error> {
        Ok(Self(
            value
                .into_vec()
                .into_iter()
                .map(Attribute::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        ))
    }
}

impl Attributes {
    pub fn find(self: &Self, oid: &ObjectIdentifier) -> Option<&Attribute> {
        self.0.iter().find(|attr| &attr.oid == oid)
    }

    /// DER of the attribute SET, the exact bytes a CMS signature covers.
    pub fn to_der(self: &Self) -> Result<Vec<u8>, TspError> {
        let mut result = SetOfVec::<x509_cert::attr::Attribute>::new();

        for vv in &self.0 {
            result.insert(vv.__inner.clone()).map_unknown_err()?;
        }

        Ok(result.to_der().map_unknown_err()?)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attribute {
    pub oid: ObjectIdentifier,
    pub values: Vec<Vec<u8>>,
    __inner: x509_cert::attr::Attribute,
}

impl TryFrom<x509_cert::attr::Attribute> for Attribute {
    type Error = TspError;

    fn try_from(attr: x509_cert::attr::Attribute) -> Result<Self, Self::Error> {
        let mut values = vec![];

        for vv in attr.values.iter() {
            values.push(vv.to_der().map_unknown_err()?);
        }

        Ok(Self {
            oid: attr.oid,
            values: values,
            __inner: attr,
        })
    }
}

impl Attribute {
    /// Decodes the value of a single-valued attribute.
    pub fn single_value<'a, T: Decode<'a>>(self: &'a Self) -> Result<T, TspError> {
        match self.values.as_slice() {
            [value] => T::from_der(value).map_app_err(TspErrorKind::InvalidSignedData),
            values => Err(TspError {
                kind: TspErrorKind::InvalidSignedData,
                message: format!("attribute {} has {} values", self.oid, values.len()),
            }),
        }
    }
}
