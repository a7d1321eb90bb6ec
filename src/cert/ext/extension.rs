use std::fmt::Display;

use der::{
    oid::{db::rfc5912::ID_CE_SUBJECT_KEY_IDENTIFIER, AssociatedOid, ObjectIdentifier},
    Decode,
};

use crate::{
    errors::{TspError, TspErrorKind, TspResult},
    utils::to_hex_str,
};

use super::{ExtendedKeyUsage, KeyUsage};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Extensions(pub Vec<Extension>);

impl TryFrom<x509_cert::ext::Extensions> for Extensions {
    type Error = TspError;

    fn try_from(value: x509_cert::ext::Extensions) -> Result<Self, Self::Error> {
        Ok(Self(
            value
                .into_iter()
                .map(Extension::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        ))
    }
}

impl Extensions {
    pub fn key_usage(self: &Self) -> Option<&KeyUsage> {
        self.0.iter().find_map(|ext| match ext {
            Extension::KeyUsage(ku) => Some(ku),
            _ => None,
        })
    }

    pub fn extended_key_usage(self: &Self) -> Option<&ExtendedKeyUsage> {
        self.0.iter().find_map(|ext| match ext {
            Extension::ExtendedKeyUsage(eku) => Some(eku),
            _ => None,
        })
    }

    pub fn subject_key_identifier(self: &Self) -> Option<&SubjectKeyIdentifier> {
        self.0.iter().find_map(|ext| match ext {
            Extension::SubjectKeyIdentifier(skid) => Some(skid),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Extension {
    SubjectKeyIdentifier(SubjectKeyIdentifier),
    KeyUsage(KeyUsage),
    ExtendedKeyUsage(ExtendedKeyUsage),
    Unknown((String, Vec<u8>)),
}

impl TryFrom<x509_cert::ext::Extension> for Extension {
    type Error = TspError;

    fn try_from(value: x509_cert::ext::Extension) -> Result<Self, Self::Error> {
        match value.extn_id {
            SubjectKeyIdentifier::OID => Ok(Self::SubjectKeyIdentifier(
                x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(value.extn_value.as_bytes())
                    .map_app_err(TspErrorKind::InvalidCertificateExtension)?
                    .into(),
            )),
            KeyUsage::OID => Ok(Self::KeyUsage(
                KeyUsage::from_der(value.extn_value.as_bytes())
                    .map_app_err(TspErrorKind::InvalidCertificateExtension)?,
            )),
            ExtendedKeyUsage::OID => Ok(Self::ExtendedKeyUsage(ExtendedKeyUsage::new(
                value.critical,
                x509_cert::ext::pkix::ExtendedKeyUsage::from_der(value.extn_value.as_bytes())
                    .map_app_err(TspErrorKind::InvalidCertificateExtension)?,
            ))),
            oid => Ok(Self::Unknown((oid.to_string(), value.extn_value.into_bytes()))),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl AssociatedOid for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = ID_CE_SUBJECT_KEY_IDENTIFIER;
}

impl From<x509_cert::ext::pkix::SubjectKeyIdentifier> for SubjectKeyIdentifier {
    fn from(value: x509_cert::ext::pkix::SubjectKeyIdentifier) -> Self {
        Self(value.0.as_bytes().to_vec())
    }
}

impl Display for SubjectKeyIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", to_hex_str(&self.0))
    }
}
