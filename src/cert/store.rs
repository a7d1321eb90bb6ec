use der::Decode;
use x509_cert::crl::CertificateList;

use crate::{
    asn1_types::TstInfo,
    errors::{TspError, TspErrorKind, TspResult},
};

use super::Certificate;

/// Read-only source of the certificates and CRLs a token embeds on `certReq`.
///
/// Both lookups see the TSTInfo about to be signed, so a store may pick by policy or serial.
pub trait CertificateStore: Send + Sync {
    fn certificates_for(&self, tst_info: &TstInfo) -> Vec<Certificate>;

    fn crls_for(&self, tst_info: &TstInfo) -> Vec<CertificateList>;
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CertificatesAndCrls {
    pub certificates: Vec<Certificate>,
    pub crls: Vec<CertificateList>,
}

impl CertificatesAndCrls {
    pub fn new(certificates: Vec<Certificate>, crls: Vec<CertificateList>) -> Self {
        Self { certificates, crls }
    }

    pub fn from_pem_chain(input: &str) -> Result<Self, TspError> {
        Ok(Self::new(Certificate::load_pem_chain(input)?, vec![]))
    }

    pub fn add_crl_der(self: &mut Self, der: &[u8]) -> Result<&mut Self, TspError> {
        let crl = CertificateList::from_der(der).map_app_err(TspErrorKind::InvalidCrl)?;
        self.crls.push(crl);

        Ok(self)
    }

    pub fn is_empty(self: &Self) -> bool {
        self.certificates.is_empty() && self.crls.is_empty()
    }
}

impl CertificateStore for CertificatesAndCrls {
    fn certificates_for(&self, _: &TstInfo) -> Vec<Certificate> {
        self.certificates.clone()
    }

    fn crls_for(&self, _: &TstInfo) -> Vec<CertificateList> {
        self.crls.clone()
    }
}
