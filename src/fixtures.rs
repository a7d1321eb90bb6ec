use std::sync::Arc;

use der::{oid::db::rfc5912::ID_SHA_256, DecodePem};

use crate::{
    cert::{Certificate, CertificatesAndCrls},
    crypto::RsaSigner,
};

pub const TSA_CERT: &str = include_str!("./testdata/tsa.pem");
pub const TSA_KEY: &str = include_str!("./testdata/tsa.key");
pub const CA_CERT: &str = include_str!("./testdata/ca.pem");
pub const OTHER_CERT: &str = include_str!("./testdata/other.pem");
pub const OTHER_KEY: &str = include_str!("./testdata/other.key");
pub const CA_CRL: &[u8] = include_bytes!("./testdata/ca.crl");

pub fn tsa_cert() -> Certificate {
    Certificate::from_pem(TSA_CERT).unwrap()
}

pub fn ca_cert() -> Certificate {
    Certificate::from_pem(CA_CERT).unwrap()
}

pub fn other_cert() -> Certificate {
    Certificate::from_pem(OTHER_CERT).unwrap()
}

pub fn tsa_signer() -> RsaSigner {
    RsaSigner::from_pkcs8_pem(TSA_KEY, tsa_cert(), &ID_SHA_256).unwrap()
}

pub fn other_signer() -> RsaSigner {
    RsaSigner::from_pkcs8_pem(OTHER_KEY, other_cert(), &ID_SHA_256).unwrap()
}

/// TSA certificate, CA certificate and the CA's CRL.
pub fn store() -> Arc<CertificatesAndCrls> {
    let mut store = CertificatesAndCrls::new(vec![tsa_cert(), ca_cert()], vec![]);
    store.add_crl_der(CA_CRL).unwrap();

    Arc::new(store)
}
