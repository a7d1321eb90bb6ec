pub mod ext;

mod certificate;
mod store;

pub use certificate::{Certificate, SubjectPublicKeyInfo, Validity};
pub use store::{CertificateStore, CertificatesAndCrls};
