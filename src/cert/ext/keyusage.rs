use std::fmt::Display;

use der::oid::{
    db::rfc5280::{ID_CE_EXT_KEY_USAGE, ID_KP_TIME_STAMPING},
    AssociatedOid, ObjectIdentifier,
};

pub use x509_cert::ext::pkix::KeyUsage;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExtendedKeyUsage {
    pub critical: bool,
    pub purposes: Vec<ObjectIdentifier>,
}

impl AssociatedOid for ExtendedKeyUsage {
    const OID: ObjectIdentifier = ID_CE_EXT_KEY_USAGE;
}

impl ExtendedKeyUsage {
    pub fn new(critical: bool, value: x509_cert::ext::pkix::ExtendedKeyUsage) -> Self {
        Self {
            critical,
            purposes: value.0,
        }
    }

    // A TSA certificate carries a critical EKU naming id-kp-timeStamping and nothing else.
    pub fn is_time_stamping_only(self: &Self) -> bool {
        self.critical && self.purposes == [ID_KP_TIME_STAMPING]
    }
}

impl Display for ExtendedKeyUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.critical {
            write!(f, "critical: ")?;
        }
        write!(
            f,
            "{}",
            self.purposes
                .iter()
                .map(|v| match v.to_string().as_str() {
                    "1.3.6.1.5.5.7.3.1" => "Server Authentication".to_owned(),
                    "1.3.6.1.5.5.7.3.2" => "Client Authentication".to_owned(),
                    "1.3.6.1.5.5.7.3.3" => "Code Signing".to_owned(),
                    "1.3.6.1.5.5.7.3.4" => "Email Protection".to_owned(),
                    "1.3.6.1.5.5.7.3.8" => "Time Stamping".to_owned(),
                    "1.3.6.1.5.5.7.3.9" => "OCSP Signing".to_owned(),
                    vv => vv.to_owned(),
                })
                .collect::<Vec<String>>()
                .join(", ")
        )
    }
}
