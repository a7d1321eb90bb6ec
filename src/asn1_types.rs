use cms::content_info::ContentInfo;
use der::{
    asn1::{BitString, GeneralizedTime, Int, OctetString},
    oid::ObjectIdentifier,
    Decode, Encode, Enumerated, Sequence,
};
use flagset::{flags, FlagSet};
use x509_cert::{
    ext::{
        pkix::{name::GeneralName, CertificatePolicies},
        Extensions,
    },
    serial_number::SerialNumber,
};

use crate::{accuracy::Accuracy, imprint::MessageImprint, policy::PolicyId};

/// `id-ct-TSTInfo`, the eContentType of a time-stamp token.
pub const ID_CT_TST_INFO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4");

#[derive(Clone, Debug, Copy, PartialEq, Eq, PartialOrd, Ord, Enumerated)]
#[asn1(type = "INTEGER")]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TspVersion {
    V1 = 1,
}

/// ```text
/// TimeStampReq ::= SEQUENCE  {
///     version                 INTEGER  { v1(1) },
///     messageImprint          MessageImprint,
///     reqPolicy               TSAPolicyId              OPTIONAL,
///     nonce                   INTEGER                  OPTIONAL,
///     certReq                 BOOLEAN                  DEFAULT FALSE,
///     extensions          [0] IMPLICIT Extensions      OPTIONAL  }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampReq {
    pub version: TspVersion,
    pub message_imprint: MessageImprint,
    #[asn1(optional = "true")]
    pub req_policy: Option<PolicyId>,
    #[asn1(optional = "true")]
    pub nonce: Option<Int>,
    #[asn1(default = "Default::default")]
    pub cert_req: bool,
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub extensions: Option<Extensions>,
}

/// ```text
/// TSTInfo ::= SEQUENCE  {
///     version                      INTEGER  { v1(1) },
///     policy                       TSAPolicyId,
///     messageImprint               MessageImprint,
///     serialNumber                 INTEGER,
///     genTime                      GeneralizedTime,
///     accuracy                     Accuracy                 OPTIONAL,
///     ordering                     BOOLEAN             DEFAULT FALSE,
///     nonce                        INTEGER                  OPTIONAL,
///     tsa                          [0] GeneralName          OPTIONAL,
///     extensions                   [1] IMPLICIT Extensions  OPTIONAL  }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TstInfo {
    pub version: TspVersion,
    pub policy: PolicyId,
    pub message_imprint: MessageImprint,
    pub serial_number: SerialNumber,
    pub gen_time: GeneralizedTime,
    #[asn1(optional = "true")]
    pub accuracy: Option<Accuracy>,
    #[asn1(default = "Default::default")]
    pub ordering: bool,
    #[asn1(optional = "true")]
    pub nonce: Option<Int>,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub tsa: Option<GeneralName>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub extensions: Option<Extensions>,
}

#[derive(Clone, Debug, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Enumerated)]
#[asn1(type = "INTEGER")]
#[repr(u8)]
pub enum PkiStatus {
    Granted = 0,
    GrantedWithMods = 1,
    Rejection = 2,
    Waiting = 3,
    RevocationWarning = 4,
    RevocationNotification = 5,
}

impl PkiStatus {
    pub fn is_granted(self: &Self) -> bool {
        matches!(self, PkiStatus::Granted | PkiStatus::GrantedWithMods)
    }
}

flags! {
    /// ```text
    /// PKIFailureInfo ::= BIT STRING {
    ///     badAlg               (0),
    ///     badRequest           (2),
    ///     badDataFormat        (5),
    ///     timeNotAvailable    (14),
    ///     unacceptedPolicy    (15),
    ///     unacceptedExtension (16),
    ///     addInfoNotAvailable (17),
    ///     systemFailure       (25)  }
    /// ```
    #[allow(missing_docs)]
    pub enum FailureInfo: u32 {
        BadAlg = 1 << 0,
        BadRequest = 1 << 2,
        BadDataFormat = 1 << 5,
        TimeNotAvailable = 1 << 14,
        UnacceptedPolicy = 1 << 15,
        UnacceptedExtension = 1 << 16,
        AddInfoNotAvailable = 1 << 17,
        SystemFailure = 1 << 25,
    }
}

/// ```text
/// PKIStatusInfo ::= SEQUENCE {
///     status        PKIStatus,
///     statusString  PKIFreeText     OPTIONAL,
///     failInfo      PKIFailureInfo  OPTIONAL  }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PkiStatusInfo {
    pub status: PkiStatus,
    #[asn1(optional = "true")]
    pub status_string: Option<Vec<String>>,
    #[asn1(optional = "true")]
    pub fail_info: Option<BitString>,
}

impl PkiStatusInfo {
    /// failInfo bits known to [`FailureInfo`]. Other bits stay in `fail_info` untouched.
    pub fn failure_flags(self: &Self) -> Option<FlagSet<FailureInfo>> {
        let bits = self.fail_info.as_ref()?;

        let flags = bits
            .bits()
            .take(32)
            .enumerate()
            .filter(|(_, set)| *set)
            .fold(0u32, |flags, (i, _)| flags | 1 << i);

        Some(FlagSet::new_truncated(flags))
    }
}

/// PKIFailureInfo BIT STRING for `flags`, trailing zero bits trimmed.
pub fn failure_bit_string(flags: FlagSet<FailureInfo>) -> der::Result<BitString> {
    BitString::from_der(&flags.to_der()?)
}

/// ```text
/// TimeStampResp ::= SEQUENCE  {
///     status                  PKIStatusInfo,
///     timeStampToken          TimeStampToken     OPTIONAL  }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampResp {
    pub status: PkiStatusInfo,
    #[asn1(optional = "true")]
    pub time_stamp_token: Option<ContentInfo>,
}

/// ```text
/// SigningCertificate ::=  SEQUENCE {
///     certs        SEQUENCE OF ESSCertID,
///     policies     SEQUENCE OF PolicyInformation OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SigningCertificate {
    pub certs: Vec<EssCertId>,
    #[asn1(optional = "true")]
    pub policies: Option<CertificatePolicies>,
}

/// ```text
/// ESSCertID ::=  SEQUENCE {
///     certHash                 Hash,
///     issuerSerial             IssuerSerial OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct EssCertId {
    pub cert_hash: OctetString,
    #[asn1(optional = "true")]
    pub issuer_serial: Option<IssuerSerial>,
}

/// ```text
/// IssuerSerial ::= SEQUENCE {
///     issuer                   GeneralNames,
///     serialNumber             CertificateSerialNumber }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct IssuerSerial {
    pub issuer: Vec<GeneralName>,
    pub serial_number: SerialNumber,
}
