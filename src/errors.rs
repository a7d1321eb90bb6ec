use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TspErrorKind {
    /// IO Error.
    IoError,

    /// Invalid TimeStampReq.
    InvalidTimeStampRequest,

    /// Invalid TimeStampResp.
    InvalidTimeStampResponse,

    /// Invalid Token ContentInfo.
    InvalidContentInfo,

    /// Invalid ContentType.
    InvalidContentType,

    /// Invalid SignedData.
    InvalidSignedData,

    /// Invalid Encapsulated ContentType.
    InvalidEncapsulatedContentType,

    /// Empty EncapsulatedContent.
    EmptyEncapsulatedContent,

    /// Invalid TSTInfo.
    InvalidTSTInfo,

    /// Invalid Accuracy.
    InvalidAccuracy,

    /// Invalid TSAPolicyId.
    InvalidPolicyId,

    /// Invalid Integer (nonce, serial number).
    InvalidInteger,

    /// Invalid GenTime.
    InvalidGenTime,

    /// Unsupported Certificate Format.
    UnsupportedCertificateFormat,

    /// Unsupported Algorithm.
    UnsupportedAlgorithm,

    /// Invalid Certificate Extension.
    InvalidCertificateExtension,

    /// Invalid PEM Certificate.
    InvalidPEMCertificate,

    /// Invalid CRL.
    InvalidCrl,

    /// Invalid Public Key.
    InvalidPublicKey,

    /// Invalid Private Key.
    InvalidPrivateKey,

    /// No Found SignerInfo.
    NoFoundSignerInfo,

    /// Signing Failed.
    SigningError,

    /// Invalid Responder Configuration.
    InvalidConfig,

    /// Token or response failed validation.
    Validation(ValidationFailure),

    /// Export as DER Error.
    ExportDerError,

    /// Export as PEM Error.
    ExportPemError,

    /// Unknown Error.
    Unknown,
}

/// Reason a produced token or response was refused by the relying party.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationFailure {
    /// Response status is not granted/grantedWithMods.
    NotGranted,

    /// Token nonce differs from the request nonce.
    NonceMismatch,

    /// Token message imprint differs from the request message imprint.
    MessageImprintMismatch,

    /// Token policy differs from the policy the request asked for.
    PolicyMismatch,

    /// Request asked for certificates but the token carries no signer certificate.
    MissingCertificate,

    /// Signature does not verify under the certificate key.
    InvalidSignature,

    /// messageDigest attribute does not match the encapsulated TSTInfo.
    MessageDigestMismatch,

    /// contentType attribute is absent or not id-ct-TSTInfo.
    ContentTypeMismatch,

    /// No ESS signingCertificate attribute.
    MissingSigningCertificate,

    /// Signer identity does not match the certificate.
    CertificateMismatch,

    /// Certificate is not usable for time-stamping.
    InvalidKeyUsage,

    /// Certificate was not valid at genTime.
    CertificateExpired,
}

#[derive(Debug)]
pub struct TspError {
    pub kind: TspErrorKind,
    pub message: String,
}

impl TspError {
    pub(crate) fn validation(failure: ValidationFailure, message: impl Into<String>) -> Self {
        Self {
            kind: TspErrorKind::Validation(failure),
            message: message.into(),
        }
    }

    /// Reason code when this error came out of token or response validation.
    pub fn validation_failure(&self) -> Option<ValidationFailure> {
        match self.kind {
            TspErrorKind::Validation(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for TspError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TspError {}

pub trait TspResult<T> {
    fn map_app_err(self: Self, kind: TspErrorKind) -> Result<T, TspError>;
    fn map_unknown_err(self: Self) -> Result<T, TspError>;
}

impl<T, E> TspResult<T> for std::result::Result<T, E>
where
    E: std::error::Error + 'static,
{
    fn map_app_err(self: Self, kind: TspErrorKind) -> Result<T, TspError> {
        self.map_err(|err| TspError {
            kind: kind,
            message: err.to_string(),
        })
    }

    fn map_unknown_err(self: Self) -> Result<T, TspError> {
        self.map_app_err(TspErrorKind::Unknown)
    }
}
