mod generator;

pub use generator::TimeStampResponseGenerator;

pub use crate::asn1_types::{FailureInfo, PkiStatus, PkiStatusInfo};

use der::{Decode, Encode};
use flagset::FlagSet;
use tracing::debug;

use crate::{
    asn1_types::{failure_bit_string, TimeStampResp},
    errors::{TspError, TspErrorKind, TspResult, ValidationFailure},
    request::TimeStampRequest,
    token::TimeStampToken,
};

/// Status string carried by every granted response.
pub const GRANTED_STATUS_STRING: &str = "Operation Okay";

/// Either a token or the reason there is none.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Granted {
        token: TimeStampToken,
        with_mods: bool,
    },
    Rejected {
        status: PkiStatus,
        fail_info: FlagSet<FailureInfo>,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TimeStampResponse {
    pub outcome: Outcome,
    pub status_strings: Vec<String>,
    __inner: TimeStampResp,
}

impl der::Encode for TimeStampResponse {
    fn encoded_len(&self) -> der::Result<der::Length> {
        self.__inner.encoded_len()
    }

    fn encode(&self, encoder: &mut impl der::Writer) -> der::Result<()> {
        self.__inner.encode(encoder)
    }
}

impl<'a> der::Decode<'a> for TimeStampResponse {
    fn decode<R: der::Reader<'a>>(decoder: &mut R) -> der::Result<Self> {
        let resp = TimeStampResp::decode(decoder)?;

        resp.try_into()
            .map_err(|_| der::Error::new(der::ErrorKind::Failed, der::Length::ZERO))
    }
}

impl TryFrom<TimeStampResp> for TimeStampResponse {
    type Error = TspError;

    fn try_from(value: TimeStampResp) -> Result<Self, Self::Error> {
        let __inner = value.clone();
        let status = value.status.status;
        let status_strings = value.status.status_string.clone().unwrap_or_default();

        let outcome = match (status.is_granted(), value.time_stamp_token) {
            (true, Some(ci)) => Outcome::Granted {
                token: TimeStampToken::from_content_info(ci)?,
                with_mods: status == PkiStatus::GrantedWithMods,
            },
            (true, None) => {
                return Err(TspError {
                    kind: TspErrorKind::InvalidTimeStampResponse,
                    message: format!("{:?} response without a token", status),
                })
            }
            (false, None) => Outcome::Rejected {
                status,
                fail_info: value.status.failure_flags().unwrap_or_default(),
            },
            (false, Some(_)) => {
                return Err(TspError {
                    kind: TspErrorKind::InvalidTimeStampResponse,
                    message: format!("{:?} response carries a token", status),
                })
            }
        };

        Ok(Self {
            outcome,
            status_strings,
            __inner,
        })
    }
}

impl TimeStampResponse {
    pub fn granted(token: TimeStampToken) -> Self {
        let status_strings = vec![GRANTED_STATUS_STRING.to_owned()];
        let __inner = TimeStampResp {
            status: PkiStatusInfo {
                status: PkiStatus::Granted,
                status_string: Some(status_strings.clone()),
                fail_info: None,
            },
            time_stamp_token: Some(token.content_info().clone()),
        };

        Self {
            outcome: Outcome::Granted {
                token,
                with_mods: false,
            },
            status_strings,
            __inner,
        }
    }

    pub fn rejected(fail_info: FailureInfo, reason: impl Into<String>) -> Self {
        let status_strings = vec![reason.into()];
        let fail_info: FlagSet<FailureInfo> = fail_info.into();
        let __inner = TimeStampResp {
            status: PkiStatusInfo {
                status: PkiStatus::Rejection,
                status_string: Some(status_strings.clone()),
                fail_info: failure_bit_string(fail_info).ok(),
            },
            time_stamp_token: None,
        };

        Self {
            outcome: Outcome::Rejected {
                status: PkiStatus::Rejection,
                fail_info,
            },
            status_strings,
            __inner,
        }
    }

    pub fn from_der(bin: &[u8]) -> Result<Self, TspError> {
        TimeStampResp::from_der(bin)
            .map_app_err(TspErrorKind::InvalidTimeStampResponse)?
            .try_into()
    }

    pub fn to_der(self: &Self) -> Result<Vec<u8>, TspError> {
        self.__inner
            .to_der()
            .map_app_err(TspErrorKind::ExportDerError)
    }

    pub fn status(self: &Self) -> PkiStatus {
        self.__inner.status.status
    }

    pub fn status_info(self: &Self) -> &PkiStatusInfo {
        &self.__inner.status
    }

    /// Status strings joined by `"; "`, `None` when there are none.
    pub fn status_string(self: &Self) -> Option<String> {
        match self.status_strings.is_empty() {
            true => None,
            false => Some(self.status_strings.join("; ")),
        }
    }

    pub fn fail_info(self: &Self) -> Option<FlagSet<FailureInfo>> {
        match &self.outcome {
            Outcome::Rejected { fail_info, .. } if !fail_info.is_empty() => Some(*fail_info),
            _ => None,
        }
    }

    pub fn time_stamp_token(self: &Self) -> Option<&TimeStampToken> {
        match &self.outcome {
            Outcome::Granted { token, .. } => Some(token),
            Outcome::Rejected { .. } => None,
        }
    }

    /// Checks this response answers `request`: granted status, same nonce, same message
    /// imprint, the requested policy, and an embedded signer certificate when one was asked for.
    ///
    /// Token authenticity is a separate question, see [`TimeStampToken::validate`].
    pub fn validate(self: &Self, request: &TimeStampRequest) -> Result<(), TspError> {
        let token = match &self.outcome {
            Outcome::Granted { token, .. } => token,
            Outcome::Rejected { status, fail_info } => {
                return Err(TspError::validation(
                    ValidationFailure::NotGranted,
                    format!(
                        "{:?} {:?}: {}",
                        status,
                        fail_info,
                        self.status_string().unwrap_or_default()
                    ),
                ))
            }
        };
        let info = token.time_stamp_info();

        if info.nonce() != request.nonce() {
            return Err(TspError::validation(
                ValidationFailure::NonceMismatch,
                format!(
                    "response nonce {:?} does not match request nonce {:?}",
                    info.nonce().map(|n| n.as_bytes()),
                    request.nonce().map(|n| n.as_bytes())
                ),
            ));
        }

        if !info.message_imprint().matches(request.message_imprint()) {
            return Err(TspError::validation(
                ValidationFailure::MessageImprintMismatch,
                format!(
                    "response imprint {} {} does not match request imprint {} {}",
                    info.message_imprint().algorithm(),
                    info.message_imprint().to_hex(),
                    request.message_imprint().algorithm(),
                    request.message_imprint().to_hex()
                ),
            ));
        }

        if let Some(policy) = request.req_policy() {
            if info.policy() != policy {
                return Err(TspError::validation(
                    ValidationFailure::PolicyMismatch,
                    format!("response policy {} is not {}", info.policy(), policy),
                ));
            }
        }

        if request.cert_req() && token.signed_data.signer_certificate().is_none() {
            return Err(TspError::validation(
                ValidationFailure::MissingCertificate,
                "certificate requested but the signer certificate is not embedded",
            ));
        }

        debug!(serial = %info.serial_number(), "time-stamp response matches request");

        Ok(())
    }
}
