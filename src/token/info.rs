use chrono::{DateTime, Utc};
use der::{asn1::Int, Decode, Encode};
use x509_cert::{
    ext::{pkix::name::GeneralName, Extension},
    serial_number::SerialNumber,
};

use crate::{
    accuracy::Accuracy,
    asn1_types::{TspVersion, TstInfo},
    errors::{TspError, TspErrorKind, TspResult},
    imprint::MessageImprint,
    policy::PolicyId,
    utils::int_to_u64,
};

/// Parsed TSTInfo, the signed body of a time-stamp token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TimeStampTokenInfo {
    __inner: TstInfo,
}

impl TryFrom<TstInfo> for TimeStampTokenInfo {
    type Error = TspError;

    fn try_from(value: TstInfo) -> Result<Self, Self::Error> {
        // range rules the DER decoder does not enforce
        if let Some(accuracy) = &value.accuracy {
            Accuracy::new(accuracy.seconds(), accuracy.millis(), accuracy.micros())?;
        }

        Ok(Self { __inner: value })
    }
}

impl TimeStampTokenInfo {
    pub fn from_der(bin: &[u8]) -> Result<Self, TspError> {
        TstInfo::from_der(bin)
            .map_app_err(TspErrorKind::InvalidTSTInfo)?
            .try_into()
    }

    pub fn to_der(self: &Self) -> Result<Vec<u8>, TspError> {
        self.__inner
            .to_der()
            .map_app_err(TspErrorKind::ExportDerError)
    }

    pub fn version(self: &Self) -> TspVersion {
        self.__inner.version
    }

    pub fn policy(self: &Self) -> &PolicyId {
        &self.__inner.policy
    }

    pub fn message_imprint(self: &Self) -> &MessageImprint {
        &self.__inner.message_imprint
    }

    pub fn serial_number(self: &Self) -> &SerialNumber {
        &self.__inner.serial_number
    }

    pub fn gen_time(self: &Self) -> DateTime<Utc> {
        self.__inner.gen_time.to_system_time().into()
    }

    pub fn accuracy(self: &Self) -> Option<&Accuracy> {
        self.__inner.accuracy.as_ref()
    }

    pub fn is_ordered(self: &Self) -> bool {
        self.__inner.ordering
    }

    pub fn nonce(self: &Self) -> Option<&Int> {
        self.__inner.nonce.as_ref()
    }

    pub fn nonce_u64(self: &Self) -> Option<u64> {
        self.nonce().and_then(int_to_u64)
    }

    pub fn tsa(self: &Self) -> Option<&GeneralName> {
        self.__inner.tsa.as_ref()
    }

    pub fn extensions(self: &Self) -> &[Extension] {
        self.__inner.extensions.as_deref().unwrap_or(&[])
    }

    pub fn as_asn1(self: &Self) -> &TstInfo {
        &self.__inner
    }
}
