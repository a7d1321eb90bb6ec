use der::{
    asn1::{Int, OctetString},
    oid::ObjectIdentifier,
    Decode, Encode,
};
use rand::Rng;
use x509_cert::ext::Extension;

use crate::{
    asn1_types::{TimeStampReq, TspVersion},
    errors::{TspError, TspErrorKind, TspResult},
    imprint::MessageImprint,
    policy::PolicyId,
    utils::{int_from_u64, int_to_u64},
};

/// Client-side time-stamp request. Immutable once generated.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TimeStampRequest {
    __inner: TimeStampReq,
}

impl der::Encode for TimeStampRequest {
    fn encoded_len(&self) -> der::Result<der::Length> {
        self.__inner.encoded_len()
    }

    fn encode(&self, encoder: &mut impl der::Writer) -> der::Result<()> {
        self.__inner.encode(encoder)
    }
}

impl<'a> der::Decode<'a> for TimeStampRequest {
    fn decode<R: der::Reader<'a>>(decoder: &mut R) -> der::Result<Self> {
        Ok(Self {
            __inner: TimeStampReq::decode(decoder)?,
        })
    }
}

impl From<TimeStampReq> for TimeStampRequest {
    fn from(value: TimeStampReq) -> Self {
        Self { __inner: value }
    }
}

impl TimeStampRequest {
    pub fn from_der(bin: &[u8]) -> Result<Self, TspError> {
        let inner =
            TimeStampReq::from_der(bin).map_app_err(TspErrorKind::InvalidTimeStampRequest)?;

        Ok(inner.into())
    }

    pub fn to_der(self: &Self) -> Result<Vec<u8>, TspError> {
        self.__inner
            .to_der()
            .map_app_err(TspErrorKind::ExportDerError)
    }

    pub fn version(self: &Self) -> TspVersion {
        self.__inner.version
    }

    pub fn message_imprint(self: &Self) -> &MessageImprint {
        &self.__inner.message_imprint
    }

    pub fn message_imprint_algorithm(self: &Self) -> &ObjectIdentifier {
        self.__inner.message_imprint.algorithm()
    }

    pub fn message_imprint_digest(self: &Self) -> &[u8] {
        self.__inner.message_imprint.hashed_message()
    }

    pub fn req_policy(self: &Self) -> Option<&PolicyId> {
        self.__inner.req_policy.as_ref()
    }

    pub fn nonce(self: &Self) -> Option<&Int> {
        self.__inner.nonce.as_ref()
    }

    /// Nonce as `u64`, `None` when absent or wider than 64 bits.
    pub fn nonce_u64(self: &Self) -> Option<u64> {
        self.nonce().and_then(int_to_u64)
    }

    pub fn cert_req(self: &Self) -> bool {
        self.__inner.cert_req
    }

    pub fn extensions(self: &Self) -> &[Extension] {
        self.__inner.extensions.as_deref().unwrap_or(&[])
    }

    pub fn as_asn1(self: &Self) -> &TimeStampReq {
        &self.__inner
    }
}

/// Builder for [`TimeStampRequest`]. Settings carry over to every generated request.
#[derive(Clone, Debug, Default)]
pub struct TimeStampRequestBuilder {
    req_policy: Option<PolicyId>,
    cert_req: bool,
    nonce: Option<Int>,
    extensions: Vec<Extension>,
}

impl TimeStampRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_req_policy(self: &mut Self, policy: PolicyId) -> &mut Self {
        self.req_policy = Some(policy);
        self
    }

    pub fn set_cert_req(self: &mut Self, cert_req: bool) -> &mut Self {
        self.cert_req = cert_req;
        self
    }

    pub fn set_nonce(self: &mut Self, nonce: Int) -> &mut Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn set_nonce_u64(self: &mut Self, nonce: u64) -> Result<&mut Self, TspError> {
        Ok(self.set_nonce(int_from_u64(nonce)?))
    }

    /// Draws a fresh positive 64-bit nonce.
    pub fn set_random_nonce(self: &mut Self) -> Result<&mut Self, TspError> {
        let nonce: u64 = rand::thread_rng().gen();

        self.set_nonce_u64(nonce)
    }

    pub fn add_extension(
        self: &mut Self,
        oid: ObjectIdentifier,
        critical: bool,
        value: &[u8],
    ) -> Result<&mut Self, TspError> {
        self.extensions.push(Extension {
            extn_id: oid,
            critical,
            extn_value: OctetString::new(value).map_app_err(TspErrorKind::InvalidTimeStampRequest)?,
        });

        Ok(self)
    }

    /// Builds the request. The digest length is not checked against the algorithm.
    pub fn generate(
        self: &Self,
        digest_algorithm: ObjectIdentifier,
        digest: &[u8],
    ) -> Result<TimeStampRequest, TspError> {
        self.build(digest_algorithm, digest, self.nonce.clone())
    }

    pub fn generate_with_nonce(
        self: &Self,
        digest_algorithm: ObjectIdentifier,
        digest: &[u8],
        nonce: Int,
    ) -> Result<TimeStampRequest, TspError> {
        self.build(digest_algorithm, digest, Some(nonce))
    }

    fn build(
        self: &Self,
        digest_algorithm: ObjectIdentifier,
        digest: &[u8],
        nonce: Option<Int>,
    ) -> Result<TimeStampRequest, TspError> {
        let extensions = match self.extensions.is_empty() {
            true => None,
            false => Some(self.extensions.clone()),
        };

        Ok(TimeStampReq {
            version: TspVersion::V1,
            message_imprint: MessageImprint::new(digest_algorithm, digest)?,
            req_policy: self.req_policy.clone(),
            nonce,
            cert_req: self.cert_req,
            extensions,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use der::oid::db::rfc5912::{ID_SHA_1, ID_SHA_256};

    use super::*;

    #[test]
    fn defaults_have_no_nonce_and_no_cert_req() {
        let request = TimeStampRequestBuilder::new()
            .generate(ID_SHA_1, &[0x01; 20])
            .unwrap();

        assert_eq!(request.version(), TspVersion::V1);
        assert!(request.nonce().is_none());
        assert!(!request.cert_req());
        assert!(request.req_policy().is_none());
        assert!(request.extensions().is_empty());
        assert_eq!(request.message_imprint_algorithm(), &ID_SHA_1);
        assert_eq!(request.message_imprint_digest(), &[0x01; 20]);
    }

    #[test]
    fn digest_length_is_not_checked() {
        let request = TimeStampRequestBuilder::new()
            .generate(ID_SHA_256, &[0x01; 3])
            .unwrap();

        assert_eq!(request.message_imprint_digest().len(), 3);
    }

    #[test]
    fn zero_nonce_is_not_absent() {
        let request = TimeStampRequestBuilder::new()
            .generate_with_nonce(ID_SHA_1, &[0x01; 20], int_from_u64(0).unwrap())
            .unwrap();

        assert_eq!(request.nonce_u64(), Some(0));

        let decoded = TimeStampRequest::from_der(&request.to_der().unwrap()).unwrap();
        assert_eq!(decoded.nonce_u64(), Some(0));
    }

    #[test]
    fn der_round_trip_is_byte_exact() {
        let mut builder = TimeStampRequestBuilder::new();
        builder
            .set_req_policy(PolicyId::new("1.2.3").unwrap())
            .set_cert_req(true)
            .add_extension(ObjectIdentifier::new_unwrap("1.2.3.4.5"), false, &[0x05, 0x00])
            .unwrap();
        builder.set_nonce_u64(100).unwrap();

        let request = builder.generate(ID_SHA_1, &[0x11; 20]).unwrap();
        let der = request.to_der().unwrap();
        let decoded = TimeStampRequest::from_der(&der).unwrap();

        assert_eq!(decoded, request);
        assert_eq!(decoded.to_der().unwrap(), der);
        assert_eq!(decoded.nonce_u64(), Some(100));
        assert!(decoded.cert_req());
        assert_eq!(decoded.extensions().len(), 1);
        assert_eq!(decoded.req_policy().map(|p| p.to_string()).as_deref(), Some("1.2.3"));
    }

    #[test]
    fn two_arc_req_policy_round_trip() {
        for dotted in ["1.1", "1.2"] {
            let mut builder = TimeStampRequestBuilder::new();
            builder.set_req_policy(dotted.parse().unwrap());

            let request = builder.generate(ID_SHA_1, &[0x11; 20]).unwrap();
            let decoded = TimeStampRequest::from_der(&request.to_der().unwrap()).unwrap();

            assert_eq!(decoded, request);
            assert_eq!(decoded.req_policy().unwrap().to_string(), dotted);
        }
    }

    #[test]
    fn cert_req_false_is_omitted_on_the_wire() {
        let request = TimeStampRequestBuilder::new()
            .generate(ID_SHA_1, &[0x11; 20])
            .unwrap();

        // SEQUENCE { INTEGER 1, MessageImprint }
        let der = request.to_der().unwrap();
        assert_eq!(der.len(), 2 + 3 + 33);
    }

    #[test]
    fn random_nonces_differ() {
        let mut builder = TimeStampRequestBuilder::new();
        let first = builder
            .set_random_nonce()
            .unwrap()
            .generate(ID_SHA_1, &[0x11; 20])
            .unwrap();
        let second = builder
            .set_random_nonce()
            .unwrap()
            .generate(ID_SHA_1, &[0x11; 20])
            .unwrap();

        assert!(first.nonce().is_some());
        assert_ne!(first.nonce(), second.nonce());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert_eq!(
            TimeStampRequest::from_der(&[0x30, 0x03, 0x02, 0x01])
                .unwrap_err()
                .kind,
            TspErrorKind::InvalidTimeStampRequest
        );
    }
}
