use std::collections::HashSet;

use chrono::{DateTime, Utc};
use der::oid::ObjectIdentifier;
use tracing::{info, warn};
use x509_cert::serial_number::SerialNumber;

use crate::{
    crypto::{DefaultDigestProvider, DigestProvider},
    policy::PolicyId,
    request::TimeStampRequest,
    source::{Clock, SerialSource},
    token::TimeStampTokenGenerator,
};

use super::{FailureInfo, TimeStampResponse};

/// Screens requests against the TSA's accepted algorithms, policies and extensions, then
/// hands the survivors to a [`TimeStampTokenGenerator`].
///
/// Every outcome, including an internal failure, is a response. Nothing escapes as an error.
pub struct TimeStampResponseGenerator {
    token_generator: TimeStampTokenGenerator,
    accepted_algorithms: HashSet<ObjectIdentifier>,
    accepted_policies: Option<HashSet<PolicyId>>,
    accepted_extensions: HashSet<ObjectIdentifier>,
    digests: Box<dyn DigestProvider>,
}

impl TimeStampResponseGenerator {
    pub fn new(
        token_generator: TimeStampTokenGenerator,
        accepted_algorithms: impl IntoIterator<Item = ObjectIdentifier>,
    ) -> Self {
        Self {
            token_generator,
            accepted_algorithms: accepted_algorithms.into_iter().collect(),
            accepted_policies: None,
            accepted_extensions: HashSet::new(),
            digests: Box::new(DefaultDigestProvider),
        }
    }

    /// Left unset, only the token generator's default policy may be requested.
    /// Once set, even to nothing, a requested policy must be a member.
    pub fn set_accepted_policies(
        self: &mut Self,
        policies: impl IntoIterator<Item = PolicyId>,
    ) -> &mut Self {
        self.accepted_policies = Some(policies.into_iter().collect());
        self
    }

    pub fn set_accepted_extensions(
        self: &mut Self,
        extensions: impl IntoIterator<Item = ObjectIdentifier>,
    ) -> &mut Self {
        self.accepted_extensions = extensions.into_iter().collect();
        self
    }

    /// Digest lengths used to check message imprints.
    pub fn set_digest_provider(self: &mut Self, digests: Box<dyn DigestProvider>) -> &mut Self {
        self.digests = digests;
        self
    }

    pub fn token_generator(self: &Self) -> &TimeStampTokenGenerator {
        &self.token_generator
    }

    pub fn accepted_algorithms(self: &Self) -> &HashSet<ObjectIdentifier> {
        &self.accepted_algorithms
    }

    pub fn accepted_policies(self: &Self) -> Option<&HashSet<PolicyId>> {
        self.accepted_policies.as_ref()
    }

    pub fn accepted_extensions(self: &Self) -> &HashSet<ObjectIdentifier> {
        &self.accepted_extensions
    }

    /// Answers `request`. A `gen_time` of `None` means the TSA has no trustworthy time.
    pub fn generate(
        self: &Self,
        request: &TimeStampRequest,
        serial_number: SerialNumber,
        gen_time: Option<DateTime<Utc>>,
    ) -> TimeStampResponse {
        let gen_time = match gen_time {
            Some(gen_time) => gen_time,
            None => {
                return reject(FailureInfo::TimeNotAvailable, "time source is not available")
            }
        };

        if let Err(response) = self.screen(request) {
            return response;
        }

        match self
            .token_generator
            .generate(request, serial_number.clone(), gen_time)
        {
            Ok(token) => {
                info!(
                    serial = %serial_number,
                    policy = %token.time_stamp_info().policy(),
                    gen_time = %token.time_stamp_info().gen_time(),
                    "time-stamp granted"
                );
                TimeStampResponse::granted(token)
            }
            Err(err) => reject(
                FailureInfo::SystemFailure,
                format!("token generation failed: {}", err),
            ),
        }
    }

    /// Like [`generate`](Self::generate), drawing the time and serial number from the given
    /// sources. No serial number is consumed when the time is unavailable.
    pub fn generate_with(
        self: &Self,
        request: &TimeStampRequest,
        clock: &dyn Clock,
        serials: &dyn SerialSource,
    ) -> TimeStampResponse {
        match clock.gen_time() {
            Some(gen_time) => self.generate(request, serials.next_serial(), Some(gen_time)),
            None => reject(FailureInfo::TimeNotAvailable, "time source is not available"),
        }
    }

    fn screen(self: &Self, request: &TimeStampRequest) -> Result<(), TimeStampResponse> {
        let algorithm = request.message_imprint_algorithm();

        if !self.accepted_algorithms.contains(algorithm) {
            return Err(reject(
                FailureInfo::BadAlg,
                format!("digest algorithm {} is not accepted", algorithm),
            ));
        }

        let expected = match self.digests.digest_length(algorithm) {
            Some(len) => len,
            None => {
                return Err(reject(
                    FailureInfo::BadAlg,
                    format!("digest length of {} is unknown", algorithm),
                ))
            }
        };

        let actual = request.message_imprint_digest().len();
        if actual != expected {
            return Err(reject(
                FailureInfo::BadDataFormat,
                format!(
                    "message imprint is {} bytes, {} needs {}",
                    actual, algorithm, expected
                ),
            ));
        }

        if let Some(policy) = request.req_policy() {
            let accepted = match &self.accepted_policies {
                Some(policies) => policies.contains(policy),
                None => policy == self.token_generator.default_policy(),
            };

            if !accepted {
                return Err(reject(
                    FailureInfo::UnacceptedPolicy,
                    format!("policy {} is not accepted", policy),
                ));
            }
        }

        if let Some(extension) = request
            .extensions()
            .iter()
            .find(|ext| !self.accepted_extensions.contains(&ext.extn_id))
        {
            return Err(reject(
                FailureInfo::UnacceptedExtension,
                format!("extension {} is not accepted", extension.extn_id),
            ));
        }

        Ok(())
    }
}

fn reject(fail_info: FailureInfo, reason: impl Into<String>) -> TimeStampResponse {
    let reason = reason.into();
    warn!(fail_info = ?fail_info, reason = %reason, "time-stamp request rejected");

    TimeStampResponse::rejected(fail_info, reason)
}

#[cfg(test)]
mod tests {
    use der::oid::db::rfc5912::{ID_MD_5, ID_SHA_1, ID_SHA_256};

    use crate::{
        crypto::ALLOWED_DIGESTS,
        errors::{TspError, TspErrorKind},
        fixtures,
        request::TimeStampRequestBuilder,
        response::{PkiStatus, GRANTED_STATUS_STRING},
        source::{CounterSerialSource, FixedClock},
    };

    use super::*;

    fn default_policy() -> PolicyId {
        PolicyId::new("1.2").unwrap()
    }

    fn responder() -> TimeStampResponseGenerator {
        let mut token_generator =
            TimeStampTokenGenerator::new(Box::new(fixtures::tsa_signer()), default_policy());
        token_generator.set_certificates_and_crls(fixtures::store());

        TimeStampResponseGenerator::new(token_generator, [ID_SHA_1, ID_SHA_256])
    }

    fn sha1_request() -> TimeStampRequest {
        TimeStampRequestBuilder::new()
            .generate(ID_SHA_1, &[0x44; 20])
            .unwrap()
    }

    fn assert_rejected(response: &TimeStampResponse, fail_info: FailureInfo) {
        assert_eq!(response.status(), PkiStatus::Rejection);
        assert_eq!(response.fail_info(), Some(fail_info.into()));
        assert!(response.time_stamp_token().is_none());
        assert!(response.status_string().is_some());
    }

    #[test]
    fn grants_acceptable_request() {
        let request = sha1_request();
        let response = responder().generate(&request, SerialNumber::from(7u64), Some(Utc::now()));

        assert_eq!(response.status(), PkiStatus::Granted);
        assert_eq!(response.status_string().as_deref(), Some(GRANTED_STATUS_STRING));
        let token = response.time_stamp_token().unwrap();
        assert_eq!(token.time_stamp_info().serial_number(), &SerialNumber::from(7u64));
        token.validate(&fixtures::tsa_cert()).unwrap();
        response.validate(&request).unwrap();
    }

    #[test]
    fn missing_time_wins_over_everything() {
        let request = TimeStampRequestBuilder::new()
            .generate(ID_MD_5, &[0x44; 3])
            .unwrap();

        let response = responder().generate(&request, SerialNumber::from(1u64), None);
        assert_rejected(&response, FailureInfo::TimeNotAvailable);
    }

    #[test]
    fn unaccepted_algorithm() {
        let request = TimeStampRequestBuilder::new()
            .generate(ID_MD_5, &[0x44; 16])
            .unwrap();

        assert_rejected(
            &responder().generate(&request, SerialNumber::from(1u64), Some(Utc::now())),
            FailureInfo::BadAlg,
        );
    }

    #[test]
    fn accepted_algorithm_without_known_length() {
        struct Sha1Only;

        impl DigestProvider for Sha1Only {
            fn digest_length(&self, oid: &ObjectIdentifier) -> Option<usize> {
                (oid == &ID_SHA_1).then_some(20)
            }

            fn digest(&self, oid: &ObjectIdentifier, data: &[u8]) -> Result<Vec<u8>, TspError> {
                DefaultDigestProvider.digest(oid, data)
            }
        }

        let mut responder = responder();
        responder.set_digest_provider(Box::new(Sha1Only));
        let request = TimeStampRequestBuilder::new()
            .generate(ID_SHA_256, &[0x44; 32])
            .unwrap();

        assert_rejected(
            &responder.generate(&request, SerialNumber::from(1u64), Some(Utc::now())),
            FailureInfo::BadAlg,
        );
    }

    #[test]
    fn wrong_imprint_length() {
        let request = TimeStampRequestBuilder::new()
            .generate(ID_SHA_1, &[0x44; 19])
            .unwrap();

        assert_rejected(
            &responder().generate(&request, SerialNumber::from(1u64), Some(Utc::now())),
            FailureInfo::BadDataFormat,
        );
    }

    #[test]
    fn policy_rules() {
        let mut builder = TimeStampRequestBuilder::new();
        builder.set_req_policy(default_policy());
        let under_default = builder.generate(ID_SHA_1, &[0x44; 20]).unwrap();
        builder.set_req_policy(PolicyId::new("1.2.9").unwrap());
        let other_request = builder.generate(ID_SHA_1, &[0x44; 20]).unwrap();

        // no accepted set: only the default policy
        let mut responder = responder();
        let now = Some(Utc::now());
        assert!(responder
            .generate(&under_default, SerialNumber::from(1u64), now)
            .time_stamp_token()
            .is_some());
        assert_rejected(
            &responder.generate(&other_request, SerialNumber::from(2u64), now),
            FailureInfo::UnacceptedPolicy,
        );

        // explicit empty set refuses any requested policy
        responder.set_accepted_policies(Vec::<PolicyId>::new());
        assert_rejected(
            &responder.generate(&under_default, SerialNumber::from(3u64), now),
            FailureInfo::UnacceptedPolicy,
        );
        assert!(responder
            .generate(&sha1_request(), SerialNumber::from(4u64), now)
            .time_stamp_token()
            .is_some());

        responder.set_accepted_policies([PolicyId::new("1.2.9").unwrap()]);
        let response = responder.generate(&other_request, SerialNumber::from(5u64), now);
        assert_eq!(
            response.time_stamp_token().unwrap().time_stamp_info().policy(),
            &PolicyId::new("1.2.9").unwrap()
        );
        response.validate(&other_request).unwrap();
    }

    #[test]
    fn extension_rules() {
        let extension = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99.1");
        let mut builder = TimeStampRequestBuilder::new();
        builder.add_extension(extension, false, &[0x05, 0x00]).unwrap();
        let request = builder.generate(ID_SHA_1, &[0x44; 20]).unwrap();

        let mut responder = responder();
        assert_rejected(
            &responder.generate(&request, SerialNumber::from(1u64), Some(Utc::now())),
            FailureInfo::UnacceptedExtension,
        );

        responder.set_accepted_extensions([extension]);
        assert!(responder
            .generate(&request, SerialNumber::from(2u64), Some(Utc::now()))
            .time_stamp_token()
            .is_some());
    }

    #[test]
    fn algorithm_is_checked_before_length() {
        let request = TimeStampRequestBuilder::new()
            .generate(ObjectIdentifier::new_unwrap("1.2.3.4"), &[0x44; 3])
            .unwrap();

        let mut responder = responder();
        responder.set_accepted_policies(Vec::<PolicyId>::new());
        assert_rejected(
            &responder.generate(&request, SerialNumber::from(1u64), Some(Utc::now())),
            FailureInfo::BadAlg,
        );
    }

    #[test]
    fn token_failure_is_a_system_failure() {
        let before_epoch = DateTime::from_timestamp(-1, 0).unwrap();

        let response = responder().generate(
            &sha1_request(),
            SerialNumber::from(1u64),
            Some(before_epoch),
        );
        assert_rejected(&response, FailureInfo::SystemFailure);
        assert!(response
            .status_string()
            .unwrap()
            .contains(&format!("{:?}", TspErrorKind::InvalidGenTime)));
    }

    #[test]
    fn generate_with_sources() {
        let responder = TimeStampResponseGenerator::new(
            TimeStampTokenGenerator::new(Box::new(fixtures::tsa_signer()), default_policy()),
            ALLOWED_DIGESTS,
        );
        let serials = CounterSerialSource::new(10);

        let response = responder.generate_with(&sha1_request(), &FixedClock(None), &serials);
        assert_rejected(&response, FailureInfo::TimeNotAvailable);

        let clock = FixedClock(Some(Utc::now()));
        let response = responder.generate_with(&sha1_request(), &clock, &serials);
        assert_eq!(
            response.time_stamp_token().unwrap().time_stamp_info().serial_number(),
            &SerialNumber::from(10u64)
        );
    }
}
