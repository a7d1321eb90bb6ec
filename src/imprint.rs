use der::{asn1::OctetString, oid::ObjectIdentifier, Any, Sequence};
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::{
    errors::{TspError, TspErrorKind, TspResult},
    utils::to_hex_str,
};

/// ```text
/// MessageImprint ::= SEQUENCE {
///     hashAlgorithm AlgorithmIdentifier,
///     hashedMessage OCTET STRING }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct MessageImprint {
    pub hash_algorithm: AlgorithmIdentifierOwned,
    pub hashed_message: OctetString,
}

impl MessageImprint {
    /// Digest parameters are left absent. Length is not checked here.
    pub fn new(algorithm: ObjectIdentifier, hashed_message: &[u8]) -> Result<Self, TspError> {
        Ok(Self {
            hash_algorithm: AlgorithmIdentifierOwned {
                oid: algorithm,
                parameters: None,
            },
            hashed_message: OctetString::new(hashed_message)
                .map_app_err(TspErrorKind::InvalidTimeStampRequest)?,
        })
    }

    pub fn algorithm(self: &Self) -> &ObjectIdentifier {
        &self.hash_algorithm.oid
    }

    pub fn hashed_message(self: &Self) -> &[u8] {
        self.hashed_message.as_bytes()
    }

    /// Algorithm OID, parameters and digest bytes all agree. Absent parameters equal NULL.
    pub fn matches(self: &Self, other: &Self) -> bool {
        fn params(alg: &AlgorithmIdentifierOwned) -> Option<&Any> {
            alg.parameters.as_ref().filter(|p| !p.is_null())
        }

        self.hash_algorithm.oid == other.hash_algorithm.oid
            && params(&self.hash_algorithm) == params(&other.hash_algorithm)
            && self.hashed_message() == other.hashed_message()
    }

    pub fn to_hex(self: &Self) -> String {
        to_hex_str(self.hashed_message())
    }
}
