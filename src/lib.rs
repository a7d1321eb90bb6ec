//! RFC 3161 time-stamp protocol: requests, token and response generation, and the checks a
//! relying party runs on what comes back.
//!
//! ```ignore
//! let request = TimeStampRequestBuilder::new()
//!     .set_cert_req(true)
//!     .generate(ID_SHA_256, &digest)?;
//!
//! let response = responder.generate_with(&request, &SystemClock, &serials);
//! response.validate(&request)?;
//! if let Some(token) = response.time_stamp_token() {
//!     token.validate(&tsa_certificate)?;
//! }
//! ```

pub mod accuracy;
pub mod asn1_types;
pub mod cert;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod imprint;
pub mod policy;
pub mod request;
pub mod response;
pub mod signed_data;
pub mod source;
pub mod token;
pub mod utils;
pub use der;

#[cfg(test)]
mod fixtures;

pub use accuracy::Accuracy;
pub use cert::{Certificate, CertificateStore, CertificatesAndCrls};
pub use config::ResponderConfig;
pub use crypto::{
    Algorithm, DefaultDigestProvider, DigestProvider, RsaSigner, RsaVerifier, Signer, Verifier,
    ALLOWED_DIGESTS,
};
pub use errors::{TspError, TspErrorKind, TspResult, ValidationFailure};
pub use imprint::MessageImprint;
pub use policy::PolicyId;
pub use request::{TimeStampRequest, TimeStampRequestBuilder};
pub use response::{
    FailureInfo, Outcome, PkiStatus, PkiStatusInfo, TimeStampResponse, TimeStampResponseGenerator,
};
pub use source::{Clock, CounterSerialSource, FixedClock, SerialSource, SystemClock};
pub use token::{TimeStampToken, TimeStampTokenGenerator, TimeStampTokenInfo};
