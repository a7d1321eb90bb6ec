use std::fmt::Display;

use der::{
    oid::{
        db::rfc5912::{
            ID_MD_5, ID_SHA_1, ID_SHA_224, ID_SHA_256, ID_SHA_384, ID_SHA_512, RSA_ENCRYPTION,
            SHA_1_WITH_RSA_ENCRYPTION, SHA_224_WITH_RSA_ENCRYPTION, SHA_256_WITH_RSA_ENCRYPTION,
            SHA_384_WITH_RSA_ENCRYPTION, SHA_512_WITH_RSA_ENCRYPTION,
        },
        ObjectIdentifier,
    },
    Any,
};
use digest::{Digest, DynDigest};
use md5::Md5;
use rsa::{pkcs8::DecodePrivateKey, Pkcs1v15Sign, RsaPrivateKey};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::{
    cert::Certificate,
    errors::{TspError, TspErrorKind, TspResult},
};

/// Digest algorithms a responder may accept in a message imprint.
pub const ALLOWED_DIGESTS: [ObjectIdentifier; 6] = [
    ID_MD_5, ID_SHA_1, ID_SHA_224, ID_SHA_256, ID_SHA_384, ID_SHA_512,
];

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Algorithm {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Md5,
    RSA,
    Sha1WithRSA,
    Sha224WithRSA,
    Sha256WithRSA,
    Sha384WithRSA,
    Sha512WithRSA,
    Unsupported(String),
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<AlgorithmIdentifierOwned> for Algorithm {
    fn from(value: AlgorithmIdentifierOwned) -> Self {
        Self::from_oid(&value.oid)
    }
}

impl From<&ObjectIdentifier> for Algorithm {
    fn from(value: &ObjectIdentifier) -> Self {
        Self::from_oid(value)
    }
}

impl Algorithm {
    pub fn from_oid(oid: &ObjectIdentifier) -> Self {
        match *oid {
            ID_MD_5 => Self::Md5,
            ID_SHA_1 => Self::Sha1,
            ID_SHA_224 => Self::Sha224,
            ID_SHA_256 => Self::Sha256,
            ID_SHA_384 => Self::Sha384,
            ID_SHA_512 => Self::Sha512,
            RSA_ENCRYPTION => Self::RSA,
            SHA_1_WITH_RSA_ENCRYPTION => Self::Sha1WithRSA,
            SHA_224_WITH_RSA_ENCRYPTION => Self::Sha224WithRSA,
            SHA_256_WITH_RSA_ENCRYPTION => Self::Sha256WithRSA,
            SHA_384_WITH_RSA_ENCRYPTION => Self::Sha384WithRSA,
            SHA_512_WITH_RSA_ENCRYPTION => Self::Sha512WithRSA,
            oid => Self::Unsupported(oid.to_string()),
        }
    }

    /// Digest algorithm by short name (`sha256`, `SHA-256`, ...) or dotted OID.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "");

        let algorithm = match normalized.as_str() {
            "md5" => Self::Md5,
            "sha1" => Self::Sha1,
            "sha224" => Self::Sha224,
            "sha256" => Self::Sha256,
            "sha384" => Self::Sha384,
            "sha512" => Self::Sha512,
            _ => Self::from_oid(&ObjectIdentifier::new(name.trim()).ok()?),
        };

        Some(algorithm)
    }

    pub fn oid(self: &Self) -> Option<ObjectIdentifier> {
        match self {
            Algorithm::Md5 => Some(ID_MD_5),
            Algorithm::Sha1 => Some(ID_SHA_1),
            Algorithm::Sha224 => Some(ID_SHA_224),
            Algorithm::Sha256 => Some(ID_SHA_256),
            Algorithm::Sha384 => Some(ID_SHA_384),
            Algorithm::Sha512 => Some(ID_SHA_512),
            Algorithm::RSA => Some(RSA_ENCRYPTION),
            Algorithm::Sha1WithRSA => Some(SHA_1_WITH_RSA_ENCRYPTION),
            Algorithm::Sha224WithRSA => Some(SHA_224_WITH_RSA_ENCRYPTION),
            Algorithm::Sha256WithRSA => Some(SHA_256_WITH_RSA_ENCRYPTION),
            Algorithm::Sha384WithRSA => Some(SHA_384_WITH_RSA_ENCRYPTION),
            Algorithm::Sha512WithRSA => Some(SHA_512_WITH_RSA_ENCRYPTION),
            Algorithm::Unsupported(oid) => ObjectIdentifier::new(oid).ok(),
        }
    }

    // Output length in bytes, only for plain digest algorithms.
    pub fn digest_len(self: &Self) -> Option<usize> {
        match self {
            Algorithm::Md5 => Some(16),
            Algorithm::Sha1 => Some(20),
            Algorithm::Sha224 => Some(28),
            Algorithm::Sha256 => Some(32),
            Algorithm::Sha384 => Some(48),
            Algorithm::Sha512 => Some(64),
            _ => None,
        }
    }

    pub fn new_digest(self: &Self) -> Result<Box<dyn DynDigest>, TspError> {
        match self {
            Algorithm::Md5 => Ok(Md5::new().box_clone()),
            Algorithm::Sha1 | Algorithm::Sha1WithRSA => Ok(Sha1::new().box_clone()),
            Algorithm::Sha224 | Algorithm::Sha224WithRSA => Ok(Sha224::new().box_clone()),
            Algorithm::Sha256 | Algorithm::Sha256WithRSA => Ok(Sha256::new().box_clone()),
            Algorithm::Sha384 | Algorithm::Sha384WithRSA => Ok(Sha384::new().box_clone()),
            Algorithm::Sha512 | Algorithm::Sha512WithRSA => Ok(Sha512::new().box_clone()),
            _ => Err(TspError {
                kind: TspErrorKind::UnsupportedAlgorithm,
                message: format!("digest: {}", self),
            }),
        }
    }

    pub fn new_pkcs1v15sign(self: &Self) -> Result<Pkcs1v15Sign, TspError> {
        match self {
            Algorithm::Md5 => Ok(Pkcs1v15Sign::new::<Md5>()),
            Algorithm::Sha1 | Algorithm::Sha1WithRSA => Ok(Pkcs1v15Sign::new::<Sha1>()),
            Algorithm::Sha224 | Algorithm::Sha224WithRSA => Ok(Pkcs1v15Sign::new::<Sha224>()),
            Algorithm::Sha256 | Algorithm::Sha256WithRSA => Ok(Pkcs1v15Sign::new::<Sha256>()),
            Algorithm::Sha384 | Algorithm::Sha384WithRSA => Ok(Pkcs1v15Sign::new::<Sha384>()),
            Algorithm::Sha512 | Algorithm::Sha512WithRSA => Ok(Pkcs1v15Sign::new::<Sha512>()),
            _ => Err(TspError {
                kind: TspErrorKind::UnsupportedAlgorithm,
                message: format!("pkcs1v15sign: {}", self),
            }),
        }
    }

    pub fn digest(self: &Self, data: &[u8]) -> Result<Vec<u8>, TspError> {
        let mut hasher = self.new_digest()?;
        hasher.update(data);

        Ok(hasher.finalize().to_vec())
    }
}

/// Digest lookup and computation by algorithm OID.
pub trait DigestProvider: Send + Sync {
    /// Output length of `algorithm`, `None` when the algorithm is unknown.
    fn digest_length(&self, algorithm: &ObjectIdentifier) -> Option<usize>;

    fn digest(&self, algorithm: &ObjectIdentifier, data: &[u8]) -> Result<Vec<u8>, TspError>;
}

/// Software MD5, SHA-1 and SHA-2 digests.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultDigestProvider;

impl DigestProvider for DefaultDigestProvider {
    fn digest_length(&self, algorithm: &ObjectIdentifier) -> Option<usize> {
        Algorithm::from_oid(algorithm).digest_len()
    }

    fn digest(&self, algorithm: &ObjectIdentifier, data: &[u8]) -> Result<Vec<u8>, TspError> {
        match Algorithm::from_oid(algorithm) {
            alg if alg.digest_len().is_some() => alg.digest(data),
            alg => Err(TspError {
                kind: TspErrorKind::UnsupportedAlgorithm,
                message: format!("digest: {}", alg),
            }),
        }
    }
}

/// Signing key bound to one certificate and one digest algorithm.
///
/// `sign` receives the DER encoding of the signed attributes and is expected to hash it with
/// [`Signer::digest_algorithm`] before signing.
pub trait Signer: Send + Sync {
    fn certificate(&self) -> &Certificate;

    fn digest_algorithm(&self) -> AlgorithmIdentifierOwned;

    fn signature_algorithm(&self) -> AlgorithmIdentifierOwned;

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, TspError>;
}

/// Signature check against a certificate's public key.
pub trait Verifier: Send + Sync {
    fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        certificate: &Certificate,
        digest_algorithm: &ObjectIdentifier,
    ) -> Result<bool, TspError>;
}

/// RSA PKCS#1 v1.5 signer.
#[derive(Clone, Debug)]
pub struct RsaSigner {
    key: RsaPrivateKey,
    certificate: Certificate,
    digest: Algorithm,
}

impl RsaSigner {
    pub fn new(
        key: RsaPrivateKey,
        certificate: Certificate,
        digest_algorithm: &ObjectIdentifier,
    ) -> Result<Self, TspError> {
        let digest = Algorithm::from_oid(digest_algorithm);
        // signing needs a real hash implementation, a known length is not enough
        digest.new_pkcs1v15sign()?;
        if digest.digest_len().is_none() {
            return Err(TspError {
                kind: TspErrorKind::UnsupportedAlgorithm,
                message: format!("signing digest: {}", digest),
            });
        }

        if &key.to_public_key() != certificate.subject_public_key_info.rsa_public_key()? {
            return Err(TspError {
                kind: TspErrorKind::InvalidPrivateKey,
                message: "private key does not match the certificate".to_owned(),
            });
        }

        Ok(Self {
            key,
            certificate,
            digest,
        })
    }

    pub fn from_pkcs8_pem(
        pem: &str,
        certificate: Certificate,
        digest_algorithm: &ObjectIdentifier,
    ) -> Result<Self, TspError> {
        let key =
            RsaPrivateKey::from_pkcs8_pem(pem).map_app_err(TspErrorKind::InvalidPrivateKey)?;

        Self::new(key, certificate, digest_algorithm)
    }
}

impl Signer for RsaSigner {
    fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    fn digest_algorithm(&self) -> AlgorithmIdentifierOwned {
        AlgorithmIdentifierOwned {
            oid: self.digest.oid().unwrap_or(ID_SHA_256),
            parameters: None,
        }
    }

    fn signature_algorithm(&self) -> AlgorithmIdentifierOwned {
        AlgorithmIdentifierOwned {
            oid: RSA_ENCRYPTION,
            parameters: Some(Any::null()),
        }
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, TspError> {
        let hashed = self.digest.digest(message)?;

        self.key
            .sign(self.digest.new_pkcs1v15sign()?, &hashed)
            .map_app_err(TspErrorKind::SigningError)
    }
}

/// RSA PKCS#1 v1.5 verifier.
#[derive(Clone, Copy, Debug, Default)]
pub struct RsaVerifier;

impl Verifier for RsaVerifier {
    fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        certificate: &Certificate,
        digest_algorithm: &ObjectIdentifier,
    ) -> Result<bool, TspError> {
        let public_key = certificate.subject_public_key_info.rsa_public_key()?;
        let digest = Algorithm::from_oid(digest_algorithm);
        let hashed = digest.digest(message)?;

        Ok(public_key
            .verify(digest.new_pkcs1v15sign()?, &hashed, signature)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use der::DecodePem;

    use super::*;

    #[test]
    fn digest_lengths_cover_allowed_set() {
        let provider = DefaultDigestProvider;

        let lengths: Vec<Option<usize>> = ALLOWED_DIGESTS
            .iter()
            .map(|oid| provider.digest_length(oid))
            .collect();

        assert_eq!(
            lengths,
            vec![Some(16), Some(20), Some(28), Some(32), Some(48), Some(64)]
        );
        assert_eq!(provider.digest_length(&RSA_ENCRYPTION), None);
    }

    #[test]
    fn md5_digest() {
        let digest = DefaultDigestProvider.digest(&ID_MD_5, b"abc").unwrap();

        assert_eq!(
            crate::utils::to_hex_str(&digest),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn unknown_digest_is_unsupported() {
        let err = DefaultDigestProvider
            .digest(&RSA_ENCRYPTION, b"abc")
            .unwrap_err();

        assert_eq!(err.kind, TspErrorKind::UnsupportedAlgorithm);
    }

    #[test]
    fn sha1_digest() {
        let digest = DefaultDigestProvider.digest(&ID_SHA_1, b"abc").unwrap();

        assert_eq!(
            crate::utils::to_hex_str(&digest),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn algorithm_from_name() {
        assert_eq!(Algorithm::from_name("SHA-256"), Some(Algorithm::Sha256));
        assert_eq!(Algorithm::from_name("sha1"), Some(Algorithm::Sha1));
        assert_eq!(
            Algorithm::from_name("2.16.840.1.101.3.4.2.3"),
            Some(Algorithm::Sha512)
        );
        assert_eq!(
            Algorithm::from_name("1.2.3.4"),
            Some(Algorithm::Unsupported("1.2.3.4".to_owned()))
        );
        assert_eq!(Algorithm::from_name("whirlpool"), None);
    }

    #[test]
    fn rsa_sign_then_verify() {
        let cert = Certificate::from_pem(include_str!("./testdata/tsa.pem")).unwrap();
        let signer =
            RsaSigner::from_pkcs8_pem(include_str!("./testdata/tsa.key"), cert.clone(), &ID_SHA_256)
                .unwrap();

        let signature = signer.sign(b"signed attributes").unwrap();

        assert!(RsaVerifier
            .verify(b"signed attributes", &signature, &cert, &ID_SHA_256)
            .unwrap());
        assert!(!RsaVerifier
            .verify(b"other attributes", &signature, &cert, &ID_SHA_256)
            .unwrap());
    }

    #[test]
    fn signer_rejects_foreign_key() {
        let cert = Certificate::from_pem(include_str!("./testdata/tsa.pem")).unwrap();
        let err =
            RsaSigner::from_pkcs8_pem(include_str!("./testdata/other.key"), cert, &ID_SHA_256)
                .unwrap_err();

        assert_eq!(err.kind, TspErrorKind::InvalidPrivateKey);
    }

    #[test]
    fn md5_sign_then_verify() {
        let cert = Certificate::from_pem(include_str!("./testdata/tsa.pem")).unwrap();
        let signer =
            RsaSigner::from_pkcs8_pem(include_str!("./testdata/tsa.key"), cert.clone(), &ID_MD_5)
                .unwrap();

        assert_eq!(signer.digest_algorithm().oid, ID_MD_5);
        let signature = signer.sign(b"signed attributes").unwrap();

        assert!(RsaVerifier
            .verify(b"signed attributes", &signature, &cert, &ID_MD_5)
            .unwrap());
        assert!(!RsaVerifier
            .verify(b"signed attributes", &signature, &cert, &ID_SHA_1)
            .unwrap());
    }

    #[test]
    fn signer_rejects_signature_algorithm_as_digest() {
        let cert = Certificate::from_pem(include_str!("./testdata/tsa.pem")).unwrap();
        let err = RsaSigner::from_pkcs8_pem(
            include_str!("./testdata/tsa.key"),
            cert,
            &SHA_256_WITH_RSA_ENCRYPTION,
        )
        .unwrap_err();

        assert_eq!(err.kind, TspErrorKind::UnsupportedAlgorithm);
    }
}
