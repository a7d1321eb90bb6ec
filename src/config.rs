use std::path::Path;

use der::oid::ObjectIdentifier;
use serde::Deserialize;

use crate::{
    crypto::{Algorithm, Signer},
    errors::{TspError, TspErrorKind, TspResult},
    policy::PolicyId,
    response::TimeStampResponseGenerator,
    token::TimeStampTokenGenerator,
};

/// Responder policy as kept in a TOML file.
///
/// ```toml
/// default_policy = "1.2"
/// accepted_algorithms = ["sha1", "sha256"]
/// accepted_policies = ["1.2", "1.2.3"]
/// accepted_extensions = []
/// ordering = false
///
/// [accuracy]
/// seconds = 1
/// millis = 2
/// micros = 3
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResponderConfig {
    pub default_policy: String,
    #[serde(default)]
    pub accepted_algorithms: Vec<String>,
    pub accepted_policies: Option<Vec<String>>,
    pub accepted_extensions: Option<Vec<String>>,
    #[serde(default)]
    pub ordering: bool,
    pub accuracy: Option<AccuracyConfig>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AccuracyConfig {
    pub seconds: Option<u64>,
    pub millis: Option<u16>,
    pub micros: Option<u16>,
}

impl ResponderConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, TspError> {
        toml::from_str(input).map_app_err(TspErrorKind::InvalidConfig)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TspError> {
        let input = std::fs::read_to_string(path).map_app_err(TspErrorKind::IoError)?;

        Self::from_toml_str(&input)
    }

    pub fn default_policy(self: &Self) -> Result<PolicyId, TspError> {
        parse_policy("default_policy", &self.default_policy)
    }

    /// Accepted digest algorithms, by short name or dotted OID.
    pub fn accepted_algorithms(self: &Self) -> Result<Vec<ObjectIdentifier>, TspError> {
        self.accepted_algorithms
            .iter()
            .map(|name| {
                Algorithm::from_name(name)
                    .and_then(|alg| alg.oid())
                    .ok_or_else(|| TspError {
                        kind: TspErrorKind::InvalidConfig,
                        message: format!("accepted_algorithms: unknown algorithm {:?}", name),
                    })
            })
            .collect()
    }

    pub fn accepted_policies(self: &Self) -> Result<Option<Vec<PolicyId>>, TspError> {
        self.accepted_policies
            .as_ref()
            .map(|policies| {
                policies
                    .iter()
                    .map(|policy| parse_policy("accepted_policies", policy))
                    .collect()
            })
            .transpose()
    }

    pub fn accepted_extensions(self: &Self) -> Result<Vec<ObjectIdentifier>, TspError> {
        match &self.accepted_extensions {
            Some(extensions) => parse_oids("accepted_extensions", extensions),
            None => Ok(vec![]),
        }
    }

    /// Token generator signing with `signer` under this configuration.
    pub fn token_generator(
        self: &Self,
        signer: Box<dyn Signer>,
    ) -> Result<TimeStampTokenGenerator, TspError> {
        let mut generator = TimeStampTokenGenerator::new(signer, self.default_policy()?);
        generator.set_ordering(self.ordering);

        if let Some(accuracy) = &self.accuracy {
            if let Some(seconds) = accuracy.seconds {
                generator.set_accuracy_seconds(seconds);
            }
            if let Some(millis) = accuracy.millis {
                generator
                    .set_accuracy_millis(millis)
                    .map_err(|err| invalid_config("accuracy.millis", err))?;
            }
            if let Some(micros) = accuracy.micros {
                generator
                    .set_accuracy_micros(micros)
                    .map_err(|err| invalid_config("accuracy.micros", err))?;
            }
        }

        Ok(generator)
    }

    /// Wraps `token_generator` with this configuration's acceptance rules.
    pub fn response_generator(
        self: &Self,
        token_generator: TimeStampTokenGenerator,
    ) -> Result<TimeStampResponseGenerator, TspError> {
        let mut generator =
            TimeStampResponseGenerator::new(token_generator, self.accepted_algorithms()?);

        if let Some(policies) = self.accepted_policies()? {
            generator.set_accepted_policies(policies);
        }
        generator.set_accepted_extensions(self.accepted_extensions()?);

        Ok(generator)
    }
}

fn parse_oid(field: &str, value: &str) -> Result<ObjectIdentifier, TspError> {
    ObjectIdentifier::new(value.trim()).map_err(|err| TspError {
        kind: TspErrorKind::InvalidConfig,
        message: format!("{}: {:?} is not an OID: {}", field, value, err),
    })
}

fn parse_policy(field: &str, value: &str) -> Result<PolicyId, TspError> {
    PolicyId::new(value).map_err(|err| TspError {
        kind: TspErrorKind::InvalidConfig,
        message: format!("{}: {}", field, err.message),
    })
}

fn parse_oids(field: &str, values: &[String]) -> Result<Vec<ObjectIdentifier>, TspError> {
    values.iter().map(|value| parse_oid(field, value)).collect()
}

fn invalid_config(field: &str, err: TspError) -> TspError {
    TspError {
        kind: TspErrorKind::InvalidConfig,
        message: format!("{}: {}", field, err.message),
    }
}
