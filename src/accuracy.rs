use std::time::Duration;

use der::Sequence;

use crate::errors::{TspError, TspErrorKind};

/// ```text
/// Accuracy ::= SEQUENCE {
///     seconds        INTEGER           OPTIONAL,
///     millis     [0] INTEGER  (1..999) OPTIONAL,
///     micros     [1] INTEGER  (1..999) OPTIONAL  }
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Sequence)]
pub struct Accuracy {
    #[asn1(optional = "true")]
    seconds: Option<u64>,
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    millis: Option<u16>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    micros: Option<u16>,
}

impl Accuracy {
    pub fn new(
        seconds: Option<u64>,
        millis: Option<u16>,
        micros: Option<u16>,
    ) -> Result<Self, TspError> {
        for (name, value) in [("millis", millis), ("micros", micros)] {
            if let Some(v) = value {
                if !(1..=999).contains(&v) {
                    return Err(TspError {
                        kind: TspErrorKind::InvalidAccuracy,
                        message: format!("{} out of range 1..=999: {}", name, v),
                    });
                }
            }
        }

        Ok(Self {
            seconds,
            millis,
            micros,
        })
    }

    pub fn seconds(self: &Self) -> Option<u64> {
        self.seconds
    }

    pub fn millis(self: &Self) -> Option<u16> {
        self.millis
    }

    pub fn micros(self: &Self) -> Option<u16> {
        self.micros
    }

    pub fn is_empty(self: &Self) -> bool {
        self.seconds.is_none() && self.millis.is_none() && self.micros.is_none()
    }

    // informational total, never written to the wire
    pub fn to_duration(self: &Self) -> Duration {
        Duration::from_secs(self.seconds.unwrap_or(0))
            + Duration::from_millis(u64::from(self.millis.unwrap_or(0)))
            + Duration::from_micros(u64::from(self.micros.unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use der::{Decode, Encode};

    use super::*;

    #[test]
    fn fields_stay_independent() {
        let accuracy = Accuracy::new(Some(1), Some(2), Some(3)).unwrap();

        assert_eq!(accuracy.seconds(), Some(1));
        assert_eq!(accuracy.millis(), Some(2));
        assert_eq!(accuracy.micros(), Some(3));
        assert_eq!(accuracy.to_duration(), Duration::from_micros(1_002_003));
    }

    #[test]
    fn out_of_range_is_rejected() {
        assert_eq!(
            Accuracy::new(None, Some(0), None).unwrap_err().kind,
            TspErrorKind::InvalidAccuracy
        );
        assert!(Accuracy::new(None, None, Some(1000)).is_err());
        assert!(Accuracy::new(Some(0), Some(999), Some(1)).is_ok());
    }

    #[test]
    fn implicit_tags() {
        let accuracy = Accuracy::new(None, Some(2), Some(3)).unwrap();
        let der = accuracy.to_der().unwrap();

        assert_eq!(der, vec![0x30, 0x06, 0x80, 0x01, 0x02, 0x81, 0x01, 0x03]);
        assert_eq!(Accuracy::from_der(&der).unwrap(), accuracy);
    }

    #[test]
    fn empty_accuracy() {
        let accuracy = Accuracy::default();

        assert!(accuracy.is_empty());
        assert_eq!(accuracy.to_der().unwrap(), vec![0x30, 0x00]);
    }
}
