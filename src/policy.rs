use std::{fmt, str::FromStr};

use der::{
    oid::ObjectIdentifier, DecodeValue, EncodeValue, FixedTag, Header, Length, Reader, Tag, Writer,
};

use crate::errors::{TspError, TspErrorKind};

/// `TSAPolicyId ::= OBJECT IDENTIFIER`.
///
/// Kept as the DER content octets so that short policy arcs such as `1.2` survive a round
/// trip. [`ObjectIdentifier`] wants at least three arcs.
#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PolicyId {
    bytes: Vec<u8>,
}

impl PolicyId {
    /// Parses dotted arcs, e.g. `"1.2"` or `"1.3.6.1.4.1.4146.2.2"`.
    pub fn new(dotted: &str) -> Result<Self, TspError> {
        let arcs = dotted
            .trim()
            .split('.')
            .map(|arc| arc.parse::<u64>())
            .collect::<Result<Vec<u64>, _>>()
            .map_err(|err| invalid(format!("{:?}: {}", dotted, err)))?;

        Self::from_arcs(&arcs)
    }

    pub fn from_arcs(arcs: &[u64]) -> Result<Self, TspError> {
        let (first, second, rest) = match arcs {
            [first, second, rest @ ..] => (*first, *second, rest),
            _ => return Err(invalid(format!("{:?} needs at least two arcs", arcs))),
        };

        if first > 2 || (first < 2 && second > 39) {
            return Err(invalid(format!("{}.{} is not a valid root", first, second)));
        }

        let root = (first * 40)
            .checked_add(second)
            .ok_or_else(|| invalid(format!("arc {} is too large", second)))?;

        let mut bytes = vec![];
        for arc in std::iter::once(root).chain(rest.iter().copied()) {
            push_base128(&mut bytes, arc);
        }

        Ok(Self { bytes })
    }

    /// Takes OBJECT IDENTIFIER content octets.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TspError> {
        let policy = Self {
            bytes: bytes.to_vec(),
        };
        policy.arcs()?;

        Ok(policy)
    }

    pub fn as_bytes(self: &Self) -> &[u8] {
        &self.bytes
    }

    pub fn arcs(self: &Self) -> Result<Vec<u64>, TspError> {
        let mut subidentifiers = vec![];
        let mut current: u64 = 0;
        let mut fresh = true;

        for byte in &self.bytes {
            if fresh && *byte == 0x80 {
                return Err(invalid("non-minimal subidentifier".to_owned()));
            }

            current = current
                .checked_mul(128)
                .map(|value| value | u64::from(byte & 0x7f))
                .ok_or_else(|| invalid("subidentifier exceeds 64 bits".to_owned()))?;

            fresh = byte & 0x80 == 0;
            if fresh {
                subidentifiers.push(current);
                current = 0;
            }
        }

        let root = match subidentifiers.first() {
            Some(root) if fresh => *root,
            _ => return Err(invalid("truncated OBJECT IDENTIFIER".to_owned())),
        };

        let mut arcs = match root {
            0..=39 => vec![0, root],
            40..=79 => vec![1, root - 40],
            _ => vec![2, root - 80],
        };
        arcs.extend_from_slice(&subidentifiers[1..]);

        Ok(arcs)
    }
}

fn push_base128(bytes: &mut Vec<u8>, arc: u64) {
    let mut groups = vec![(arc & 0x7f) as u8];
    let mut rest = arc >> 7;

    while rest > 0 {
        groups.push((rest & 0x7f) as u8 | 0x80);
        rest >>= 7;
    }

    bytes.extend(groups.iter().rev());
}

fn invalid(message: String) -> TspError {
    TspError {
        kind: TspErrorKind::InvalidPolicyId,
        message,
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.arcs() {
            Ok(arcs) => {
                let dotted: Vec<String> = arcs.iter().map(|arc| arc.to_string()).collect();
                f.write_str(&dotted.join("."))
            }
            Err(_) => write!(f, "<{}>", crate::utils::to_hex_str(&self.bytes)),
        }
    }
}

impl fmt::Debug for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PolicyId({})", self)
    }
}

impl FromStr for PolicyId {
    type Err = TspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<ObjectIdentifier> for PolicyId {
    fn from(value: ObjectIdentifier) -> Self {
        Self {
            bytes: value.as_bytes().to_vec(),
        }
    }
}

impl FixedTag for PolicyId {
    const TAG: Tag = Tag::ObjectIdentifier;
}

impl EncodeValue for PolicyId {
    fn value_len(&self) -> der::Result<Length> {
        Length::try_from(self.bytes.len())
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        writer.write(&self.bytes)
    }
}

impl<'a> DecodeValue<'a> for PolicyId {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> der::Result<Self> {
        let bytes = reader.read_vec(header.length)?;

        Self::from_bytes(&bytes).map_err(|_| Self::TAG.value_error())
    }
}
