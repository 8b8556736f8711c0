//! DHT key of a reflector document.
use rand::Rng;
use sha1_smol::Sha1;
use std::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

use crate::{Error, Result};

/// The size of DHT keys in bytes.
pub const ID_SIZE: usize = 20;

#[derive(Clone, Copy, PartialEq, Ord, PartialOrd, Eq, Hash)]
/// DHT key under which a reflector publishes its documents.
pub struct Id(pub [u8; ID_SIZE]);

impl Id {
    pub fn random() -> Id {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; ID_SIZE] = rng.gen();

        Id(random_bytes)
    }

    /// Hash a reflector callsign into the key its documents are stored under.
    ///
    /// Reflectors publish under the SHA-1 of their uppercase callsign, so the
    /// name is trimmed and uppercased before hashing.
    pub fn hash(name: &str) -> Id {
        let normalized = name.trim().to_ascii_uppercase();

        let mut hasher = Sha1::new();
        hasher.update(normalized.as_bytes());

        Id(hasher.digest().bytes())
    }

    /// Create a new Id from some bytes. Returns Err if `bytes` is not of length
    /// [ID_SIZE].
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Id> {
        let bytes = bytes.as_ref();
        if bytes.len() != ID_SIZE {
            return Err(Error::InvalidIdSize(bytes.len()));
        }

        let mut tmp: [u8; ID_SIZE] = [0; ID_SIZE];
        tmp.copy_from_slice(bytes);

        Ok(Id(tmp))
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{:02x}", byte)?;
        }

        Ok(())
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Id> {
        if s.len() % 2 != 0 {
            return Err(Error::InvalidIdEncoding(
                "Number of Hex characters should be even".into(),
            ));
        }

        let mut bytes = Vec::with_capacity(s.len() / 2);

        for i in 0..s.len() / 2 {
            let byte_str = s
                .get(i * 2..(i * 2) + 2)
                .ok_or_else(|| Error::InvalidIdEncoding("Non ASCII character".into()))?;

            let byte = u8::from_str_radix(byte_str, 16)
                .map_err(|_| Error::InvalidIdEncoding("Invalid hex character".into()))?;

            bytes.push(byte);
        }

        Id::from_bytes(bytes)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash_is_sha1_of_uppercase_callsign() {
        // sha1("M17-USA")
        let expected = {
            let mut hasher = Sha1::new();
            hasher.update(b"M17-USA");
            Id(hasher.digest().bytes())
        };

        assert_eq!(Id::hash("M17-USA"), expected);
        assert_eq!(Id::hash(" m17-usa\t"), expected);
        assert_ne!(Id::hash("M17-USB"), expected);
    }

    #[test]
    fn hex_round_trip() {
        let id = Id::from_str("4238af8aff56cf6e0007d9d2003bf23d33eea7c3").unwrap();

        assert_eq!(id.to_string(), "4238af8aff56cf6e0007d9d2003bf23d33eea7c3");
    }

    #[test]
    fn invalid_encodings() {
        assert!(matches!(
            Id::from_str("abc"),
            Err(Error::InvalidIdEncoding(_))
        ));
        assert!(matches!(
            Id::from_str("zz38af8aff56cf6e0007d9d2003bf23d33eea7c3"),
            Err(Error::InvalidIdEncoding(_))
        ));
        assert!(matches!(Id::from_str("abcd"), Err(Error::InvalidIdSize(2))));
    }
}
