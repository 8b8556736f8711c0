//! Record kinds, reflector families and their schema tags.

use std::fmt::{self, Display, Formatter};

use crate::{Error, Result};

/// The part of a reflector document a [Value](crate::Value) carries.
///
/// The discriminant is the DHT value id the reflector publishes the part
/// under. Ids are append-only: never reuse or renumber one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Config = 1,
    Peers = 2,
    Clients = 3,
    Users = 4,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Config,
        RecordKind::Peers,
        RecordKind::Clients,
        RecordKind::Users,
    ];

    /// Map a DHT value id back to a kind, `None` for ids this crate doesn't know.
    pub fn from_value_id(id: u64) -> Option<RecordKind> {
        match id {
            1 => Some(RecordKind::Config),
            2 => Some(RecordKind::Peers),
            3 => Some(RecordKind::Clients),
            4 => Some(RecordKind::Users),
            _ => None,
        }
    }

    pub fn value_id(&self) -> u64 {
        *self as u64
    }

    /// Parse the single letter section selector used by the `get` tool:
    /// `c`onfig, `p`eers, `l`inked clients, `u`sers.
    pub fn from_section(section: char) -> Option<RecordKind> {
        match section.to_ascii_lowercase() {
            'c' => Some(RecordKind::Config),
            'p' => Some(RecordKind::Peers),
            'l' => Some(RecordKind::Clients),
            'u' => Some(RecordKind::Users),
            _ => None,
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Config => "config",
            RecordKind::Peers => "peers",
            RecordKind::Clients => "clients",
            RecordKind::Users => "users",
        };

        f.write_str(name)
    }
}

/// Reflector software publishing the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    /// M17 reflectors, callsigns like `M17-USA`.
    Mrefd,
    /// Universal reflectors, callsigns like `URF270`.
    Urfd,
}

const MREFD_PREFIX: &str = "M17-";
const URFD_PREFIX: &str = "URF";

impl Family {
    /// Detect the family from a reflector callsign.
    pub fn from_callsign(callsign: &str) -> Result<Family> {
        let callsign = callsign.trim().to_ascii_uppercase();

        if callsign.starts_with(MREFD_PREFIX) {
            Ok(Family::Mrefd)
        } else if callsign.starts_with(URFD_PREFIX) {
            Ok(Family::Urfd)
        } else {
            Err(Error::UnknownFamily(callsign))
        }
    }

    /// The callsign prefix every reflector of this family carries.
    pub fn prefix(&self) -> &'static str {
        match self {
            Family::Mrefd => MREFD_PREFIX,
            Family::Urfd => URFD_PREFIX,
        }
    }

    /// The `user_type` a current value of `kind` must carry to be decoded.
    ///
    /// New payload revisions get a new tag; existing tags never change meaning.
    pub fn schema_tag(&self, kind: RecordKind) -> &'static str {
        match (self, kind) {
            (Family::Mrefd, RecordKind::Config) => "mrefd-config-1",
            (Family::Mrefd, RecordKind::Peers) => "mrefd-peers-1",
            (Family::Mrefd, RecordKind::Clients) => "mrefd-clients-1",
            (Family::Mrefd, RecordKind::Users) => "mrefd-users-1",
            (Family::Urfd, RecordKind::Config) => "urfd-config-1",
            (Family::Urfd, RecordKind::Peers) => "urfd-peers-1",
            (Family::Urfd, RecordKind::Clients) => "urfd-clients-1",
            (Family::Urfd, RecordKind::Users) => "urfd-users-1",
        }
    }
}

/// Filter handed to the DHT client with a get.
///
/// It is evaluated by the DHT layer; the reconciler never relies on it and
/// checks every value it receives on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Where {
    id: Option<u64>,
}

impl Where {
    /// Match every value under the key.
    pub fn any() -> Self {
        Self { id: None }
    }

    /// Match only values of one record kind.
    pub fn kind(kind: RecordKind) -> Self {
        Self {
            id: Some(kind.value_id()),
        }
    }

    pub fn value_id(&self) -> Option<u64> {
        self.id
    }

    pub fn matches(&self, value_id: u64) -> bool {
        self.id.map_or(true, |id| id == value_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn family_from_callsign() {
        assert_eq!(Family::from_callsign("m17-usa").unwrap(), Family::Mrefd);
        assert_eq!(Family::from_callsign(" URF270 ").unwrap(), Family::Urfd);
        assert!(matches!(
            Family::from_callsign("XLX757"),
            Err(Error::UnknownFamily(callsign)) if callsign == "XLX757"
        ));
    }

    #[test]
    fn value_ids_are_stable() {
        for kind in RecordKind::ALL {
            assert_eq!(RecordKind::from_value_id(kind.value_id()), Some(kind));
        }

        assert_eq!(RecordKind::Config.value_id(), 1);
        assert_eq!(RecordKind::Users.value_id(), 4);
        assert_eq!(RecordKind::from_value_id(0), None);
        assert_eq!(RecordKind::from_value_id(5), None);
    }

    #[test]
    fn sections() {
        assert_eq!(RecordKind::from_section('l'), Some(RecordKind::Clients));
        assert_eq!(RecordKind::from_section('P'), Some(RecordKind::Peers));
        assert_eq!(RecordKind::from_section('x'), None);
    }

    #[test]
    fn where_filter() {
        assert!(Where::any().matches(3));
        assert!(Where::kind(RecordKind::Peers).matches(2));
        assert!(!Where::kind(RecordKind::Peers).matches(1));
    }

    #[test]
    fn tags_are_family_specific() {
        assert_eq!(Family::Mrefd.schema_tag(RecordKind::Peers), "mrefd-peers-1");
        assert_eq!(Family::Urfd.schema_tag(RecordKind::Peers), "urfd-peers-1");
    }
}
