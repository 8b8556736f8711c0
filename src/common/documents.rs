//! Payload schemas of the reflector document parts.
//!
//! Field order and meaning follow the published `*-1` schema tags; a new
//! revision must get a new tag rather than change these structs.

use std::collections::BTreeMap;

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

use super::{Family, RecordKind, Value};

/// Ordering key of a revision: publication time, then the publisher's
/// sequence counter for revisions published within the same second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub timestamp: i64,
    pub sequence: u32,
}

impl Version {
    pub fn new(timestamp: i64, sequence: u32) -> Self {
        Self {
            timestamp,
            sequence,
        }
    }
}

/// A document part that can be ordered against other revisions of itself.
pub trait Versioned {
    fn version(&self) -> Version;
}

// === Config ===

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// `mrefd-config-1`
pub struct MrefdConfig {
    pub timestamp: i64,
    pub callsign: String,
    pub ipv4addr: String,
    pub ipv6addr: String,
    /// all configured modules, `[A-Z]`
    pub modules: String,
    /// modules that pass encrypted streams
    pub encryptedmods: String,
    /// dashboard URL
    pub url: String,
    pub email: String,
    pub sponsor: String,
    /// 2-letter country code
    pub country: String,
    /// reflector software version
    pub version: String,
    /// UDP listening port, usually 17000
    pub port: u16,
}

/// Index into [UrfdConfig::port].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrfdPort {
    Dcs,
    DExtra,
    DmrPlus,
    DPlus,
    M17,
    Mmdvm,
    Nxdn,
    P25,
    Urf,
    Ysf,
}

/// Protocols with an auto-link module, index into [UrfdConfig::almod].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoLink {
    Nxdn,
    P25,
    Ysf,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// `urfd-config-1`
pub struct UrfdConfig {
    pub timestamp: i64,
    pub callsign: String,
    pub ipv4addr: String,
    pub ipv6addr: String,
    pub modules: String,
    /// modules with full transcoding
    pub transcodedmods: String,
    pub url: String,
    pub email: String,
    pub sponsor: String,
    pub country: String,
    pub version: String,
    /// listening ports, indexed by [UrfdPort]
    pub port: Vec<u16>,
    /// auto-link module letters, indexed by [AutoLink]
    pub almod: String,
    /// default YSF rx and tx frequencies
    pub ysffreq: Vec<u64>,
    /// NXDN and P25 reflector ids
    pub refid: Vec<u32>,
    /// module letter to description
    pub description: BTreeMap<String, String>,
    /// non-zero when G3 is enabled
    pub g3enabled: u8,
}

impl UrfdConfig {
    /// Listening port of a protocol, 0 when not published.
    pub fn port(&self, port: UrfdPort) -> u16 {
        self.port.get(port as usize).copied().unwrap_or(0)
    }

    /// Auto-link module of a protocol, if published.
    pub fn auto_link(&self, protocol: AutoLink) -> Option<char> {
        self.almod.chars().nth(protocol as usize)
    }

    pub fn ysf_rx_freq(&self) -> u64 {
        self.ysffreq.first().copied().unwrap_or(0)
    }

    pub fn ysf_tx_freq(&self) -> u64 {
        self.ysffreq.get(1).copied().unwrap_or(0)
    }

    pub fn nxdn_reflector_id(&self) -> u32 {
        self.refid.first().copied().unwrap_or(0)
    }

    pub fn p25_reflector_id(&self) -> u32 {
        self.refid.get(1).copied().unwrap_or(0)
    }

    pub fn description(&self, module: char) -> Option<&str> {
        self.description
            .get(module.to_string().as_str())
            .map(String::as_str)
    }

    pub fn g3_enabled(&self) -> bool {
        self.g3enabled != 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Config {
    Mrefd(MrefdConfig),
    Urfd(UrfdConfig),
}

impl Config {
    pub fn callsign(&self) -> &str {
        match self {
            Config::Mrefd(config) => &config.callsign,
            Config::Urfd(config) => &config.callsign,
        }
    }

    pub fn modules(&self) -> &str {
        match self {
            Config::Mrefd(config) => &config.modules,
            Config::Urfd(config) => &config.modules,
        }
    }
}

impl Versioned for Config {
    /// Config parts carry no sequence counter.
    fn version(&self) -> Version {
        match self {
            Config::Mrefd(config) => Version::new(config.timestamp, 0),
            Config::Urfd(config) => Version::new(config.timestamp, 0),
        }
    }
}

// === Peers ===

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    /// callsign of the linked reflector
    pub callsign: String,
    /// modules shared over the link
    pub modules: String,
    pub connect_time: i64,
}

impl PeerEntry {
    pub fn new(callsign: &str, modules: &str, connect_time: i64) -> Self {
        Self {
            callsign: callsign.to_string(),
            modules: modules.to_string(),
            connect_time,
        }
    }

    pub fn shares(&self, module: char) -> bool {
        self.modules.contains(module)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// `mrefd-peers-1` and `urfd-peers-1` share this layout.
pub struct Peers {
    pub timestamp: i64,
    pub sequence: u32,
    pub list: Vec<PeerEntry>,
}

impl Versioned for Peers {
    fn version(&self) -> Version {
        Version::new(self.timestamp, self.sequence)
    }
}

// === Clients ===

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEntry {
    pub callsign: String,
    pub ip: String,
    /// module letter the client is linked to
    pub module: String,
    pub connect_time: i64,
    pub last_heard: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// `mrefd-clients-1` and `urfd-clients-1` share this layout.
pub struct Clients {
    pub timestamp: i64,
    pub sequence: u32,
    pub list: Vec<ClientEntry>,
}

impl Versioned for Clients {
    fn version(&self) -> Version {
        Version::new(self.timestamp, self.sequence)
    }
}

// === Users ===

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MrefdUser {
    pub source: String,
    pub destination: String,
    /// reflector and module where the transmission was heard
    pub reflector: String,
    pub last_heard: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// `mrefd-users-1`
pub struct MrefdUsers {
    pub timestamp: i64,
    pub sequence: u32,
    pub list: Vec<MrefdUser>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrfdUser {
    pub callsign: String,
    pub via_node: String,
    pub on_module: String,
    pub via_peer: String,
    pub last_heard: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// `urfd-users-1`
pub struct UrfdUsers {
    pub timestamp: i64,
    pub sequence: u32,
    pub list: Vec<UrfdUser>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Users {
    Mrefd(MrefdUsers),
    Urfd(UrfdUsers),
}

impl Users {
    pub fn len(&self) -> usize {
        match self {
            Users::Mrefd(users) => users.list.len(),
            Users::Urfd(users) => users.list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Versioned for Users {
    fn version(&self) -> Version {
        match self {
            Users::Mrefd(users) => Version::new(users.timestamp, users.sequence),
            Users::Urfd(users) => Version::new(users.timestamp, users.sequence),
        }
    }
}

// === Document ===

/// One decoded part of a reflector document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Document {
    Config(Config),
    Peers(Peers),
    Clients(Clients),
    Users(Users),
}

impl Document {
    /// Decode the payload of a value whose tag already matched `family` and `kind`.
    pub fn decode(
        family: Family,
        kind: RecordKind,
        data: &[u8],
    ) -> Result<Document, serde_bencode::Error> {
        Ok(match (family, kind) {
            (Family::Mrefd, RecordKind::Config) => {
                Document::Config(Config::Mrefd(serde_bencode::from_bytes(data)?))
            }
            (Family::Urfd, RecordKind::Config) => {
                Document::Config(Config::Urfd(serde_bencode::from_bytes(data)?))
            }
            (_, RecordKind::Peers) => Document::Peers(serde_bencode::from_bytes(data)?),
            (_, RecordKind::Clients) => Document::Clients(serde_bencode::from_bytes(data)?),
            (Family::Mrefd, RecordKind::Users) => {
                Document::Users(Users::Mrefd(serde_bencode::from_bytes(data)?))
            }
            (Family::Urfd, RecordKind::Users) => {
                Document::Users(Users::Urfd(serde_bencode::from_bytes(data)?))
            }
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_bencode::Error> {
        match self {
            Document::Config(Config::Mrefd(config)) => serde_bencode::to_bytes(config),
            Document::Config(Config::Urfd(config)) => serde_bencode::to_bytes(config),
            Document::Peers(peers) => serde_bencode::to_bytes(peers),
            Document::Clients(clients) => serde_bencode::to_bytes(clients),
            Document::Users(Users::Mrefd(users)) => serde_bencode::to_bytes(users),
            Document::Users(Users::Urfd(users)) => serde_bencode::to_bytes(users),
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Document::Config(_) => RecordKind::Config,
            Document::Peers(_) => RecordKind::Peers,
            Document::Clients(_) => RecordKind::Clients,
            Document::Users(_) => RecordKind::Users,
        }
    }

    /// Encode and sign this part the way a `family` reflector publishes it.
    pub fn to_value(
        &self,
        signer: &SigningKey,
        family: Family,
    ) -> Result<Value, serde_bencode::Error> {
        let kind = self.kind();

        Ok(Value::new(
            signer,
            kind.value_id(),
            family.schema_tag(kind),
            &self.encode()?,
        ))
    }
}

impl Versioned for Document {
    fn version(&self) -> Version {
        match self {
            Document::Config(config) => config.version(),
            Document::Peers(peers) => peers.version(),
            Document::Clients(clients) => clients.version(),
            Document::Users(users) => users.version(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn version_is_lexicographic() {
        assert!(Version::new(100, 2) > Version::new(100, 1));
        assert!(Version::new(101, 0) > Version::new(100, 9));
        assert_eq!(Version::default(), Version::new(0, 0));
    }

    #[test]
    fn peers_decode() {
        let peers = Peers {
            timestamp: 1_700_000_000,
            sequence: 3,
            list: vec![PeerEntry::new("M17-QQQ", "CM", 1_699_999_000)],
        };

        let data = Document::Peers(peers.clone()).encode().unwrap();

        assert_eq!(
            Document::decode(Family::Mrefd, RecordKind::Peers, &data).unwrap(),
            Document::Peers(peers)
        );
    }

    #[test]
    fn urfd_config_accessors() {
        let config = UrfdConfig {
            timestamp: 1,
            callsign: "URF270".into(),
            port: vec![30051, 30001, 8880, 20001, 17000, 10017, 41400, 41000, 10017, 42000],
            almod: "ABC".into(),
            ysffreq: vec![438_000_000, 439_000_000],
            refid: vec![27, 270],
            description: [("A".to_string(), "Main".to_string())].into_iter().collect(),
            g3enabled: 1,
            ..Default::default()
        };

        assert_eq!(config.port(UrfdPort::M17), 17000);
        assert_eq!(config.port(UrfdPort::Ysf), 42000);
        assert_eq!(config.auto_link(AutoLink::Ysf), Some('C'));
        assert_eq!(config.ysf_tx_freq(), 439_000_000);
        assert_eq!(config.p25_reflector_id(), 270);
        assert_eq!(config.description('A'), Some("Main"));
        assert_eq!(config.description('B'), None);
        assert!(config.g3_enabled());

        let data = Document::Config(Config::Urfd(config.clone())).encode().unwrap();
        assert_eq!(
            Document::decode(Family::Urfd, RecordKind::Config, &data).unwrap(),
            Document::Config(Config::Urfd(config))
        );
    }

    #[test]
    fn short_urfd_arrays_default_to_zero() {
        let config = UrfdConfig::default();

        assert_eq!(config.port(UrfdPort::Urf), 0);
        assert_eq!(config.auto_link(AutoLink::Nxdn), None);
        assert_eq!(config.nxdn_reflector_id(), 0);
    }

    #[test]
    fn config_version_has_no_sequence() {
        let config = Config::Mrefd(MrefdConfig {
            timestamp: 42,
            ..Default::default()
        });

        assert_eq!(config.version(), Version::new(42, 0));
    }

    #[test]
    fn garbage_does_not_decode() {
        assert!(Document::decode(Family::Mrefd, RecordKind::Clients, b"i42e").is_err());
    }
}
