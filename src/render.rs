//! Plain text rendering of reconciled documents and connectivity graphs.

use chrono::{DateTime, Local, Utc};

use crate::{
    common::{Clients, Config, Peers, RecordKind, Users},
    crawler::ConnectivityGraph,
    reconciler::Snapshot,
};

/// Render the selected part of a snapshot, or all four when `section` is `None`.
pub fn render_snapshot(
    snapshot: &Snapshot,
    section: Option<RecordKind>,
    zone: TimeZone,
) -> String {
    let kinds = match section {
        Some(kind) => vec![kind],
        None => RecordKind::ALL.to_vec(),
    };

    kinds
        .into_iter()
        .map(|kind| match kind {
            RecordKind::Config => render_config(snapshot.config.get()),
            RecordKind::Peers => render_peers(snapshot.peers.get(), zone),
            RecordKind::Clients => render_clients(snapshot.clients.get(), zone),
            RecordKind::Users => render_users(snapshot.users.get(), zone),
        })
        .collect()
}

pub fn render_config(config: Option<&Config>) -> String {
    let mut out = String::from("Configuration:\n");

    match config {
        Some(Config::Mrefd(config)) => {
            field(&mut out, "Callsign", &config.callsign);
            field(&mut out, "Version", &config.version);
            field(&mut out, "Modules", &config.modules);
            field(&mut out, "EncryptMods", &config.encryptedmods);
            field(&mut out, "IPv4Address", &config.ipv4addr);
            field(&mut out, "IPv6Address", &config.ipv6addr);
            field(&mut out, "URL", &config.url);
            field(&mut out, "Country", &config.country);
            field(&mut out, "Sponsor", &config.sponsor);
            field(&mut out, "Email", &config.email);
            field(&mut out, "Port", config.port);
        }
        Some(Config::Urfd(config)) => {
            use crate::common::{AutoLink, UrfdPort};

            let auto_link = |protocol| {
                config
                    .auto_link(protocol)
                    .map(String::from)
                    .unwrap_or_default()
            };

            field(&mut out, "Callsign", &config.callsign);
            field(&mut out, "Version", &config.version);
            field(&mut out, "Modules", &config.modules);
            field(&mut out, "TranscodedModules", &config.transcodedmods);
            for module in config.modules.chars() {
                field(
                    &mut out,
                    &format!("Description{}", module),
                    config.description(module).unwrap_or_default(),
                );
            }
            field(&mut out, "IPv4Address", &config.ipv4addr);
            field(&mut out, "IPv6Address", &config.ipv6addr);
            field(&mut out, "URL", &config.url);
            field(&mut out, "Country", &config.country);
            field(&mut out, "Sponsor", &config.sponsor);
            field(&mut out, "Email", &config.email);
            field(&mut out, "G3Enable", config.g3_enabled());
            field(&mut out, "DCSPort", config.port(UrfdPort::Dcs));
            field(&mut out, "DExtraPort", config.port(UrfdPort::DExtra));
            field(&mut out, "DMRPlusPort", config.port(UrfdPort::DmrPlus));
            field(&mut out, "DPlusPort", config.port(UrfdPort::DPlus));
            field(&mut out, "M17Port", config.port(UrfdPort::M17));
            field(&mut out, "MMDVMPort", config.port(UrfdPort::Mmdvm));
            field(&mut out, "NXDNPort", config.port(UrfdPort::Nxdn));
            field(&mut out, "NXDNAutoLinkModule", auto_link(AutoLink::Nxdn));
            field(&mut out, "NXDNReflectorID", config.nxdn_reflector_id());
            field(&mut out, "P25Port", config.port(UrfdPort::P25));
            field(&mut out, "P25AutoLinkModule", auto_link(AutoLink::P25));
            field(&mut out, "P25ReflectorID", config.p25_reflector_id());
            field(&mut out, "URFPort", config.port(UrfdPort::Urf));
            field(&mut out, "YSFPort", config.port(UrfdPort::Ysf));
            field(&mut out, "YSFAutoLinkModule", auto_link(AutoLink::Ysf));
            field(&mut out, "YSFDefaultRxFreq", config.ysf_rx_freq());
            field(&mut out, "YSFDefaultTxFreq", config.ysf_tx_freq());
        }
        None => {}
    }

    out
}

pub fn render_peers(peers: Option<&Peers>, zone: TimeZone) -> String {
    let mut out = String::from("Peers:\n");

    for peer in peers.map(|peers| peers.list.as_slice()).unwrap_or_default() {
        out.push_str(&format!(
            "  {:<8} {:<26} {}\n",
            peer.callsign,
            peer.modules,
            zone.format(peer.connect_time)
        ));
    }

    out
}

pub fn render_clients(clients: Option<&Clients>, zone: TimeZone) -> String {
    let mut out = String::from("Clients:\n");

    for client in clients.map(|clients| clients.list.as_slice()).unwrap_or_default() {
        out.push_str(&format!(
            "  {} {:<9} {:<39} {} {}\n",
            client.module,
            client.callsign,
            client.ip,
            zone.format(client.connect_time),
            zone.format(client.last_heard)
        ));
    }

    out
}

pub fn render_users(users: Option<&Users>, zone: TimeZone) -> String {
    let mut out = String::from("Users:\n");

    match users {
        Some(Users::Mrefd(users)) => {
            for user in users.list.iter() {
                out.push_str(&format!(
                    "  {:<9} {:<9} {:<9} {}\n",
                    user.source,
                    user.destination,
                    user.reflector,
                    zone.format(user.last_heard)
                ));
            }
        }
        Some(Users::Urfd(users)) => {
            for user in users.list.iter() {
                out.push_str(&format!(
                    "  {:<9} {} {:<9} {:<9} {}\n",
                    user.callsign,
                    user.on_module,
                    user.via_node,
                    user.via_peer,
                    zone.format(user.last_heard)
                ));
            }
        }
        None => {}
    }

    out
}

impl ConnectivityGraph {
    /// Render the graph as an adjacency matrix.
    ///
    /// Rows and columns are in callsign order. A row's diagonal cell is `=`
    /// when it has neighbors and `?` when it has none; `+` marks a column the
    /// row lists as a peer. Columns are labelled vertically with the callsign
    /// minus its family prefix.
    pub fn render_matrix(&self) -> String {
        let prefix = self.family().prefix();
        let width = self.nodes().map(|node| node.len()).max().unwrap_or(0) + 2;
        let indent = " ".repeat(width);
        let rule = format!("{}{}\n", indent, "=".repeat(2 * self.len() + 1));

        let suffix = |node: &'_ str| node.strip_prefix(prefix).unwrap_or(node).to_string();

        let mut out = rule.clone();

        for (row, neighbors) in self.iter() {
            out.push_str(&format!("{:<w$} |", row, w = width - 2));

            for col in self.nodes() {
                let cell = if col == row {
                    if neighbors.is_empty() {
                        '?'
                    } else {
                        '='
                    }
                } else if neighbors.contains(col) {
                    '+'
                } else {
                    ' '
                };

                out.push(' ');
                out.push(cell);
            }

            out.push_str(&format!(" | {}\n", suffix(row.as_str())));
        }

        out.push_str(&rule);

        let labels: Vec<Vec<char>> = self
            .nodes()
            .map(|node| suffix(node.as_str()).chars().collect())
            .collect();
        let lines = labels.iter().map(Vec::len).max().unwrap_or(0);

        for line in 0..lines {
            out.push_str(&indent);

            for label in labels.iter() {
                out.push(' ');
                out.push(label.get(line).copied().unwrap_or(' '));
            }

            out.push('\n');
        }

        out
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// How timestamps are printed.
pub enum TimeZone {
    /// `YYYY-MM-DDTHH:MM:SSZ`
    #[default]
    Utc,
    /// `YYYY-MM-DD HH:MM:SS +HH:MM` in the local time zone.
    Local,
}

impl TimeZone {
    /// Format a unix timestamp. Timestamps out of chrono's range are printed
    /// as plain seconds.
    pub fn format(&self, timestamp: i64) -> String {
        let Some(time) = DateTime::<Utc>::from_timestamp(timestamp, 0) else {
            return timestamp.to_string();
        };

        match self {
            TimeZone::Utc => time.format("%FT%TZ").to_string(),
            TimeZone::Local => time.with_timezone(&Local).format("%F %T %:z").to_string(),
        }
    }
}

/// Format a unix timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_utc(timestamp: i64) -> String {
    TimeZone::Utc.format(timestamp)
}

fn field(out: &mut String, name: &str, value: impl std::fmt::Display) {
    out.push_str(&format!("  {}: {}\n", name, value));
}
