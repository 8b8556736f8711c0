use std::time::{Duration, Instant};

use clap::Parser;
use tracing::Level;

use refdht::{
    render::{render_snapshot, TimeZone},
    ClientEntry, Clients, Document, Family, MrefdConfig, MrefdUser, MrefdUsers, PeerEntry, Peers,
    Query, RecordKind, ReflectorConfig, SigningKey, Testnet, UrfdConfig, UrfdUser, UrfdUsers,
    Users, Where,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// Fetch the published state of one reflector from a simulated network.
struct Cli {
    /// Reflector callsign, `M17-XXX` or `URFXXX`.
    callsign: String,
    /// Only fetch one section: (c)onfig, (p)eers, c(l)ients or (u)sers.
    #[arg(short, long)]
    section: Option<char>,
    /// Number of simulated replicas.
    #[arg(short, long, default_value_t = 5)]
    replicas: usize,
    /// Seconds to wait for the get to complete.
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,
    /// Print times in the local time zone instead of UTC.
    #[arg(short, long)]
    local: bool,
    /// Log every candidate value.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::TRACE } else { Level::INFO })
        .init();

    let filter = match cli.section {
        None => Where::any(),
        Some(section) => match RecordKind::from_section(section) {
            Some(kind) => Where::kind(kind),
            None => {
                eprintln!("Illegal section {:?}, expected one of c, p, l or u", section);
                std::process::exit(1);
            }
        },
    };

    let testnet = match seed(&cli.callsign, cli.replicas) {
        Ok(testnet) => testnet,
        Err(error) => {
            eprintln!("Error: {}", error);
            std::process::exit(1);
        }
    };

    let start = Instant::now();

    println!("\nLooking up {} ...\n", cli.callsign.to_uppercase());

    let query = match Query::begin(&testnet, &cli.callsign, filter) {
        Ok(query) => query,
        Err(error) => {
            eprintln!("Error: {}", error);
            std::process::exit(1);
        }
    };
    let reconciler = query.reconciler().clone();

    let snapshot = match query.wait(Duration::from_secs(cli.timeout)) {
        Ok(snapshot) => snapshot,
        Err(error) => {
            eprintln!("Warning: {}", error);
            error.into_partial()
        }
    };

    let zone = if cli.local {
        TimeZone::Local
    } else {
        TimeZone::Utc
    };
    let section = filter.value_id().and_then(RecordKind::from_value_id);

    print!("{}", render_snapshot(&snapshot, section, zone));

    let stats = reconciler.stats();
    println!(
        "\nQuery done in {:?} seconds, {} candidates: {} accepted, {} superseded, {} forged.",
        start.elapsed().as_secs_f32(),
        stats.received(),
        stats.accepted,
        stats.superseded,
        stats.signature_invalid,
    );
}

/// Publish a few revisions of `callsign`'s document, plus a forged one.
fn seed(callsign: &str, replicas: usize) -> refdht::Result<Testnet> {
    let family = Family::from_callsign(callsign)?;
    let callsign = callsign.trim().to_uppercase();
    let signer = SigningKey::from_bytes(&rand::random());
    let now = 1_700_000_000;

    let mut testnet = Testnet::new(replicas.max(1)).with_max_delay(Duration::from_millis(20));

    for (age, sequence) in [(60, 0), (0, 0), (0, 1)] {
        let timestamp = now - age;

        for document in documents(family, &callsign, timestamp, sequence) {
            let value = document.to_value(&signer, family)?;
            let replica = rand::random::<usize>() % replicas.max(1);

            testnet.put(replica, refdht::Id::hash(&callsign), value);
        }
    }

    // A newer Peers document that fails its signature check.
    let forged = documents(family, &callsign, now + 3600, 0).remove(1);
    let honest = forged.to_value(&signer, family)?;
    let value = refdht::Value::new_signed_unchecked(
        *honest.owner(),
        [0; 64],
        honest.id(),
        honest.user_type(),
        honest.data(),
    );
    testnet.put(0, refdht::Id::hash(&callsign), value);

    Ok(testnet)
}

fn documents(family: Family, callsign: &str, timestamp: i64, sequence: u32) -> Vec<Document> {
    let (config, peers, users) = match family {
        Family::Mrefd => (
            ReflectorConfig::Mrefd(MrefdConfig {
                timestamp,
                callsign: callsign.into(),
                ipv4addr: "192.0.2.17".into(),
                modules: "ACM".into(),
                encryptedmods: "C".into(),
                url: format!("https://{}.example.org", callsign.to_lowercase()),
                country: "US".into(),
                version: "0.9.4".into(),
                port: 17000,
                ..Default::default()
            }),
            vec![
                PeerEntry::new("M17-QQQ", "CM", timestamp - 86_400),
                PeerEntry::new("M17-XYZ", "A", timestamp - 3_600),
            ],
            Users::Mrefd(MrefdUsers {
                timestamp,
                sequence,
                list: vec![MrefdUser {
                    source: "N0CALL".into(),
                    destination: "ALL".into(),
                    reflector: format!("{} C", callsign),
                    last_heard: timestamp - 30,
                }],
            }),
        ),
        Family::Urfd => (
            ReflectorConfig::Urfd(UrfdConfig {
                timestamp,
                callsign: callsign.into(),
                ipv4addr: "192.0.2.27".into(),
                modules: "ABD".into(),
                transcodedmods: "A".into(),
                country: "DE".into(),
                version: "1.3.0".into(),
                port: vec![30051, 30001, 8880, 20001, 17000, 10017, 41400, 41000, 10017, 42000],
                almod: "ABD".into(),
                ysffreq: vec![438_000_000, 438_000_000],
                refid: vec![27, 270],
                description: [("A", "Main"), ("B", "Regional"), ("D", "Test")]
                    .into_iter()
                    .map(|(module, text)| (module.to_string(), text.to_string()))
                    .collect(),
                g3enabled: 1,
                ..Default::default()
            }),
            vec![PeerEntry::new("URF001", "AB", timestamp - 86_400)],
            Users::Urfd(UrfdUsers {
                timestamp,
                sequence,
                list: vec![UrfdUser {
                    callsign: "N0CALL".into(),
                    via_node: "N0CALL B".into(),
                    on_module: "A".into(),
                    via_peer: "URF001".into(),
                    last_heard: timestamp - 30,
                }],
            }),
        ),
    };

    vec![
        Document::Config(config),
        Document::Peers(Peers {
            timestamp,
            sequence,
            list: peers,
        }),
        Document::Clients(Clients {
            timestamp,
            sequence,
            list: vec![ClientEntry {
                callsign: "N0CALL D".into(),
                ip: "198.51.100.7".into(),
                module: "A".into(),
                connect_time: timestamp - 600,
                last_heard: timestamp - 30,
            }],
        }),
        Document::Users(users),
    ]
}
