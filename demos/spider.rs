use std::time::{Duration, Instant};

use clap::Parser;
use rand::{seq::SliceRandom, Rng};
use tracing::Level;

use refdht::{
    crawler::{normalize_callsign, normalize_module},
    CrawlerBuilder, Document, Family, PeerEntry, Peers, SigningKey, Testnet,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// Map the reflectors linked to a seed over one module, on a simulated network.
struct Cli {
    /// Seed reflector callsign, `M17-XXX` or `URFXXX`.
    seed: String,
    /// Module letter to follow.
    module: char,
    /// Number of reflectors in the simulated network.
    #[arg(short, long, default_value_t = 16)]
    reflectors: usize,
    /// Peers queries in flight.
    #[arg(short, long, default_value_t = 4)]
    workers: usize,
    /// Seconds to wait for each Peers query.
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,
    /// Show debug logs.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let testnet = match mesh(&cli.seed, cli.module, cli.reflectors) {
        Ok(testnet) => testnet,
        Err(error) => {
            eprintln!("Error: {}", error);
            std::process::exit(1);
        }
    };

    let start = Instant::now();

    let graph = match CrawlerBuilder::new()
        .workers(cli.workers)
        .query_timeout(Duration::from_secs(cli.timeout))
        .crawl(&testnet, &cli.seed, cli.module)
    {
        Ok(graph) => graph,
        Err(error) => {
            eprintln!("Error: {}", error);
            std::process::exit(1);
        }
    };

    println!();
    print!("{}", graph.render_matrix());
    println!(
        "\nFound {} reflectors on module {} in {:?} seconds, {} gets issued.",
        graph.len(),
        graph.module(),
        start.elapsed().as_secs_f32(),
        testnet.gets()
    );
}

/// A random network of reflectors around `seed`, each linked to a few others
/// over a random mix of modules that usually includes `module`.
fn mesh(seed: &str, module: char, reflectors: usize) -> refdht::Result<Testnet> {
    let family = Family::from_callsign(seed)?;
    let module = normalize_module(module)?;
    let seed = normalize_callsign(seed);

    let mut callsigns = vec![seed.clone()];
    for i in 1..reflectors.max(1) {
        let callsign = match family {
            Family::Mrefd => format!("M17-{:03}", i),
            Family::Urfd => format!("URF{:03}", i),
        };
        if callsign != seed {
            callsigns.push(callsign);
        }
    }

    let mut rng = rand::thread_rng();
    let mut testnet = Testnet::new(3).with_max_delay(Duration::from_millis(10));
    let now = 1_700_000_000;

    for callsign in callsigns.iter() {
        let signer = SigningKey::from_bytes(&rng.gen());

        let list = callsigns
            .choose_multiple(&mut rng, 3)
            .filter(|peer| *peer != callsign)
            .map(|peer| {
                let modules = if rng.gen_bool(0.8) {
                    format!("{}", module)
                } else {
                    "Z".to_string()
                };
                PeerEntry::new(peer, &modules, now - rng.gen_range(0..86_400))
            })
            .collect();

        let document = Document::Peers(Peers {
            timestamp: now,
            sequence: 0,
            list,
        });

        testnet.publish(&signer, callsign, &document)?;
    }

    Ok(testnet)
}
