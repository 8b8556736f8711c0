//! Discover every reflector reachable from a seed over one shared module.
//!
//! Starting from the seed, the Peers document of each newly found reflector is
//! reconciled and the peers linked on the target module become new nodes,
//! until no undiscovered node is left. Lookups run on a small pool of worker
//! threads; the graph itself is only touched by the coordinating thread.

use std::{
    collections::{btree_map, BTreeMap, BTreeSet},
    thread,
    time::Duration,
};

use tracing::{debug, info, trace, warn};

use crate::{
    common::{Family, Id, RecordKind, Where},
    config::Config,
    dht::Dht,
    reconciler::Query,
    Error, Result,
};

/// Neighbors of one node, ordered by callsign.
pub type Neighbors = BTreeSet<String>;

#[derive(Clone, Debug, PartialEq, Eq)]
/// Reflectors found by a crawl and the peers each one reported on the
/// target module.
///
/// Edges are directed: `a -> b` means `a`'s Peers document lists `b`.
/// A node is a key as soon as its expansion started, which is what keeps a
/// crawl from expanding any node twice.
pub struct ConnectivityGraph {
    family: Family,
    module: char,
    nodes: BTreeMap<String, Neighbors>,
}

impl ConnectivityGraph {
    pub fn new(family: Family, module: char) -> Self {
        Self {
            family,
            module,
            nodes: BTreeMap::new(),
        }
    }

    // === Getters ===

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn module(&self) -> char {
        self.module
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn neighbors(&self, node: &str) -> Option<&Neighbors> {
        self.nodes.get(node)
    }

    /// True if `from` reported `to` as a peer on the module.
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.nodes
            .get(from)
            .map_or(false, |neighbors| neighbors.contains(to))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in lexicographic order.
    pub fn nodes(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Neighbors> {
        self.nodes.iter()
    }

    // === Private Methods ===

    /// Mark a node as being expanded. Returns false if it already was.
    fn visit(&mut self, node: &str) -> bool {
        match self.nodes.entry(node.to_string()) {
            btree_map::Entry::Occupied(_) => false,
            btree_map::Entry::Vacant(entry) => {
                entry.insert(Neighbors::new());
                true
            }
        }
    }

    fn set_neighbors(&mut self, node: String, neighbors: Neighbors) {
        self.nodes.insert(node, neighbors);
    }
}

#[derive(Debug, Default, Clone)]
/// Crawler settings, see [Config].
pub struct CrawlerBuilder(Config);

impl CrawlerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of Peers queries to keep in flight.
    pub fn workers(&mut self, workers: usize) -> &mut Self {
        self.0.workers = workers;
        self
    }

    /// Deadline of each Peers query.
    pub fn query_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.0.query_timeout = timeout;
        self
    }

    /// Create a crawler for `family` reflectors linked on `module`.
    pub fn build<D: Dht>(&self, dht: D, family: Family, module: char) -> Result<Crawler<D>> {
        Ok(Crawler {
            dht,
            config: self.0.clone(),
            graph: ConnectivityGraph::new(family, normalize_module(module)?),
        })
    }

    /// Crawl from `seed` and return the resulting graph.
    ///
    /// The reflector family is taken from the seed's callsign.
    pub fn crawl<D: Dht>(&self, dht: D, seed: &str, module: char) -> Result<ConnectivityGraph> {
        let family = Family::from_callsign(seed)?;

        let mut crawler = self.build(dht, family, module)?;
        crawler.expand(seed);

        Ok(crawler.into_graph())
    }
}

#[derive(Debug)]
/// Builds a [ConnectivityGraph] from reconciled Peers documents.
pub struct Crawler<D> {
    dht: D,
    config: Config,
    graph: ConnectivityGraph,
}

impl<D: Dht> Crawler<D> {
    /// Create a crawler with the default [Config].
    pub fn new(dht: D, family: Family, module: char) -> Result<Self> {
        CrawlerBuilder::new().build(dht, family, module)
    }

    /// Crawl from `seed` with the default [Config], see [CrawlerBuilder::crawl].
    pub fn crawl(dht: D, seed: &str, module: char) -> Result<ConnectivityGraph> {
        CrawlerBuilder::new().crawl(dht, seed, module)
    }

    // === Getters ===

    pub fn graph(&self) -> &ConnectivityGraph {
        &self.graph
    }

    pub fn into_graph(self) -> ConnectivityGraph {
        self.graph
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // === Public Methods ===

    /// Expand `node` and, transitively, every newly discovered neighbor.
    ///
    /// A node already in the graph is left alone and no query is issued.
    /// A node whose query fails or times out becomes a leaf. Returns the number
    /// of nodes queried.
    pub fn expand(&mut self, node: &str) -> usize {
        let node = normalize_callsign(node);

        let Crawler { dht, config, graph } = self;
        let dht: &D = dht;

        if node.is_empty() || !graph.visit(&node) {
            trace!(?node, "Already expanded");
            return 0;
        }

        let family = graph.family();
        let module = graph.module();
        let timeout = config.query_timeout;
        let workers = config.workers.max(1);

        let (jobs, job_receiver) = flume::unbounded::<String>();
        let (result_sender, results) = flume::unbounded::<(String, Neighbors)>();

        let mut queried = 0;

        thread::scope(|scope| {
            for _ in 0..workers {
                let job_receiver = job_receiver.clone();
                let result_sender = result_sender.clone();

                scope.spawn(move || {
                    for node in job_receiver.iter() {
                        let neighbors = lookup(dht, family, module, timeout, &node);

                        if result_sender.send((node, neighbors)).is_err() {
                            break;
                        }
                    }
                });
            }
            // Results only come from workers from here on.
            drop(result_sender);

            let _ = jobs.send(node.clone());
            let mut inflight = 1_usize;

            while inflight > 0 {
                let Ok((node, neighbors)) = results.recv() else {
                    warn!("Crawl workers exited early");
                    break;
                };
                inflight -= 1;
                queried += 1;

                for neighbor in neighbors.iter() {
                    if graph.visit(neighbor) {
                        trace!(from = ?node, ?neighbor, "Discovered node");

                        let _ = jobs.send(neighbor.clone());
                        inflight += 1;
                    }
                }

                graph.set_neighbors(node, neighbors);
            }

            // Let the workers drain out.
            drop(jobs);
        });

        info!(seed = ?node, module = %module, queried, nodes = graph.len(), "Crawl done");

        queried
    }
}

/// Reconcile the Peers document of `node` and return the peers it shares
/// `module` with. Any failure yields no neighbors.
fn lookup<D: Dht + ?Sized>(
    dht: &D,
    family: Family,
    module: char,
    timeout: Duration,
    node: &str,
) -> Neighbors {
    let query = Query::begin_with_key(dht, Id::hash(node), family, Where::kind(RecordKind::Peers));

    let snapshot = match query.wait(timeout) {
        Ok(snapshot) => snapshot,
        Err(error) => {
            warn!(?node, %error, "Peers query failed, treating node as a leaf");
            return Neighbors::new();
        }
    };

    let Some(peers) = snapshot.peers.into_inner() else {
        debug!(?node, "No Peers document");
        return Neighbors::new();
    };

    let mut neighbors = Neighbors::new();

    for entry in peers.list.iter().filter(|entry| entry.shares(module)) {
        let neighbor = normalize_callsign(&entry.callsign);

        if neighbor.is_empty() {
            warn!(?node, "Peer without a callsign");
            continue;
        }

        if !neighbors.insert(neighbor) {
            warn!(?node, peer = ?entry.callsign, "Duplicate peer");
        }
    }

    debug!(?node, peers = peers.list.len(), neighbors = neighbors.len(), "Expanded node");

    neighbors
}

/// Node ids are trimmed, uppercase callsigns.
pub fn normalize_callsign(callsign: &str) -> String {
    callsign.trim().to_ascii_uppercase()
}

/// Modules are single letters, compared uppercase.
pub fn normalize_module(module: char) -> Result<char> {
    if module.is_ascii_alphabetic() {
        Ok(module.to_ascii_uppercase())
    } else {
        Err(Error::InvalidModule(module.to_string()))
    }
}
