//! Reduce the values every replica returns for a key into one authoritative
//! revision per record kind.
//!
//! Replicas answer in any order, repeat each other, and may hold stale
//! revisions. Every candidate is verified, checked against the schema tag
//! expected for its kind, decoded, and merged with a last-writer-wins rule on
//! `(timestamp, sequence)`. The merge is commutative and associative, so the
//! result does not depend on arrival order.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use flume::{Receiver, RecvTimeoutError};
use tracing::{debug, trace, warn};

use crate::{
    common::{
        Clients, Config, Document, Family, Id, Peers, RecordKind, Users, Value, Version,
        Versioned, Where,
    },
    dht::Dht,
    Result,
};

// === BestValue ===

#[derive(Clone, Debug, PartialEq, Eq)]
/// The most recent revision of one record kind seen so far.
///
/// A timestamp of 0 means no value yet.
pub struct BestValue<T> {
    version: Version,
    payload: Option<T>,
}

impl<T> Default for BestValue<T> {
    fn default() -> Self {
        Self {
            version: Version::default(),
            payload: None,
        }
    }
}

impl<T: Versioned> BestValue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held revision if `candidate` is strictly more recent.
    ///
    /// Returns true if the candidate was taken.
    pub fn offer(&mut self, candidate: T) -> bool {
        let version = candidate.version();

        // A zero timestamp can't be told apart from "no value".
        if version.timestamp <= 0 || version <= self.version {
            return false;
        }

        self.version = version;
        self.payload = Some(candidate);

        true
    }

    // === Getters ===

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn timestamp(&self) -> i64 {
        self.version.timestamp
    }

    pub fn sequence(&self) -> u32 {
        self.version.sequence
    }

    pub fn get(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    pub fn into_inner(self) -> Option<T> {
        self.payload
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }
}

// === Snapshot ===

#[derive(Clone, Debug, PartialEq, Eq)]
/// Reconciled state of one reflector.
pub struct Snapshot {
    pub family: Family,
    pub config: BestValue<Config>,
    pub peers: BestValue<Peers>,
    pub clients: BestValue<Clients>,
    pub users: BestValue<Users>,
}

impl Snapshot {
    pub fn new(family: Family) -> Self {
        Self {
            family,
            config: BestValue::new(),
            peers: BestValue::new(),
            clients: BestValue::new(),
            users: BestValue::new(),
        }
    }

    /// Merge a decoded part into the matching [BestValue].
    ///
    /// Returns true if it replaced the held revision.
    pub fn merge(&mut self, document: Document) -> bool {
        match document {
            Document::Config(config) => self.config.offer(config),
            Document::Peers(peers) => self.peers.offer(peers),
            Document::Clients(clients) => self.clients.offer(clients),
            Document::Users(users) => self.users.offer(users),
        }
    }

    pub fn version(&self, kind: RecordKind) -> Version {
        match kind {
            RecordKind::Config => self.config.version(),
            RecordKind::Peers => self.peers.version(),
            RecordKind::Clients => self.clients.version(),
            RecordKind::Users => self.users.version(),
        }
    }

    /// True when no usable value of any kind was reconciled.
    pub fn is_empty(&self) -> bool {
        self.config.is_empty()
            && self.peers.is_empty()
            && self.clients.is_empty()
            && self.users.is_empty()
    }
}

// === Rejections ===

#[derive(thiserror::Error, Debug)]
/// Why a single candidate value was dropped.
///
/// Rejections only ever affect their own candidate; they are logged and
/// counted, never returned to the caller of a query.
pub enum Rejection {
    #[error("Value signature failed")]
    SignatureInvalid,

    #[error("Unknown value id {0}")]
    UnknownKind(u64),

    /// Usually a newer schema revision this crate can't read yet.
    #[error("Unexpected {kind} schema {found:?}, expected {expected:?}")]
    SchemaMismatch {
        kind: RecordKind,
        expected: &'static str,
        found: String,
    },

    #[error("Failed to decode {kind} payload: {source}")]
    Undecodable {
        kind: RecordKind,
        source: serde_bencode::Error,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Counters of what happened to the candidates of one query.
pub struct Stats {
    /// Candidates that became the best value of their kind when they arrived.
    pub accepted: usize,
    /// Valid candidates that were not more recent than the best value.
    pub superseded: usize,
    pub signature_invalid: usize,
    /// Unknown value ids and unexpected schema tags.
    pub schema_mismatch: usize,
    pub undecodable: usize,
}

impl Stats {
    pub fn received(&self) -> usize {
        self.accepted
            + self.superseded
            + self.signature_invalid
            + self.schema_mismatch
            + self.undecodable
    }

    fn reject(&mut self, rejection: &Rejection) {
        match rejection {
            Rejection::SignatureInvalid => self.signature_invalid += 1,
            Rejection::UnknownKind(_) | Rejection::SchemaMismatch { .. } => {
                self.schema_mismatch += 1
            }
            Rejection::Undecodable { .. } => self.undecodable += 1,
        }
    }
}

// === Reconciler ===

#[derive(Debug)]
struct State {
    snapshot: Snapshot,
    stats: Stats,
    completed: Option<bool>,
}

#[derive(Debug)]
/// Reconciliation state of one outstanding get.
///
/// Owned by a single query; [Reconciler::ingest] may be called concurrently
/// from the DHT client's threads, merges are serialized by one lock.
pub struct Reconciler {
    key: Id,
    family: Family,
    state: Mutex<State>,
}

impl Reconciler {
    pub fn new(key: Id, family: Family) -> Self {
        Self {
            key,
            family,
            state: Mutex::new(State {
                snapshot: Snapshot::new(family),
                stats: Stats::default(),
                completed: None,
            }),
        }
    }

    // === Getters ===

    pub fn key(&self) -> &Id {
        &self.key
    }

    pub fn family(&self) -> Family {
        self.family
    }

    /// A copy of what has been reconciled so far.
    pub fn snapshot(&self) -> Snapshot {
        self.state().snapshot.clone()
    }

    pub fn stats(&self) -> Stats {
        self.state().stats
    }

    /// `Some(success)` once [Reconciler::complete] was called.
    pub fn completed(&self) -> Option<bool> {
        self.state().completed
    }

    // === Public Methods ===

    /// Handle one candidate value from the DHT.
    ///
    /// Always returns true: every replica's answer is wanted, the get is
    /// never cut short on the first match.
    pub fn ingest(&self, value: &Value) -> bool {
        let key = self.key;

        match self.check(value) {
            Ok(document) => {
                let kind = document.kind();
                let version = document.version();

                let mut state = self.state();
                if state.snapshot.merge(document) {
                    state.stats.accepted += 1;
                    trace!(?key, %kind, ?version, "Accepted value");
                } else {
                    state.stats.superseded += 1;
                    trace!(?key, %kind, ?version, "Value is not more recent");
                }
            }
            Err(rejection) => {
                match &rejection {
                    Rejection::SignatureInvalid | Rejection::Undecodable { .. } => {
                        warn!(?key, %rejection, "Dropped value");
                    }
                    Rejection::UnknownKind(_) | Rejection::SchemaMismatch { .. } => {
                        debug!(?key, %rejection, "Skipped value");
                    }
                }

                self.state().stats.reject(&rejection);
            }
        }

        true
    }

    /// Record the end of the get. Only the first call counts.
    pub fn complete(&self, success: bool) {
        let key = self.key;
        let mut state = self.state();

        if let Some(previous) = state.completed {
            warn!(?key, previous, success, "Get completed more than once");
            return;
        }

        state.completed = Some(success);

        if success {
            debug!(?key, stats = ?state.stats, "Get done");
        } else {
            warn!(?key, stats = ?state.stats, "get() failed");
        }
    }

    // === Private Methods ===

    fn check(&self, value: &Value) -> std::result::Result<Document, Rejection> {
        if !value.check_signature() {
            return Err(Rejection::SignatureInvalid);
        }

        let kind = value.kind().ok_or(Rejection::UnknownKind(value.id()))?;

        let expected = self.family.schema_tag(kind);
        if value.user_type() != expected {
            return Err(Rejection::SchemaMismatch {
                kind,
                expected,
                found: value.user_type().to_string(),
            });
        }

        Document::decode(self.family, kind, value.data())
            .map_err(|source| Rejection::Undecodable { kind, source })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// === Query ===

#[derive(thiserror::Error, Debug)]
/// A get that did not complete successfully.
///
/// Values reconciled before the failure are kept in `partial`.
pub enum QueryError {
    #[error("get() failed for {key:?}")]
    Failed { key: Id, partial: Box<Snapshot> },

    #[error("get() for {key:?} did not complete within {timeout:?}")]
    Timeout {
        key: Id,
        timeout: Duration,
        partial: Box<Snapshot>,
    },

    #[error("DHT client dropped the get for {key:?} without completing it")]
    Abandoned { key: Id, partial: Box<Snapshot> },
}

impl QueryError {
    pub fn key(&self) -> &Id {
        match self {
            QueryError::Failed { key, .. }
            | QueryError::Timeout { key, .. }
            | QueryError::Abandoned { key, .. } => key,
        }
    }

    /// Whatever was reconciled before the query failed.
    pub fn partial(&self) -> &Snapshot {
        match self {
            QueryError::Failed { partial, .. }
            | QueryError::Timeout { partial, .. }
            | QueryError::Abandoned { partial, .. } => partial,
        }
    }

    pub fn into_partial(self) -> Snapshot {
        match self {
            QueryError::Failed { partial, .. }
            | QueryError::Timeout { partial, .. }
            | QueryError::Abandoned { partial, .. } => *partial,
        }
    }
}

#[derive(Debug)]
/// Handle of one outstanding get and its [Reconciler].
pub struct Query {
    reconciler: Arc<Reconciler>,
    done: Receiver<bool>,
}

impl Query {
    /// Start a get for a reflector callsign.
    ///
    /// The family is taken from the callsign prefix and the key is the hash of
    /// the uppercase callsign. Does not block.
    pub fn begin<D: Dht + ?Sized>(dht: &D, callsign: &str, filter: Where) -> Result<Query> {
        let family = Family::from_callsign(callsign)?;

        Ok(Self::begin_with_key(dht, Id::hash(callsign), family, filter))
    }

    /// Start a get for an already hashed key. Does not block.
    pub fn begin_with_key<D: Dht + ?Sized>(
        dht: &D,
        key: Id,
        family: Family,
        filter: Where,
    ) -> Query {
        let reconciler = Arc::new(Reconciler::new(key, family));
        let (sender, done) = flume::bounded::<bool>(1);

        trace!(?key, ?family, ?filter, "New query");

        let on_value = {
            let reconciler = reconciler.clone();
            Arc::new(move |value: &Value| reconciler.ingest(value))
        };
        let on_done = {
            let reconciler = reconciler.clone();
            Box::new(move |success: bool| {
                reconciler.complete(success);
                let _ = sender.send(success);
            })
        };

        dht.get(key, filter, on_value, on_done);

        Query { reconciler, done }
    }

    // === Getters ===

    pub fn key(&self) -> &Id {
        self.reconciler.key()
    }

    /// The shared reconciler, e.g. to read its [Stats] after [Query::wait].
    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    // === Public Methods ===

    /// Block until the get completes or `timeout` passes.
    ///
    /// A successful get may still hold no usable value, see [Snapshot::is_empty].
    pub fn wait(self, timeout: Duration) -> std::result::Result<Snapshot, QueryError> {
        let result = self.done.recv_timeout(timeout);
        let key = *self.key();
        let snapshot = Box::new(self.reconciler.snapshot());

        match result {
            Ok(true) => Ok(*snapshot),
            Ok(false) => Err(QueryError::Failed {
                key,
                partial: snapshot,
            }),
            Err(RecvTimeoutError::Timeout) => {
                warn!(?key, ?timeout, "Query timed out");

                Err(QueryError::Timeout {
                    key,
                    timeout,
                    partial: snapshot,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!(?key, "Query was dropped by the DHT client");

                Err(QueryError::Abandoned {
                    key,
                    partial: snapshot,
                })
            }
        }
    }

    #[cfg(feature = "async")]
    /// Await completion of the get.
    ///
    /// No deadline is applied; race this against your runtime's timer.
    pub async fn wait_async(self) -> std::result::Result<Snapshot, QueryError> {
        let result = self.done.recv_async().await;
        let key = *self.key();
        let snapshot = Box::new(self.reconciler.snapshot());

        match result {
            Ok(true) => Ok(*snapshot),
            Ok(false) => Err(QueryError::Failed {
                key,
                partial: snapshot,
            }),
            Err(flume::RecvError::Disconnected) => Err(QueryError::Abandoned {
                key,
                partial: snapshot,
            }),
        }
    }
}
