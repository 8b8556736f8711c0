//! In-memory DHT of a few replicas, for tests and demos.

use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Debug, Formatter},
    sync::{Mutex, PoisonError},
    thread,
    time::Duration,
};

use ed25519_dalek::SigningKey;
use rand::{seq::SliceRandom, Rng};
use tracing::trace;

use crate::{
    common::{Document, Family, Id, Value, Where},
    dht::{Dht, OnDone, OnValue},
};

/// A [Dht] where every replica answers a get from its own thread, in random
/// order and with random latency.
///
/// Replicas hold independent copies, so they can be loaded with stale or
/// conflicting revisions of the same document.
pub struct Testnet {
    replicas: Vec<HashMap<Id, Vec<Value>>>,
    failing: HashSet<Id>,
    stalled: HashSet<Id>,
    max_delay: Duration,
    gets: Mutex<HashMap<Id, usize>>,
    /// Completion callbacks of stalled gets, held until [Testnet::unstall]
    /// drops them without calling them.
    parked: Mutex<HashMap<Id, Vec<OnDone>>>,
}

impl Testnet {
    /// Create a testnet with `replicas` empty replicas.
    pub fn new(replicas: usize) -> Self {
        Self {
            replicas: vec![HashMap::new(); replicas],
            failing: HashSet::new(),
            stalled: HashSet::new(),
            max_delay: Duration::from_millis(2),
            gets: Mutex::new(HashMap::new()),
            parked: Mutex::new(HashMap::new()),
        }
    }

    /// Upper bound of the random delay before each delivered value.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    // === Public Methods ===

    /// Store a value on one replica, adding replicas if needed.
    pub fn put(&mut self, replica: usize, key: Id, value: Value) {
        if replica >= self.replicas.len() {
            self.replicas.resize_with(replica + 1, HashMap::new);
        }

        self.replicas[replica].entry(key).or_default().push(value);
    }

    /// Store a value on every replica.
    pub fn put_all(&mut self, key: Id, value: Value) {
        for replica in self.replicas.iter_mut() {
            replica.entry(key).or_default().push(value.clone());
        }
    }

    /// Sign a document as reflector `callsign` and store it on every replica.
    pub fn publish(
        &mut self,
        signer: &SigningKey,
        callsign: &str,
        document: &Document,
    ) -> crate::Result<()> {
        let family = Family::from_callsign(callsign)?;
        let value = document.to_value(signer, family)?;

        self.put_all(Id::hash(callsign), value);

        Ok(())
    }

    /// Make gets for `key` complete with `success == false`.
    pub fn fail(&mut self, key: Id) {
        self.failing.insert(key);
    }

    /// Make gets for `key` deliver their values but never complete.
    pub fn stall(&mut self, key: Id) {
        self.stalled.insert(key);
    }

    /// Stop stalling gets for `key`, dropping the completion callbacks of
    /// the gets stalled so far.
    pub fn unstall(&mut self, key: Id) {
        self.stalled.remove(&key);

        let parked = self
            .parked
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);

        trace!(?key, parked = parked.map_or(0, |parked| parked.len()), "Testnet unstall");
    }

    // === Getters ===

    /// Number of gets issued so far.
    pub fn gets(&self) -> usize {
        self.gets_lock().values().sum()
    }

    /// Number of gets issued so far for one key.
    pub fn gets_for(&self, key: &Id) -> usize {
        self.gets_lock().get(key).copied().unwrap_or(0)
    }

    // === Private Methods ===

    fn gets_lock(&self) -> std::sync::MutexGuard<'_, HashMap<Id, usize>> {
        self.gets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for Testnet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Testnet")
            .field("replicas", &self.replicas.len())
            .field("failing", &self.failing)
            .field("stalled", &self.stalled)
            .field("max_delay", &self.max_delay)
            .finish_non_exhaustive()
    }
}

impl Dht for Testnet {
    fn get(&self, key: Id, filter: Where, on_value: OnValue, on_done: OnDone) {
        *self.gets_lock().entry(key).or_default() += 1;

        let answers: Vec<Vec<Value>> = self
            .replicas
            .iter()
            .map(|replica| {
                replica
                    .get(&key)
                    .map(|values| {
                        values
                            .iter()
                            .filter(|value| filter.matches(value.id()))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect();

        let success = !self.failing.contains(&key);
        let on_done = if self.stalled.contains(&key) {
            self.parked
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key)
                .or_default()
                .push(on_done);
            None
        } else {
            Some(on_done)
        };

        let max_delay = self.max_delay.as_micros() as u64;

        trace!(?key, replicas = answers.len(), success, "Testnet get");

        thread::spawn(move || {
            let handles: Vec<_> = answers
                .into_iter()
                .map(|mut values| {
                    let on_value = on_value.clone();

                    thread::spawn(move || {
                        let mut rng = rand::thread_rng();
                        values.shuffle(&mut rng);

                        for value in values {
                            if max_delay > 0 {
                                thread::sleep(Duration::from_micros(rng.gen_range(0..=max_delay)));
                            }

                            if !on_value(&value) {
                                break;
                            }
                        }
                    })
                })
                .collect();

            for handle in handles {
                let _ = handle.join();
            }

            if let Some(on_done) = on_done {
                on_done(success);
            }
        });
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::common::RecordKind;

    #[test]
    fn delivers_every_replica_then_completes() {
        let signer = SigningKey::from_bytes(&[7; 32]);
        let key = Id::hash("M17-AAA");

        let mut testnet = Testnet::new(3);
        testnet.put_all(key, Value::new(&signer, 2, "mrefd-peers-1", b"le"));
        testnet.put(1, key, Value::new(&signer, 1, "mrefd-config-1", b"de"));

        let count = Arc::new(AtomicUsize::new(0));
        let (sender, receiver) = flume::bounded(1);

        let counter = count.clone();
        testnet.get(
            key,
            Where::any(),
            Arc::new(move |_: &Value| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }),
            Box::new(move |success: bool| {
                let _ = sender.send(success);
            }),
        );

        assert!(receiver.recv_timeout(Duration::from_secs(5)).unwrap());
        assert_eq!(count.load(Ordering::SeqCst), 4);
        assert_eq!(testnet.gets_for(&key), 1);
    }

    #[test]
    fn filter_is_applied() {
        let signer = SigningKey::from_bytes(&[7; 32]);
        let key = Id::hash("M17-AAA");

        let mut testnet = Testnet::new(1);
        testnet.put(0, key, Value::new(&signer, 2, "mrefd-peers-1", b"le"));
        testnet.put(0, key, Value::new(&signer, 1, "mrefd-config-1", b"de"));

        let (values, receiver) = flume::unbounded();
        let (sender, done) = flume::bounded(1);

        testnet.get(
            key,
            Where::kind(RecordKind::Config),
            Arc::new(move |value: &Value| {
                let _ = values.send(value.id());
                true
            }),
            Box::new(move |success: bool| {
                let _ = sender.send(success);
            }),
        );

        assert!(done.recv_timeout(Duration::from_secs(5)).unwrap());
        assert_eq!(receiver.drain().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn unstall_drops_parked_completions() {
        let signer = SigningKey::from_bytes(&[7; 32]);
        let key = Id::hash("M17-AAA");
        let other = Id::hash("M17-BBB");

        let mut testnet = Testnet::new(1);
        testnet.put(0, key, Value::new(&signer, 2, "mrefd-peers-1", b"le"));
        testnet.stall(key);
        testnet.stall(other);

        let (sender, done) = flume::bounded(1);
        testnet.get(
            key,
            Where::any(),
            Arc::new(|_: &Value| true),
            Box::new(move |success: bool| {
                let _ = sender.send(success);
            }),
        );
        testnet.get(other, Where::any(), Arc::new(|_: &Value| true), Box::new(|_: bool| {}));

        assert_eq!(
            done.recv_timeout(Duration::from_millis(50)),
            Err(flume::RecvTimeoutError::Timeout)
        );

        testnet.unstall(key);

        assert_eq!(
            done.recv_timeout(Duration::from_secs(5)),
            Err(flume::RecvTimeoutError::Disconnected)
        );
        assert!(!testnet.stalled.contains(&key));
        assert_eq!(testnet.parked.lock().unwrap().len(), 1);
        assert_eq!(testnet.parked.lock().unwrap()[&other].len(), 1);

        testnet.get(key, Where::any(), Arc::new(|_: &Value| true), Box::new(|_: bool| {}));
        assert_eq!(testnet.parked.lock().unwrap().len(), 1);
    }

    #[test]
    fn put_adds_replicas() {
        let signer = SigningKey::from_bytes(&[7; 32]);

        let mut testnet = Testnet::new(0);
        testnet.put(2, Id::random(), Value::new(&signer, 2, "mrefd-peers-1", b"le"));

        assert_eq!(testnet.replicas.len(), 3);
    }
}
