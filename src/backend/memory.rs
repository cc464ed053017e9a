//! In-process key-value backend.

use crate::batch::{Batch, BatchExecutor, Slot};
use crate::command::Command;
use crate::operation::OperationKind;
use crate::reply::{CommandError, Outcome, Reply};
use crate::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(BTreeMap<String, String>),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

type Store = HashMap<String, Entry>;

struct Inner {
    store: RwLock<Store>,
    latency: Option<Duration>,
    round_trips: AtomicU64,
    submitted: AtomicU64,
}

/// A [`BatchExecutor`] backed by an in-process map.
///
/// - Strings, hashes and sets, each with an optional expiry
/// - One `execute_all` is one "round-trip": all queued commands are applied
///   in order under a single lock acquisition
/// - Optional simulated latency per round-trip
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                store: RwLock::new(HashMap::new()),
                latency: None,
                round_trips: AtomicU64::new(0),
                submitted: AtomicU64::new(0),
            }),
        }
    }

    /// Sleep for `latency` at the start of every round-trip.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: RwLock::new(HashMap::new()),
                latency: Some(latency),
                round_trips: AtomicU64::new(0),
                submitted: AtomicU64::new(0),
            }),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Store> {
        self.inner
            .store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a string value, replacing whatever was at `key`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.write()
            .insert(key.into(), Entry::new(Value::Str(value.into())));
    }

    /// Set a hash field. A non-hash value at `key` is replaced. Returns true for a new field.
    pub fn hset(
        &self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> bool {
        let mut store = self.write();
        let entry = store
            .entry(key.into())
            .or_insert_with(|| Entry::new(Value::Hash(BTreeMap::new())));
        if !matches!(entry.value, Value::Hash(_)) {
            *entry = Entry::new(Value::Hash(BTreeMap::new()));
        }
        match &mut entry.value {
            Value::Hash(h) => h.insert(field.into(), value.into()).is_none(),
            _ => false,
        }
    }

    /// Add a set member. A non-set value at `key` is replaced. Returns true if newly added.
    pub fn sadd(&self, key: impl Into<String>, member: impl Into<String>) -> bool {
        let mut store = self.write();
        let entry = store
            .entry(key.into())
            .or_insert_with(|| Entry::new(Value::Set(BTreeSet::new())));
        if !matches!(entry.value, Value::Set(_)) {
            *entry = Entry::new(Value::Set(BTreeSet::new()));
        }
        match &mut entry.value {
            Value::Set(s) => s.insert(member.into()),
            _ => false,
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        let now = Instant::now();
        self.inner
            .store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map_or(false, |e| !e.is_expired(now))
    }

    /// Remaining time to live, `None` for missing or persistent keys.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let store = self
            .inner
            .store
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let at = store.get(key)?.expires_at?;
        at.checked_duration_since(now)
    }

    /// Number of executed round-trips.
    pub fn round_trips(&self) -> u64 {
        self.inner.round_trips.load(Ordering::Relaxed)
    }

    /// Number of commands executed across all round-trips.
    pub fn submitted(&self) -> u64 {
        self.inner.submitted.load(Ordering::Relaxed)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchExecutor for MemoryBackend {
    fn batch(&self) -> Box<dyn Batch> {
        Box::new(MemoryBatch {
            inner: Arc::clone(&self.inner),
            commands: Vec::new(),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryBatch {
    inner: Arc<Inner>,
    // malformed arguments surface as a per-command error, not a bulk failure
    commands: Vec<std::result::Result<Command, String>>,
}

#[async_trait]
impl Batch for MemoryBatch {
    fn submit(&mut self, kind: OperationKind, args: &[String]) -> Slot {
        self.commands
            .push(Command::from_args(kind, args).map_err(|e| e.to_string()));
        Slot::new(self.commands.len() - 1)
    }

    fn len(&self) -> usize {
        self.commands.len()
    }

    async fn execute_all(&mut self) -> Result<Vec<Outcome>> {
        if let Some(latency) = self.inner.latency {
            tokio::time::sleep(latency).await;
        }
        let commands = std::mem::take(&mut self.commands);
        let outcomes: Vec<Outcome> = {
            let mut store = self
                .inner
                .store
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            commands
                .into_iter()
                .map(|cmd| match cmd {
                    Ok(cmd) => apply(&mut store, cmd, now),
                    Err(msg) => Err(CommandError::Backend(msg)),
                })
                .collect()
        };
        self.inner.round_trips.fetch_add(1, Ordering::Relaxed);
        self.inner
            .submitted
            .fetch_add(outcomes.len() as u64, Ordering::Relaxed);
        Ok(outcomes)
    }
}

/// Look up `key`, evicting it first if it has expired.
fn live<'a>(store: &'a mut Store, key: &str, now: Instant) -> Option<&'a mut Entry> {
    if store.get(key).map_or(false, |e| e.is_expired(now)) {
        store.remove(key);
    }
    store.get_mut(key)
}

fn apply(store: &mut Store, cmd: Command, now: Instant) -> Outcome {
    match cmd {
        Command::HDel { key, fields } => {
            let (removed, emptied) = match live(store, &key, now) {
                None => return Ok(Reply::Int(0)),
                Some(Entry {
                    value: Value::Hash(h),
                    ..
                }) => {
                    let removed = fields.iter().filter(|f| h.remove(f.as_str()).is_some()).count();
                    (removed, h.is_empty())
                }
                Some(_) => return Err(CommandError::WrongType),
            };
            if emptied {
                store.remove(&key);
            }
            Ok(Reply::Int(removed as i64))
        }
        Command::Expire { key, ttl } => {
            let Some(entry) = live(store, &key, now) else {
                return Ok(Reply::Bool(false));
            };
            if ttl.is_zero() {
                store.remove(&key);
            } else {
                entry.expires_at = Some(now + ttl);
            }
            Ok(Reply::Bool(true))
        }
        Command::HGet { key, field } => match live(store, &key, now) {
            None => Err(CommandError::Nil),
            Some(Entry {
                value: Value::Hash(h),
                ..
            }) => h.get(&field).cloned().map(Reply::Str).ok_or(CommandError::Nil),
            Some(_) => Err(CommandError::WrongType),
        },
        Command::HGetAll { key } => match live(store, &key, now) {
            None => Ok(Reply::Map(BTreeMap::new())),
            Some(Entry {
                value: Value::Hash(h),
                ..
            }) => Ok(Reply::Map(h.clone())),
            Some(_) => Err(CommandError::WrongType),
        },
        Command::Get { key } => match live(store, &key, now) {
            None => Err(CommandError::Nil),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Reply::Str(s.clone())),
            Some(_) => Err(CommandError::WrongType),
        },
        Command::Del { keys } => {
            let removed = keys
                .iter()
                .filter(|k| live(store, k, now).is_some() && store.remove(k.as_str()).is_some())
                .count();
            Ok(Reply::Int(removed as i64))
        }
        Command::SMembers { key } => match live(store, &key, now) {
            None => Ok(Reply::List(Vec::new())),
            Some(Entry {
                value: Value::Set(s),
                ..
            }) => Ok(Reply::List(s.iter().cloned().collect())),
            Some(_) => Err(CommandError::WrongType),
        },
        Command::MGet { keys } => {
            let values = keys
                .iter()
                .map(|k| match live(store, k, now) {
                    Some(Entry {
                        value: Value::Str(s),
                        ..
                    }) => Some(s.clone()),
                    _ => None,
                })
                .collect();
            Ok(Reply::Values(values))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(backend: &MemoryBackend, cmds: Vec<Command>) -> Vec<Outcome> {
        let mut batch = backend.batch();
        for cmd in cmds {
            let (kind, args) = cmd.into_parts();
            batch.submit(kind, &args);
        }
        batch.execute_all().await.unwrap()
    }

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[tokio::test]
    async fn test_one_batch_is_one_round_trip() {
        let backend = MemoryBackend::new();
        backend.set("a", "1");
        backend.set("b", "2");
        let out = run(
            &backend,
            vec![
                Command::Get { key: s("a") },
                Command::Get { key: s("b") },
                Command::Get { key: s("missing") },
            ],
        )
        .await;
        assert_eq!(
            out,
            vec![
                Ok(Reply::Str(s("1"))),
                Ok(Reply::Str(s("2"))),
                Err(CommandError::Nil)
            ]
        );
        assert_eq!(backend.round_trips(), 1);
        assert_eq!(backend.submitted(), 3);
    }

    #[tokio::test]
    async fn test_hash_commands() {
        let backend = MemoryBackend::new();
        assert!(backend.hset("h", "f1", "v1"));
        assert!(backend.hset("h", "f2", "v2"));
        assert!(!backend.hset("h", "f2", "v2b"));

        let out = run(
            &backend,
            vec![
                Command::HGet {
                    key: s("h"),
                    field: s("f2"),
                },
                Command::HGetAll { key: s("h") },
                Command::HDel {
                    key: s("h"),
                    fields: vec![s("f1"), s("nope")],
                },
                Command::HDel {
                    key: s("h"),
                    fields: vec![s("f2")],
                },
                Command::HGetAll { key: s("h") },
            ],
        )
        .await;

        assert_eq!(out[0], Ok(Reply::Str(s("v2b"))));
        let mut expected = BTreeMap::new();
        expected.insert(s("f1"), s("v1"));
        expected.insert(s("f2"), s("v2b"));
        assert_eq!(out[1], Ok(Reply::Map(expected)));
        assert_eq!(out[2], Ok(Reply::Int(1)));
        assert_eq!(out[3], Ok(Reply::Int(1)));
        assert_eq!(out[4], Ok(Reply::Map(BTreeMap::new())));
        assert!(!backend.exists("h"));
    }

    #[tokio::test]
    async fn test_del_mget_smembers() {
        let backend = MemoryBackend::new();
        backend.set("a", "1");
        backend.sadd("s", "y");
        backend.sadd("s", "x");

        let out = run(
            &backend,
            vec![
                Command::MGet {
                    keys: vec![s("a"), s("s"), s("zz")],
                },
                Command::SMembers { key: s("s") },
                Command::Del {
                    keys: vec![s("a"), s("zz"), s("s")],
                },
                Command::SMembers { key: s("s") },
            ],
        )
        .await;

        assert_eq!(
            out[0],
            Ok(Reply::Values(vec![Some(s("1")), None, None]))
        );
        assert_eq!(out[1], Ok(Reply::List(vec![s("x"), s("y")])));
        assert_eq!(out[2], Ok(Reply::Int(2)));
        assert_eq!(out[3], Ok(Reply::List(vec![])));
    }

    #[tokio::test]
    async fn test_wrong_type_and_expire() {
        let backend = MemoryBackend::new();
        backend.set("str", "v");
        let out = run(
            &backend,
            vec![
                Command::HGet {
                    key: s("str"),
                    field: s("f"),
                },
                Command::Expire {
                    key: s("str"),
                    ttl: Duration::from_secs(60),
                },
                Command::Expire {
                    key: s("missing"),
                    ttl: Duration::from_secs(60),
                },
            ],
        )
        .await;
        assert_eq!(out[0], Err(CommandError::WrongType));
        assert_eq!(out[1], Ok(Reply::Bool(true)));
        assert_eq!(out[2], Ok(Reply::Bool(false)));
        let ttl = backend.ttl("str").expect("ttl set");
        assert!(ttl <= Duration::from_secs(60) && ttl > Duration::from_secs(50));

        let out = run(
            &backend,
            vec![Command::Expire {
                key: s("str"),
                ttl: Duration::ZERO,
            }],
        )
        .await;
        assert_eq!(out[0], Ok(Reply::Bool(true)));
        assert!(!backend.exists("str"));
    }

    #[tokio::test]
    async fn test_expired_keys_are_invisible() {
        let backend = MemoryBackend::new();
        backend.set("k", "v");
        run(
            &backend,
            vec![Command::Expire {
                key: s("k"),
                ttl: Duration::from_millis(5),
            }],
        )
        .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!backend.exists("k"));
        let out = run(&backend, vec![Command::Get { key: s("k") }]).await;
        assert_eq!(out[0], Err(CommandError::Nil));
    }

    #[tokio::test]
    async fn test_malformed_args_fail_only_that_command() {
        let backend = MemoryBackend::new();
        backend.set("a", "1");
        let mut batch = backend.batch();
        batch.submit(OperationKind::HGet, &[s("only-key")]);
        batch.submit(OperationKind::Get, &[s("a")]);
        let out = batch.execute_all().await.unwrap();
        assert!(matches!(out[0], Err(CommandError::Backend(_))));
        assert_eq!(out[1], Ok(Reply::Str(s("1"))));
    }
}
