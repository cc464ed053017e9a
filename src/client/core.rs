use crate::client::builder::AutoPipelineBuilder;
use crate::client::types::TypedHandle;
use crate::command::Command;
use crate::engine::{Engine, EngineStats};
use crate::reply::FromReply;
use crate::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Typed, cloneable front-end to an [`Engine`].
///
/// Every call goes through the engine, so identical concurrent calls share one
/// backend command and every call in a window shares one round-trip.
#[derive(Clone, Debug)]
pub struct AutoPipeline {
    engine: Arc<Engine>,
}

impl AutoPipeline {
    pub fn builder() -> AutoPipelineBuilder {
        AutoPipelineBuilder::new()
    }

    pub fn from_engine(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Enqueue any command and convert its reply into `T`.
    pub fn submit<T: FromReply>(&self, command: Command) -> TypedHandle<T> {
        TypedHandle::new(self.engine.enqueue_command(command))
    }

    /// HDEL: number of fields removed.
    pub fn hdel_async<I, S>(&self, key: impl Into<String>, fields: I) -> TypedHandle<i64>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.submit(Command::HDel {
            key: key.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        })
    }

    pub async fn hdel<I, S>(&self, key: impl Into<String>, fields: I) -> Result<i64>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hdel_async(key, fields).await
    }

    /// EXPIRE: whether the key existed.
    pub fn expire_async(&self, key: impl Into<String>, ttl: Duration) -> TypedHandle<bool> {
        self.submit(Command::Expire {
            key: key.into(),
            ttl,
        })
    }

    pub async fn expire(&self, key: impl Into<String>, ttl: Duration) -> Result<bool> {
        self.expire_async(key, ttl).await
    }

    /// HGET: the field value; a missing field is `Error::Command(CommandError::Nil)`.
    pub fn hget_async(
        &self,
        key: impl Into<String>,
        field: impl Into<String>,
    ) -> TypedHandle<String> {
        self.submit(Command::HGet {
            key: key.into(),
            field: field.into(),
        })
    }

    pub async fn hget(&self, key: impl Into<String>, field: impl Into<String>) -> Result<String> {
        self.hget_async(key, field).await
    }

    pub fn hget_all_async(
        &self,
        key: impl Into<String>,
    ) -> TypedHandle<BTreeMap<String, String>> {
        self.submit(Command::HGetAll { key: key.into() })
    }

    pub async fn hget_all(&self, key: impl Into<String>) -> Result<BTreeMap<String, String>> {
        self.hget_all_async(key).await
    }

    pub fn get_async(&self, key: impl Into<String>) -> TypedHandle<String> {
        self.submit(Command::Get { key: key.into() })
    }

    pub async fn get(&self, key: impl Into<String>) -> Result<String> {
        self.get_async(key).await
    }

    /// DEL: number of keys removed.
    pub fn del_async<I, S>(&self, keys: I) -> TypedHandle<i64>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.submit(Command::Del {
            keys: keys.into_iter().map(Into::into).collect(),
        })
    }

    pub async fn del<I, S>(&self, keys: I) -> Result<i64>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.del_async(keys).await
    }

    pub fn smembers_async(&self, key: impl Into<String>) -> TypedHandle<Vec<String>> {
        self.submit(Command::SMembers { key: key.into() })
    }

    pub async fn smembers(&self, key: impl Into<String>) -> Result<Vec<String>> {
        self.smembers_async(key).await
    }

    /// MGET: one entry per key, `None` where there is no string value.
    pub fn mget_async<I, S>(&self, keys: I) -> TypedHandle<Vec<Option<String>>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.submit(Command::MGet {
            keys: keys.into_iter().map(Into::into).collect(),
        })
    }

    pub async fn mget<I, S>(&self, keys: I) -> Result<Vec<Option<String>>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mget_async(keys).await
    }

    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }

    /// Active listeners not yet resolved.
    pub fn pending(&self) -> usize {
        self.engine.pending()
    }

    /// Stop admission, drain what is queued and wait for the loop to end.
    pub async fn shutdown(&self) -> Result<()> {
        self.engine.shutdown().await
    }
}
