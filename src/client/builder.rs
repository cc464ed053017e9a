use crate::batch::BatchExecutor;
use crate::client::core::AutoPipeline;
use crate::config::PipelineConfig;
use crate::engine::Engine;
use crate::telemetry::EventSink;
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Builder for [`AutoPipeline`].
///
/// An executor is required; everything else has a default.
pub struct AutoPipelineBuilder {
    executor: Option<Arc<dyn BatchExecutor>>,
    config: PipelineConfig,
    sink: Option<Arc<dyn EventSink>>,
    cancel: Option<CancellationToken>,
}

impl AutoPipelineBuilder {
    pub fn new() -> Self {
        Self {
            executor: None,
            config: PipelineConfig::default(),
            sink: None,
            cancel: None,
        }
    }

    /// The executor that runs each coalesced round-trip.
    pub fn executor(mut self, executor: Arc<dyn BatchExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Replace all engine options at once.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Load engine options from the environment.
    ///
    /// - `AUTOPIPELINE_TTL_US`
    /// - `AUTOPIPELINE_MAX_SIZE`
    /// - `AUTOPIPELINE_POLL_INTERVAL_US`
    pub fn from_env(mut self) -> Self {
        self.config = PipelineConfig::from_env();
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config = self.config.with_ttl(ttl);
        self
    }

    pub fn max_size(mut self, n: usize) -> Self {
        self.config = self.config.with_max_size(n);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config = self.config.with_poll_interval(interval);
        self
    }

    /// Inject an event sink. Default is the process-wide sink.
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Stop the pipeline when `token` is cancelled.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Start the engine. Must be called from within a tokio runtime.
    pub fn build(self) -> Result<AutoPipeline> {
        let executor = self.executor.ok_or_else(|| {
            Error::configuration_with_context(
                "an executor is required",
                ErrorContext::new()
                    .with_field_path("executor")
                    .with_source("AutoPipelineBuilder"),
            )
        })?;

        let mut engine = Engine::builder(executor).config(self.config);
        if let Some(sink) = self.sink {
            engine = engine.event_sink(sink);
        }
        if let Some(token) = self.cancel {
            engine = engine.cancellation_token(token);
        }
        Ok(AutoPipeline::from_engine(engine.start()?))
    }
}

impl Default for AutoPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[tokio::test]
    async fn test_executor_is_required() {
        let err = AutoPipelineBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("executor")
        );
    }

    #[tokio::test]
    async fn test_setters_reach_engine_config() {
        let client = AutoPipelineBuilder::new()
            .executor(Arc::new(MemoryBackend::new()))
            .ttl(Duration::from_millis(7))
            .max_size(3)
            .poll_interval(Duration::from_micros(200))
            .build()
            .unwrap();
        let cfg = client.engine().config();
        assert_eq!(cfg.ttl, Duration::from_millis(7));
        assert_eq!(cfg.max_size, 3);
        assert_eq!(cfg.poll_interval, Duration::from_micros(200));
        assert_eq!(client.engine().executor_name(), "memory");
        client.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let res = AutoPipelineBuilder::new()
            .executor(Arc::new(MemoryBackend::new()))
            .poll_interval(Duration::ZERO)
            .build();
        assert!(matches!(res, Err(Error::Configuration { .. })));
    }
}
