use std::sync::Arc;

use crate::core::PipelineConfig;
use crate::metrics::PipelineMetrics;
use crate::pipeline::Pipeline;
use crate::storage::{DocumentRegistry, SqliteRegistry};

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<Pipeline>,
}

impl ApiState {
    /// Connects the SQLite registry named by the configuration.
    pub async fn new(config: PipelineConfig, metrics: Arc<PipelineMetrics>) -> anyhow::Result<Self> {
        let registry = SqliteRegistry::connect(&config.database_url).await?;
        tracing::info!(database = %config.database_url, "Document registry connected");
        Ok(Self::with_registry(config, Arc::new(registry), metrics))
    }

    pub fn with_registry(
        config: PipelineConfig,
        registry: Arc<dyn DocumentRegistry>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        let pipeline = Pipeline::new(&config, registry, metrics);
        ApiState {
            pipeline: Arc::new(pipeline),
        }
    }
}
