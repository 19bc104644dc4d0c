use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

use crate::models::SkipReason;

/// Counters exported on `/metrics`.
#[derive(Clone)]
pub struct PipelineMetrics {
    pub compilations: IntCounter,
    pub compressions: IntCounterVec,
    pub compression_fallbacks: IntCounter,
    pub merges: IntCounter,
    pub documents_skipped: IntCounterVec,
}

impl PipelineMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(PipelineMetrics {
            compilations: IntCounter::new("compilations_total", "Compiled tender responses")?,
            compressions: IntCounterVec::new(
                Opts::new("compressions_total", "Compressed artifacts by strategy"),
                &["method"],
            )?,
            compression_fallbacks: IntCounter::new(
                "compression_fallbacks_total",
                "Compressions that needed the fallback strategy",
            )?,
            merges: IntCounter::new("merges_total", "Merged bundles produced")?,
            documents_skipped: IntCounterVec::new(
                Opts::new("documents_skipped_total", "References dropped during compilation"),
                &["reason"],
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.compilations.clone()))?;
        registry.register(Box::new(self.compressions.clone()))?;
        registry.register(Box::new(self.compression_fallbacks.clone()))?;
        registry.register(Box::new(self.merges.clone()))?;
        registry.register(Box::new(self.documents_skipped.clone()))?;
        Ok(())
    }

    pub fn record_skip(&self, reason: &SkipReason) {
        self.documents_skipped.with_label_values(&[reason.label()]).inc();
    }
}
