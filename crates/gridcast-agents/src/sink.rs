use async_trait::async_trait;
use gridcast_models::PipelineRecord;

use crate::error::SinkError;

/// Write-only destination for pipeline results. Never read back mid-cycle.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn record(&self, record: PipelineRecord) -> Result<(), SinkError>;
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl PersistenceSink for NullSink {
    async fn record(&self, _record: PipelineRecord) -> Result<(), SinkError> {
        Ok(())
    }
}
