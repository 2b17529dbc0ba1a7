//! One-shot export of the most recent past eras.

use eraexport_core::chunk::{chunk, ChunkSize};
use eraexport_core::config::HISTORIC_ERA_CHUNK;
use eraexport_core::provider::ChainDataProvider;
use eraexport_core::types::{EraIndex, ExportRequest};

use crate::error::SchedulerError;
use crate::export::Exporter;

/// The last `history_size` of `available` eras, oldest first.
pub fn recent_eras(available: &[EraIndex], history_size: usize) -> Vec<EraIndex> {
    let mut eras = available.to_vec();
    eras.sort_unstable();
    eras.dedup();
    let skip = eras.len().saturating_sub(history_size);
    eras.split_off(skip)
}

/// Export the last `history_size` eras the chain still holds, in requests of
/// at most [`HISTORIC_ERA_CHUNK`] eras. Returns the eras exported.
pub async fn export_history(
    provider: &dyn ChainDataProvider,
    exporter: &Exporter,
    history_size: usize,
) -> Result<Vec<EraIndex>, SchedulerError> {
    let available = exporter
        .retry()
        .call("historic_eras", || provider.historic_eras())
        .await?;
    let eras = recent_eras(&available, history_size);
    if eras.is_empty() {
        tracing::warn!("Chain reports no historic eras, nothing to export");
        return Ok(eras);
    }
    tracing::info!(
        first = eras[0],
        last = eras[eras.len() - 1],
        count = eras.len(),
        "Historic export started"
    );

    for batch in chunk(&eras, ChunkSize::new(HISTORIC_ERA_CHUNK)?) {
        exporter.export(ExportRequest::Historic { eras: batch }).await?;
    }
    Ok(eras)
}
