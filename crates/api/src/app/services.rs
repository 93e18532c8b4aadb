use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio::sync::mpsc::unbounded_channel;
use tokio_stream::wrappers::UnboundedReceiverStream;

use remitflow_events::{Event, EventBus, InMemoryEventBus};
use remitflow_infra::{
    DirectoryWriter, ImportPipeline, InMemoryBatchStore, InMemoryImportLog,
    InMemoryProviderDirectory, JsonRowsIngestion, PipelineConfig,
};
use remitflow_providers::DirectoryWriteFailed;

pub type NotificationBus = Arc<InMemoryEventBus<DirectoryWriteFailed>>;

pub type Pipeline = ImportPipeline<
    JsonRowsIngestion<Arc<InMemoryProviderDirectory>, Arc<InMemoryBatchStore>>,
    Arc<InMemoryBatchStore>,
    Arc<InMemoryImportLog>,
    NotificationBus,
>;

/// Everything the handlers reach through `Extension<Arc<AppServices>>`.
pub struct AppServices {
    pub pipeline: Pipeline,
    pub directory: Arc<InMemoryProviderDirectory>,
    pub batches: Arc<InMemoryBatchStore>,
    pub bus: NotificationBus,
}

pub fn build_services(config: &PipelineConfig) -> std::io::Result<AppServices> {
    let directory = Arc::new(InMemoryProviderDirectory::new());
    let batches = Arc::new(InMemoryBatchStore::new());
    let bus: NotificationBus = Arc::new(InMemoryEventBus::new());

    let log = Arc::new(InMemoryImportLog::new());

    let writer = DirectoryWriter::spawn(
        directory.clone(),
        bus.clone(),
        config.directory_writer.clone(),
    )?;
    let ingestion = JsonRowsIngestion::new(directory.clone(), batches.clone());
    let pipeline = ImportPipeline::new(ingestion, batches.clone(), log, writer)
        .with_session_idle(config.session_idle);

    Ok(AppServices {
        pipeline,
        directory,
        batches,
        bus,
    })
}

/// Live directory-write failures as server-sent events.
///
/// The bus is a blocking std channel, so a blocking task forwards into an
/// async channel until the client goes away.
pub fn notifications_sse_stream(
    services: Arc<AppServices>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let (tx, rx) = unbounded_channel::<Result<SseEvent, Infallible>>();
    let subscription = services.bus.subscribe();

    tokio::task::spawn_blocking(move || {
        loop {
            match subscription.recv_timeout(Duration::from_millis(500)) {
                Ok(failed) => {
                    let event = SseEvent::default()
                        .event(failed.event_type())
                        .json_data(&failed)
                        .unwrap_or_else(|_| SseEvent::default().comment("unserializable notification"));
                    if tx.send(Ok(event)).is_err() {
                        break;
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    if tx.is_closed() {
                        break;
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    });

    Sse::new(UnboundedReceiverStream::new(rx)).keep_alive(KeepAlive::default())
}
