//! Background worker applying directory write intents.
//!
//! Intents are queued on a bounded channel and applied in order by a single
//! worker thread, each with its own retry budget. Given-up writes (retries
//! exhausted, or rejected because the queue was full) go to a bounded failure
//! ledger and are published as [`DirectoryWriteFailed`] on the event bus.
//! Nothing is ever reported back to the import that produced the intent.

use std::collections::VecDeque;
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use remitflow_events::EventBus;
use remitflow_providers::{DirectoryUpdate, DirectoryWriteFailed};

use crate::directory::ProviderDirectory;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct DirectoryWriterConfig {
    pub name: String,
    pub queue_capacity: usize,
    /// Most recent failures kept; older ones are dropped first.
    pub ledger_capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for DirectoryWriterConfig {
    fn default() -> Self {
        Self {
            name: "directory-writer".to_string(),
            queue_capacity: 256,
            ledger_capacity: 500,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterStats {
    pub queued: u64,
    pub succeeded: u64,
    pub retried: u64,
    pub failed: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Queued,
    /// Queue full or worker gone; the write went straight to the ledger.
    Rejected,
}

/// Shared between the handle and the worker thread.
struct Ledger<B> {
    bus: B,
    stats: Mutex<WriterStats>,
    failures: Mutex<VecDeque<DirectoryWriteFailed>>,
    capacity: usize,
}

impl<B: EventBus<DirectoryWriteFailed>> Ledger<B> {
    fn bump(&self, f: impl FnOnce(&mut WriterStats)) {
        match self.stats.lock() {
            Ok(mut s) => f(&mut s),
            Err(_) => warn!("writer stats lock poisoned"),
        }
    }

    fn record_failure(&self, update: DirectoryUpdate, attempts: u32, error: String) {
        warn!(
            provider_id = %update.provider_id,
            origin = ?update.origin,
            attempts,
            error = %error,
            "directory write given up"
        );
        let failed = DirectoryWriteFailed {
            update,
            attempts,
            error,
            failed_at: Utc::now(),
        };
        if let Ok(mut ledger) = self.failures.lock() {
            if ledger.len() >= self.capacity {
                ledger.pop_front();
            }
            ledger.push_back(failed.clone());
        }
        if let Err(e) = self.bus.publish(failed) {
            error!(error = ?e, "failed to publish directory write failure");
        }
    }
}

/// Handle to the running worker. Dropping it drains the queue and stops the
/// worker.
pub struct DirectoryWriter<B: EventBus<DirectoryWriteFailed> + 'static> {
    sender: Option<SyncSender<DirectoryUpdate>>,
    join: Option<thread::JoinHandle<()>>,
    ledger: Arc<Ledger<B>>,
    name: String,
}

impl<B> DirectoryWriter<B>
where
    B: EventBus<DirectoryWriteFailed> + 'static,
{
    pub fn spawn<D>(directory: D, bus: B, config: DirectoryWriterConfig) -> std::io::Result<Self>
    where
        D: ProviderDirectory + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel::<DirectoryUpdate>(config.queue_capacity.max(1));
        let ledger = Arc::new(Ledger {
            bus,
            stats: Mutex::new(WriterStats::default()),
            failures: Mutex::new(VecDeque::new()),
            capacity: config.ledger_capacity.max(1),
        });

        let worker_ledger = ledger.clone();
        let retry = config.retry.clone();
        let name = config.name.clone();
        let join = thread::Builder::new().name(config.name.clone()).spawn(move || {
            info!(worker = %name, "directory writer started");
            for update in receiver {
                apply_with_retry(&directory, &retry, &worker_ledger, update);
            }
            info!(worker = %name, "directory writer stopped");
        })?;

        Ok(Self {
            sender: Some(sender),
            join: Some(join),
            ledger,
            name: config.name,
        })
    }

    /// Queue a write without blocking.
    pub fn dispatch(&self, update: DirectoryUpdate) -> Dispatch {
        let Some(sender) = &self.sender else {
            self.reject(update, "directory writer stopped");
            return Dispatch::Rejected;
        };
        match sender.try_send(update) {
            Ok(()) => {
                self.ledger.bump(|s| s.queued += 1);
                Dispatch::Queued
            }
            Err(TrySendError::Full(update)) => {
                self.reject(update, "directory write queue full");
                Dispatch::Rejected
            }
            Err(TrySendError::Disconnected(update)) => {
                self.reject(update, "directory writer stopped");
                Dispatch::Rejected
            }
        }
    }

    fn reject(&self, update: DirectoryUpdate, reason: &str) {
        self.ledger.bump(|s| s.rejected += 1);
        self.ledger.record_failure(update, 0, reason.to_string());
    }

    pub fn stats(&self) -> WriterStats {
        self.ledger.stats.lock().map(|s| *s).unwrap_or_default()
    }

    /// The most recent given-up writes, oldest first.
    pub fn failures(&self) -> Vec<DirectoryWriteFailed> {
        self.ledger
            .failures
            .lock()
            .map(|f| f.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Stop accepting writes, finish the queued ones, join the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        drop(self.sender.take());
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!(worker = %self.name, "directory writer panicked");
            }
        }
    }
}

impl<B: EventBus<DirectoryWriteFailed> + 'static> Drop for DirectoryWriter<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn apply_with_retry<D, B>(
    directory: &D,
    retry: &RetryPolicy,
    ledger: &Ledger<B>,
    update: DirectoryUpdate,
) where
    D: ProviderDirectory,
    B: EventBus<DirectoryWriteFailed>,
{
    let mut attempt = 1;
    loop {
        match directory.update(&update.provider_id, &update.patch) {
            Ok(_) => {
                debug!(provider_id = %update.provider_id, attempt, "directory write applied");
                ledger.bump(|s| s.succeeded += 1);
                return;
            }
            Err(e) if retry.should_retry(attempt) => {
                let delay = retry.delay_after(attempt);
                debug!(
                    provider_id = %update.provider_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "directory write failed; retrying"
                );
                ledger.bump(|s| s.retried += 1);
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                ledger.bump(|s| s.failed += 1);
                ledger.record_failure(update, attempt, e.to_string());
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DirectoryError, InMemoryProviderDirectory};
    use remitflow_events::InMemoryEventBus;
    use remitflow_providers::{ProviderDirectoryEntry, ProviderId, ProviderPatch, UpdateOrigin};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    type Bus = Arc<InMemoryEventBus<DirectoryWriteFailed>>;

    /// Fails the first `failures` calls, then delegates.
    struct Flaky {
        inner: InMemoryProviderDirectory,
        failures: AtomicU32,
    }

    impl ProviderDirectory for Flaky {
        fn get(&self, id: &ProviderId) -> Result<Option<ProviderDirectoryEntry>, DirectoryError> {
            self.inner.get(id)
        }

        fn update(
            &self,
            id: &ProviderId,
            patch: &ProviderPatch,
        ) -> Result<ProviderDirectoryEntry, DirectoryError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(DirectoryError::Unavailable("timeout".to_string()));
            }
            self.inner.update(id, patch)
        }

        fn list(&self) -> Result<Vec<ProviderDirectoryEntry>, DirectoryError> {
            self.inner.list()
        }
    }

    fn flaky(failures: u32) -> Arc<Flaky> {
        Arc::new(Flaky {
            inner: InMemoryProviderDirectory::new(),
            failures: AtomicU32::new(failures),
        })
    }

    fn update() -> DirectoryUpdate {
        DirectoryUpdate::new(
            ProviderId::parse("B12345674").unwrap(),
            ProviderPatch::account("ES9121000418450200051332"),
            UpdateOrigin::AccountResolution,
        )
    }

    fn config(max_attempts: u32) -> DirectoryWriterConfig {
        DirectoryWriterConfig {
            name: "test-writer".to_string(),
            queue_capacity: 8,
            ledger_capacity: 4,
            retry: RetryPolicy::fixed(max_attempts, Duration::from_millis(1)),
        }
    }

    #[test]
    fn transient_failure_is_retried_until_applied() {
        let dir = flaky(2);
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let notices = bus.subscribe();
        let writer = DirectoryWriter::spawn(dir.clone(), bus, config(3)).unwrap();

        assert_eq!(writer.dispatch(update()), Dispatch::Queued);
        let ledger = writer.ledger.clone();
        writer.shutdown();
        let stats = *ledger.stats.lock().unwrap();

        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.retried, 2);
        assert!(notices.drain().is_empty());
        let entry = dir.get(&ProviderId::parse("B12345674").unwrap()).unwrap().unwrap();
        assert_eq!(entry.account.as_deref(), Some("ES9121000418450200051332"));
    }

    #[test]
    fn exhausted_write_lands_in_ledger_and_on_bus() {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let notices = bus.subscribe();
        let writer = DirectoryWriter::spawn(flaky(10), bus, config(2)).unwrap();
        writer.dispatch(update());

        let ledger = writer.ledger.clone();
        writer.shutdown();

        let failures: Vec<_> = ledger.failures.lock().unwrap().iter().cloned().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].attempts, 2);
        assert_eq!(failures[0].error, "provider directory unavailable: timeout");
        let published = notices.drain();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].update.origin, UpdateOrigin::AccountResolution);
    }

    #[test]
    fn stopped_writer_rejects_into_ledger() {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let mut writer = DirectoryWriter::spawn(flaky(0), bus, config(1)).unwrap();
        writer.stop();

        assert_eq!(writer.dispatch(update()), Dispatch::Rejected);
        assert_eq!(writer.stats().rejected, 1);
        assert_eq!(writer.failures()[0].attempts, 0);
    }

    #[test]
    fn ledger_keeps_only_the_latest_failures() {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let notices = bus.subscribe();
        let mut writer = DirectoryWriter::spawn(flaky(0), bus, config(1)).unwrap();
        writer.stop();

        let tax_ids = ["B12345674", "12345678Z", "X1234567L", "B99999999", "B12345678", "A58818501"];
        for tax_id in tax_ids {
            let mut u = update();
            u.provider_id = ProviderId::parse(tax_id).unwrap();
            writer.dispatch(u);
        }

        let kept: Vec<String> = writer
            .failures()
            .iter()
            .map(|f| f.update.provider_id.to_string())
            .collect();
        assert_eq!(kept, ["X1234567L", "B99999999", "B12345678", "A58818501"]);
        assert_eq!(writer.stats().rejected, 6);
        assert_eq!(notices.drain().len(), 6);
    }
}
