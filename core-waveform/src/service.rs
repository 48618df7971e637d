//! # Waveform Request Coordinator
//!
//! [`WaveformService`] serializes, deduplicates and cancels per-file envelope
//! computations under a single-flight discipline: at most one decode+reduce
//! pipeline runs system-wide, and the most recently requested file always
//! wins. An envelope for a track the user already skipped past is worthless.
//!
//! ## Concurrency model
//!
//! A mutex-guarded table owns every in-flight pipeline. Pipelines run as
//! spawned tasks; decode and reduction never execute while the table lock is
//! held, so coordination is never blocked by slow I/O. Cancellation is
//! cooperative: the token is checked before decode, after decode and between
//! reduction chunks. Callers for the same file attach to the existing
//! pipeline's outcome channel instead of starting a duplicate.

use crate::cache::{AudioFileRef, CacheKey, EnvelopeCache};
use crate::config::WaveformConfig;
use crate::envelope::Envelope;
use crate::error::{Result, WaveformError};
use crate::reducer;
use crate::traits::WaveformDecoder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Terminal state of one pipeline, broadcast to every attached awaiter.
#[derive(Debug, Clone)]
enum PipelineOutcome {
    /// Pipeline finished; the envelope was (best-effort) persisted.
    Completed(Envelope),
    /// Decode or reduction failed; nothing was persisted.
    Failed(WaveformError),
    /// Pipeline was superseded by a request for a different file.
    Cancelled,
}

/// One active decode+reduce pipeline. Owned by the in-flight table; removed
/// by its own task on completion, failure or cancellation.
struct InflightPipeline {
    /// Distinguishes this pipeline from a successor under the same key.
    generation: u64,
    /// Source path, for `cancel_all`'s exclusion match.
    path: PathBuf,
    cancel: CancellationToken,
    progress: watch::Receiver<Option<Envelope>>,
    outcome: watch::Receiver<Option<PipelineOutcome>>,
}

#[derive(Default)]
struct InflightTable {
    pipelines: HashMap<CacheKey, InflightPipeline>,
    next_generation: u64,
}

/// Receiver half of a pipeline, held by one awaiting caller.
struct Attached {
    progress: watch::Receiver<Option<Envelope>>,
    outcome: watch::Receiver<Option<PipelineOutcome>>,
}

/// Coordinates waveform extraction for the player.
///
/// Explicitly constructed with injected dependencies, no global state. The
/// service is cheap to clone; clones share the decoder, the cache and the
/// in-flight table.
#[derive(Clone)]
pub struct WaveformService {
    decoder: Arc<dyn WaveformDecoder>,
    cache: EnvelopeCache,
    config: WaveformConfig,
    inflight: Arc<Mutex<InflightTable>>,
}

impl WaveformService {
    /// Create a service from a decoder and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WaveformError::Configuration`] if the configuration fails
    /// validation.
    pub fn new(decoder: Arc<dyn WaveformDecoder>, config: WaveformConfig) -> Result<Self> {
        config.validate().map_err(WaveformError::Configuration)?;
        let cache = EnvelopeCache::new(config.cache_directory.clone());
        Ok(Self {
            decoder,
            cache,
            config,
            inflight: Arc::new(Mutex::new(InflightTable::default())),
        })
    }

    /// The envelope cache this service reads and writes.
    pub fn cache(&self) -> &EnvelopeCache {
        &self.cache
    }

    /// Compute (or fetch from cache) the envelope for the file at `path`.
    ///
    /// Any in-flight pipeline for a *different* file is cancelled first,
    /// before the cache check (see DESIGN.md). On a cache miss,
    /// a concurrent request for the same file attaches to the existing
    /// pipeline instead of starting a duplicate.
    ///
    /// # Errors
    ///
    /// Decode failures propagate; [`WaveformError::Cancelled`] signals this
    /// request was superseded. Cache incidents never surface here.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub async fn get_peaks(&self, path: impl AsRef<Path>) -> Result<Envelope> {
        let path = path.as_ref();
        let file_ref = AudioFileRef::resolve(path).await?;
        let key = file_ref.cache_key();

        self.cancel_other_pipelines(&key).await;

        if let Some(envelope) = self.cache.lookup(&key).await {
            return Ok(envelope);
        }

        let attached = self.attach_or_start(key, file_ref).await;
        Self::await_attached(attached).await
    }

    /// Like [`get_peaks`](Self::get_peaks), but forwards partial envelopes
    /// to `on_progress` as the reduction proceeds.
    ///
    /// `on_progress` runs on the caller's task. On a cache hit it is invoked
    /// exactly once with the full cached envelope before the call returns,
    /// so callers get a uniform progressive-update contract regardless of
    /// hit or miss. Attachers to an existing pipeline observe the same
    /// progress stream from their attach point onward.
    #[instrument(skip(self, on_progress), fields(path = %path.as_ref().display()))]
    pub async fn get_peaks_streaming<F>(
        &self,
        path: impl AsRef<Path>,
        mut on_progress: F,
    ) -> Result<Envelope>
    where
        F: FnMut(Envelope),
    {
        let path = path.as_ref();
        let file_ref = AudioFileRef::resolve(path).await?;
        let key = file_ref.cache_key();

        self.cancel_other_pipelines(&key).await;

        if let Some(envelope) = self.cache.lookup(&key).await {
            on_progress(envelope.clone());
            return Ok(envelope);
        }

        let attached = self.attach_or_start(key, file_ref).await;
        Self::await_attached_streaming(attached, &mut on_progress).await
    }

    /// Best-effort cache warm-up for `path`.
    ///
    /// Does nothing when the file is already cached, or when any pipeline is
    /// in flight; prefetch never preempts foreground work (see DESIGN.md).
    /// Failures are logged and discarded.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub async fn prefetch(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let file_ref = match AudioFileRef::resolve(path).await {
            Ok(file_ref) => file_ref,
            Err(error) => {
                debug!(%error, "prefetch skipped, source unavailable");
                return;
            }
        };
        let key = file_ref.cache_key();

        if self.cache.lookup(&key).await.is_some() {
            debug!(%key, "prefetch skipped, already cached");
            return;
        }

        let service = self.clone();
        tokio::spawn(async move {
            // The in-flight check and the registration share one lock
            // acquisition, so a foreground pipeline started during the cache
            // lookup above is seen here and the prefetch yields to it.
            let attached = {
                let mut table = service.inflight.lock().await;
                if table.pipelines.values().any(|p| !p.cancel.is_cancelled()) {
                    debug!(%key, "prefetch skipped, a pipeline is already in flight");
                    return;
                }
                service.start_pipeline(&mut table, key.clone(), file_ref)
            };
            match Self::await_attached(attached).await {
                Ok(_) => debug!(%key, "prefetch completed"),
                Err(error) => debug!(%key, %error, "prefetch discarded failure"),
            }
        });
    }

    /// Cooperatively cancel every in-flight pipeline whose source path is
    /// not `except` (all of them, when `None`).
    ///
    /// Cancellation is advisory: pipelines observe it at the next checked
    /// point, unregister themselves and persist nothing.
    pub async fn cancel_all(&self, except: Option<&Path>) {
        let table = self.inflight.lock().await;
        for (key, pipeline) in table.pipelines.iter() {
            if except.map_or(false, |p| pipeline.path.as_path() == p) {
                continue;
            }
            if !pipeline.cancel.is_cancelled() {
                info!(%key, path = %pipeline.path.display(), "cancelling in-flight pipeline");
                pipeline.cancel.cancel();
            }
        }
    }

    /// Preempt every live pipeline computing a different file than `key`.
    async fn cancel_other_pipelines(&self, key: &CacheKey) {
        let table = self.inflight.lock().await;
        for (other, pipeline) in table.pipelines.iter() {
            if other != key && !pipeline.cancel.is_cancelled() {
                debug!(cancelled = %other, requested = %key, "preempting in-flight pipeline");
                pipeline.cancel.cancel();
            }
        }
    }

    /// Attach to the live pipeline for `key`, or register and spawn a new
    /// one. Cancelled pipelines are never attached to; a request arriving
    /// after cancellation recomputes from scratch.
    ///
    /// The preemption sweep runs again here, under the same lock acquisition
    /// as the registration: two requests racing through their stat and cache
    /// lookup windows serialize on this lock, and whichever registers last
    /// cancels the other. Without the in-lock sweep the earlier request could
    /// survive a later one.
    async fn attach_or_start(&self, key: CacheKey, file_ref: AudioFileRef) -> Attached {
        let mut table = self.inflight.lock().await;

        for (other, pipeline) in table.pipelines.iter() {
            if other != &key && !pipeline.cancel.is_cancelled() {
                debug!(cancelled = %other, requested = %key, "preempting in-flight pipeline");
                pipeline.cancel.cancel();
            }
        }

        if let Some(existing) = table.pipelines.get(&key) {
            if !existing.cancel.is_cancelled() {
                debug!(%key, "attaching to in-flight pipeline");
                return Attached {
                    progress: existing.progress.clone(),
                    outcome: existing.outcome.clone(),
                };
            }
            // Cancelled predecessor still unwinding; the new entry replaces
            // it in the table and the old task's cleanup is generation-gated.
        }

        self.start_pipeline(&mut table, key, file_ref)
    }

    /// Register a pipeline under `key` and spawn its task.
    ///
    /// The caller holds the table lock, so the registration is atomic with
    /// whatever sweep or in-flight check preceded it.
    fn start_pipeline(
        &self,
        table: &mut InflightTable,
        key: CacheKey,
        file_ref: AudioFileRef,
    ) -> Attached {
        let generation = table.next_generation;
        table.next_generation += 1;

        let cancel = CancellationToken::new();
        let (progress_tx, progress_rx) = watch::channel(None);
        let (outcome_tx, outcome_rx) = watch::channel(None);

        table.pipelines.insert(
            key.clone(),
            InflightPipeline {
                generation,
                path: file_ref.path().to_path_buf(),
                cancel: cancel.clone(),
                progress: progress_rx.clone(),
                outcome: outcome_rx.clone(),
            },
        );

        debug!(%key, generation, "starting waveform pipeline");

        let decoder = Arc::clone(&self.decoder);
        let cache = self.cache.clone();
        let inflight = Arc::clone(&self.inflight);
        let chunks = self.config.progress_chunks;
        tokio::spawn(async move {
            let outcome = Self::run_pipeline(
                decoder,
                cache,
                &key,
                file_ref,
                cancel,
                chunks,
                &progress_tx,
            )
            .await;

            // Unregister before publishing the outcome so an awaiter that
            // immediately re-requests never attaches to a finished pipeline.
            {
                let mut table = inflight.lock().await;
                if table.pipelines.get(&key).map(|p| p.generation) == Some(generation) {
                    table.pipelines.remove(&key);
                }
            }

            let _ = outcome_tx.send(Some(outcome));
            // The progress sender closes only after the outcome is visible,
            // so awaiters never see the channel die with the result pending.
            drop(progress_tx);
        });

        Attached {
            progress: progress_rx,
            outcome: outcome_rx,
        }
    }

    /// The pipeline body: decode, reduce, persist.
    async fn run_pipeline(
        decoder: Arc<dyn WaveformDecoder>,
        cache: EnvelopeCache,
        key: &CacheKey,
        file_ref: AudioFileRef,
        cancel: CancellationToken,
        chunks: usize,
        progress: &watch::Sender<Option<Envelope>>,
    ) -> PipelineOutcome {
        if cancel.is_cancelled() {
            debug!(%key, "pipeline cancelled before decode");
            return PipelineOutcome::Cancelled;
        }

        let pcm = match decoder.decode(file_ref.path()).await {
            Ok(pcm) => pcm,
            Err(error) => {
                warn!(%key, %error, "decode failed");
                return PipelineOutcome::Failed(error);
            }
        };

        if cancel.is_cancelled() {
            debug!(%key, "pipeline cancelled after decode");
            return PipelineOutcome::Cancelled;
        }

        debug!(
            %key,
            frames = pcm.frame_count(),
            channels = pcm.channel_count(),
            "reducing decoded audio"
        );

        let reduced = reducer::reduce_streaming(&pcm, chunks, &cancel, |partial| {
            let _ = progress.send(Some(partial));
        })
        .await;
        drop(pcm); // decoded samples are not retained past the reduction

        let envelope = match reduced {
            Ok(envelope) => envelope,
            Err(error) if error.is_cancelled() => {
                debug!(%key, "pipeline cancelled during reduction");
                return PipelineOutcome::Cancelled;
            }
            Err(error) => {
                warn!(%key, %error, "reduction failed");
                return PipelineOutcome::Failed(error);
            }
        };

        // A cancelled or failed pipeline never reaches this store.
        cache.store(key, &envelope).await;
        PipelineOutcome::Completed(envelope)
    }

    /// Await a pipeline's terminal outcome.
    async fn await_attached(mut attached: Attached) -> Result<Envelope> {
        let outcome = attached
            .outcome
            .wait_for(|o| o.is_some())
            .await
            .map_err(|_| {
                WaveformError::Internal("pipeline dropped without publishing an outcome".to_string())
            })?
            .clone();

        Self::resolve_outcome(outcome)
    }

    /// Await a pipeline's outcome while forwarding progress emissions.
    async fn await_attached_streaming<F>(
        mut attached: Attached,
        on_progress: &mut F,
    ) -> Result<Envelope>
    where
        F: FnMut(Envelope),
    {
        loop {
            tokio::select! {
                changed = attached.progress.changed() => {
                    match changed {
                        Ok(()) => {
                            let partial = attached.progress.borrow_and_update().clone();
                            if let Some(envelope) = partial {
                                on_progress(envelope);
                            }
                        }
                        // Progress channel closes only after the outcome is
                        // published; leave the loop to collect it.
                        Err(_) => break,
                    }
                }
                outcome = attached.outcome.wait_for(|o| o.is_some()) => {
                    let outcome = outcome
                        .map_err(|_| WaveformError::Internal(
                            "pipeline dropped without publishing an outcome".to_string(),
                        ))?
                        .clone();

                    // Deliver a final partial published after our last wakeup.
                    if attached.progress.has_changed().unwrap_or(false) {
                        if let Some(envelope) = attached.progress.borrow_and_update().clone() {
                            on_progress(envelope);
                        }
                    }

                    return Self::resolve_outcome(outcome);
                }
            }
        }

        Self::await_attached(attached).await
    }

    fn resolve_outcome(outcome: Option<PipelineOutcome>) -> Result<Envelope> {
        match outcome {
            Some(PipelineOutcome::Completed(envelope)) => Ok(envelope),
            Some(PipelineOutcome::Failed(error)) => Err(error),
            Some(PipelineOutcome::Cancelled) | None => Err(WaveformError::Cancelled),
        }
    }
}
