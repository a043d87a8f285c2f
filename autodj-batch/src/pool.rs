//! Worker pool for analyzing many tracks
//!
//! Jobs are pulled from a shared queue by a fixed number of threads, each
//! running the full [`TrackAnalyzer`] on one buffer at a time. Results come
//! back in job order regardless of which worker finished first.

use autodj_analysis::{
    AnalysisError, AnalyzerConfig, AudioBuffer, AudioFeatures, CancellationToken, TrackAnalyzer,
};
use crossbeam_channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Progress updates during a batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchProgress {
    /// Batch started
    Started {
        /// Total number of jobs
        total: usize,
    },
    /// A worker picked up a job
    Analyzing {
        /// Job number (1-indexed)
        current: usize,
        total: usize,
        id: String,
    },
    /// A job produced its features
    Finished {
        /// Number of jobs done so far, including this one
        completed: usize,
        total: usize,
        id: String,
    },
    /// A job failed
    Failed { id: String, message: String },
    /// Every job has been processed
    Complete { analyzed: usize, failed: usize },
}

/// Analysis threads each job runs side by side (tempo, key, energy, spectral)
const THREADS_PER_JOB: usize = 4;

/// Configuration for the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of jobs analyzed at once
    ///
    /// Every job fans out to four analysis threads, so the default is a
    /// quarter of the available cores (at least one).
    pub max_threads: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let cores = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(THREADS_PER_JOB);
        Self {
            max_threads: (cores / THREADS_PER_JOB).max(1),
        }
    }
}

/// Error type for batch operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Batch was cancelled")]
    Cancelled,
    #[error("Analysis worker panicked")]
    WorkerPanicked,
}

/// One track to analyze
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    /// Caller-chosen identifier echoed in progress events and results
    pub id: String,
    pub buffer: AudioBuffer,
}

impl AnalysisJob {
    pub fn new(id: impl Into<String>, buffer: AudioBuffer) -> Self {
        Self {
            id: id.into(),
            buffer,
        }
    }
}

/// Outcome of a single job
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub id: String,
    pub result: Result<AudioFeatures, AnalysisError>,
}

/// Result of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    /// One outcome per job, in job order
    pub outcomes: Vec<JobOutcome>,
    pub analyzed_count: usize,
    pub failed_count: usize,
}

impl BatchResult {
    /// Features of every job that succeeded, in job order
    pub fn features(&self) -> impl Iterator<Item = (&str, &AudioFeatures)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|f| (o.id.as_str(), f)))
    }
}

/// Counters and per-job result slots shared by the workers
struct Shared {
    slots: Vec<Option<JobOutcome>>,
    analyzed: usize,
    failed: usize,
}

/// Bounded pool of analysis threads sharing one analyzer
#[derive(Debug, Clone)]
pub struct AnalysisPool {
    analyzer: Arc<TrackAnalyzer>,
    config: PoolConfig,
}

impl AnalysisPool {
    /// Create a pool whose workers all use the given analyzer settings
    pub fn new(analyzer_config: AnalyzerConfig, config: PoolConfig) -> Result<Self, BatchError> {
        Ok(Self {
            analyzer: Arc::new(TrackAnalyzer::new(analyzer_config)?),
            config,
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Analyze every job, blocking until the batch is done
    ///
    /// A single failing job is reported and recorded in its outcome; it does
    /// not stop the batch. Cancellation does: once `cancel` fires, workers
    /// stop picking up jobs, in-flight analyses bail out, and the whole call
    /// returns [`BatchError::Cancelled`].
    pub fn analyze_all(
        &self,
        jobs: Vec<AnalysisJob>,
        progress_tx: Option<Sender<BatchProgress>>,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, BatchError> {
        if cancel.is_cancelled() {
            return Err(BatchError::Cancelled);
        }

        let total = jobs.len();
        send(&progress_tx, BatchProgress::Started { total });

        if total == 0 {
            send(
                &progress_tx,
                BatchProgress::Complete {
                    analyzed: 0,
                    failed: 0,
                },
            );
            return Ok(BatchResult {
                outcomes: Vec::new(),
                analyzed_count: 0,
                failed_count: 0,
            });
        }

        let thread_count = self.config.max_threads.min(total).max(1);
        debug!(total, threads = thread_count, "starting batch");

        // Queue every job up front; dropping the sender lets workers drain and exit
        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        for item in jobs.into_iter().enumerate() {
            let _ = job_tx.send(item);
        }
        drop(job_tx);

        let shared = Arc::new(Mutex::new(Shared {
            slots: vec![None; total],
            analyzed: 0,
            failed: 0,
        }));

        let mut handles = Vec::with_capacity(thread_count);
        for _ in 0..thread_count {
            let job_rx = job_rx.clone();
            let shared = Arc::clone(&shared);
            let analyzer = Arc::clone(&self.analyzer);
            let progress_tx = progress_tx.clone();
            let cancel = cancel.clone();

            let handle = thread::spawn(move || {
                run_worker(&analyzer, &job_rx, &shared, progress_tx.as_ref(), &cancel, total)
            });
            handles.push(handle);
        }

        let mut panicked = false;
        for handle in handles {
            panicked |= handle.join().is_err();
        }
        if panicked {
            return Err(BatchError::WorkerPanicked);
        }
        if cancel.is_cancelled() {
            info!("batch cancelled");
            return Err(BatchError::Cancelled);
        }

        let mut shared = shared.lock();
        let analyzed_count = shared.analyzed;
        let failed_count = shared.failed;
        let outcomes: Vec<JobOutcome> = shared.slots.drain(..).flatten().collect();
        drop(shared);

        send(
            &progress_tx,
            BatchProgress::Complete {
                analyzed: analyzed_count,
                failed: failed_count,
            },
        );
        info!(analyzed = analyzed_count, failed = failed_count, "batch complete");

        Ok(BatchResult {
            outcomes,
            analyzed_count,
            failed_count,
        })
    }

    /// Start a batch on a background thread
    ///
    /// Returns a receiver for progress updates and a handle to the batch thread.
    pub fn analyze_async(
        &self,
        jobs: Vec<AnalysisJob>,
        cancel: CancellationToken,
    ) -> (Receiver<BatchProgress>, JoinHandle<Result<BatchResult, BatchError>>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let pool = self.clone();

        let handle = thread::spawn(move || pool.analyze_all(jobs, Some(tx), &cancel));

        (rx, handle)
    }
}

fn run_worker(
    analyzer: &TrackAnalyzer,
    job_rx: &Receiver<(usize, AnalysisJob)>,
    shared: &Mutex<Shared>,
    progress_tx: Option<&Sender<BatchProgress>>,
    cancel: &CancellationToken,
    total: usize,
) {
    while let Ok((idx, job)) = job_rx.recv() {
        if cancel.is_cancelled() {
            break;
        }

        if let Some(tx) = progress_tx {
            let _ = tx.send(BatchProgress::Analyzing {
                current: idx + 1,
                total,
                id: job.id.clone(),
            });
        }

        let result = analyzer.analyze_buffer_with_cancel(&job.buffer, cancel);
        if result == Err(AnalysisError::Cancelled) {
            break;
        }

        let event = {
            let mut shared = shared.lock();
            let event = match &result {
                Ok(_) => {
                    shared.analyzed += 1;
                    BatchProgress::Finished {
                        completed: shared.analyzed + shared.failed,
                        total,
                        id: job.id.clone(),
                    }
                }
                Err(e) => {
                    shared.failed += 1;
                    warn!(id = %job.id, error = %e, "track analysis failed");
                    BatchProgress::Failed {
                        id: job.id.clone(),
                        message: e.to_string(),
                    }
                }
            };
            shared.slots[idx] = Some(JobOutcome { id: job.id, result });
            event
        };

        if let Some(tx) = progress_tx {
            let _ = tx.send(event);
        }
    }
}

fn send(progress_tx: &Option<Sender<BatchProgress>>, event: BatchProgress) {
    if let Some(tx) = progress_tx {
        let _ = tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn tone_job(id: &str, sample_rate: u32, freq: f32, seconds: f32) -> AnalysisJob {
        let total = (sample_rate as f32 * seconds) as usize;
        let samples = (0..total)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        AnalysisJob::new(id, AudioBuffer::mono(sample_rate, samples).unwrap())
    }

    fn pool(threads: usize) -> AnalysisPool {
        AnalysisPool::new(AnalyzerConfig::default(), PoolConfig { max_threads: threads }).unwrap()
    }

    #[test]
    fn test_pool_config_default() {
        let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        let workers = PoolConfig::default().max_threads;
        assert!(workers >= 1);
        // Workers times their four analysis threads stay within the cores
        assert!(workers == 1 || workers * 4 <= cores);
    }

    #[test]
    fn test_rejects_bad_analyzer_config() {
        let config = AnalyzerConfig {
            fft_size: 100,
            ..AnalyzerConfig::default()
        };
        assert_eq!(
            AnalysisPool::new(config, PoolConfig::default()).unwrap_err(),
            BatchError::Analysis(AnalysisError::NonPowerOfTwo(100))
        );
    }

    #[test]
    fn test_empty_batch() {
        init_tracing();
        let (tx, rx) = crossbeam_channel::unbounded();
        let result = pool(2)
            .analyze_all(Vec::new(), Some(tx), &CancellationToken::new())
            .unwrap();
        assert!(result.outcomes.is_empty());
        assert_eq!(result.analyzed_count, 0);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                BatchProgress::Started { total: 0 },
                BatchProgress::Complete {
                    analyzed: 0,
                    failed: 0
                },
            ]
        );
    }

    #[test]
    fn test_results_keep_job_order() {
        init_tracing();
        // Longer jobs first so later jobs tend to finish earlier
        let jobs = vec![
            tone_job("a", 8000, 440.0, 3.0),
            tone_job("b", 11025, 220.0, 2.0),
            tone_job("c", 8000, 330.0, 1.0),
            tone_job("d", 16000, 550.0, 0.5),
        ];
        let result = pool(3)
            .analyze_all(jobs, None, &CancellationToken::new())
            .unwrap();

        let ids: Vec<&str> = result.outcomes.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(result.analyzed_count, 4);
        assert_eq!(result.failed_count, 0);

        let durations: Vec<f64> = result.features().map(|(_, f)| f.duration_secs).collect();
        assert_eq!(durations.len(), 4);
        assert!((durations[0] - 3.0).abs() < 1e-9);
        assert!((durations[3] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_matches_single_analysis() {
        let job = tone_job("solo", 8000, 440.0, 2.0);
        let expected = TrackAnalyzer::new(AnalyzerConfig::default())
            .unwrap()
            .analyze_buffer(&job.buffer)
            .unwrap();
        let result = pool(1)
            .analyze_all(vec![job], None, &CancellationToken::new())
            .unwrap();
        assert_eq!(result.outcomes[0].result, Ok(expected));
    }

    #[test]
    fn test_failed_job_does_not_stop_batch() {
        init_tracing();
        let empty = AnalysisJob::new("empty", AudioBuffer::mono(8000, Vec::new()).unwrap());
        let jobs = vec![tone_job("ok", 8000, 440.0, 1.0), empty];

        let (tx, rx) = crossbeam_channel::unbounded();
        let result = pool(2)
            .analyze_all(jobs, Some(tx), &CancellationToken::new())
            .unwrap();

        assert_eq!(result.analyzed_count, 1);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.outcomes[1].result, Err(AnalysisError::EmptyBuffer));

        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.contains(&BatchProgress::Failed {
            id: "empty".into(),
            message: AnalysisError::EmptyBuffer.to_string(),
        }));
        assert_eq!(
            events.last(),
            Some(&BatchProgress::Complete {
                analyzed: 1,
                failed: 1
            })
        );
    }

    #[test]
    fn test_pre_cancelled_does_no_work() {
        let token = CancellationToken::new();
        token.cancel();
        let (tx, rx) = crossbeam_channel::unbounded();
        let result = pool(2).analyze_all(vec![tone_job("a", 8000, 440.0, 1.0)], Some(tx), &token);
        assert_eq!(result, Err(BatchError::Cancelled));
        assert!(rx.try_iter().next().is_none());
    }

    #[test]
    fn test_cancel_between_jobs() {
        init_tracing();
        let token = CancellationToken::new();
        let jobs: Vec<_> = (0..4)
            .map(|i| tone_job(&format!("t{i}"), 8000, 440.0, 1.0))
            .collect();
        // Rendezvous channel: the worker blocks on each event until it is taken,
        // so nothing after the first Finished can start before the cancel
        let (tx, rx) = crossbeam_channel::bounded(0);
        let pool = pool(1);

        let (result, events) = thread::scope(|s| {
            let batch = s.spawn(|| pool.analyze_all(jobs, Some(tx), &token));
            let mut events = Vec::new();
            for event in rx.iter() {
                if matches!(event, BatchProgress::Finished { .. }) {
                    token.cancel();
                }
                events.push(event);
            }
            (batch.join().unwrap(), events)
        });

        assert_eq!(result, Err(BatchError::Cancelled));
        let finished = events
            .iter()
            .filter(|e| matches!(e, BatchProgress::Finished { .. }))
            .count();
        assert_eq!(finished, 1);
        assert!(!events
            .iter()
            .any(|e| matches!(e, BatchProgress::Complete { .. })));
    }

    #[test]
    fn test_analyze_async() {
        init_tracing();
        let jobs = vec![tone_job("x", 8000, 440.0, 1.0), tone_job("y", 8000, 660.0, 1.0)];
        let (rx, handle) = pool(2).analyze_async(jobs, CancellationToken::new());

        // The channel closes once the batch thread drops its sender
        let events: Vec<BatchProgress> = rx.iter().collect();
        let result = handle.join().unwrap().unwrap();

        assert_eq!(result.analyzed_count, 2);
        assert_eq!(events.first(), Some(&BatchProgress::Started { total: 2 }));
        let analyzing = events
            .iter()
            .filter(|e| matches!(e, BatchProgress::Analyzing { .. }))
            .count();
        let finished = events
            .iter()
            .filter(|e| matches!(e, BatchProgress::Finished { .. }))
            .count();
        assert_eq!(analyzing, 2);
        assert_eq!(finished, 2);
    }
}
