//! Concurrent liveness probing
//!
//! Jobs are pushed onto a shared crossbeam queue and drained by a bounded set
//! of scoped worker threads. Workers only see `(id, url)` pairs; results flow
//! back over a second channel and are collected into a map keyed by node id,
//! so completion order does not matter.
//!
//! Cancellation is cooperative: once the shared flag is set, workers stop
//! taking jobs, backoff sleeps end early, and in-flight requests run into
//! their timeout.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::unbounded;
use tracing::{debug, info, instrument, trace};
use url::Url;

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{FailureKind, NodeId, ProbeOutcome, ProbeResult};
use crate::infrastructure::http::HttpClientConfig;
use crate::infrastructure::traits::HttpClient;

pub const DEFAULT_USER_AGENT: &str = "SafariBookmarkPruner/1.0";

const MAX_BACKOFF: Duration = Duration::from_secs(30);
const SLEEP_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    pub timeout: Duration,
    pub max_redirects: usize,
    /// Total requests per url, including the first
    pub max_attempts: u32,
    pub workers: usize,
    /// Delay before the first retry; doubles on each further retry
    pub backoff: Duration,
    pub user_agent: String,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_redirects: 10,
            max_attempts: 3,
            workers: 8,
            backoff: Duration::from_millis(500),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ProbeOptions {
    pub fn validate(&self) -> ApplicationResult<()> {
        if self.timeout.is_zero() {
            return Err(ApplicationError::config("probe timeout must be greater than zero"));
        }
        if self.workers == 0 {
            return Err(ApplicationError::config("probe workers must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(ApplicationError::config("probe attempts must be at least 1"));
        }
        Ok(())
    }

    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: self.timeout,
            max_redirects: self.max_redirects,
            user_agent: self.user_agent.clone(),
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt.saturating_sub(1)).min(16);
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeJob {
    pub id: NodeId,
    pub url: String,
}

/// Completion counter passed to result callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

#[derive(Debug, Default)]
pub struct ProbeReport {
    pub results: HashMap<NodeId, ProbeResult>,
    /// Jobs a worker actually started
    pub dispatched: usize,
    pub cancelled: bool,
}

pub struct LivenessProber {
    client: Arc<dyn HttpClient>,
    options: ProbeOptions,
    cancel: Arc<AtomicBool>,
}

impl LivenessProber {
    pub fn new(
        client: Arc<dyn HttpClient>,
        options: ProbeOptions,
        cancel: Arc<AtomicBool>,
    ) -> ApplicationResult<Self> {
        options.validate()?;
        Ok(Self {
            client,
            options,
            cancel,
        })
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Probe a single url, retrying transient failures.
    ///
    /// Urls that do not parse, lack a host, or use a scheme other than
    /// http/https fail as [`FailureKind::MalformedUrl`] without a request.
    pub fn probe(&self, id: NodeId, url: &str) -> ProbeResult {
        let parsed = match parse_probe_url(url) {
            Ok(parsed) => parsed,
            Err(kind) => return ProbeResult::new(id, ProbeOutcome::Failed(kind), 1),
        };

        let mut attempt = 1;
        loop {
            match self.client.fetch_status(&parsed) {
                Ok(code) => return ProbeResult::new(id, ProbeOutcome::Status(code), attempt),
                Err(kind)
                    if kind.is_transient()
                        && attempt < self.options.max_attempts
                        && !self.is_cancelled() =>
                {
                    let delay = self.options.backoff_for(attempt);
                    trace!(%url, attempt, %kind, ?delay, "transient failure, retrying");
                    if !self.sleep_unless_cancelled(delay) {
                        return ProbeResult::new(id, ProbeOutcome::Failed(kind), attempt);
                    }
                    attempt += 1;
                }
                Err(kind) => return ProbeResult::new(id, ProbeOutcome::Failed(kind), attempt),
            }
        }
    }

    /// Probe all jobs on the worker pool.
    ///
    /// `on_result` runs on the calling thread once per finished probe, in
    /// completion order, together with the running count.
    #[instrument(level = "debug", skip_all, fields(jobs = jobs.len()))]
    pub fn probe_all<F>(&self, jobs: Vec<ProbeJob>, mut on_result: F) -> ProbeReport
    where
        F: FnMut(&ProbeResult, Progress),
    {
        let mut report = ProbeReport::default();
        if jobs.is_empty() {
            return report;
        }

        let total = jobs.len();
        let worker_count = self.options.workers.min(total).max(1);
        let dispatched = AtomicUsize::new(0);
        let (job_tx, job_rx) = unbounded::<ProbeJob>();
        let (result_tx, result_rx) = unbounded::<ProbeResult>();
        for job in jobs {
            // receiver is alive until the scope below ends
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let started = Instant::now();
        thread::scope(|scope| {
            for _ in 0..worker_count {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let dispatched = &dispatched;
                scope.spawn(move || {
                    for job in job_rx {
                        if self.is_cancelled() {
                            break;
                        }
                        dispatched.fetch_add(1, Ordering::Relaxed);
                        let result = self.probe(job.id, &job.url);
                        if result_tx.send(result).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            for (done, result) in result_rx.into_iter().enumerate() {
                on_result(
                    &result,
                    Progress {
                        done: done + 1,
                        total,
                    },
                );
                report.results.insert(result.id, result);
            }
        });

        report.dispatched = dispatched.into_inner();
        report.cancelled = self.is_cancelled();
        info!(
            probed = report.results.len(),
            workers = worker_count,
            cancelled = report.cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "probing finished"
        );
        report
    }

    /// Sleep for `delay`; returns false if cancellation interrupted it.
    fn sleep_unless_cancelled(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.is_cancelled() {
                debug!("backoff interrupted by cancellation");
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

fn parse_probe_url(url: &str) -> Result<Url, FailureKind> {
    let parsed = Url::parse(url.trim()).map_err(|_| FailureKind::MalformedUrl)?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some_and(|h| !h.is_empty()) => Ok(parsed),
        _ => Err(FailureKind::MalformedUrl),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_non_http_schemes_when_parsing_then_malformed() {
        assert_eq!(
            parse_probe_url("javascript:alert(1)"),
            Err(FailureKind::MalformedUrl)
        );
        assert_eq!(
            parse_probe_url("file:///etc/hosts"),
            Err(FailureKind::MalformedUrl)
        );
        assert_eq!(parse_probe_url("not a url"), Err(FailureKind::MalformedUrl));
        assert!(parse_probe_url("https://example.com/a").is_ok());
    }

    #[test]
    fn given_base_backoff_when_retrying_then_delay_doubles_up_to_cap() {
        let options = ProbeOptions {
            backoff: Duration::from_millis(100),
            ..ProbeOptions::default()
        };
        assert_eq!(options.backoff_for(1), Duration::from_millis(100));
        assert_eq!(options.backoff_for(2), Duration::from_millis(200));
        assert_eq!(options.backoff_for(3), Duration::from_millis(400));
        assert_eq!(options.backoff_for(40), MAX_BACKOFF);
    }

    #[test]
    fn given_zero_timeout_when_validating_then_config_error() {
        let options = ProbeOptions {
            timeout: Duration::ZERO,
            ..ProbeOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ApplicationError::Config { .. })
        ));
    }
}
