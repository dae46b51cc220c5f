use log::{debug, error, warn};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until};

/// Admission limits: at most `max_starts` job starts in any `window`, and at
/// most `max_concurrent` jobs running at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    max_starts: usize,
    window: Duration,
    max_concurrent: usize,
}

impl Quota {
    /// `None` if any limit is zero, since such a quota could never admit work.
    pub fn new(max_starts: usize, window: Duration, max_concurrent: usize) -> Option<Self> {
        if max_starts == 0 || window.is_zero() || max_concurrent == 0 {
            return None;
        }
        Some(Self { max_starts, window, max_concurrent })
    }

    pub fn max_starts(&self) -> usize {
        self.max_starts
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

/// A unit of deferred work with its arguments already bound.
pub trait Job: Send + 'static {
    type Output: Send + 'static;

    /// Short label for logs.
    fn describe(&self) -> String;

    fn run(self) -> impl Future<Output = Self::Output> + Send;
}

/// FIFO job queue that only starts work inside its [`Quota`].
///
/// Jobs are never retried, reordered or deduplicated. A job that never
/// finishes keeps its concurrency slot forever.
pub struct RateLimitedScheduler<J: Job> {
    quota: Quota,
    queue: VecDeque<J>,
    slots: Arc<Semaphore>,
    /// Start instants inside the current window, oldest first. Survives
    /// across `schedule` calls so consecutive batches share one budget.
    starts: VecDeque<Instant>,
}

impl<J: Job> RateLimitedScheduler<J> {
    pub fn new(quota: Quota) -> Self {
        Self {
            quota,
            queue: VecDeque::new(),
            slots: Arc::new(Semaphore::new(quota.max_concurrent)),
            starts: VecDeque::with_capacity(quota.max_starts),
        }
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }

    pub fn submit(&mut self, job: J) {
        debug!("queued {}", job.describe());
        self.queue.push_back(job);
    }

    /// Jobs submitted but not yet admitted.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Run everything queued, admitting in submission order, and wait for all
    /// admitted jobs to finish. Outputs come back in completion order.
    pub async fn schedule(&mut self) -> Vec<J::Output> {
        let mut running = JoinSet::new();

        while let Some(job) = self.queue.pop_front() {
            let Ok(permit) = self.slots.clone().acquire_owned().await else {
                error!("scheduler slots closed; dropping {} queued jobs", self.queue.len() + 1);
                self.queue.clear();
                break;
            };
            self.wait_for_window().await;

            debug!("starting {}", job.describe());
            running.spawn(async move {
                let output = job.run().await;
                drop(permit);
                output
            });
        }

        let mut outputs = Vec::with_capacity(running.len());
        while let Some(joined) = running.join_next().await {
            match joined {
                Ok(output) => outputs.push(output),
                Err(e) => warn!("job did not complete: {e}"),
            }
        }
        outputs
    }

    /// Wait until a start fits in the sliding window, then record it.
    async fn wait_for_window(&mut self) {
        loop {
            let now = Instant::now();
            while self
                .starts
                .front()
                .is_some_and(|&t| t + self.quota.window <= now)
            {
                self.starts.pop_front();
            }

            if self.starts.len() < self.quota.max_starts {
                self.starts.push_back(now);
                return;
            }

            let Some(&oldest) = self.starts.front() else {
                continue;
            };
            let reopens = oldest + self.quota.window;
            debug!("start quota exhausted; waiting {:?}", reopens - now);
            sleep_until(reopens).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    #[derive(Default)]
    struct Probe {
        starts: Mutex<Vec<(usize, Instant)>>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    struct ProbeJob {
        id: usize,
        hold: Duration,
        fail: bool,
        probe: Arc<Probe>,
    }

    impl Job for ProbeJob {
        type Output = Result<usize, String>;

        fn describe(&self) -> String {
            format!("probe #{}", self.id)
        }

        async fn run(self) -> Self::Output {
            self.probe.starts.lock().unwrap().push((self.id, Instant::now()));
            let now_active = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.probe.peak.fetch_max(now_active, Ordering::SeqCst);
            sleep(self.hold).await;
            self.probe.active.fetch_sub(1, Ordering::SeqCst);
            if self.fail { Err(format!("probe #{} failed", self.id)) } else { Ok(self.id) }
        }
    }

    fn quota(max_starts: usize, window_secs: u64, max_concurrent: usize) -> Quota {
        Quota::new(max_starts, Duration::from_secs(window_secs), max_concurrent).unwrap()
    }

    fn submit_probes(
        scheduler: &mut RateLimitedScheduler<ProbeJob>,
        probe: &Arc<Probe>,
        count: usize,
        hold: Duration,
    ) {
        for id in 0..count {
            scheduler.submit(ProbeJob { id, hold, fail: false, probe: probe.clone() });
        }
    }

    fn max_starts_in_any_window(starts: &[(usize, Instant)], window: Duration) -> usize {
        starts
            .iter()
            .map(|&(_, from)| {
                starts
                    .iter()
                    .filter(|&&(_, t)| t >= from && t < from + window)
                    .count()
            })
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert!(Quota::new(0, Duration::from_secs(60), 5).is_none());
        assert!(Quota::new(5, Duration::ZERO, 5).is_none());
        assert!(Quota::new(5, Duration::from_secs(60), 0).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_never_exceeds_starts_per_window() {
        let probe = Arc::new(Probe::default());
        let mut scheduler = RateLimitedScheduler::new(quota(5, 60, 5));
        submit_probes(&mut scheduler, &probe, 12, Duration::from_secs(1));

        let began = Instant::now();
        let outputs = scheduler.schedule().await;

        assert_eq!(outputs.len(), 12);
        let starts = probe.starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 12);
        assert!(max_starts_in_any_window(&starts, Duration::from_secs(60)) <= 5);
        // Three batches of five: the last batch can't open before two windows pass.
        let last = starts.iter().map(|&(_, t)| t).max().unwrap();
        assert!(last - began >= Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_cap_holds_with_loose_start_quota() {
        let probe = Arc::new(Probe::default());
        let mut scheduler = RateLimitedScheduler::new(quota(100, 60, 2));
        submit_probes(&mut scheduler, &probe, 7, Duration::from_secs(10));

        scheduler.schedule().await;

        assert_eq!(probe.peak.load(Ordering::SeqCst), 2);
        assert_eq!(probe.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn admission_is_fifo() {
        let probe = Arc::new(Probe::default());
        let mut scheduler = RateLimitedScheduler::new(quota(2, 5, 1));
        submit_probes(&mut scheduler, &probe, 6, Duration::from_millis(100));

        scheduler.schedule().await;

        let order: Vec<usize> = probe.starts.lock().unwrap().iter().map(|&(id, _)| id).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn window_budget_carries_across_batches() {
        let probe = Arc::new(Probe::default());
        let mut scheduler = RateLimitedScheduler::new(quota(3, 60, 3));

        submit_probes(&mut scheduler, &probe, 3, Duration::from_secs(1));
        scheduler.schedule().await;
        submit_probes(&mut scheduler, &probe, 3, Duration::from_secs(1));
        assert_eq!(scheduler.pending(), 3);
        scheduler.schedule().await;

        let starts = probe.starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 6);
        assert!(max_starts_in_any_window(&starts, Duration::from_secs(60)) <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_disturb_siblings() {
        let probe = Arc::new(Probe::default());
        let mut scheduler = RateLimitedScheduler::new(quota(10, 60, 3));
        for id in 0..6 {
            scheduler.submit(ProbeJob {
                id,
                hold: Duration::from_secs(1),
                fail: id % 2 == 0,
                probe: probe.clone(),
            });
        }

        let outputs = scheduler.schedule().await;

        assert_eq!(outputs.len(), 6);
        assert_eq!(outputs.iter().filter(|o| o.is_err()).count(), 3);
        assert_eq!(probe.active.load(Ordering::SeqCst), 0);
    }

    struct Panicky {
        id: usize,
        done: Arc<AtomicUsize>,
    }

    impl Job for Panicky {
        type Output = usize;

        fn describe(&self) -> String {
            format!("panicky #{}", self.id)
        }

        async fn run(self) -> usize {
            if self.id == 1 {
                panic!("job #1 blew up");
            }
            self.done.fetch_add(1, Ordering::SeqCst);
            self.id
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_job_releases_its_slot() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut scheduler = RateLimitedScheduler::new(quota(10, 60, 1));
        for id in 0..4 {
            scheduler.submit(Panicky { id, done: done.clone() });
        }

        let outputs = scheduler.schedule().await;

        assert_eq!(outputs.len(), 3);
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }
}
