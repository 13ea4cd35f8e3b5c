//! Polling orchestration over a [`StatusSource`].
//!
//! The tracker owns the records of every tracked job and enforces the
//! polling rules the pure engine cannot:
//!
//! - **One poll in flight per job.** A refresh requested while another is
//!   outstanding is coalesced, not queued.
//! - **Cancellation.** Untracking a job cancels its token; a poll that
//!   finishes afterwards touches nothing.
//! - **Response order.** Every observation of a job (poll or list sync)
//!   takes a sequence number; a poll response older than the last applied
//!   observation is dropped.
//!
//! The lock is never held across an `.await`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::error::{TrackError, TrackResult};
use crate::job::{JobId, JobStatus};
use crate::record::JobRecord;
use crate::snapshot::{parse_create_response, parse_list_response};
use crate::source::{PollConfig, StatusSource};

/// What happened to one refresh request.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Response applied; the job's new status.
    Updated(JobStatus),
    /// Transport failed; recorded as the job's polling error.
    Failed(TrackError),
    /// Another poll of this job was already in flight.
    Coalesced,
    /// A newer observation was applied while this poll was in flight.
    Stale,
    /// The job was untracked while this poll was in flight.
    Cancelled,
}

struct TrackedJob {
    record: JobRecord,
    cancel: CancellationToken,
    /// Sequence number of the poll in flight.
    in_flight: Option<u64>,
    issued: u64,
    applied: u64,
}

impl TrackedJob {
    fn new(record: JobRecord) -> Self {
        Self {
            record,
            cancel: CancellationToken::new(),
            in_flight: None,
            issued: 0,
            applied: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn settle(&mut self) {
        self.in_flight = None;
        self.record.is_polling = false;
        self.record.is_manual_refresh = false;
    }
}

struct PollTicket {
    seq: u64,
    cancel: CancellationToken,
}

/// Clears the in-flight mark if a refresh future is dropped mid-poll.
struct InFlightGuard<'a> {
    jobs: &'a Mutex<FxHashMap<JobId, TrackedJob>>,
    id: &'a JobId,
    seq: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut jobs = self.jobs.lock();
        if let Some(job) = jobs
            .get_mut(self.id)
            .filter(|job| job.in_flight == Some(self.seq))
        {
            job.settle();
        }
    }
}

/// Tracks jobs against one status source.
pub struct JobTracker<S> {
    source: S,
    config: PollConfig,
    jobs: Mutex<FxHashMap<JobId, TrackedJob>>,
}

impl<S: StatusSource> JobTracker<S> {
    /// Create a tracker. Fails if `config` is invalid.
    pub fn new(source: S, config: PollConfig) -> TrackResult<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            jobs: Mutex::new(FxHashMap::default()),
        })
    }

    /// Get the status source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get the polling configuration.
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Start tracking an existing record.
    pub fn track(&self, record: JobRecord) -> TrackResult<()> {
        let mut jobs = self.jobs.lock();
        if jobs.contains_key(&record.id) {
            return Err(TrackError::AlreadyTracked(record.id.to_string()));
        }
        tracing::debug!(job_id = %record.id, stage = %record.status.stage, "Tracking job");
        jobs.insert(record.id.clone(), TrackedJob::new(record));
        Ok(())
    }

    /// Seed and track every task of a create-job response.
    ///
    /// Nothing is tracked unless every task has a distinct id and none is
    /// already tracked.
    pub fn track_created(&self, payload: &Value, now: DateTime<Utc>) -> TrackResult<Vec<JobId>> {
        let records = parse_create_response(payload)
            .into_iter()
            .map(|snapshot| JobRecord::from_snapshot(snapshot, now))
            .collect::<TrackResult<Vec<_>>>()?;
        if records.is_empty() {
            return Err(TrackError::MissingJobId);
        }

        let mut jobs = self.jobs.lock();
        let mut batch = FxHashSet::default();
        if let Some(existing) = records
            .iter()
            .find(|r| jobs.contains_key(&r.id) || !batch.insert(&r.id))
        {
            return Err(TrackError::AlreadyTracked(existing.id.to_string()));
        }
        let ids = records.iter().map(|r| r.id.clone()).collect();
        for record in records {
            tracing::info!(
                job_id = %record.id,
                stage = %record.status.stage,
                source_ref = %record.source_ref,
                "Job created",
            );
            jobs.insert(record.id.clone(), TrackedJob::new(record));
        }
        Ok(ids)
    }

    /// Stop tracking a job, cancelling any poll in flight.
    pub fn untrack(&self, id: &JobId) -> Option<JobRecord> {
        let job = self.jobs.lock().remove(id)?;
        job.cancel.cancel();
        tracing::debug!(job_id = %id, in_flight = job.in_flight.is_some(), "Untracked job");
        Some(job.record)
    }

    /// Snapshot of one record.
    pub fn record(&self, id: &JobId) -> Option<JobRecord> {
        self.jobs.lock().get(id).map(|job| job.record.clone())
    }

    /// Snapshots of all records, ordered by id.
    pub fn records(&self) -> Vec<JobRecord> {
        let mut records: Vec<_> = self
            .jobs
            .lock()
            .values()
            .map(|job| job.record.clone())
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Merge a list-jobs response into tracked records.
    ///
    /// Tasks that are not tracked are ignored. Returns the ids updated.
    pub fn sync_list(&self, payload: &Value, now: DateTime<Utc>) -> Vec<JobId> {
        let mut jobs = self.jobs.lock();
        let mut updated = Vec::new();
        for snapshot in parse_list_response(payload) {
            let Some(job) = snapshot.id.as_ref().and_then(|id| jobs.get_mut(id)) else {
                continue;
            };
            job.applied = job.next_seq();
            job.record.apply_snapshot(snapshot, now);
            updated.push(job.record.id.clone());
        }
        tracing::debug!(count = updated.len(), "Synced job list");
        updated
    }

    /// Fetch a list-jobs response from the source and merge it.
    pub async fn refresh_list(&self) -> TrackResult<Vec<JobId>> {
        let payload = self.source.fetch_jobs().await?;
        Ok(self.sync_list(&payload, Utc::now()))
    }

    /// Poll one job once.
    ///
    /// `manual` marks the record as a user-requested refresh while the poll
    /// is outstanding.
    pub async fn refresh(&self, id: &JobId, manual: bool) -> TrackResult<RefreshOutcome> {
        let Some(ticket) = self.begin_poll(id, manual)? else {
            tracing::debug!(job_id = %id, manual, "Poll already in flight, coalesced");
            return Ok(RefreshOutcome::Coalesced);
        };

        let _guard = InFlightGuard {
            jobs: &self.jobs,
            id,
            seq: ticket.seq,
        };

        tracing::debug!(job_id = %id, seq = ticket.seq, "Polling job");
        let result = tokio::select! {
            _ = ticket.cancel.cancelled() => {
                tracing::debug!(job_id = %id, seq = ticket.seq, "Poll cancelled");
                return Ok(RefreshOutcome::Cancelled);
            }
            result = self.source.fetch_status(id) => result,
        };

        Ok(self.finish_poll(id, &ticket, result, Utc::now()))
    }

    /// Poll a job on the configured interval until it is final.
    ///
    /// A backend-reported failure is a final status, not an `Err`. Transient
    /// transport errors are retried on the next tick; others end polling.
    /// The record is checked after every attempt, so a list sync or another
    /// refresh that finalizes the job also ends the loop.
    pub async fn poll_until_final(&self, id: &JobId) -> TrackResult<JobStatus> {
        let cancel = {
            let jobs = self.jobs.lock();
            let job = jobs
                .get(id)
                .ok_or_else(|| TrackError::JobNotFound(id.to_string()))?;
            if !job.record.needs_polling() {
                return Ok(job.record.status.clone());
            }
            job.cancel.clone()
        };

        let mut polls = 0u32;
        loop {
            match self.refresh(id, false).await? {
                RefreshOutcome::Failed(e) if !e.is_transient() => return Err(e),
                RefreshOutcome::Cancelled => {
                    return Err(TrackError::JobNotFound(id.to_string()));
                }
                _ => {}
            }

            polls += 1;
            if let Some(status) = self.final_status(id)? {
                tracing::info!(job_id = %id, status = %status, polls, "Job finished");
                return Ok(status);
            }
            if self.config.max_polls.is_some_and(|max| polls >= max) {
                tracing::warn!(job_id = %id, polls, "Giving up on job");
                return Err(TrackError::Timeout(id.to_string()));
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(TrackError::JobNotFound(id.to_string())),
                _ = sleep(self.config.interval()) => {}
            }
        }
    }

    fn final_status(&self, id: &JobId) -> TrackResult<Option<JobStatus>> {
        let jobs = self.jobs.lock();
        let job = jobs
            .get(id)
            .ok_or_else(|| TrackError::JobNotFound(id.to_string()))?;
        Ok((!job.record.needs_polling()).then(|| job.record.status.clone()))
    }

    fn begin_poll(&self, id: &JobId, manual: bool) -> TrackResult<Option<PollTicket>> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| TrackError::JobNotFound(id.to_string()))?;
        if job.in_flight.is_some() {
            return Ok(None);
        }
        let seq = job.next_seq();
        job.in_flight = Some(seq);
        job.record.is_polling = true;
        job.record.is_manual_refresh = manual;
        Ok(Some(PollTicket {
            seq,
            cancel: job.cancel.clone(),
        }))
    }

    fn finish_poll(
        &self,
        id: &JobId,
        ticket: &PollTicket,
        result: TrackResult<Value>,
        now: DateTime<Utc>,
    ) -> RefreshOutcome {
        let mut jobs = self.jobs.lock();
        let job = match jobs.get_mut(id) {
            Some(job) if !ticket.cancel.is_cancelled() => job,
            _ => return RefreshOutcome::Cancelled,
        };

        job.settle();

        if ticket.seq <= job.applied {
            tracing::debug!(
                job_id = %id,
                seq = ticket.seq,
                applied = job.applied,
                "Dropping stale response",
            );
            return RefreshOutcome::Stale;
        }

        match result {
            Ok(payload) => {
                job.applied = ticket.seq;
                job.record.apply_status_payload(&payload, now);
                let status = job.record.status.clone();
                tracing::debug!(
                    job_id = %id,
                    seq = ticket.seq,
                    status = %status,
                    "Poll applied",
                );
                RefreshOutcome::Updated(status)
            }
            Err(e) => {
                tracing::warn!(job_id = %id, seq = ticket.seq, error = %e, "Poll failed");
                job.record.record_poll_failure(&e);
                RefreshOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::job::Stage;

    /// Replays scripted responses; the last one repeats forever.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Value, String>>>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: impl IntoIterator<Item = Result<Value, String>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn statuses(tokens: &[&str]) -> Self {
            Self::new(tokens.iter().map(|t| Ok(json!({"data": {"status": t}}))))
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch_status(&self, _job_id: &JobId) -> TrackResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            let next = {
                let mut script = self.script.lock();
                if script.len() > 1 {
                    script.pop_front()
                } else {
                    script.front().cloned()
                }
            };
            match next {
                Some(Ok(payload)) => Ok(payload),
                Some(Err(msg)) => Err(TrackError::Transport(msg)),
                None => Err(TrackError::SourceUnavailable("empty script".into())),
            }
        }
    }

    fn tracker(source: ScriptedSource) -> Arc<JobTracker<ScriptedSource>> {
        let config = PollConfig::every(Duration::from_secs(2)).with_max_polls(20);
        let tracker = JobTracker::new(source, config).unwrap();
        tracker.track(JobRecord::new("t-1", Utc::now())).unwrap();
        Arc::new(tracker)
    }

    fn id() -> JobId {
        JobId::new("t-1")
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_final() {
        let tracker = tracker(ScriptedSource::statuses(&[
            "queued",
            "processing",
            "processing",
            "asr",
            "done",
        ]));

        let status = tracker.poll_until_final(&id()).await.unwrap();
        assert!(status.is_success());

        let record = tracker.record(&id()).unwrap();
        let stages: Vec<Stage> = record.history.iter().map(|e| e.stage).collect();
        assert_eq!(
            stages,
            [Stage::Uploading, Stage::Splitting, Stage::Transcribing, Stage::Complete]
        );
        assert!(!record.is_polling);
        assert_eq!(tracker.source().calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failure_is_final_status() {
        let tracker = tracker(ScriptedSource::new([
            Err("connection reset".into()),
            Ok(json!({"job": {"state": "Failed", "errorMessage": "Unsupported codec"}})),
        ]));

        let status = tracker.poll_until_final(&id()).await.unwrap();
        assert!(status.is_error);
        let record = tracker.record(&id()).unwrap();
        assert_eq!(record.message.as_deref(), Some("Unsupported codec"));
        assert_eq!(record.polling_error, None);
        assert_eq!(record.history.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_keeps_status() {
        let tracker = tracker(ScriptedSource::new([
            Ok(json!({"status": "processing"})),
            Err("502 Bad Gateway".into()),
        ]));

        tracker.refresh(&id(), false).await.unwrap();
        let outcome = tracker.refresh(&id(), true).await.unwrap();
        assert!(matches!(
            outcome,
            RefreshOutcome::Failed(TrackError::Transport(_))
        ));

        let record = tracker.record(&id()).unwrap();
        assert_eq!(record.status.stage, Stage::Splitting);
        assert_eq!(
            record.polling_error.as_deref(),
            Some("Transport error: 502 Bad Gateway")
        );
        assert!(!record.is_manual_refresh);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_polls_times_out() {
        let config = PollConfig::every(Duration::from_secs(1)).with_max_polls(3);
        let tracker = JobTracker::new(ScriptedSource::statuses(&["queued"]), config).unwrap();
        tracker.track(JobRecord::new("t-1", Utc::now())).unwrap();

        let err = tracker.poll_until_final(&id()).await.unwrap_err();
        assert!(matches!(err, TrackError::Timeout(_)));
        assert_eq!(tracker.source().calls.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.record(&id()).unwrap().history.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_coalesced() {
        let source = ScriptedSource::statuses(&["splitting"]).with_delay(Duration::from_secs(1));
        let tracker = tracker(source);

        let first = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.refresh(&id(), false).await }
        });
        tokio::task::yield_now().await;
        assert!(tracker.record(&id()).unwrap().is_polling);

        let second = tracker.refresh(&id(), true).await.unwrap();
        assert!(matches!(second, RefreshOutcome::Coalesced));

        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, RefreshOutcome::Updated(_)));
        assert_eq!(tracker.source().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_untrack_cancels_in_flight_poll() {
        let source = ScriptedSource::statuses(&["done"]).with_delay(Duration::from_secs(5));
        let tracker = tracker(source);

        let poll = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.refresh(&id(), false).await }
        });
        tokio::task::yield_now().await;

        let removed = tracker.untrack(&id()).unwrap();
        assert!(removed.is_polling);

        let outcome = poll.await.unwrap().unwrap();
        assert!(matches!(outcome, RefreshOutcome::Cancelled));
        assert!(tracker.record(&id()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_sync_makes_poll_stale() {
        let source = ScriptedSource::statuses(&["processing"]).with_delay(Duration::from_secs(1));
        let tracker = tracker(source);

        let poll = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.refresh(&id(), false).await }
        });
        tokio::task::yield_now().await;

        let list = json!({"tasks": [
            {"id": "t-1", "status": "asr"},
            {"id": "other", "status": "done"},
        ]});
        assert_eq!(tracker.sync_list(&list, Utc::now()), [id()]);

        let outcome = poll.await.unwrap().unwrap();
        assert!(matches!(outcome, RefreshOutcome::Stale));
        let record = tracker.record(&id()).unwrap();
        assert_eq!(record.status.stage, Stage::Transcribing);
        assert!(!record.is_polling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_sync_finalizes_running_poll() {
        let source = ScriptedSource::statuses(&["processing"]).with_delay(Duration::from_secs(1));
        let tracker = tracker(source);

        let poll = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.poll_until_final(&id()).await }
        });
        tokio::task::yield_now().await;

        let list = json!({"tasks": [{"id": "t-1", "status": "done"}]});
        assert_eq!(tracker.sync_list(&list, Utc::now()), [id()]);

        let status = poll.await.unwrap().unwrap();
        assert!(status.is_success());
        assert_eq!(tracker.source().calls.load(Ordering::SeqCst), 1);
        let record = tracker.record(&id()).unwrap();
        assert!(record.status.is_final);
        assert_eq!(record.status.stage, Stage::Complete);
    }

    #[test]
    fn test_single_item_list_keeps_envelope_out() {
        let tracker = tracker(ScriptedSource::statuses(&["queued"]));
        let list = json!({
            "status": "success",
            "message": "1 job",
            "items": [{"id": "t-1", "progress": 10}],
        });
        assert_eq!(tracker.sync_list(&list, Utc::now()), [id()]);

        let record = tracker.record(&id()).unwrap();
        assert!(record.needs_polling());
        assert_eq!(record.status.stage, Stage::Uploading);
        assert_eq!(record.message, None);
    }

    #[test]
    fn test_track_created_rejects_repeated_id() {
        let source = ScriptedSource::statuses(&["queued"]);
        let tracker = JobTracker::new(source, PollConfig::default()).unwrap();
        let payload = json!({"data": [
            {"jobId": "a", "status": "queued"},
            {"jobId": "a", "status": "processing"},
        ]});

        let err = tracker.track_created(&payload, Utc::now()).unwrap_err();
        assert!(matches!(err, TrackError::AlreadyTracked(dup) if dup == "a"));
        assert!(tracker.records().is_empty());
    }

    #[test]
    fn test_created_job_ignores_envelope_status() {
        let source = ScriptedSource::statuses(&["queued"]);
        let tracker = JobTracker::new(source, PollConfig::default()).unwrap();
        let payload = json!({"status": "success", "task": {"id": "x"}});

        let ids = tracker.track_created(&payload, Utc::now()).unwrap();
        assert!(tracker.record(&ids[0]).unwrap().needs_polling());
    }

    #[test]
    fn test_track_created() {
        let source = ScriptedSource::statuses(&["queued"]);
        let tracker = JobTracker::new(source, PollConfig::default()).unwrap();
        let payload = json!({"ok": true, "data": [
            {"jobId": "a", "status": "created", "url": "https://cdn/a.mp3"},
            {"jobId": "b", "status": "pending"},
        ]});

        let ids = tracker.track_created(&payload, Utc::now()).unwrap();
        assert_eq!(ids, [JobId::new("a"), JobId::new("b")]);
        let records = tracker.records();
        assert_eq!(records[0].source_ref, "https://cdn/a.mp3");
        assert_eq!(records[1].status.stage, Stage::Uploading);

        let err = tracker.track_created(&payload, Utc::now()).unwrap_err();
        assert!(matches!(err, TrackError::AlreadyTracked(_)));

        let err = tracker.track_created(&json!({"ok": true}), Utc::now()).unwrap_err();
        assert!(matches!(err, TrackError::MissingJobId));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_refresh_releases_job() {
        let source = ScriptedSource::statuses(&["asr"]).with_delay(Duration::from_secs(5));
        let tracker = tracker(source);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), tracker.refresh(&id(), true)).await;
        assert!(abandoned.is_err());
        let record = tracker.record(&id()).unwrap();
        assert!(!record.is_polling);
        assert!(!record.is_manual_refresh);

        let outcome = tracker.refresh(&id(), false).await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Updated(_)));
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let tracker = tracker(ScriptedSource::statuses(&["queued"]));
        let missing = JobId::new("nope");
        assert!(matches!(
            tracker.refresh(&missing, true).await,
            Err(TrackError::JobNotFound(_))
        ));
        assert!(matches!(
            tracker.poll_until_final(&missing).await,
            Err(TrackError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_list_unsupported() {
        let tracker = tracker(ScriptedSource::statuses(&["queued"]));
        assert!(matches!(
            tracker.refresh_list().await,
            Err(TrackError::Unsupported(_))
        ));
    }
}
