//! Watch-progress tracking for timed resources.
//!
//! A [`WatchTracker`] hands out one [`WatchHandle`] per displayed resource.
//! The handle counts display seconds, tells the server when watching starts,
//! and persists progress on threshold, completion, a periodic interval and
//! page lifecycle events. Persistence is best effort: failures are logged
//! and never surface to the caller.
//!
//! ```text
//! Idle -> FirstWatchPending -> Tracking -> ThresholdCrossed -> Completed
//!   \______(resumed)_________/
//! ```

use crate::api_client::ClientError;
use async_trait::async_trait;
use lectern_core::{ProgressUpdate, RecordId, WatchRecord, MAX_TRACKED_DURATION_SECS};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Where progress goes.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Tell the server a resource was opened for the first time.
    async fn mark_started(&self, resource_id: &RecordId) -> Result<(), ClientError>;

    async fn save_progress(&self, update: &ProgressUpdate) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Display time counted per tick.
    pub tick: Duration,
    /// Minimum spacing between throttled persists.
    pub throttle_window: Duration,
    /// Spacing of periodic persists while tracking.
    pub persist_interval: Duration,
    /// Resources longer than this are not tracked.
    pub max_duration_secs: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            throttle_window: Duration::from_millis(500),
            persist_interval: Duration::from_secs(10),
            max_duration_secs: MAX_TRACKED_DURATION_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Displayed, not ticked yet.
    Idle,
    /// The first-watch signal is on its way.
    FirstWatchPending,
    Tracking,
    ThresholdCrossed,
    Completed,
}

/// Page lifecycle signals that affect persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    VisibilityHidden,
    VisibilityVisible,
    PageHide,
    BeforeUnload,
}

/// Elapsed display seconds per resource for the current session.
///
/// Shared by every handle of a tracker so a redisplayed resource resumes
/// where it left off.
#[derive(Debug, Clone, Default)]
pub struct WatchPositions {
    inner: Arc<Mutex<HashMap<RecordId, u64>>>,
}

impl WatchPositions {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RecordId, u64>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &RecordId) -> Option<u64> {
        self.lock().get(id).copied()
    }

    pub fn set(&self, id: RecordId, position: u64) {
        self.lock().insert(id, position);
    }

    pub fn remove(&self, id: &RecordId) -> Option<u64> {
        self.lock().remove(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Hands out watch handles for one session.
#[derive(Clone)]
pub struct WatchTracker {
    sink: Arc<dyn ProgressSink>,
    config: TrackerConfig,
    authenticated: bool,
    positions: WatchPositions,
}

impl fmt::Debug for WatchTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchTracker")
            .field("config", &self.config)
            .field("authenticated", &self.authenticated)
            .field("tracked", &self.positions.len())
            .finish()
    }
}

impl WatchTracker {
    pub fn new(sink: Arc<dyn ProgressSink>, config: TrackerConfig, authenticated: bool) -> Self {
        Self {
            sink,
            config,
            authenticated,
            positions: WatchPositions::new(),
        }
    }

    /// Share an existing position map, usually the session's.
    pub fn with_positions(mut self, positions: WatchPositions) -> Self {
        self.positions = positions;
        self
    }

    pub fn positions(&self) -> &WatchPositions {
        &self.positions
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Start tracking a displayed resource.
    ///
    /// Returns `None` for anonymous sessions and for resources without a
    /// duration or longer than the configured ceiling.
    pub fn track(&self, record: WatchRecord) -> Option<WatchHandle> {
        if !self.authenticated {
            tracing::debug!(resource_id = %record.resource_id, "Anonymous session, not tracking");
            return None;
        }
        if !record.is_trackable(self.config.max_duration_secs) {
            tracing::debug!(
                resource_id = %record.resource_id,
                duration = ?record.duration,
                "Resource not trackable"
            );
            return None;
        }

        let remembered = self.positions.get(&record.resource_id);
        let resumed = remembered.is_some() || record.last_position.is_some();
        let position = remembered.or(record.last_position).unwrap_or(0);
        let already_passed = resumed && record.passed_at(position);

        Some(WatchHandle {
            sink: Arc::clone(&self.sink),
            positions: self.positions.clone(),
            throttle: Throttle::new(self.config.throttle_window),
            last_periodic: Instant::now(),
            config: self.config.clone(),
            record,
            position,
            resumed,
            already_passed,
            state: WatchState::Idle,
            paused: false,
        })
    }
}

/// Leading-edge throttle that remembers one trailing call.
#[derive(Debug)]
struct Throttle {
    window: Duration,
    last_fired: Option<Instant>,
    pending: bool,
}

impl Throttle {
    fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: None,
            pending: false,
        }
    }

    fn try_fire(&mut self, now: Instant) -> bool {
        match self.last_fired {
            Some(last) if now.duration_since(last) < self.window => {
                self.pending = true;
                false
            }
            _ => {
                self.fired(now);
                true
            }
        }
    }

    fn fired(&mut self, now: Instant) {
        self.last_fired = Some(now);
        self.pending = false;
    }

    fn deadline(&self) -> Option<Instant> {
        if self.pending {
            self.last_fired.map(|last| last + self.window)
        } else {
            None
        }
    }

    fn trailing_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }
}

/// Progress tracking for one displayed resource.
pub struct WatchHandle {
    record: WatchRecord,
    sink: Arc<dyn ProgressSink>,
    config: TrackerConfig,
    positions: WatchPositions,
    position: u64,
    resumed: bool,
    already_passed: bool,
    state: WatchState,
    paused: bool,
    throttle: Throttle,
    last_periodic: Instant,
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("resource_id", &self.record.resource_id)
            .field("position", &self.position)
            .field("state", &self.state)
            .field("paused", &self.paused)
            .finish()
    }
}

impl WatchHandle {
    pub fn resource_id(&self) -> &RecordId {
        &self.record.resource_id
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Elapsed display seconds.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn progress(&self) -> f64 {
        self.record.progress_at(self.position)
    }

    pub fn passed(&self) -> bool {
        self.record.passed_at(self.position)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn progress_update(&self) -> ProgressUpdate {
        ProgressUpdate {
            resource_id: self.record.resource_id.clone(),
            last_position: self.position,
            last_location: self.record.last_location.clone(),
            watched: watched_bitmap(self.record.duration.unwrap_or(0.0), self.position),
        }
    }

    fn ceiling(&self) -> u64 {
        self.record.duration.map(|d| d.ceil() as u64).unwrap_or(0)
    }

    /// Count one tick of display time.
    pub async fn tick(&mut self) {
        if self.paused || self.state == WatchState::Completed {
            return;
        }

        let ceiling = self.ceiling();
        let step = self.config.tick.as_secs().max(1);
        self.position = self.position.saturating_add(step).min(ceiling);
        self.positions
            .set(self.record.resource_id.clone(), self.position);

        if self.state == WatchState::Idle {
            self.start().await;
        }

        if self.position >= ceiling {
            self.state = WatchState::Completed;
            tracing::debug!(resource_id = %self.record.resource_id, "Resource completed");
            self.flush().await;
            return;
        }

        if self.state == WatchState::Tracking && self.passed() {
            self.state = WatchState::ThresholdCrossed;
            tracing::debug!(
                resource_id = %self.record.resource_id,
                progress = self.progress(),
                "Cutoff progress reached"
            );
            self.flush().await;
            return;
        }

        let now = Instant::now();
        if now.duration_since(self.last_periodic) >= self.config.persist_interval {
            self.last_periodic = now;
            self.persist().await;
        } else {
            self.flush_trailing().await;
        }
    }

    async fn start(&mut self) {
        if !self.resumed {
            self.state = WatchState::FirstWatchPending;
            if let Err(err) = self.sink.mark_started(&self.record.resource_id).await {
                tracing::warn!(
                    resource_id = %self.record.resource_id,
                    error = %err,
                    "Failed to mark resource as started"
                );
            }
        }
        self.state = if self.already_passed {
            WatchState::ThresholdCrossed
        } else {
            WatchState::Tracking
        };
    }

    /// Throttled persist. Returns whether a call went out now; a suppressed
    /// call is sent once the window has passed.
    pub async fn persist(&mut self) -> bool {
        if self.state == WatchState::Idle {
            return false;
        }
        if self.throttle.try_fire(Instant::now()) {
            self.send().await;
            true
        } else {
            tracing::trace!(resource_id = %self.record.resource_id, "Persist throttled");
            false
        }
    }

    /// Persist regardless of the throttle window.
    pub async fn flush(&mut self) {
        if self.state == WatchState::Idle {
            return;
        }
        self.throttle.fired(Instant::now());
        self.send().await;
    }

    async fn flush_trailing(&mut self) {
        if self.throttle.trailing_due(Instant::now()) {
            self.flush().await;
        }
    }

    async fn send(&self) {
        let update = self.progress_update();
        if let Err(err) = self.sink.save_progress(&update).await {
            tracing::warn!(
                resource_id = %update.resource_id,
                last_position = update.last_position,
                error = %err,
                "Failed to save watch progress"
            );
        }
    }

    pub async fn page_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::VisibilityHidden => {
                self.persist().await;
                self.paused = true;
            }
            PageEvent::VisibilityVisible => self.paused = false,
            PageEvent::PageHide | PageEvent::BeforeUnload => self.flush().await,
        }
    }

    /// Drive the handle until the resource completes or the event channel
    /// closes. Closing the channel is the unmount signal.
    pub async fn run(mut self, mut events: mpsc::Receiver<PageEvent>) -> WatchState {
        let mut ticker = time::interval_at(Instant::now() + self.config.tick, self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let trailing = self.throttle.deadline();
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                    if self.state == WatchState::Completed {
                        break;
                    }
                }
                event = events.recv() => match event {
                    Some(event) => self.page_event(event).await,
                    None => {
                        tracing::debug!(resource_id = %self.record.resource_id, "Watch handle unmounted");
                        self.persist().await;
                        break;
                    }
                },
                _ = wait_until(trailing) => self.flush_trailing().await,
            }
        }

        self.state
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Seconds watched as a bitmap, one bit per second of `duration`, most
/// significant bit first, hex encoded.
pub fn watched_bitmap(duration: f64, last_position: u64) -> String {
    if duration.is_nan() || duration <= 0.0 {
        return String::new();
    }
    let seconds = duration.ceil() as u64;
    let watched = last_position.min(seconds);

    let mut bytes = vec![0u8; seconds.div_ceil(8) as usize];
    let full = (watched / 8) as usize;
    bytes[..full].fill(0xFF);
    let rest = watched % 8;
    if rest > 0 {
        bytes[full] = 0xFF << (8 - rest);
    }
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Capture {
        started: StdMutex<Vec<RecordId>>,
        saved: StdMutex<Vec<ProgressUpdate>>,
        fail: bool,
    }

    impl Capture {
        fn saved(&self) -> Vec<ProgressUpdate> {
            self.saved.lock().expect("lock").clone()
        }

        fn started(&self) -> usize {
            self.started.lock().expect("lock").len()
        }
    }

    #[async_trait]
    impl ProgressSink for Capture {
        async fn mark_started(&self, resource_id: &RecordId) -> Result<(), ClientError> {
            self.started.lock().expect("lock").push(resource_id.clone());
            Ok(())
        }

        async fn save_progress(&self, update: &ProgressUpdate) -> Result<(), ClientError> {
            self.saved.lock().expect("lock").push(update.clone());
            if self.fail {
                return Err(ClientError::Status {
                    status: 500,
                    message: "down".to_string(),
                });
            }
            Ok(())
        }
    }

    fn tracker(sink: &Arc<Capture>) -> WatchTracker {
        WatchTracker::new(sink.clone(), TrackerConfig::default(), true)
    }

    #[test]
    fn test_bitmap_layout() {
        assert_eq!(watched_bitmap(10.0, 0), "0000");
        assert_eq!(watched_bitmap(10.0, 3), "e000");
        assert_eq!(watched_bitmap(10.0, 8), "ff00");
        assert_eq!(watched_bitmap(10.0, 10), "ffc0");
        assert_eq!(watched_bitmap(10.0, 99), "ffc0");
        assert_eq!(watched_bitmap(0.0, 5), "");
    }

    #[test]
    fn test_untrackable_resources() {
        let sink = Arc::new(Capture::default());
        let tracker = tracker(&sink);
        assert!(tracker.track(WatchRecord::new("a", None, 80.0)).is_none());
        assert!(tracker.track(WatchRecord::new("b", Some(0.0), 80.0)).is_none());
        assert!(tracker.track(WatchRecord::new("c", Some(10_801.0), 80.0)).is_none());
        assert!(tracker.track(WatchRecord::new("d", Some(10_800.0), 80.0)).is_some());

        let anonymous = WatchTracker::new(sink, TrackerConfig::default(), false);
        assert!(anonymous.track(WatchRecord::new("d", Some(60.0), 80.0)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_marks_started_once() {
        let sink = Arc::new(Capture::default());
        let mut handle = tracker(&sink)
            .track(WatchRecord::new("v1", Some(100.0), 80.0))
            .expect("trackable");
        assert_eq!(handle.state(), WatchState::Idle);

        handle.tick().await;
        handle.tick().await;

        assert_eq!(sink.started(), 1);
        assert_eq!(handle.state(), WatchState::Tracking);
        assert_eq!(handle.position(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resumed_resource_skips_first_watch() {
        let sink = Arc::new(Capture::default());
        let mut handle = tracker(&sink)
            .track(WatchRecord::new("v1", Some(100.0), 80.0).with_position(40))
            .expect("trackable");
        handle.tick().await;
        assert_eq!(sink.started(), 0);
        assert_eq!(handle.position(), 41);
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_persists_immediately_once() {
        let sink = Arc::new(Capture::default());
        let mut handle = tracker(&sink)
            .track(WatchRecord::new("v1", Some(10.0), 50.0))
            .expect("trackable");

        for _ in 0..5 {
            handle.tick().await;
        }
        assert_eq!(handle.state(), WatchState::ThresholdCrossed);
        let saved = sink.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].last_position, 5);

        handle.tick().await;
        assert_eq!(sink.saved().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_stops_ticking() {
        let sink = Arc::new(Capture::default());
        let mut handle = tracker(&sink)
            .track(WatchRecord::new("v1", Some(2.5), 100.0))
            .expect("trackable");

        for _ in 0..6 {
            handle.tick().await;
        }
        assert_eq!(handle.state(), WatchState::Completed);
        assert_eq!(handle.position(), 3);
        let saved = sink.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].watched, "e0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_sends_leading_then_trailing() {
        let sink = Arc::new(Capture::default());
        let mut handle = tracker(&sink)
            .track(WatchRecord::new("v1", Some(100.0), 90.0))
            .expect("trackable");
        handle.tick().await;

        for _ in 0..10 {
            handle.persist().await;
            time::advance(Duration::from_millis(40)).await;
        }
        assert_eq!(sink.saved().len(), 1);

        time::advance(Duration::from_millis(200)).await;
        handle.tick().await;
        let saved = sink.saved();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].last_position, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unload_flush_ignores_throttle() {
        let sink = Arc::new(Capture::default());
        let mut handle = tracker(&sink)
            .track(WatchRecord::new("v1", Some(100.0), 90.0))
            .expect("trackable");
        handle.tick().await;
        handle.persist().await;
        handle.page_event(PageEvent::PageHide).await;
        handle.page_event(PageEvent::BeforeUnload).await;
        assert_eq!(sink.saved().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_page_pauses_counter() {
        let sink = Arc::new(Capture::default());
        let mut handle = tracker(&sink)
            .track(WatchRecord::new("v1", Some(100.0), 90.0))
            .expect("trackable");
        handle.tick().await;
        handle.page_event(PageEvent::VisibilityHidden).await;
        handle.tick().await;
        assert_eq!(handle.position(), 1);
        assert!(handle.is_paused());

        handle.page_event(PageEvent::VisibilityVisible).await;
        handle.tick().await;
        assert_eq!(handle.position(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redisplay_reuses_position() {
        let sink = Arc::new(Capture::default());
        let tracker = tracker(&sink);
        let mut first = tracker
            .track(WatchRecord::new("v1", Some(100.0), 90.0))
            .expect("trackable");
        for _ in 0..7 {
            first.tick().await;
        }
        drop(first);

        let mut second = tracker
            .track(WatchRecord::new("v1", Some(100.0), 90.0))
            .expect("trackable");
        assert_eq!(second.position(), 7);
        second.tick().await;
        assert_eq!(second.position(), 8);
        assert_eq!(sink.started(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_persist_is_swallowed() {
        let sink = Arc::new(Capture {
            fail: true,
            ..Capture::default()
        });
        let mut handle = tracker(&sink)
            .track(WatchRecord::new("v1", Some(100.0), 90.0))
            .expect("trackable");
        handle.tick().await;
        handle.flush().await;
        assert_eq!(sink.saved().len(), 1);
        assert_eq!(handle.state(), WatchState::Tracking);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_completion() {
        let sink = Arc::new(Capture::default());
        let handle = tracker(&sink)
            .track(WatchRecord::new("v1", Some(3.0), 100.0))
            .expect("trackable");
        let (_tx, rx) = mpsc::channel(4);

        let state = handle.run(rx).await;
        assert_eq!(state, WatchState::Completed);
        assert_eq!(sink.saved().last().map(|u| u.last_position), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_unmount_persists() {
        let sink = Arc::new(Capture::default());
        let handle = tracker(&sink)
            .track(WatchRecord::new("v1", Some(600.0), 90.0))
            .expect("trackable");
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(handle.run(rx));

        time::sleep(Duration::from_millis(2_500)).await;
        drop(tx);
        let state = task.await.expect("join");

        assert_eq!(state, WatchState::Tracking);
        assert_eq!(sink.saved().last().map(|u| u.last_position), Some(2));
    }

    proptest! {
        #[test]
        fn prop_bitmap_length_tracks_duration(duration in 1u32..10_800, position in 0u64..20_000) {
            let bitmap = watched_bitmap(duration as f64, position);
            let bytes = (duration as usize).div_ceil(8);
            prop_assert_eq!(bitmap.len(), bytes * 2);

            let decoded = hex::decode(&bitmap).expect("hex");
            let ones: u32 = decoded.iter().map(|b| b.count_ones()).sum();
            prop_assert_eq!(ones as u64, position.min(duration as u64));
        }
    }
}
