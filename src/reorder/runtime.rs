//! Serialized reorder runtime: one event loop, one ticker, one persist worker.
//!
//! Touch events from the host and auto-scroll ticks both funnel through a
//! single channel, so the [`DragController`] only ever executes on the loop
//! thread — platforms with parallel timer callbacks get their marshaling here
//! for free. The SQLite commit is the only asynchronous edge: it runs on a
//! dedicated worker thread so a release never blocks the gesture path, at the
//! cost of eventual (not strictly serializable) consistency with storage.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::journal::{JournalEntry, JournalWriter};
use crate::model::section::{SectionKey, TimePeriod};
use crate::reorder::drag::{
    DragCmd, DragController, FrameSection, FrameSnapshot, GestureEvent, ScrollMetrics, SectionRect,
};
use crate::reorder::heights::HeightOracle;
use crate::store::position::PositionStore;

// ──────────────────── host traits ────────────────────

/// Current on-screen layout of sections, queried only at touch-start.
pub trait SectionSurface {
    /// Screen rectangle of a section, or `None` when it is not laid out yet.
    fn measure(&self, key: &SectionKey) -> Option<SectionRect>;
}

/// Scroll container control consumed during a drag.
pub trait ScrollHost {
    /// Enable or disable the container's native scrolling.
    fn set_scroll_enabled(&mut self, enabled: bool);
    /// Scroll to an absolute offset.
    fn scroll_to(&mut self, y: f64);
    /// Current scroll offset.
    fn scroll_offset(&self) -> f64;
    /// `(visible_height, content_height)` of the container.
    fn content_extent(&self) -> (f64, f64);
    /// Top edge of the viewport in screen coordinates.
    fn viewport_top(&self) -> f64 {
        0.0
    }
}

/// Plays the geometric animation driven by the controller's commands.
pub trait ViewAnimator {
    /// Apply a visual translation to the dragged section.
    fn translate(&mut self, key: &SectionKey, y: f64);
    /// Shift a displaced sibling into the vacated slot.
    fn reseat(&mut self, key: &SectionKey, dy: f64);
    /// Animate the dragged section back to its resting offset.
    fn settle(&mut self, key: &SectionKey);
}

/// Persistence boundary for reorder commits.
///
/// Must tolerate being invoked again for a different section before a prior
/// call's effect is observed; the runtime serializes calls through one worker.
pub trait ReorderSink: Send + 'static {
    /// Persist a net displacement for one section.
    fn persist_reorder(&self, key: &SectionKey, delta: i64) -> Result<()>;
}

#[cfg(feature = "sqlite")]
impl ReorderSink for crate::store::sqlite::SectionDb {
    fn persist_reorder(&self, key: &SectionKey, delta: i64) -> Result<()> {
        Self::persist_reorder(self, key, delta)
    }
}

// ──────────────────── events ────────────────────

/// Events accepted by the runtime loop.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Long-press entered edit mode.
    EditEnter,
    /// Edit mode left.
    EditExit,
    /// Finger down.
    TouchStart { touch_y: f64 },
    /// Finger moved; `finger_dy` is cumulative since touch-start.
    TouchMove { finger_dy: f64, touch_y: f64 },
    /// Finger lifted.
    Release,
    /// Gesture terminated by the platform.
    Cancel,
    /// Active time-period tab changed.
    SetPeriod(TimePeriod),
    /// Internal: one auto-scroll ticker tick.
    Tick,
    /// Stop the loop.
    Shutdown,
}

// ──────────────────── ticker ────────────────────

/// Cancellable handle to the auto-scroll ticker thread. One handle exists at
/// a time; stopping is idempotent via the shared flag.
struct TickerHandle {
    stop: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl TickerHandle {
    fn spawn(tx: Sender<UiEvent>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let join = thread::Builder::new()
            .name("hg-autoscroll".to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::Relaxed) {
                    if tx.send(UiEvent::Tick).is_err() {
                        break;
                    }
                    thread::sleep(interval);
                }
            })
            .ok();
        Self { stop, join }
    }

    fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

// ──────────────────── persistence worker ────────────────────

#[derive(Debug)]
struct PersistJob {
    key: SectionKey,
    delta: i64,
}

struct PersistWorker {
    tx: Option<Sender<PersistJob>>,
    join: Option<thread::JoinHandle<()>>,
}

impl PersistWorker {
    /// Spawn the worker owning the sink and the journal. Jobs are applied in
    /// queue order; a failed commit is journaled and swallowed — the
    /// in-memory order is deliberately not rolled back.
    fn spawn(sink: Box<dyn ReorderSink>, mut journal: JournalWriter) -> Self {
        let (tx, rx): (Sender<PersistJob>, Receiver<PersistJob>) = unbounded();
        let join = thread::Builder::new()
            .name("hg-persist".to_string())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    match sink.persist_reorder(&job.key, job.delta) {
                        Ok(()) => {
                            journal.write_entry(&JournalEntry::commit(&job.key, job.delta));
                        }
                        Err(err) => {
                            eprintln!("[HG-REORDER] persist failure for {}: {err}", job.key);
                            journal.write_entry(&JournalEntry::failure(
                                &job.key,
                                job.delta,
                                err.code(),
                                &err.to_string(),
                            ));
                        }
                    }
                }
            })
            .ok();
        Self { tx: Some(tx), join }
    }

    fn enqueue(&self, key: SectionKey, delta: i64) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(PersistJob { key, delta });
        }
    }

    /// Drop the queue and wait for in-flight jobs to finish.
    fn shutdown(mut self) {
        self.tx.take();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

// ──────────────────── runtime ────────────────────

/// The engine's serialized execution context.
///
/// Owns the [`PositionStore`], the [`DragController`], the height oracle, and
/// the host view; executes drag commands; and forwards commits to the
/// persistence worker.
pub struct ReorderRuntime<V> {
    controller: DragController,
    store: PositionStore,
    oracle: HeightOracle,
    period: TimePeriod,
    view: V,
    tick_interval: Duration,
    ticker: Option<TickerHandle>,
    worker: PersistWorker,
    events_tx: Sender<UiEvent>,
    events_rx: Receiver<UiEvent>,
}

impl<V> ReorderRuntime<V>
where
    V: SectionSurface + ScrollHost + ViewAnimator,
{
    /// Build a runtime over a hydrated store, a host view, and a persistence
    /// sink. The journal records every commit outcome.
    #[must_use]
    pub fn new(
        config: &Config,
        store: PositionStore,
        view: V,
        sink: Box<dyn ReorderSink>,
    ) -> Self {
        let (events_tx, events_rx) = unbounded();
        let journal = JournalWriter::open(&config.paths.journal_log);
        Self {
            controller: DragController::new(&config.layout, config.autoscroll.clone()),
            store,
            oracle: HeightOracle::new(config.layout.clone()),
            period: TimePeriod::Daily,
            view,
            tick_interval: Duration::from_millis(config.autoscroll.tick_interval_ms),
            ticker: None,
            worker: PersistWorker::spawn(sink, journal),
            events_tx,
            events_rx,
        }
    }

    /// Sender for host input events. Clone freely; all clones feed the same
    /// serialized loop.
    #[must_use]
    pub fn sender(&self) -> Sender<UiEvent> {
        self.events_tx.clone()
    }

    /// The owned section store (loop-thread access only).
    #[must_use]
    pub const fn store(&self) -> &PositionStore {
        &self.store
    }

    /// Mutable store access for CRUD outside a drag.
    pub const fn store_mut(&mut self) -> &mut PositionStore {
        &mut self.store
    }

    /// Active time period.
    #[must_use]
    pub const fn period(&self) -> TimePeriod {
        self.period
    }

    /// The host view (for tests and diagnostics).
    #[must_use]
    pub const fn view(&self) -> &V {
        &self.view
    }

    /// Whether a drag is currently in flight.
    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        self.controller.is_dragging()
    }

    /// Run the loop until [`UiEvent::Shutdown`] arrives, then drain the
    /// persistence queue and return the store.
    pub fn run(mut self) -> PositionStore {
        loop {
            match self.events_rx.recv() {
                Ok(UiEvent::Shutdown) | Err(_) => break,
                Ok(event) => self.process(event),
            }
        }
        self.shutdown()
    }

    /// Stop the ticker, drain the persistence queue, and return the store.
    pub fn shutdown(mut self) -> PositionStore {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop();
        }
        self.worker.shutdown();
        self.store
    }

    /// Apply one event synchronously. This is the loop body; tests drive it
    /// directly to stay deterministic.
    pub fn process(&mut self, event: UiEvent) {
        let gesture = match event {
            UiEvent::EditEnter => GestureEvent::EditEnter,
            UiEvent::EditExit => GestureEvent::EditExit,
            UiEvent::TouchStart { touch_y } => GestureEvent::TouchStart {
                touch_y,
                frame: self.build_frame(),
            },
            UiEvent::TouchMove {
                finger_dy,
                touch_y,
            } => GestureEvent::TouchMove {
                finger_dy,
                touch_y,
            },
            UiEvent::Release => GestureEvent::Release,
            UiEvent::Cancel => GestureEvent::Cancel,
            UiEvent::Tick => GestureEvent::AutoScrollTick,
            UiEvent::SetPeriod(period) => {
                // Switching tabs ends any in-flight drag the same way the
                // platform would: through the cancel path.
                let cmds = self.controller.handle(GestureEvent::Cancel);
                self.execute(cmds);
                self.period = period;
                return;
            }
            UiEvent::Shutdown => return,
        };
        let cmds = self.controller.handle(gesture);
        self.execute(cmds);
    }

    /// Snapshot the active period's layout for touch resolution: rectangles
    /// from the view, heights from the oracle, scroll geometry from the host.
    fn build_frame(&mut self) -> FrameSnapshot {
        let view_handle = self.store.view();
        let heights = self.oracle.heights(&view_handle, self.period).to_vec();
        let sections = self
            .store
            .ordered(self.period)
            .into_iter()
            .map(|section| {
                let key = section.key();
                let rect = self.view.measure(&key);
                FrameSection { key, rect }
            })
            .collect();
        let (visible_height, content_height) = self.view.content_extent();
        FrameSnapshot {
            sections,
            heights,
            scroll: ScrollMetrics {
                offset: self.view.scroll_offset(),
                viewport_top: self.view.viewport_top(),
                visible_height,
                content_height,
            },
        }
    }

    fn execute(&mut self, cmds: Vec<DragCmd>) {
        for cmd in cmds {
            match cmd {
                DragCmd::SetScrollEnabled(enabled) => self.view.set_scroll_enabled(enabled),
                DragCmd::ScrollTo(y) => self.view.scroll_to(y),
                DragCmd::StartAutoScroll(_direction) => {
                    if self.ticker.is_none() {
                        self.ticker = Some(TickerHandle::spawn(
                            self.events_tx.clone(),
                            self.tick_interval,
                        ));
                    }
                }
                DragCmd::StopAutoScroll => {
                    if let Some(ticker) = self.ticker.take() {
                        ticker.stop();
                    }
                }
                DragCmd::Translate { key, y } => self.view.translate(&key, y),
                DragCmd::Reseat { key, dy } => self.view.reseat(&key, dy),
                DragCmd::Settle { key } => self.view.settle(&key),
                DragCmd::CommitReorder { key, delta } => self.commit(key, delta),
            }
        }
    }

    /// Apply the move in memory synchronously, then hand the same (clamped)
    /// delta to the worker. A failed in-memory move is terminal-local: the
    /// gesture is already over and the collection is untouched.
    fn commit(&mut self, key: SectionKey, delta: i64) {
        match self.store.move_by(&key, delta) {
            Ok(outcome) => {
                let applied = outcome.applied_delta();
                if applied != 0 {
                    self.worker.enqueue(key, applied);
                }
            }
            Err(err) => {
                eprintln!("[HG-REORDER] move_by failed for {key}: {err}");
            }
        }
    }
}

/// Load the persisted sections into a fresh [`PositionStore`].
///
/// This is the startup path and the reconciliation point after a persistence
/// failure: storage wins wholesale.
#[cfg(feature = "sqlite")]
pub fn hydrate_store(db: &crate::store::sqlite::SectionDb) -> Result<PositionStore> {
    let sections = db.load_sections()?;
    let mut store = PositionStore::new();
    store.hydrate(sections);
    Ok(store)
}

// ──────────────────── tests ────────────────────
