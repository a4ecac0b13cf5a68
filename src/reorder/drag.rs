//! Drag-and-reorder gesture state machine.
//!
//! All gesture state lives in one [`DragSession`] value owned by the
//! [`DragController`]. Input arrives as [`GestureEvent`] values; side-effects
//! are represented as [`DragCmd`] values returned from the handler.
//!
//! **Design invariant:** the controller is deterministic and testable — no
//! I/O, no timers, no storage calls happen here. The runtime executes the
//! commands and owns the auto-scroll ticker.

use crate::core::config::{AutoScrollConfig, LayoutConfig};
use crate::model::section::SectionKey;
use crate::reorder::thresholds::compute_thresholds;

// ──────────────────── geometry inputs ────────────────────

/// On-screen rectangle of one section, captured at touch-start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionRect {
    /// Top edge in screen coordinates.
    pub screen_y: f64,
    /// Rendered height.
    pub height: f64,
}

impl SectionRect {
    /// Whether a touch at `y` lands inside this rectangle.
    #[must_use]
    pub fn contains(&self, y: f64) -> bool {
        y >= self.screen_y && y <= self.screen_y + self.height
    }
}

/// Scroll container geometry, captured at touch-start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    /// Current scroll offset.
    pub offset: f64,
    /// Top edge of the scroll viewport in screen coordinates.
    pub viewport_top: f64,
    /// Height of the visible viewport.
    pub visible_height: f64,
    /// Total scrollable content height.
    pub content_height: f64,
}

impl ScrollMetrics {
    /// Largest legal scroll offset.
    #[must_use]
    pub fn max_offset(&self) -> f64 {
        (self.content_height - self.visible_height).max(0.0)
    }
}

/// One section's identity and (possibly missing) on-screen rectangle.
///
/// A section that has not been laid out yet has no rectangle and is excluded
/// from touch resolution.
#[derive(Debug, Clone)]
pub struct FrameSection {
    /// Section identity.
    pub key: SectionKey,
    /// Screen rectangle, if the section is laid out.
    pub rect: Option<SectionRect>,
}

/// Layout snapshot of the active period, built by the runtime at touch-start.
///
/// `sections` and `heights` are parallel arrays in position order.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    /// Sections of the active period, in position order.
    pub sections: Vec<FrameSection>,
    /// Estimated heights, parallel to `sections`.
    pub heights: Vec<f64>,
    /// Scroll container geometry.
    pub scroll: ScrollMetrics,
}

// ──────────────────── events & commands ────────────────────

/// Direction of an edge-triggered auto-scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    /// Toward the top of the list.
    Up,
    /// Toward the bottom of the list.
    Down,
}

/// Input events delivered to the controller, in arrival order.
#[derive(Debug, Clone)]
pub enum GestureEvent {
    /// Long-press entered edit mode; the controller arms.
    EditEnter,
    /// Edit mode left; an in-flight drag is cancelled first.
    EditExit,
    /// Finger down at `touch_y` with the current layout snapshot.
    TouchStart { touch_y: f64, frame: FrameSnapshot },
    /// Finger moved; `finger_dy` is cumulative since touch-start.
    TouchMove { finger_dy: f64, touch_y: f64 },
    /// One tick of the edge auto-scroll timer.
    AutoScrollTick,
    /// Finger lifted.
    Release,
    /// Gesture terminated by the platform (incoming call, recognizer loss).
    Cancel,
}

/// Side-effects for the runtime to execute against the host.
#[derive(Debug, Clone, PartialEq)]
pub enum DragCmd {
    /// Enable/disable the scroll container's native scrolling.
    SetScrollEnabled(bool),
    /// Scroll the container to an absolute offset (always within bounds).
    ScrollTo(f64),
    /// Start the repeating auto-scroll ticker in one direction.
    StartAutoScroll(ScrollDirection),
    /// Stop any running auto-scroll ticker.
    StopAutoScroll,
    /// Apply a visual translation to the dragged section.
    Translate { key: SectionKey, y: f64 },
    /// Shift a displaced sibling into the slot the dragged section vacated.
    Reseat { key: SectionKey, dy: f64 },
    /// Animate the dragged section back to its resting offset.
    Settle { key: SectionKey },
    /// Commit the net displacement to the position store.
    CommitReorder { key: SectionKey, delta: i64 },
}

// ──────────────────── session ────────────────────

/// Ephemeral state of one drag, created at touch-start and consumed at
/// end-of-gesture. Replaced wholesale on every phase transition.
#[derive(Debug, Clone)]
pub struct DragSession {
    /// Section keys of the period group, in position order at drag start.
    keys: Vec<SectionKey>,
    /// Height snapshot parallel to `keys`.
    heights: Vec<f64>,
    /// Swap boundaries, frozen at drag start.
    thresholds: Vec<f64>,
    /// Dragged section's rank at drag start.
    origin: usize,
    /// Net positions moved so far; signed.
    net_moves: i64,
    /// Offset carried across swap re-bases.
    base_offset: f64,
    /// Latest cumulative finger delta.
    finger_dy: f64,
    /// Finger reference subtracted after a re-base.
    finger_origin: f64,
    /// Accumulated auto-scroll displacement this drag.
    scroll_accum: f64,
    /// Current scroll offset of the container.
    scrolled: f64,
    /// Viewport geometry captured at touch-start.
    viewport_top: f64,
    visible_height: f64,
    content_height: f64,
    /// Running ticker direction, if any.
    auto_scroll: Option<ScrollDirection>,
    /// One-shot guard: a tick already ran this cycle's swap check.
    swap_checked: bool,
}

impl DragSession {
    /// Identity of the dragged section.
    #[must_use]
    pub fn key(&self) -> &SectionKey {
        &self.keys[self.origin]
    }

    /// Net positions moved so far.
    #[must_use]
    pub const fn net_moves(&self) -> i64 {
        self.net_moves
    }

    /// Dragged section's rank at drag start.
    #[must_use]
    pub const fn origin(&self) -> usize {
        self.origin
    }

    /// Swap boundaries frozen at drag start.
    #[must_use]
    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// Whether an auto-scroll ticker is running, and in which direction.
    #[must_use]
    pub const fn auto_scroll(&self) -> Option<ScrollDirection> {
        self.auto_scroll
    }

    /// Continuous displacement: finger delta + re-base carry + auto-scroll.
    #[must_use]
    pub fn virtual_offset(&self) -> f64 {
        self.base_offset + (self.finger_dy - self.finger_origin) + self.scroll_accum
    }

    fn max_scroll(&self) -> f64 {
        (self.content_height - self.visible_height).max(0.0)
    }

    fn threshold_at(&self, index: i64) -> Option<f64> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.thresholds.get(i))
            .copied()
    }

    /// Swap boundary toward the next sibling below, given the current net.
    fn down_threshold(&self) -> Option<f64> {
        self.threshold_at(self.origin as i64 + self.net_moves + 1)
    }

    /// Swap boundary toward the next sibling above, given the current net.
    fn up_threshold(&self) -> Option<f64> {
        self.threshold_at(self.origin as i64 + self.net_moves - 1)
    }

    /// Preserve the apparent position across a swap and reset the finger
    /// reference so the next move measures from the new baseline.
    fn rebase(&mut self) {
        self.base_offset = self.virtual_offset() - self.scroll_accum;
        self.finger_origin = self.finger_dy;
    }

    fn sibling_key(&self, index: i64) -> Option<SectionKey> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.keys.get(i))
            .cloned()
    }
}

// ──────────────────── controller ────────────────────

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    Armed,
    Dragging(DragSession),
}

/// Gesture state machine: `Idle → Armed → Dragging → Armed/Idle`.
///
/// Owns no timers and performs no I/O; every transition goes through
/// [`DragController::handle`], making the machine deterministic and testable.
#[derive(Debug)]
pub struct DragController {
    section_margin: f64,
    autoscroll: AutoScrollConfig,
    phase: Phase,
}

impl DragController {
    /// Build a controller over the given layout and auto-scroll constants.
    #[must_use]
    pub fn new(layout: &LayoutConfig, autoscroll: AutoScrollConfig) -> Self {
        Self {
            section_margin: layout.section_margin,
            autoscroll,
            phase: Phase::Idle,
        }
    }

    /// Whether edit mode is armed (with or without an active drag).
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        matches!(self.phase, Phase::Armed | Phase::Dragging(_))
    }

    /// Whether a drag session is in flight.
    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        matches!(self.phase, Phase::Dragging(_))
    }

    /// The in-flight session, if any.
    #[must_use]
    pub const fn session(&self) -> Option<&DragSession> {
        match &self.phase {
            Phase::Dragging(session) => Some(session),
            _ => None,
        }
    }

    /// Apply one gesture event and return the commands to execute.
    ///
    /// This is the single authority for drag semantics; every state
    /// transition goes through here.
    pub fn handle(&mut self, event: GestureEvent) -> Vec<DragCmd> {
        match event {
            GestureEvent::EditEnter => {
                if matches!(self.phase, Phase::Idle) {
                    self.phase = Phase::Armed;
                }
                Vec::new()
            }
            GestureEvent::EditExit => {
                let cmds = self.finish_drag();
                self.phase = Phase::Idle;
                cmds
            }
            GestureEvent::TouchStart { touch_y, frame } => self.on_touch_start(touch_y, frame),
            GestureEvent::TouchMove {
                finger_dy,
                touch_y,
            } => self.on_touch_move(finger_dy, touch_y),
            GestureEvent::AutoScrollTick => self.on_tick(),
            GestureEvent::Release | GestureEvent::Cancel => self.finish_drag(),
        }
    }

    // ──────────────────── transitions ────────────────────

    fn on_touch_start(&mut self, touch_y: f64, frame: FrameSnapshot) -> Vec<DragCmd> {
        // Only one session at a time; a second touch while dragging is ignored,
        // as is any touch outside edit mode.
        if !matches!(self.phase, Phase::Armed) {
            return Vec::new();
        }

        // First rectangle containing the point wins; sections without a
        // rectangle are unreachable.
        let Some(origin) = frame.sections.iter().position(|section| {
            section.rect.is_some_and(|rect| rect.contains(touch_y))
        }) else {
            // Touch resolution failure: the gesture simply does not start.
            return Vec::new();
        };

        let keys: Vec<SectionKey> = frame.sections.into_iter().map(|s| s.key).collect();
        let thresholds = compute_thresholds(origin, &frame.heights, self.section_margin);

        self.phase = Phase::Dragging(DragSession {
            keys,
            heights: frame.heights,
            thresholds,
            origin,
            net_moves: 0,
            base_offset: 0.0,
            finger_dy: 0.0,
            finger_origin: 0.0,
            scroll_accum: 0.0,
            scrolled: frame.scroll.offset,
            viewport_top: frame.scroll.viewport_top,
            visible_height: frame.scroll.visible_height,
            content_height: frame.scroll.content_height,
            auto_scroll: None,
            swap_checked: false,
        });

        vec![DragCmd::SetScrollEnabled(false)]
    }

    fn on_touch_move(&mut self, finger_dy: f64, touch_y: f64) -> Vec<DragCmd> {
        let edge_margin = self.autoscroll.edge_margin;
        let margin = self.section_margin;
        let Phase::Dragging(session) = &mut self.phase else {
            return Vec::new();
        };

        session.finger_dy = finger_dy;
        let virtual_offset = session.virtual_offset();
        let mut cmds = vec![DragCmd::Translate {
            key: session.key().clone(),
            y: virtual_offset,
        }];

        // Edge-triggered auto-scroll. Only one direction's ticker at a time;
        // the dead zone cancels whichever is running.
        let near_top = touch_y < session.viewport_top + edge_margin;
        let near_bottom = touch_y > session.viewport_top + session.visible_height - edge_margin;
        if near_top && session.scrolled > 0.0 {
            if session.auto_scroll.is_none() {
                session.auto_scroll = Some(ScrollDirection::Up);
                cmds.push(DragCmd::StartAutoScroll(ScrollDirection::Up));
            }
        } else if near_bottom && session.scrolled < session.max_scroll() {
            if session.auto_scroll.is_none() {
                session.auto_scroll = Some(ScrollDirection::Down);
                cmds.push(DragCmd::StartAutoScroll(ScrollDirection::Down));
            }
        } else if session.auto_scroll.take().is_some() {
            cmds.push(DragCmd::StopAutoScroll);
        }

        // Manual swap check, unless a tick already checked this cycle.
        if !session.swap_checked {
            if let Some(down) = session.down_threshold()
                && virtual_offset > down
            {
                cmds.extend(swap_down(session, margin));
            } else if let Some(up) = session.up_threshold()
                && virtual_offset < up
            {
                cmds.extend(swap_up(session, margin));
            }
        }
        session.swap_checked = false;

        cmds
    }

    fn on_tick(&mut self) -> Vec<DragCmd> {
        let step = self.autoscroll.scroll_step;
        let margin = self.section_margin;
        let Phase::Dragging(session) = &mut self.phase else {
            return Vec::new();
        };
        let Some(direction) = session.auto_scroll else {
            return Vec::new();
        };

        // Step the scroll position, clamped to the content bounds; the
        // accumulator advances by the applied step only, so `ScrollTo` can
        // never leave [0, max].
        let applied = match direction {
            ScrollDirection::Up => {
                let applied = step.min(session.scrolled);
                session.scrolled -= applied;
                session.scroll_accum -= applied;
                applied
            }
            ScrollDirection::Down => {
                let applied = step.min(session.max_scroll() - session.scrolled);
                session.scrolled += applied;
                session.scroll_accum += applied;
                applied
            }
        };
        if applied <= 0.0 {
            // Pinned at the edge; the ticker idles until a move event leaves
            // the edge zone and stops it.
            return Vec::new();
        }

        let virtual_offset = session.virtual_offset();
        let mut cmds = vec![
            DragCmd::ScrollTo(session.scrolled),
            DragCmd::Translate {
                key: session.key().clone(),
                y: virtual_offset,
            },
        ];

        // Directional swap check; at most one swap per tick, and the next
        // move event skips its own check to avoid double-counting the same
        // crossing.
        match direction {
            ScrollDirection::Up => {
                if let Some(up) = session.up_threshold()
                    && virtual_offset < up
                {
                    cmds.extend(swap_up(session, margin));
                }
            }
            ScrollDirection::Down => {
                if let Some(down) = session.down_threshold()
                    && virtual_offset > down
                {
                    cmds.extend(swap_down(session, margin));
                }
            }
        }
        session.swap_checked = true;

        cmds
    }

    /// Cleanup shared by release, cancel, and edit-exit. Idempotent: once the
    /// session is gone this returns nothing.
    fn finish_drag(&mut self) -> Vec<DragCmd> {
        let Phase::Dragging(session) = &self.phase else {
            return Vec::new();
        };
        let key = session.key().clone();
        let delta = session.net_moves;

        let cmds = vec![
            DragCmd::StopAutoScroll,
            DragCmd::Settle { key: key.clone() },
            DragCmd::CommitReorder { key, delta },
            DragCmd::SetScrollEnabled(true),
        ];
        self.phase = Phase::Armed;
        cmds
    }
}

// ──────────────────── swap helpers ────────────────────

/// Register a downward crossing: the passed sibling re-seats one dragged-item
/// height upward, and the session re-bases so the drag stays continuous.
fn swap_down(session: &mut DragSession, margin: f64) -> Vec<DragCmd> {
    let sibling = session.sibling_key(session.origin as i64 + session.net_moves + 1);
    session.rebase();
    session.net_moves += 1;
    sibling.map_or_else(Vec::new, |key| {
        vec![DragCmd::Reseat {
            key,
            dy: -(session.heights[session.origin] + margin),
        }]
    })
}

/// Register an upward crossing: mirror of [`swap_down`].
fn swap_up(session: &mut DragSession, margin: f64) -> Vec<DragCmd> {
    let sibling = session.sibling_key(session.origin as i64 + session.net_moves - 1);
    session.rebase();
    session.net_moves -= 1;
    sibling.map_or_else(Vec::new, |key| {
        vec![DragCmd::Reseat {
            key,
            dy: session.heights[session.origin] + margin,
        }]
    })
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::section::TimePeriod;

    const MARGIN: f64 = 17.0;

    fn layout() -> LayoutConfig {
        LayoutConfig {
            section_margin: MARGIN,
            ..LayoutConfig::default()
        }
    }

    fn autoscroll() -> AutoScrollConfig {
        AutoScrollConfig {
            edge_margin: 150.0,
            scroll_step: 5.0,
            tick_interval_ms: 16,
        }
    }

    fn key(title: &str) -> SectionKey {
        SectionKey::new(title, TimePeriod::Daily)
    }

    /// Three sections A(100) B(150) C(120), stacked from y=0, no scroll.
    fn frame() -> FrameSnapshot {
        frame_with_scroll(ScrollMetrics {
            offset: 0.0,
            viewport_top: 0.0,
            visible_height: 800.0,
            content_height: 800.0,
        })
    }

    fn frame_with_scroll(scroll: ScrollMetrics) -> FrameSnapshot {
        let heights = [100.0, 150.0, 120.0];
        let mut y = 0.0;
        let sections = ["A", "B", "C"]
            .iter()
            .zip(heights)
            .map(|(title, h)| {
                let section = FrameSection {
                    key: key(title),
                    rect: Some(SectionRect {
                        screen_y: y,
                        height: h,
                    }),
                };
                y += h + MARGIN;
                section
            })
            .collect();
        FrameSnapshot {
            sections,
            heights: heights.to_vec(),
            scroll,
        }
    }

    fn armed_controller() -> DragController {
        let mut controller = DragController::new(&layout(), autoscroll());
        controller.handle(GestureEvent::EditEnter);
        controller
    }

    fn dragging_controller() -> DragController {
        let mut controller = armed_controller();
        let cmds = controller.handle(GestureEvent::TouchStart {
            touch_y: 50.0,
            frame: frame(),
        });
        assert_eq!(cmds, [DragCmd::SetScrollEnabled(false)]);
        controller
    }

    fn move_to(controller: &mut DragController, finger_dy: f64) -> Vec<DragCmd> {
        controller.handle(GestureEvent::TouchMove {
            finger_dy,
            touch_y: 400.0,
        })
    }

    fn commit_of(cmds: &[DragCmd]) -> Option<(SectionKey, i64)> {
        cmds.iter().find_map(|cmd| match cmd {
            DragCmd::CommitReorder { key, delta } => Some((key.clone(), *delta)),
            _ => None,
        })
    }

    // ── arming & touch resolution ──

    #[test]
    fn touch_start_requires_edit_mode() {
        let mut controller = DragController::new(&layout(), autoscroll());
        let cmds = controller.handle(GestureEvent::TouchStart {
            touch_y: 50.0,
            frame: frame(),
        });
        assert!(cmds.is_empty());
        assert!(!controller.is_dragging());
    }

    #[test]
    fn touch_start_resolves_section_by_rectangle() {
        let mut controller = armed_controller();
        // 117..267 is B's band (A is 0..100, margin 17).
        controller.handle(GestureEvent::TouchStart {
            touch_y: 200.0,
            frame: frame(),
        });
        let session = controller.session().unwrap();
        assert_eq!(session.key(), &key("B"));
        assert_eq!(session.origin(), 1);
        assert_eq!(session.thresholds(), [-117.0, 0.0, 167.0]);
    }

    #[test]
    fn touch_outside_every_rectangle_does_not_arm_a_session() {
        let mut controller = armed_controller();
        let cmds = controller.handle(GestureEvent::TouchStart {
            touch_y: 5_000.0,
            frame: frame(),
        });
        assert!(cmds.is_empty());
        assert!(!controller.is_dragging());
        assert!(controller.is_armed(), "edit mode survives a missed touch");
    }

    #[test]
    fn unmeasured_section_is_excluded_from_resolution() {
        let mut controller = armed_controller();
        let mut f = frame();
        f.sections[0].rect = None;
        // y=50 would land in A, but A has no rectangle.
        let cmds = controller.handle(GestureEvent::TouchStart {
            touch_y: 50.0,
            frame: f,
        });
        assert!(cmds.is_empty());
        assert!(!controller.is_dragging());
    }

    #[test]
    fn second_touch_while_dragging_is_ignored() {
        let mut controller = dragging_controller();
        move_to(&mut controller, 130.0);
        let before = controller.session().unwrap().clone();

        let cmds = controller.handle(GestureEvent::TouchStart {
            touch_y: 300.0,
            frame: frame(),
        });
        assert!(cmds.is_empty());

        let after = controller.session().unwrap();
        assert_eq!(after.key(), before.key());
        assert_eq!(after.net_moves(), before.net_moves());
        assert_eq!(after.thresholds(), before.thresholds());
    }

    // ── threshold crossings ──

    #[test]
    fn worked_scenario_drag_top_section_to_bottom() {
        let mut controller = dragging_controller();
        let session = controller.session().unwrap();
        assert_eq!(session.thresholds(), [0.0, 117.0, 384.0]);

        move_to(&mut controller, 120.0);
        assert_eq!(controller.session().unwrap().net_moves(), 1);

        // finger_origin was re-based at 120, so the cumulative offset is
        // carried forward: 120 + (390 - 120) = 390 > 384.
        move_to(&mut controller, 390.0);
        assert_eq!(controller.session().unwrap().net_moves(), 2);

        let cmds = controller.handle(GestureEvent::Release);
        assert_eq!(commit_of(&cmds), Some((key("A"), 2)));
        assert!(!controller.is_dragging());
    }

    #[test]
    fn one_crossing_registers_exactly_one_swap() {
        let mut controller = dragging_controller();
        move_to(&mut controller, 120.0);
        assert_eq!(controller.session().unwrap().net_moves(), 1);
        // Still past the first boundary but short of the second: no change.
        move_to(&mut controller, 140.0);
        move_to(&mut controller, 200.0);
        assert_eq!(controller.session().unwrap().net_moves(), 1);
    }

    #[test]
    fn crossing_down_reseats_the_passed_sibling_upward() {
        let mut controller = dragging_controller();
        let cmds = move_to(&mut controller, 120.0);
        let reseat = cmds.iter().find_map(|cmd| match cmd {
            DragCmd::Reseat { key, dy } => Some((key.clone(), *dy)),
            _ => None,
        });
        // B moves up by A's height plus the margin.
        assert_eq!(reseat, Some((key("B"), -117.0)));
    }

    #[test]
    fn translate_is_continuous_across_a_swap() {
        let mut controller = dragging_controller();
        let cmds = move_to(&mut controller, 120.0);
        let y_at_swap = cmds.iter().find_map(|cmd| match cmd {
            DragCmd::Translate { y, .. } => Some(*y),
            _ => None,
        });
        assert_eq!(y_at_swap, Some(120.0));

        // The very next move keeps measuring the same cumulative offset.
        let cmds = move_to(&mut controller, 121.0);
        let y_next = cmds.iter().find_map(|cmd| match cmd {
            DragCmd::Translate { y, .. } => Some(*y),
            _ => None,
        });
        assert_eq!(y_next, Some(121.0), "no visual jump across the swap");
    }

    #[test]
    fn dragging_back_over_the_boundary_unwinds_the_swap() {
        let mut controller = dragging_controller();
        move_to(&mut controller, 120.0);
        assert_eq!(controller.session().unwrap().net_moves(), 1);

        // After the swap the undo boundary is thresholds[origin] = 0.
        move_to(&mut controller, -5.0);
        assert_eq!(controller.session().unwrap().net_moves(), 0);

        let cmds = controller.handle(GestureEvent::Release);
        assert_eq!(commit_of(&cmds), Some((key("A"), 0)));
    }

    #[test]
    fn round_trip_of_two_slots_nets_zero() {
        let mut controller = dragging_controller();
        move_to(&mut controller, 120.0);
        move_to(&mut controller, 390.0);
        assert_eq!(controller.session().unwrap().net_moves(), 2);

        // Walk back: undo boundaries are 117 then 0.
        move_to(&mut controller, 110.0);
        assert_eq!(controller.session().unwrap().net_moves(), 1);
        move_to(&mut controller, -5.0);
        assert_eq!(controller.session().unwrap().net_moves(), 0);
    }

    #[test]
    fn upward_drag_of_bottom_section() {
        let mut controller = armed_controller();
        controller.handle(GestureEvent::TouchStart {
            touch_y: 300.0, // C's band starts at 284
            frame: frame(),
        });
        let session = controller.session().unwrap();
        assert_eq!(session.key(), &key("C"));
        assert_eq!(session.thresholds(), [-284.0, -167.0, 0.0]);

        let cmds = controller.handle(GestureEvent::TouchMove {
            finger_dy: -170.0,
            touch_y: 300.0,
        });
        assert_eq!(controller.session().unwrap().net_moves(), -1);
        let reseat = cmds.iter().find_map(|cmd| match cmd {
            DragCmd::Reseat { key, dy } => Some((key.clone(), *dy)),
            _ => None,
        });
        // B drops down by C's height plus the margin.
        assert_eq!(reseat, Some((key("B"), 137.0)));
    }

    #[test]
    fn single_section_group_can_never_swap() {
        let mut controller = armed_controller();
        let f = FrameSnapshot {
            sections: vec![FrameSection {
                key: key("Solo"),
                rect: Some(SectionRect {
                    screen_y: 0.0,
                    height: 120.0,
                }),
            }],
            heights: vec![120.0],
            scroll: ScrollMetrics {
                offset: 0.0,
                viewport_top: 0.0,
                visible_height: 800.0,
                content_height: 800.0,
            },
        };
        controller.handle(GestureEvent::TouchStart {
            touch_y: 60.0,
            frame: f,
        });
        assert_eq!(controller.session().unwrap().thresholds(), [0.0]);

        move_to(&mut controller, 500.0);
        move_to(&mut controller, -500.0);
        assert_eq!(controller.session().unwrap().net_moves(), 0);
    }

    // ── auto-scroll ──

    fn scrolled_frame() -> FrameSnapshot {
        frame_with_scroll(ScrollMetrics {
            offset: 200.0,
            viewport_top: 0.0,
            visible_height: 600.0,
            content_height: 1_200.0,
        })
    }

    #[test]
    fn near_top_edge_starts_upward_ticker_once() {
        let mut controller = armed_controller();
        controller.handle(GestureEvent::TouchStart {
            touch_y: 50.0,
            frame: scrolled_frame(),
        });

        let cmds = controller.handle(GestureEvent::TouchMove {
            finger_dy: -10.0,
            touch_y: 40.0,
        });
        assert!(cmds.contains(&DragCmd::StartAutoScroll(ScrollDirection::Up)));

        // Staying in the zone must not start a second ticker.
        let cmds = controller.handle(GestureEvent::TouchMove {
            finger_dy: -12.0,
            touch_y: 35.0,
        });
        assert!(!cmds.iter().any(|c| matches!(c, DragCmd::StartAutoScroll(_))));
    }

    #[test]
    fn top_edge_without_scroll_room_does_not_start_ticker() {
        let mut controller = dragging_controller(); // offset 0
        let cmds = controller.handle(GestureEvent::TouchMove {
            finger_dy: -10.0,
            touch_y: 10.0,
        });
        assert!(!cmds.iter().any(|c| matches!(c, DragCmd::StartAutoScroll(_))));
    }

    #[test]
    fn dead_zone_stops_the_ticker() {
        let mut controller = armed_controller();
        controller.handle(GestureEvent::TouchStart {
            touch_y: 50.0,
            frame: scrolled_frame(),
        });
        controller.handle(GestureEvent::TouchMove {
            finger_dy: -10.0,
            touch_y: 40.0,
        });
        assert!(controller.session().unwrap().auto_scroll().is_some());

        let cmds = controller.handle(GestureEvent::TouchMove {
            finger_dy: 0.0,
            touch_y: 300.0,
        });
        assert!(cmds.contains(&DragCmd::StopAutoScroll));
        assert!(controller.session().unwrap().auto_scroll().is_none());
    }

    #[test]
    fn upward_ticks_scroll_and_clamp_at_zero() {
        let mut controller = armed_controller();
        let mut f = scrolled_frame();
        f.scroll.offset = 7.0; // two steps from the top
        controller.handle(GestureEvent::TouchStart {
            touch_y: 50.0,
            frame: f,
        });
        controller.handle(GestureEvent::TouchMove {
            finger_dy: 0.0,
            touch_y: 40.0,
        });

        let cmds = controller.handle(GestureEvent::AutoScrollTick);
        assert!(cmds.contains(&DragCmd::ScrollTo(2.0)));
        let cmds = controller.handle(GestureEvent::AutoScrollTick);
        assert!(cmds.contains(&DragCmd::ScrollTo(0.0)), "clamped, not -3");
        // Pinned at the top: further ticks are inert.
        let cmds = controller.handle(GestureEvent::AutoScrollTick);
        assert!(cmds.is_empty());
    }

    #[test]
    fn downward_ticks_clamp_at_max_extent() {
        let mut controller = armed_controller();
        let mut f = scrolled_frame();
        f.scroll.offset = 597.0; // max is 600
        controller.handle(GestureEvent::TouchStart {
            touch_y: 50.0,
            frame: f,
        });
        controller.handle(GestureEvent::TouchMove {
            finger_dy: 0.0,
            touch_y: 580.0,
        });
        assert_eq!(
            controller.session().unwrap().auto_scroll(),
            Some(ScrollDirection::Down)
        );

        let cmds = controller.handle(GestureEvent::AutoScrollTick);
        assert!(cmds.contains(&DragCmd::ScrollTo(600.0)), "clamped at max");
        let cmds = controller.handle(GestureEvent::AutoScrollTick);
        assert!(cmds.is_empty());
    }

    #[test]
    fn tick_driven_swap_is_not_double_counted_by_the_next_move() {
        let mut controller = armed_controller();
        controller.handle(GestureEvent::TouchStart {
            touch_y: 50.0,
            frame: scrolled_frame(),
        });
        // Drag down to just under the first boundary, into the bottom zone.
        controller.handle(GestureEvent::TouchMove {
            finger_dy: 115.0,
            touch_y: 580.0,
        });
        assert_eq!(controller.session().unwrap().net_moves(), 0);

        // One tick adds 5px of scroll displacement: 120 > 117 → swap.
        let cmds = controller.handle(GestureEvent::AutoScrollTick);
        assert!(cmds.iter().any(|c| matches!(c, DragCmd::Reseat { .. })));
        assert_eq!(controller.session().unwrap().net_moves(), 1);

        // The immediately following move event still sees 120 > 117 for the
        // crossed boundary but must skip its check for this one cycle.
        controller.handle(GestureEvent::TouchMove {
            finger_dy: 115.0,
            touch_y: 580.0,
        });
        assert_eq!(controller.session().unwrap().net_moves(), 1);

        // The one-shot resets; a later genuine crossing still registers.
        controller.handle(GestureEvent::TouchMove {
            finger_dy: 385.0,
            touch_y: 400.0,
        });
        assert_eq!(controller.session().unwrap().net_moves(), 2);
    }

    #[test]
    fn ticks_outside_a_session_are_inert() {
        let mut controller = armed_controller();
        assert!(controller.handle(GestureEvent::AutoScrollTick).is_empty());
        let mut controller = dragging_controller();
        // Dragging but no ticker running.
        assert!(controller.handle(GestureEvent::AutoScrollTick).is_empty());
    }

    // ── end of gesture ──

    #[test]
    fn release_emits_full_cleanup_sequence() {
        let mut controller = dragging_controller();
        move_to(&mut controller, 120.0);

        let cmds = controller.handle(GestureEvent::Release);
        assert_eq!(
            cmds,
            [
                DragCmd::StopAutoScroll,
                DragCmd::Settle { key: key("A") },
                DragCmd::CommitReorder {
                    key: key("A"),
                    delta: 1
                },
                DragCmd::SetScrollEnabled(true),
            ]
        );
        assert!(controller.is_armed(), "edit mode persists after release");
    }

    #[test]
    fn cancel_commits_like_release() {
        let mut controller = dragging_controller();
        move_to(&mut controller, 120.0);
        let cmds = controller.handle(GestureEvent::Cancel);
        assert_eq!(commit_of(&cmds), Some((key("A"), 1)));
    }

    #[test]
    fn cleanup_is_idempotent() {
        let mut controller = dragging_controller();
        move_to(&mut controller, 120.0);

        let first = controller.handle(GestureEvent::Release);
        assert!(!first.is_empty());
        let second = controller.handle(GestureEvent::Release);
        assert!(second.is_empty(), "second cleanup must be a no-op");
        assert!(controller.session().is_none());

        // Events after cleanup are inert too.
        assert!(move_to(&mut controller, 500.0).is_empty());
    }

    #[test]
    fn edit_exit_during_drag_commits_and_disarms() {
        let mut controller = dragging_controller();
        move_to(&mut controller, 120.0);

        let cmds = controller.handle(GestureEvent::EditExit);
        assert_eq!(commit_of(&cmds), Some((key("A"), 1)));
        assert!(!controller.is_armed());
        assert!(!controller.is_dragging());
    }

    #[test]
    fn edit_exit_when_armed_only_disarms() {
        let mut controller = armed_controller();
        let cmds = controller.handle(GestureEvent::EditExit);
        assert!(cmds.is_empty());
        assert!(!controller.is_armed());
    }
}
