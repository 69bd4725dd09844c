// ============================================================================
// POINTER / GESTURE TRACKER — classifies raw pointer streams
// ============================================================================
//
// One active pointer drives a paint stroke; exactly two drive a pinch
// gesture (which cancels any in-flight stroke); three or more are tracked
// for release bookkeeping only and emit nothing.  Up, Cancel and Leave are
// treated identically so a stroke that never sees its matching Up (focus
// loss, pointer leaving the surface) is always recoverable.

use std::collections::HashMap;

/// Pointer lifecycle phases.  `Leave` is normalized to `Up` internally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
    Leave,
}

/// One raw pointer event in screen space.
#[derive(Clone, Copy, Debug)]
pub struct PointerEvent {
    pub id: u64,
    pub phase: PointerPhase,
    pub x: f32,
    pub y: f32,
    /// [0,1]; devices that report no pressure use 0.5.
    pub pressure: f32,
    /// Degrees, [-90, 90].
    pub tilt_x: f32,
    pub tilt_y: f32,
}

impl PointerEvent {
    /// Event with default pressure/tilt (mouse-like device).
    pub fn simple(id: u64, phase: PointerPhase, x: f32, y: f32) -> Self {
        Self {
            id,
            phase,
            x,
            y,
            pressure: 0.5,
            tilt_x: 0.0,
            tilt_y: 0.0,
        }
    }
}

/// One normalized stroke sample in image space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeSample {
    pub x: f32,
    pub y: f32,
    pub pressure: f32,
    pub tilt_x: f32,
    pub tilt_y: f32,
}

/// What the tracker tells the editor to do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TrackerAction {
    StrokeBegin(StrokeSample),
    StrokeMove { prev: StrokeSample, next: StrokeSample },
    StrokeFinish,
    /// A gesture began while a stroke was in flight; discard the scratch.
    StrokeCancel,
    /// Incremental pinch update: scale ratio plus screen-space pan delta.
    Gesture {
        scale_ratio: f32,
        pan_dx: f32,
        pan_dy: f32,
    },
}

/// Tracker state machine.  All per-gesture data lives in the state payload.
#[derive(Clone, Copy, Debug)]
enum TrackerState {
    Idle,
    Stroking {
        pointer: u64,
        last: StrokeSample,
    },
    Gesturing {
        a: u64,
        b: u64,
        last_dist: f32,
        last_mid: (f32, f32),
    },
}

pub struct PointerTracker {
    /// Last-known event per live pointer id.
    pointers: HashMap<u64, PointerEvent>,
    state: TrackerState,
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerTracker {
    pub fn new() -> Self {
        Self {
            pointers: HashMap::new(),
            state: TrackerState::Idle,
        }
    }

    pub fn is_stroking(&self) -> bool {
        matches!(self.state, TrackerState::Stroking { .. })
    }

    pub fn is_gesturing(&self) -> bool {
        matches!(self.state, TrackerState::Gesturing { .. })
    }

    pub fn live_pointers(&self) -> usize {
        self.pointers.len()
    }

    /// Drain a batch of coalesced sub-events in arrival order.  High-frequency
    /// stylus hardware reports several samples between dispatched events.
    pub fn handle_all<F>(
        &mut self,
        events: impl IntoIterator<Item = PointerEvent>,
        to_image: F,
    ) -> Vec<TrackerAction>
    where
        F: Fn(f32, f32) -> (f32, f32),
    {
        let mut actions = Vec::new();
        for ev in events {
            actions.extend(self.handle(ev, &to_image));
        }
        actions
    }

    /// Process one pointer event.  `to_image` maps screen coordinates to
    /// image space (the inverse view transform, supplied by the editor).
    pub fn handle<F>(&mut self, ev: PointerEvent, to_image: F) -> Vec<TrackerAction>
    where
        F: Fn(f32, f32) -> (f32, f32),
    {
        match ev.phase {
            PointerPhase::Down => self.on_down(ev, &to_image),
            PointerPhase::Move => self.on_move(ev, &to_image),
            // Up, Cancel and Leave share the release path.
            PointerPhase::Up | PointerPhase::Cancel | PointerPhase::Leave => self.on_release(ev),
        }
    }

    fn sample<F>(ev: &PointerEvent, to_image: &F) -> StrokeSample
    where
        F: Fn(f32, f32) -> (f32, f32),
    {
        let (x, y) = to_image(ev.x, ev.y);
        StrokeSample {
            x,
            y,
            pressure: ev.pressure.clamp(0.0, 1.0),
            tilt_x: ev.tilt_x.clamp(-90.0, 90.0),
            tilt_y: ev.tilt_y.clamp(-90.0, 90.0),
        }
    }

    fn on_down<F>(&mut self, ev: PointerEvent, to_image: &F) -> Vec<TrackerAction>
    where
        F: Fn(f32, f32) -> (f32, f32),
    {
        self.pointers.insert(ev.id, ev);
        match self.pointers.len() {
            1 => {
                let sample = Self::sample(&ev, to_image);
                self.state = TrackerState::Stroking {
                    pointer: ev.id,
                    last: sample,
                };
                vec![TrackerAction::StrokeBegin(sample)]
            }
            2 => {
                let mut actions = Vec::new();
                if self.is_stroking() {
                    actions.push(TrackerAction::StrokeCancel);
                }
                let mut ids = self.pointers.keys().copied().collect::<Vec<_>>();
                ids.sort_unstable();
                let (a, b) = (ids[0], ids[1]);
                let (dist, mid) = self.pair_metrics(a, b);
                self.state = TrackerState::Gesturing {
                    a,
                    b,
                    last_dist: dist,
                    last_mid: mid,
                };
                actions
            }
            // Third and later pointers: bookkeeping only.
            _ => Vec::new(),
        }
    }

    fn on_move<F>(&mut self, ev: PointerEvent, to_image: &F) -> Vec<TrackerAction>
    where
        F: Fn(f32, f32) -> (f32, f32),
    {
        // A move for an unknown pointer (e.g. hover) carries no state.
        if !self.pointers.contains_key(&ev.id) {
            return Vec::new();
        }
        self.pointers.insert(ev.id, ev);

        match self.state {
            TrackerState::Stroking { pointer, last } if pointer == ev.id => {
                let next = Self::sample(&ev, to_image);
                self.state = TrackerState::Stroking {
                    pointer,
                    last: next,
                };
                vec![TrackerAction::StrokeMove { prev: last, next }]
            }
            TrackerState::Gesturing {
                a,
                b,
                last_dist,
                last_mid,
            } if ev.id == a || ev.id == b => {
                let (dist, mid) = self.pair_metrics(a, b);
                self.state = TrackerState::Gesturing {
                    a,
                    b,
                    last_dist: dist,
                    last_mid: mid,
                };
                // Degenerate pinch (coincident fingers) emits pan only.
                let scale_ratio = if last_dist > f32::EPSILON && dist > f32::EPSILON {
                    dist / last_dist
                } else {
                    1.0
                };
                vec![TrackerAction::Gesture {
                    scale_ratio,
                    pan_dx: mid.0 - last_mid.0,
                    pan_dy: mid.1 - last_mid.1,
                }]
            }
            // Moves from extra pointers (3rd+) or stale strokes emit nothing.
            _ => Vec::new(),
        }
    }

    fn on_release(&mut self, ev: PointerEvent) -> Vec<TrackerAction> {
        if self.pointers.remove(&ev.id).is_none() {
            return Vec::new();
        }
        match self.state {
            TrackerState::Stroking { pointer, .. } if pointer == ev.id => {
                self.state = TrackerState::Idle;
                vec![TrackerAction::StrokeFinish]
            }
            TrackerState::Gesturing { a, b, .. } if ev.id == a || ev.id == b => {
                // Gesture over.  The surviving finger does not become a
                // stroke; a stroke only ever starts on pointer-down.
                self.state = TrackerState::Idle;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn pair_metrics(&self, a: u64, b: u64) -> (f32, (f32, f32)) {
        let (pa, pb) = match (self.pointers.get(&a), self.pointers.get(&b)) {
            (Some(pa), Some(pb)) => (pa, pb),
            _ => return (0.0, (0.0, 0.0)),
        };
        let dx = pb.x - pa.x;
        let dy = pb.y - pa.y;
        let dist = (dx * dx + dy * dy).sqrt();
        let mid = ((pa.x + pb.x) * 0.5, (pa.y + pb.y) * 0.5);
        (dist, mid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(x: f32, y: f32) -> (f32, f32) {
        (x, y)
    }

    #[test]
    fn single_pointer_produces_stroke_lifecycle() {
        let mut t = PointerTracker::new();
        let a = t.handle(PointerEvent::simple(1, PointerPhase::Down, 10.0, 10.0), ident);
        assert!(matches!(a[0], TrackerAction::StrokeBegin(_)));
        let a = t.handle(PointerEvent::simple(1, PointerPhase::Move, 20.0, 10.0), ident);
        assert!(matches!(a[0], TrackerAction::StrokeMove { .. }));
        let a = t.handle(PointerEvent::simple(1, PointerPhase::Up, 20.0, 10.0), ident);
        assert_eq!(a, vec![TrackerAction::StrokeFinish]);
        assert_eq!(t.live_pointers(), 0);
    }

    #[test]
    fn leave_behaves_like_up() {
        let mut t = PointerTracker::new();
        t.handle(PointerEvent::simple(1, PointerPhase::Down, 0.0, 0.0), ident);
        let a = t.handle(PointerEvent::simple(1, PointerPhase::Leave, 5.0, 5.0), ident);
        assert_eq!(a, vec![TrackerAction::StrokeFinish]);
        assert!(!t.is_stroking());
    }

    #[test]
    fn second_pointer_cancels_stroke_and_starts_gesture() {
        let mut t = PointerTracker::new();
        t.handle(PointerEvent::simple(1, PointerPhase::Down, 0.0, 0.0), ident);
        let a = t.handle(PointerEvent::simple(2, PointerPhase::Down, 100.0, 0.0), ident);
        assert_eq!(a, vec![TrackerAction::StrokeCancel]);
        assert!(t.is_gesturing());
    }

    #[test]
    fn pinch_emits_scale_ratio_and_pan() {
        let mut t = PointerTracker::new();
        t.handle(PointerEvent::simple(1, PointerPhase::Down, 0.0, 0.0), ident);
        t.handle(PointerEvent::simple(2, PointerPhase::Down, 100.0, 0.0), ident);
        // Spread: pointer 2 moves from x=100 to x=200, doubling the distance.
        let a = t.handle(PointerEvent::simple(2, PointerPhase::Move, 200.0, 0.0), ident);
        match a[0] {
            TrackerAction::Gesture {
                scale_ratio,
                pan_dx,
                pan_dy,
            } => {
                assert!((scale_ratio - 2.0).abs() < 1e-5);
                assert!((pan_dx - 50.0).abs() < 1e-5);
                assert!(pan_dy.abs() < 1e-5);
            }
            other => panic!("expected gesture, got {:?}", other),
        }
    }

    #[test]
    fn third_pointer_emits_nothing() {
        let mut t = PointerTracker::new();
        t.handle(PointerEvent::simple(1, PointerPhase::Down, 0.0, 0.0), ident);
        t.handle(PointerEvent::simple(2, PointerPhase::Down, 100.0, 0.0), ident);
        let a = t.handle(PointerEvent::simple(3, PointerPhase::Down, 50.0, 50.0), ident);
        assert!(a.is_empty());
        let a = t.handle(PointerEvent::simple(3, PointerPhase::Move, 60.0, 60.0), ident);
        assert!(a.is_empty());
        // Still tracked for release bookkeeping.
        assert_eq!(t.live_pointers(), 3);
        let a = t.handle(PointerEvent::simple(3, PointerPhase::Up, 60.0, 60.0), ident);
        assert!(a.is_empty());
        assert_eq!(t.live_pointers(), 2);
    }

    #[test]
    fn gesture_end_does_not_resume_stroke() {
        let mut t = PointerTracker::new();
        t.handle(PointerEvent::simple(1, PointerPhase::Down, 0.0, 0.0), ident);
        t.handle(PointerEvent::simple(2, PointerPhase::Down, 100.0, 0.0), ident);
        let a = t.handle(PointerEvent::simple(2, PointerPhase::Up, 100.0, 0.0), ident);
        assert!(a.is_empty());
        // Remaining pointer moves emit nothing until it goes down again.
        let a = t.handle(PointerEvent::simple(1, PointerPhase::Move, 10.0, 10.0), ident);
        assert!(a.is_empty());
    }

    #[test]
    fn samples_are_mapped_through_inverse_view_transform() {
        let mut t = PointerTracker::new();
        // Screen→image mapping for a 2x zoom with (10, 20) pan.
        let map = |x: f32, y: f32| ((x - 10.0) / 2.0, (y - 20.0) / 2.0);
        let a = t.handle(PointerEvent::simple(1, PointerPhase::Down, 30.0, 60.0), map);
        match a[0] {
            TrackerAction::StrokeBegin(s) => {
                assert!((s.x - 10.0).abs() < 1e-5);
                assert!((s.y - 20.0).abs() < 1e-5);
            }
            other => panic!("expected begin, got {:?}", other),
        }
    }

    #[test]
    fn coalesced_batch_is_drained_in_order() {
        let mut t = PointerTracker::new();
        let events = vec![
            PointerEvent::simple(1, PointerPhase::Down, 0.0, 0.0),
            PointerEvent::simple(1, PointerPhase::Move, 1.0, 0.0),
            PointerEvent::simple(1, PointerPhase::Move, 2.0, 0.0),
            PointerEvent::simple(1, PointerPhase::Up, 2.0, 0.0),
        ];
        let actions = t.handle_all(events, ident);
        assert_eq!(actions.len(), 4);
        assert!(matches!(actions[0], TrackerAction::StrokeBegin(_)));
        assert!(matches!(actions[3], TrackerAction::StrokeFinish));
        // Moves arrive in order.
        if let TrackerAction::StrokeMove { prev, next } = actions[1] {
            assert_eq!(prev.x, 0.0);
            assert_eq!(next.x, 1.0);
        } else {
            panic!("expected move");
        }
    }
}
