//! Preview surface gesture routing.
//!
//! Turns raw preview gestures into session commands. Time is passed in by
//! the caller so the router can be driven from any UI loop and tested
//! without sleeping.
//!
//! A single tap is not acted on immediately: it is held for
//! [`DEFAULT_TAP_WINDOW`] in case a second tap turns it into a double tap.
//! Callers poll [`GestureRouter::poll`] (or sleep until
//! [`GestureRouter::next_deadline`]) to release held taps.

use std::time::{Duration, Instant};

use shutter_capture_engine::ZoomDirection;
use shutter_platform_core::NormalizedPoint;

/// How long a single tap waits for a second one.
pub const DEFAULT_TAP_WINDOW: Duration = Duration::from_millis(250);

/// How long the focus indicator stays on screen.
pub const FOCUS_INDICATOR_DURATION: Duration = Duration::from_millis(300);

/// A command produced by a gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureAction {
    Zoom(ZoomDirection),
    FocusAndExpose(NormalizedPoint),
    FlipCamera,
}

/// Transient marker drawn where the user tapped to focus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusIndicator {
    /// Location in view coordinates.
    pub x: f64,
    pub y: f64,
    pub shown_at: Instant,
}

impl FocusIndicator {
    pub fn is_visible(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) < FOCUS_INDICATOR_DURATION
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingTap {
    x: f64,
    y: f64,
    at: Instant,
}

/// Maps preview gestures to [`GestureAction`]s.
#[derive(Debug)]
pub struct GestureRouter {
    width: f64,
    height: f64,
    tap_window: Duration,
    pending: Option<PendingTap>,
    indicator: Option<FocusIndicator>,
}

impl GestureRouter {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            tap_window: DEFAULT_TAP_WINDOW,
            pending: None,
            indicator: None,
        }
    }

    pub fn with_tap_window(mut self, window: Duration) -> Self {
        self.tap_window = window;
        self
    }

    /// Pinch with the gesture's cumulative scale.
    pub fn pinch(&mut self, scale: f64) -> Option<GestureAction> {
        if !scale.is_finite() || scale <= 0.0 {
            return None;
        }
        let direction = if scale >= 1.0 {
            ZoomDirection::In
        } else {
            ZoomDirection::Out
        };
        Some(GestureAction::Zoom(direction))
    }

    /// A tap at view coordinates.
    ///
    /// Returns [`GestureAction::FlipCamera`] when this tap completes a
    /// double tap. A stale held tap that was never polled is released here
    /// as a focus action and this tap is held in its place.
    pub fn tap(&mut self, x: f64, y: f64, now: Instant) -> Option<GestureAction> {
        let tap = PendingTap { x, y, at: now };
        match self.pending.take() {
            Some(held) if now.saturating_duration_since(held.at) <= self.tap_window => {
                tracing::debug!("Double tap");
                Some(GestureAction::FlipCamera)
            }
            Some(held) => {
                self.pending = Some(tap);
                Some(self.release(held, now))
            }
            None => {
                self.pending = Some(tap);
                None
            }
        }
    }

    /// Release a held tap whose double-tap window has passed.
    pub fn poll(&mut self, now: Instant) -> Option<GestureAction> {
        let held = self.pending?;
        if now.saturating_duration_since(held.at) <= self.tap_window {
            return None;
        }
        self.pending = None;
        Some(self.release(held, now))
    }

    /// When the held tap, if any, becomes releasable.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .map(|held| held.at + self.tap_window + Duration::from_millis(1))
    }

    /// The focus indicator, while it is still visible.
    pub fn focus_indicator(&self, now: Instant) -> Option<FocusIndicator> {
        self.indicator.filter(|i| i.is_visible(now))
    }

    fn release(&mut self, held: PendingTap, now: Instant) -> GestureAction {
        let point = NormalizedPoint::from_view(held.x, held.y, self.width, self.height);
        self.indicator = Some(FocusIndicator {
            x: held.x,
            y: held.y,
            shown_at: now,
        });
        tracing::debug!(x = point.x, y = point.y, "Focus tap");
        GestureAction::FocusAndExpose(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn pinch_direction_follows_scale() {
        let mut router = GestureRouter::new(390.0, 844.0);
        assert_eq!(router.pinch(1.4), Some(GestureAction::Zoom(ZoomDirection::In)));
        assert_eq!(router.pinch(1.0), Some(GestureAction::Zoom(ZoomDirection::In)));
        assert_eq!(router.pinch(0.7), Some(GestureAction::Zoom(ZoomDirection::Out)));
        assert_eq!(router.pinch(f64::NAN), None);
    }

    #[test]
    fn single_tap_focuses_after_window() {
        let t0 = Instant::now();
        let mut router = GestureRouter::new(400.0, 800.0);

        assert_eq!(router.tap(100.0, 200.0, t0), None);
        assert_eq!(router.poll(t0 + ms(100)), None);

        let action = router.poll(t0 + ms(260));
        assert_eq!(
            action,
            Some(GestureAction::FocusAndExpose(NormalizedPoint::new(0.25, 0.25)))
        );
        assert_eq!(router.poll(t0 + ms(400)), None);
    }

    #[test]
    fn double_tap_flips_without_focusing() {
        let t0 = Instant::now();
        let mut router = GestureRouter::new(400.0, 800.0);

        assert_eq!(router.tap(100.0, 200.0, t0), None);
        assert_eq!(router.tap(102.0, 198.0, t0 + ms(120)), Some(GestureAction::FlipCamera));
        assert_eq!(router.poll(t0 + ms(1000)), None);
        assert!(router.focus_indicator(t0 + ms(1000)).is_none());
    }

    #[test]
    fn indicator_is_transient() {
        let t0 = Instant::now();
        let mut router = GestureRouter::new(400.0, 800.0);
        router.tap(40.0, 80.0, t0);
        let released = t0 + ms(300);
        router.poll(released);

        let indicator = router.focus_indicator(released + ms(100)).unwrap();
        assert_eq!((indicator.x, indicator.y), (40.0, 80.0));
        assert!(router.focus_indicator(released + ms(301)).is_none());
    }

    #[test]
    fn stale_tap_is_released_by_the_next_one() {
        let t0 = Instant::now();
        let mut router = GestureRouter::new(100.0, 100.0);
        router.tap(10.0, 10.0, t0);

        let action = router.tap(90.0, 90.0, t0 + ms(500));
        assert_eq!(
            action,
            Some(GestureAction::FocusAndExpose(NormalizedPoint::new(0.1, 0.1)))
        );
        assert!(router.next_deadline().is_some());
        assert_eq!(
            router.poll(t0 + ms(800)),
            Some(GestureAction::FocusAndExpose(NormalizedPoint::new(0.9, 0.9)))
        );
    }

    #[test]
    fn taps_outside_the_view_clamp() {
        let t0 = Instant::now();
        let mut router = GestureRouter::new(100.0, 100.0).with_tap_window(ms(50));
        router.tap(150.0, -20.0, t0);
        assert_eq!(
            router.poll(t0 + ms(60)),
            Some(GestureAction::FocusAndExpose(NormalizedPoint::new(1.0, 0.0)))
        );
    }
}
