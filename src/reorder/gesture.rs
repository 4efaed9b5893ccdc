use std::time::{Duration, Instant};

// Mouse drags start after 8px of travel
const MOUSE_DISTANCE_PX: f32 = 8.0;
// Touch drags start after a 250ms hold that stays within 5px
const TOUCH_HOLD: Duration = Duration::from_millis(250);
const TOUCH_TOLERANCE_PX: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
}

/// What a pointer must do before a press counts as a drag rather than a click.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActivationConstraint {
    Distance { min_px: f32 },
    Delay { hold: Duration, tolerance_px: f32 },
}

impl ActivationConstraint {
    pub fn for_pointer(kind: PointerKind) -> Self {
        match kind {
            PointerKind::Mouse => ActivationConstraint::Distance {
                min_px: MOUSE_DISTANCE_PX,
            },
            PointerKind::Touch => ActivationConstraint::Delay {
                hold: TOUCH_HOLD,
                tolerance_px: TOUCH_TOLERANCE_PX,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Pending,
    Active,
    /// Touch moved too far before the hold elapsed (a scroll, not a drag).
    Cancelled,
}

// A pressed pointer that has not become a drag yet
#[derive(Debug, Clone, Copy)]
pub struct PendingActivation {
    constraint: ActivationConstraint,
    origin: (f32, f32),
    pressed_at: Instant,
}

impl PendingActivation {
    pub fn new(kind: PointerKind, origin: (f32, f32), pressed_at: Instant) -> Self {
        Self {
            constraint: ActivationConstraint::for_pointer(kind),
            origin,
            pressed_at,
        }
    }

    pub fn update(&self, position: (f32, f32), now: Instant) -> Activation {
        let moved = (position.0 - self.origin.0).hypot(position.1 - self.origin.1);
        match self.constraint {
            ActivationConstraint::Distance { min_px } => {
                if moved >= min_px {
                    Activation::Active
                } else {
                    Activation::Pending
                }
            }
            ActivationConstraint::Delay { hold, tolerance_px } => {
                if moved > tolerance_px {
                    Activation::Cancelled
                } else if now.saturating_duration_since(self.pressed_at) >= hold {
                    Activation::Active
                } else {
                    Activation::Pending
                }
            }
        }
    }
}

/// Keyboard reordering for the focused item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardMove {
    Up,
    Down,
}

impl KeyboardMove {
    // Target index, or None at the list edge
    pub fn target(&self, from: usize, len: usize) -> Option<usize> {
        match self {
            KeyboardMove::Up => from.checked_sub(1),
            KeyboardMove::Down => Some(from + 1).filter(|to| *to < len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_needs_distance() {
        let t0 = Instant::now();
        let press = PendingActivation::new(PointerKind::Mouse, (0.0, 0.0), t0);
        assert_eq!(press.update((3.0, 4.0), t0), Activation::Pending);
        assert_eq!(press.update((6.0, 8.0), t0), Activation::Active);
    }

    #[test]
    fn touch_needs_steady_hold() {
        let t0 = Instant::now();
        let press = PendingActivation::new(PointerKind::Touch, (10.0, 10.0), t0);
        assert_eq!(
            press.update((12.0, 10.0), t0 + Duration::from_millis(100)),
            Activation::Pending
        );
        assert_eq!(
            press.update((12.0, 10.0), t0 + Duration::from_millis(250)),
            Activation::Active
        );
        assert_eq!(
            press.update((10.0, 30.0), t0 + Duration::from_millis(100)),
            Activation::Cancelled
        );
    }

    #[test]
    fn keyboard_targets_stop_at_edges() {
        assert_eq!(KeyboardMove::Up.target(0, 3), None);
        assert_eq!(KeyboardMove::Up.target(2, 3), Some(1));
        assert_eq!(KeyboardMove::Down.target(2, 3), None);
        assert_eq!(KeyboardMove::Down.target(0, 3), Some(1));
    }
}
