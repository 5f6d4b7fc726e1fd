//! Lifecycle rules: scene bounds and reset fade-out.

use crate::vehicle::Vehicle;
use std::time::Duration;

/// True once a vehicle has left the scene on either axis.
pub fn out_of_bounds(v: &Vehicle, boundary: f64) -> bool {
    v.position.x.abs() > boundary || v.position.y.abs() > boundary
}

/// Starts fading a vehicle. A vehicle that is already fading restarts its
/// fade from `now`.
pub fn begin_fade(v: &mut Vehicle, now: Duration) {
    v.fading = true;
    v.fade_start = Some(now);
}

/// Updates the opacity of a fading vehicle.
///
/// Returns true when the vehicle is fully transparent and should be removed.
pub fn update_fade(v: &mut Vehicle, now: Duration, fade_secs: f64) -> bool {
    let Some(start) = v.fade_start.filter(|_| v.fading) else {
        return false;
    };

    let elapsed = now.saturating_sub(start).as_secs_f64();
    v.opacity = if fade_secs > 0.0 {
        (1.0 - elapsed / fade_secs).max(0.0)
    } else {
        0.0
    };
    v.opacity <= 0.0
}
