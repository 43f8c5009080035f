/// Frame pacing - fixed-point rate accumulators per refresh domain
///
/// Each screen refreshes at 60 Hz on its own vblank. Every vblank subtracts
/// the target rate from that screen's accumulator; when it drops to zero or
/// below, 60 is added back and the vblank is due: transfers run and the
/// screen's frame counter advances. Arithmetic is Q16.16 so the cadence
/// never drifts over long runs.

use crate::gpu::Screen;

/// Display refresh rate, and the highest accepted frame rate
pub const REFRESH_RATE: f32 = 60.0;

const FRACT_BITS: u32 = 16;
const REFRESH_FIXED: i32 = 60 << FRACT_BITS;

fn to_fixed(fps: f32) -> i32 {
    (fps * (1 << FRACT_BITS) as f32).round() as i32
}

fn from_fixed(value: i32) -> f32 {
    value as f32 / (1 << FRACT_BITS) as f32
}

fn domain(screen: Screen) -> usize {
    match screen {
        Screen::Top => 0,
        Screen::Bottom => 1,
    }
}

/// Whether `fps` is an accepted frame rate (0 < fps <= 60)
pub fn is_valid_rate(fps: f32) -> bool {
    fps > 0.0 && fps <= REFRESH_RATE
}

/// Per-screen vblank gate and logical frame counters
#[derive(Debug, Clone)]
pub struct FramePacer {
    rate: i32,
    accumulators: [i32; 2],
    counters: [u32; 2],
}

impl FramePacer {
    /// Create a pacer; out-of-range rates fall back to 60
    pub fn new(fps: f32) -> Self {
        let fps = if is_valid_rate(fps) { fps } else { REFRESH_RATE };
        Self {
            rate: to_fixed(fps),
            accumulators: [0; 2],
            counters: [0; 2],
        }
    }

    /// Current target rate in frames per second
    pub fn rate(&self) -> f32 {
        from_fixed(self.rate)
    }

    /// Change the target rate; returns the previous one
    ///
    /// Rates outside `0 < fps <= 60` leave the pacer unchanged.
    pub fn set_rate(&mut self, fps: f32) -> f32 {
        let previous = self.rate();
        if is_valid_rate(fps) {
            self.rate = to_fixed(fps);
        } else {
            crate::pica_warn!("pica::FramePacer",
                "Rejected frame rate {} (keeping {})", fps, previous);
        }
        previous
    }

    /// Account one vblank of `screen`; returns whether it is due
    pub fn tick(&mut self, screen: Screen) -> bool {
        let d = domain(screen);
        self.accumulators[d] -= self.rate;
        if self.accumulators[d] > 0 {
            return false;
        }
        self.accumulators[d] += REFRESH_FIXED;
        self.counters[d] = self.counters[d].wrapping_add(1);
        true
    }

    /// Due vblanks seen on `screen`
    pub fn counter(&self, screen: Screen) -> u32 {
        self.counters[domain(screen)]
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new(REFRESH_RATE)
    }
}

#[cfg(test)]
#[path = "pacing_tests.rs"]
mod tests;
