/// Screen output slots - which target feeds which physical display
///
/// Three fixed slots: top-left, top-right (stereo right eye) and bottom.

use crate::gpu::{Screen, Side};
use super::render_target::TargetKey;

/// Physical output a target can be linked to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputSlot {
    TopLeft,
    TopRight,
    Bottom,
}

impl OutputSlot {
    pub const ALL: [OutputSlot; 3] = [OutputSlot::TopLeft, OutputSlot::TopRight, OutputSlot::Bottom];

    /// Slot fed by `screen`/`side` (the bottom screen ignores the side)
    pub fn new(screen: Screen, side: Side) -> Self {
        match (screen, side) {
            (Screen::Bottom, _) => OutputSlot::Bottom,
            (Screen::Top, Side::Right) => OutputSlot::TopRight,
            (Screen::Top, Side::Left) => OutputSlot::TopLeft,
        }
    }

    pub fn index(self) -> usize {
        match self {
            OutputSlot::TopLeft => 0,
            OutputSlot::TopRight => 1,
            OutputSlot::Bottom => 2,
        }
    }
}

/// Target installed in each output slot
#[derive(Debug, Default)]
pub struct OutputSlots {
    slots: [Option<TargetKey>; 3],
}

impl OutputSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: OutputSlot) -> Option<TargetKey> {
        self.slots[slot.index()]
    }

    /// Install `key`; returns the target it displaced
    pub fn set(&mut self, slot: OutputSlot, key: TargetKey) -> Option<TargetKey> {
        self.slots[slot.index()].replace(key).filter(|old| *old != key)
    }

    /// Empty a slot; returns its previous target
    pub fn take(&mut self, slot: OutputSlot) -> Option<TargetKey> {
        self.slots[slot.index()].take()
    }

    /// Slot currently holding `key`
    pub fn find(&self, key: TargetKey) -> Option<OutputSlot> {
        OutputSlot::ALL.into_iter().find(|slot| self.get(*slot) == Some(key))
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
