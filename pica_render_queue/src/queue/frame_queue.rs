/// Frame queue - two-slot double buffer of "targets drawn together"
///
/// Slot `queue_swap` holds the oldest queued frame (the one rendering or
/// next to render); frames are built in slot `queue_swap ^ queued_count`.
/// Each slot chains its targets through their `frame_next[slot]` field.

use crate::gpu::{CommandList, SubmitFlags};
use super::render_target::TargetKey;
use super::target_registry::TargetRegistry;
use super::invariant_violation;

bitflags::bitflags! {
    /// Flags accepted by `Scheduler::frame_begin`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FrameFlags: u8 {
        /// Allow at most one frame in flight
        const SYNCDRAW = 1 << 0;
        /// Return false instead of blocking when the frame cap is reached
        const NONBLOCK = 1 << 1;
    }
}

/// Frames in flight without `SYNCDRAW`
pub const MAX_QUEUED_FRAMES: usize = 2;

#[derive(Debug, Default)]
struct QueuedFrame {
    target_list: Option<TargetKey>,
    commands: Option<CommandList>,
    flags: SubmitFlags,
}

/// Double-buffered frame queue
#[derive(Debug, Default)]
pub struct FrameQueue {
    frames: [QueuedFrame; 2],
    queue_swap: usize,
    queued_count: usize,
    rendering: bool,
    in_frame: bool,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot of the oldest queued frame
    pub fn queue_swap(&self) -> usize {
        self.queue_swap
    }

    /// Frames ended but not yet rendered
    pub fn queued_count(&self) -> usize {
        self.queued_count
    }

    /// Whether the oldest frame is on the GPU
    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    /// Whether a frame is being built
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// Slot the open (or next) frame is built in
    pub fn build_slot(&self) -> usize {
        (self.queue_swap ^ self.queued_count) & 1
    }

    /// In-flight frame cap for `flags`
    pub fn cap(flags: FrameFlags) -> usize {
        if flags.contains(FrameFlags::SYNCDRAW) { 1 } else { MAX_QUEUED_FRAMES }
    }

    /// Whether another frame may begin under `flags`
    pub fn has_room(&self, flags: FrameFlags) -> bool {
        self.queued_count < Self::cap(flags)
    }

    pub(crate) fn open(&mut self) {
        self.in_frame = true;
    }

    /// Add `key` to the build slot's target list (idempotent per slot)
    ///
    /// Returns `true` if the target was not yet part of the frame.
    pub(crate) fn add_target(&mut self, registry: &mut TargetRegistry, key: TargetKey) -> bool {
        let slot = self.build_slot();
        match registry.get(key) {
            Some(target) if target.in_frame[slot] => return false,
            Some(_) => {}
            None => return false,
        }

        match self.frames[slot].target_list {
            None => self.frames[slot].target_list = Some(key),
            Some(mut cursor) => {
                while let Some(next) = registry.get(cursor).and_then(|t| t.frame_next[slot]) {
                    cursor = next;
                }
                match registry.get_mut(cursor) {
                    Some(tail) => tail.frame_next[slot] = Some(key),
                    None => invariant_violation("pica::FrameQueue",
                        format!("frame slot {} chain broken", slot)),
                }
            }
        }

        if let Some(target) = registry.get_mut(key) {
            target.in_frame[slot] = true;
            target.frame_next[slot] = None;
        }
        true
    }

    /// Whether the open frame references any target
    pub fn build_slot_is_empty(&self) -> bool {
        self.frames[self.build_slot()].target_list.is_none()
    }

    /// Close the open frame
    ///
    /// An empty frame is dropped. Otherwise `commands` are stored in the
    /// build slot and the frame joins the queue; returns whether it did.
    pub(crate) fn close(&mut self, commands: Option<CommandList>, flags: SubmitFlags) -> bool {
        self.in_frame = false;
        let slot = self.build_slot();
        if self.frames[slot].target_list.is_none() {
            return false;
        }
        self.frames[slot].commands = commands;
        self.frames[slot].flags = flags;
        self.queued_count += 1;
        true
    }

    /// Throw away the open frame and its target list
    pub(crate) fn abandon(&mut self, registry: &mut TargetRegistry) {
        let slot = self.build_slot();
        for key in self.targets(registry, slot) {
            if let Some(target) = registry.get_mut(key) {
                target.frame_next[slot] = None;
                target.in_frame[slot] = false;
            }
        }
        self.frames[slot] = QueuedFrame::default();
        self.in_frame = false;
    }

    /// Targets of frame slot `slot`, in insertion order
    pub fn targets(&self, registry: &TargetRegistry, slot: usize) -> Vec<TargetKey> {
        let slot = slot & 1;
        std::iter::successors(self.frames[slot].target_list, |key| {
            registry.get(*key).and_then(|t| t.frame_next[slot])
        })
        .collect()
    }

    /// Whether the oldest frame can start: queued, not rendering, and every
    /// target it touches is drawable
    pub fn ready_to_submit(&self, registry: &TargetRegistry) -> bool {
        if self.rendering || self.queued_count == 0 {
            return false;
        }
        self.targets(registry, self.queue_swap)
            .iter()
            .all(|key| registry.get(*key).is_some_and(|t| t.draw_ok))
    }

    /// Mark the oldest frame as rendering; returns its commands and flags
    ///
    /// Clears `draw_ok` on every target the frame touches.
    pub(crate) fn start(&mut self, registry: &mut TargetRegistry) -> (CommandList, SubmitFlags) {
        self.rendering = true;
        for key in self.targets(registry, self.queue_swap) {
            if let Some(target) = registry.get_mut(key) {
                target.draw_ok = false;
            }
        }
        let frame = &mut self.frames[self.queue_swap];
        (frame.commands.clone().unwrap_or_default(), frame.flags)
    }

    /// Consume the rendered frame and rotate the queue
    ///
    /// Returns the frame's targets; their slot membership is cleared.
    pub(crate) fn complete(&mut self, registry: &mut TargetRegistry) -> Vec<TargetKey> {
        let slot = self.queue_swap;
        let keys = self.targets(registry, slot);
        for key in &keys {
            if let Some(target) = registry.get_mut(*key) {
                target.frame_next[slot] = None;
                target.in_frame[slot] = false;
            }
        }

        self.frames[slot] = QueuedFrame::default();
        self.queue_swap ^= 1;
        self.queued_count -= 1;
        self.rendering = false;
        keys
    }
}

#[cfg(test)]
#[path = "frame_queue_tests.rs"]
mod tests;
