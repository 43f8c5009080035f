/// Queue module - the render queue proper
///
/// Target registry, pending clear/transfer queues, the two-slot frame
/// queue, screen output slots, frame pacing and the `Scheduler` that ties
/// them to hardware events.

pub mod render_target;
pub mod target_registry;
pub mod pending_queue;
pub mod frame_queue;
pub mod output;
pub mod pacing;
pub mod scheduler;

pub use render_target::{
    RenderTarget, TargetKey, TargetState, ClearBits, Stage, QueueNode, pack_clear_color,
};
pub use target_registry::TargetRegistry;
pub use pending_queue::PendingQueue;
pub use frame_queue::{FrameQueue, FrameFlags, MAX_QUEUED_FRAMES};
pub use output::{OutputSlot, OutputSlots};
pub use pacing::{FramePacer, REFRESH_RATE};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerStats};

/// Host and hardware disagree about what is in flight; nothing can be trusted
pub(crate) fn invariant_violation(source: &str, message: String) -> ! {
    crate::pica_error!(source, "Invariant violation: {}", message);
    panic!("invariant violation: {}", message);
}
