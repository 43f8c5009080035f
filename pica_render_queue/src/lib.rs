/*!
# PICA Render Queue

Frame scheduling for a tile-less embedded GPU driving two displays (a
stereoscopic top screen and a bottom screen).

Client code records frames into render targets; the scheduler submits each
frame once every target it draws on is free, copies finished targets to
their screens on the next due vblank and clears them for the next frame.
All progress is driven by hardware events (`RenderDone`, `TransferDone`,
`ClearDone`, `VBlankTop`, `VBlankBottom`) fed through `Scheduler::advance`.

## Architecture

- **GpuDevice**: hardware trait (memory, submit, transfers, fills, vblanks)
- **GpuContext**: command buffer with lazy frame-buffer state
- **TargetRegistry**: live render targets in creation order
- **FrameQueue**: two-slot frame ring and draw state machine
- **PendingQueue**: FIFO clear and transfer stages
- **FramePacer**: per-screen vblank rate limiting
- **Scheduler**: the event loop tying them together

`MockGpu` simulates the hardware on a virtual vblank clock for tests and
host-side tools.
*/

// Internal modules
mod error;
pub mod log;
pub mod gpu;
pub mod queue;

// Main pica namespace module
pub mod pica {
    // Error types
    pub use crate::error::{Error, Result};

    // Scheduler and its collaborators
    pub use crate::queue::{
        ClearBits, FrameFlags, FramePacer, OutputSlot, QueueNode, RenderTarget, Scheduler,
        SchedulerConfig, SchedulerStats, TargetKey, TargetRegistry, TargetState,
        pack_clear_color, MAX_QUEUED_FRAMES, REFRESH_RATE,
    };

    // Logging sub-module (types only, macros are exported at the crate root)
    pub mod log {
        pub use crate::log::{
            Logger, LogEntry, LogSeverity, DefaultLogger, set_logger, reset_logger, emit,
            emit_detailed,
        };
    }

    // Hardware sub-module
    pub mod gpu {
        pub use crate::gpu::*;
    }
}

// Re-export math library at crate root
pub use glam;
