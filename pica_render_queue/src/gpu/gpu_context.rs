/// GPU context - command buffer plus stale-state tracking
///
/// State set on the context (bound frame buffer, viewport) is written to the
/// command buffer lazily: setters only raise dirty bits, `update()` emits the
/// register writes before the next recorded draw.

use crate::error::Result;
use crate::gpu::command_buffer::{reg, CommandBuffer, CommandList};
use crate::gpu::FrameBuffer;

bitflags::bitflags! {
    /// "State is stale" bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StateFlags: u32 {
        /// Something was drawn into the bound frame buffer
        const DRAW_USED = 1 << 1;
        /// Frame-buffer registers must be resent
        const FRAME_BUF = 1 << 5;
        /// Viewport registers must be resent
        const VIEWPORT = 1 << 6;
    }
}

/// Command buffer owner for the render queue
pub struct GpuContext {
    commands: CommandBuffer,
    dirty: StateFlags,
    frame_buffer: Option<FrameBuffer>,
    viewport: (u16, u16),
}

impl GpuContext {
    /// Create a context with a command buffer of `size_bytes`
    pub fn new(size_bytes: usize) -> Self {
        Self {
            commands: CommandBuffer::new(size_bytes / 4),
            dirty: StateFlags::empty(),
            frame_buffer: None,
            viewport: (0, 0),
        }
    }

    /// Currently stale state
    pub fn dirty(&self) -> StateFlags {
        self.dirty
    }

    /// Frame buffer the next draws go to
    pub fn bound_frame_buffer(&self) -> Option<&FrameBuffer> {
        self.frame_buffer.as_ref()
    }

    /// Bind a frame buffer and reset the viewport to cover it
    pub fn bind(&mut self, frame_buffer: &FrameBuffer) {
        self.frame_buffer = Some(*frame_buffer);
        self.viewport = (frame_buffer.width, frame_buffer.height);
        self.dirty |= StateFlags::FRAME_BUF | StateFlags::VIEWPORT;
    }

    /// Emit every stale register block
    pub fn update(&mut self) -> Result<()> {
        if self.dirty.contains(StateFlags::FRAME_BUF) {
            if self.dirty.contains(StateFlags::DRAW_USED) {
                self.commands.add_write(reg::FRAMEBUFFER_FLUSH, 1)?;
                self.dirty.remove(StateFlags::DRAW_USED);
            }
            if let Some(fb) = self.frame_buffer {
                self.write_frame_buffer(&fb)?;
            }
            self.dirty.remove(StateFlags::FRAME_BUF);
        }

        if self.dirty.contains(StateFlags::VIEWPORT) {
            let (w, h) = self.viewport;
            self.commands.add_incremental_writes(
                reg::VIEWPORT_WIDTH,
                &[u32::from(w) / 2, u32::from(w), u32::from(h) / 2, u32::from(h)],
            )?;
            self.commands.add_write(reg::VIEWPORT_XY, 0)?;
            self.dirty.remove(StateFlags::VIEWPORT);
        }
        Ok(())
    }

    fn write_frame_buffer(&mut self, fb: &FrameBuffer) -> Result<()> {
        let regs = fb.location_regs();
        self.commands.add_write(reg::FRAMEBUFFER_INVALIDATE, 1)?;
        self.commands.add_incremental_writes(reg::DEPTHBUFFER_LOC, regs.words())?;
        self.commands.add_write(reg::RENDERBUF_DIM, regs.dim)?;
        self.commands.add_write(reg::DEPTHBUFFER_FORMAT, fb.depth_format_reg())?;
        self.commands.add_write(reg::COLORBUFFER_FORMAT, fb.color_format_reg())?;
        self.commands.add_write(reg::FRAMEBUFFER_BLOCK32, u32::from(fb.block32))?;
        self.commands.add_incremental_writes(reg::COLORBUFFER_READ, &fb.access_regs())
    }

    /// Flush stale state, then append opaque draw words
    pub fn record(&mut self, words: &[u32]) -> Result<()> {
        self.update()?;
        self.commands.add_raw(words)?;
        self.dirty |= StateFlags::DRAW_USED;
        Ok(())
    }

    /// Close the current frame's commands into a `CommandList`
    pub fn finalize(&mut self) -> Result<CommandList> {
        if self.dirty.contains(StateFlags::DRAW_USED) {
            self.commands.add_write(reg::FRAMEBUFFER_FLUSH, 1)?;
            self.commands.add_write(reg::FRAMEBUFFER_INVALIDATE, 1)?;
            self.dirty.remove(StateFlags::DRAW_USED);
        }
        self.commands.finalize()
    }

    /// Throw away the current frame's commands
    pub fn discard(&mut self) {
        self.commands.discard();
        self.dirty.remove(StateFlags::DRAW_USED);
    }

    /// Forget the bound frame buffer if it is `frame_buffer`
    pub fn unbind_if(&mut self, frame_buffer: &FrameBuffer) {
        if self.frame_buffer.as_ref() == Some(frame_buffer) {
            self.frame_buffer = None;
            self.dirty.remove(StateFlags::FRAME_BUF);
        }
    }

    /// Peak command buffer usage (0.0 ..= 1.0)
    pub fn usage(&self) -> f32 {
        self.commands.peak_usage()
    }

    /// Words recorded in the open frame
    pub fn pending_words(&self) -> usize {
        self.commands.len()
    }
}

#[cfg(test)]
#[path = "gpu_context_tests.rs"]
mod tests;
