/// Command buffer - CPU-side builder of GPU register writes
///
/// Commands are 32-bit words: parameter first, then a header naming the
/// register, byte-enable mask and extra-parameter count. A frame's commands
/// are finalized into an owned `CommandList` handed to `GpuDevice::submit`.

use crate::error::{Error, Result};

/// Register ids written by the render queue
pub mod reg {
    pub const FINALIZE: u16 = 0x0010;
    pub const VIEWPORT_WIDTH: u16 = 0x0041;
    pub const VIEWPORT_XY: u16 = 0x0068;
    pub const RENDERBUF_DIM: u16 = 0x006E;
    pub const FRAMEBUFFER_INVALIDATE: u16 = 0x0110;
    pub const FRAMEBUFFER_FLUSH: u16 = 0x0111;
    pub const COLORBUFFER_READ: u16 = 0x0112;
    pub const DEPTHBUFFER_FORMAT: u16 = 0x0116;
    pub const COLORBUFFER_FORMAT: u16 = 0x0117;
    pub const FRAMEBUFFER_BLOCK32: u16 = 0x011B;
    pub const DEPTHBUFFER_LOC: u16 = 0x011C;
}

fn header(reg: u16, mask: u8, extra: usize, incremental: bool) -> u32 {
    u32::from(reg)
        | (u32::from(mask & 0xF) << 16)
        | (((extra as u32) & 0xFF) << 20)
        | if incremental { 1 << 31 } else { 0 }
}

/// Fixed-capacity command buffer
pub struct CommandBuffer {
    words: Vec<u32>,
    capacity: usize,
    peak: usize,
}

impl CommandBuffer {
    /// Create a buffer holding at most `capacity` words
    pub fn new(capacity: usize) -> Self {
        Self {
            words: Vec::with_capacity(capacity),
            capacity,
            peak: 0,
        }
    }

    /// Capacity in words
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Words recorded since the last finalize
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether nothing has been recorded since the last finalize
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn reserve(&self, count: usize) -> Result<()> {
        if self.words.len() + count > self.capacity {
            return Err(Error::OutOfMemory);
        }
        Ok(())
    }

    /// Command headers sit on 8-byte boundaries
    fn pad(&mut self) {
        if self.words.len() % 2 != 0 {
            self.words.push(0);
        }
    }

    /// Single register write
    pub fn add_write(&mut self, reg: u16, value: u32) -> Result<()> {
        self.add_masked_write(reg, 0xF, value)
    }

    /// Single register write with a byte-enable mask
    pub fn add_masked_write(&mut self, reg: u16, mask: u8, value: u32) -> Result<()> {
        self.reserve(2)?;
        self.words.push(value);
        self.words.push(header(reg, mask, 0, false));
        Ok(())
    }

    /// Consecutive registers starting at `reg`
    pub fn add_incremental_writes(&mut self, reg: u16, values: &[u32]) -> Result<()> {
        let Some((first, rest)) = values.split_first() else {
            return Ok(());
        };
        self.reserve(2 + rest.len() + 1)?;
        self.words.push(*first);
        self.words.push(header(reg, 0xF, rest.len(), true));
        self.words.extend_from_slice(rest);
        self.pad();
        Ok(())
    }

    /// Raw pre-encoded words (draw payloads from client encoders)
    pub fn add_raw(&mut self, words: &[u32]) -> Result<()> {
        self.reserve(words.len() + 1)?;
        self.words.extend_from_slice(words);
        self.pad();
        Ok(())
    }

    /// Terminate the recorded commands and move them into a `CommandList`
    ///
    /// Appends the FINALIZE write and pads the list to 16 bytes. The buffer
    /// is empty afterwards and ready for the next frame.
    pub fn finalize(&mut self) -> Result<CommandList> {
        self.reserve(4)?;
        self.add_write(reg::FINALIZE, 0x1234_5678)?;
        while self.words.len() % 4 != 0 {
            self.add_write(reg::FINALIZE, 0x1234_5678)?;
        }
        self.peak = self.peak.max(self.words.len());
        let words = std::mem::replace(&mut self.words, Vec::with_capacity(self.capacity));
        Ok(CommandList { words })
    }

    /// Drop everything recorded since the last finalize
    pub fn discard(&mut self) {
        self.words.clear();
    }

    /// Largest finalized list so far, as a fraction of capacity
    pub fn peak_usage(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.peak as f32 / self.capacity as f32
    }
}

/// Finalized command list, owned until its frame has rendered
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandList {
    words: Vec<u32>,
}

impl CommandList {
    /// Command words
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Byte view for DMA
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.words.len() * 4
    }

    /// Registers written by this list, in order
    pub fn written_registers(&self) -> Vec<u16> {
        let mut regs = Vec::new();
        let mut i = 0;
        while i + 1 < self.words.len() {
            let hdr = self.words[i + 1];
            let reg = (hdr & 0xFFFF) as u16;
            let extra = ((hdr >> 20) & 0xFF) as usize;
            let incremental = hdr & (1 << 31) != 0;
            for n in 0..=extra {
                regs.push(if incremental { reg + n as u16 } else { reg });
            }
            i += 2 + extra;
            if i % 2 != 0 {
                i += 1;
            }
        }
        regs
    }
}

#[cfg(test)]
#[path = "command_buffer_tests.rs"]
mod tests;
