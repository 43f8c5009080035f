/// Frame buffer descriptor - where the rasterizer writes color and depth
///
/// A render target owns one `FrameBuffer`. Binding it to the GPU context
/// emits the frame-buffer register block below into the command buffer.

use bytemuck::{Pod, Zeroable};
use crate::gpu::GpuAddr;

/// Color buffer pixel formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    Rgba8,
    Rgb8,
    Rgba5551,
    Rgb565,
    Rgba4,
}

impl ColorFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            ColorFormat::Rgba8 => 4,
            ColorFormat::Rgb8 => 3,
            ColorFormat::Rgba5551 | ColorFormat::Rgb565 | ColorFormat::Rgba4 => 2,
        }
    }

    /// Hardware format id (COLORBUFFER_FORMAT bits 16..)
    pub fn id(self) -> u32 {
        match self {
            ColorFormat::Rgba8 => 0,
            ColorFormat::Rgb8 => 1,
            ColorFormat::Rgba5551 => 2,
            ColorFormat::Rgb565 => 3,
            ColorFormat::Rgba4 => 4,
        }
    }

    /// Pixel size code (COLORBUFFER_FORMAT bits 0..1)
    fn size_code(self) -> u32 {
        match self {
            ColorFormat::Rgba8 => 2,
            ColorFormat::Rgb8 => 1,
            _ => 0,
        }
    }
}

/// Depth buffer formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthFormat {
    Depth16,
    Depth24,
    Depth24Stencil8,
}

impl DepthFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            DepthFormat::Depth16 => 2,
            DepthFormat::Depth24 => 3,
            DepthFormat::Depth24Stencil8 => 4,
        }
    }

    /// Hardware format id (DEPTHBUFFER_FORMAT)
    pub fn id(self) -> u32 {
        match self {
            DepthFormat::Depth16 => 0,
            DepthFormat::Depth24 => 2,
            DepthFormat::Depth24Stencil8 => 3,
        }
    }
}

/// Size in bytes of a color buffer
pub fn color_buffer_size(width: u16, height: u16, format: ColorFormat) -> u32 {
    u32::from(width) * u32::from(height) * format.bytes_per_pixel()
}

/// Size in bytes of a depth buffer
pub fn depth_buffer_size(width: u16, height: u16, format: DepthFormat) -> u32 {
    u32::from(width) * u32::from(height) * format.bytes_per_pixel()
}

/// Frame buffer descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBuffer {
    pub color: Option<GpuAddr>,
    pub depth: Option<GpuAddr>,
    pub width: u16,
    pub height: u16,
    pub color_format: ColorFormat,
    pub depth_format: Option<DepthFormat>,
    pub block32: bool,
    /// Per-channel color write mask (4 bits)
    pub color_mask: u8,
    /// Depth/stencil write mask (bit 1 depth, bit 0 stencil)
    pub depth_mask: u8,
}

impl FrameBuffer {
    /// Describe a frame buffer; masks follow which buffers are present
    pub fn new(
        width: u16,
        height: u16,
        color: Option<GpuAddr>,
        color_format: ColorFormat,
        depth: Option<(GpuAddr, DepthFormat)>,
    ) -> Self {
        let color_mask = if color.is_some() { 0xF } else { 0 };
        let depth_mask = match depth {
            Some((_, DepthFormat::Depth24Stencil8)) => 0x3,
            Some(_) => 0x2,
            None => 0,
        };
        Self {
            color,
            depth: depth.map(|(addr, _)| addr),
            width,
            height,
            color_format,
            depth_format: depth.map(|(_, fmt)| fmt),
            block32: false,
            color_mask,
            depth_mask,
        }
    }

    /// Size in bytes of the color buffer
    pub fn color_size(&self) -> u32 {
        color_buffer_size(self.width, self.height, self.color_format)
    }

    /// Size in bytes of the depth buffer (0 without depth)
    pub fn depth_size(&self) -> u32 {
        self.depth_format
            .map(|fmt| depth_buffer_size(self.width, self.height, fmt))
            .unwrap_or(0)
    }

    /// Register block for DEPTHBUFFER_LOC..FRAMEBUFFER_DIM
    pub fn location_regs(&self) -> FrameBufferRegs {
        FrameBufferRegs {
            depth_loc: self.depth.map(|a| a.0 >> 3).unwrap_or(0),
            color_loc: self.color.map(|a| a.0 >> 3).unwrap_or(0),
            dim: 0x0100_0000
                | ((u32::from(self.height.saturating_sub(1)) & 0xFFF) << 12)
                | (u32::from(self.width) & 0xFFF),
        }
    }

    /// COLORBUFFER_FORMAT value
    pub fn color_format_reg(&self) -> u32 {
        self.color_format.size_code() | (self.color_format.id() << 16)
    }

    /// DEPTHBUFFER_FORMAT value (Depth16 when there is no depth buffer)
    pub fn depth_format_reg(&self) -> u32 {
        self.depth_format.map(DepthFormat::id).unwrap_or(0)
    }

    /// COLORBUFFER_READ..DEPTHBUFFER_WRITE values
    pub fn access_regs(&self) -> [u32; 4] {
        let color = if self.color.is_some() { u32::from(self.color_mask) } else { 0 };
        let depth = if self.depth.is_some() { u32::from(self.depth_mask) } else { 0 };
        [color, color, depth, depth]
    }
}

/// Location registers, written with one incremental write
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct FrameBufferRegs {
    pub depth_loc: u32,
    pub color_loc: u32,
    pub dim: u32,
}

impl FrameBufferRegs {
    /// Register words in write order
    pub fn words(&self) -> &[u32] {
        bytemuck::cast_slice(std::slice::from_ref(self))
    }
}

#[cfg(test)]
#[path = "frame_buffer_tests.rs"]
mod tests;
