/// Render target - a frame buffer plus its readiness bookkeeping
///
/// Targets live in the registry arena and are addressed by `TargetKey`.
/// Queue membership (registry list, frame slots, pending queue chain) is
/// stored as key fields on the target itself.

use slotmap::new_key_type;
use crate::gpu::{
    ColorFormat, DepthFormat, DisplayTransfer, FillRange, FillWidth, FrameBuffer, GpuAddr,
    MemoryFill, Screen, Side, TransferFlags,
};

// ===== SLOT MAP KEY =====

new_key_type! {
    /// Stable handle of a render target.
    ///
    /// A key is invalidated when its target is deleted; later lookups
    /// report `Error::InvalidResource` instead of touching freed memory.
    pub struct TargetKey;
}

bitflags::bitflags! {
    /// Buffers cleared after each completed frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClearBits: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const ALL = Self::COLOR.bits() | Self::DEPTH.bits();
    }
}

/// Position of a target in the draw state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetState {
    /// Not referenced by any queue, safe to draw on
    Drawable,
    /// Referenced by a frame that has not started rendering
    Queued,
    /// The frame touching it is being rendered
    Rendering,
    /// Rendered, waiting for or undergoing its display transfer
    Transferring,
    /// Waiting for or undergoing its memory fill
    Clearing,
}

/// Pending queue a target currently belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Clear,
    Transfer,
}

/// Pending queue member: a registry target or the stereo scratch copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueNode {
    Target(TargetKey),
    StereoScratch,
}

/// A destination frame buffer plus its readiness state
#[derive(Debug, Clone)]
pub struct RenderTarget {
    pub(crate) frame_buffer: FrameBuffer,
    pub(crate) owns_color: bool,
    pub(crate) owns_depth: bool,

    pub(crate) draw_ok: bool,
    pub(crate) transfer_ok: bool,
    pub(crate) used: bool,

    pub(crate) clear_bits: ClearBits,
    pub(crate) clear_color: u32,
    pub(crate) clear_depth: u32,

    pub(crate) linked: bool,
    pub(crate) screen: Screen,
    pub(crate) side: Side,
    pub(crate) transfer_flags: TransferFlags,

    // Registry list
    pub(crate) prev: Option<TargetKey>,
    pub(crate) next: Option<TargetKey>,
    // Frame slot lists, one per queue parity
    pub(crate) frame_next: [Option<TargetKey>; 2],
    pub(crate) in_frame: [bool; 2],
    // Pending queue chain
    pub(crate) link: Option<QueueNode>,
    pub(crate) stage: Option<Stage>,
}

impl RenderTarget {
    pub(crate) fn new(frame_buffer: FrameBuffer, owns_color: bool, owns_depth: bool) -> Self {
        Self {
            frame_buffer,
            owns_color,
            owns_depth,
            draw_ok: true,
            transfer_ok: false,
            used: false,
            clear_bits: ClearBits::empty(),
            clear_color: 0,
            clear_depth: 0,
            linked: false,
            screen: Screen::Top,
            side: Side::Left,
            transfer_flags: TransferFlags::default(),
            prev: None,
            next: None,
            frame_next: [None; 2],
            in_frame: [false; 2],
            link: None,
            stage: None,
        }
    }

    /// Placeholder for the stereo scratch slot, never drawn on
    pub(crate) fn scratch() -> Self {
        Self::new(
            FrameBuffer::new(0, 0, None, ColorFormat::Rgba8, None),
            false,
            false,
        )
    }

    /// Right-eye duplicate of a left-eye target, transferred once
    pub(crate) fn stereo_copy(&self) -> Self {
        Self {
            side: Side::Right,
            clear_bits: ClearBits::empty(),
            owns_color: false,
            owns_depth: false,
            used: false,
            prev: None,
            next: None,
            frame_next: [None; 2],
            in_frame: [false; 2],
            link: None,
            stage: None,
            ..self.clone()
        }
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.frame_buffer
    }

    pub fn width(&self) -> u16 {
        self.frame_buffer.width
    }

    pub fn height(&self) -> u16 {
        self.frame_buffer.height
    }

    pub fn color_format(&self) -> ColorFormat {
        self.frame_buffer.color_format
    }

    pub fn depth_format(&self) -> Option<DepthFormat> {
        self.frame_buffer.depth_format
    }

    /// Whether the color buffer is freed with the target
    pub fn owns_color(&self) -> bool {
        self.owns_color
    }

    /// Whether the depth buffer is freed with the target
    pub fn owns_depth(&self) -> bool {
        self.owns_depth
    }

    /// Safe to submit a new frame referencing this target
    pub fn draw_ok(&self) -> bool {
        self.draw_ok
    }

    /// Rendered and awaiting its vblank display transfer
    pub fn transfer_ok(&self) -> bool {
        self.transfer_ok
    }

    /// Touched by the frame currently being built
    pub fn is_used(&self) -> bool {
        self.used
    }

    pub fn clear_bits(&self) -> ClearBits {
        self.clear_bits
    }

    pub fn clear_color(&self) -> u32 {
        self.clear_color
    }

    pub fn clear_depth(&self) -> u32 {
        self.clear_depth
    }

    /// Whether render completions route to the transfer queue
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Output this target transfers to, if linked
    pub fn output(&self) -> Option<(Screen, Side)> {
        self.linked.then_some((self.screen, self.side))
    }

    pub fn transfer_flags(&self) -> TransferFlags {
        self.transfer_flags
    }

    /// Whether the target is in the target list of frame slot `slot`
    pub fn in_frame(&self, slot: usize) -> bool {
        self.in_frame[slot & 1]
    }

    /// Pending queue currently holding the target
    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    /// Derive the draw state machine position from the flags
    pub fn state(&self) -> TargetState {
        match self.stage {
            Some(Stage::Transfer) => TargetState::Transferring,
            Some(Stage::Clear) => TargetState::Clearing,
            None if self.transfer_ok => TargetState::Transferring,
            None if !self.draw_ok => TargetState::Rendering,
            None if self.used || self.in_frame.iter().any(|&f| f) => TargetState::Queued,
            None => TargetState::Drawable,
        }
    }

    /// Memory fill for the configured clear bits
    pub(crate) fn clear_fill(&self) -> MemoryFill {
        let fb = &self.frame_buffer;
        let color = fb
            .color
            .filter(|_| self.clear_bits.contains(ClearBits::COLOR))
            .map(|start| FillRange {
                start,
                end: start.offset(fb.color_size()),
                value: self.clear_color,
                width: color_fill_width(fb.color_format),
            });
        let depth = fb
            .depth
            .zip(fb.depth_format)
            .filter(|_| self.clear_bits.contains(ClearBits::DEPTH))
            .map(|(start, format)| FillRange {
                start,
                end: start.offset(fb.depth_size()),
                value: self.clear_depth,
                width: depth_fill_width(format),
            });
        MemoryFill { ranges: [color, depth] }
    }

    /// Display transfer of the color buffer into `dst`
    pub(crate) fn display_transfer(&self, dst: GpuAddr) -> DisplayTransfer {
        let fb = &self.frame_buffer;
        let dim = (fb.width, fb.height);
        DisplayTransfer {
            src: fb.color.unwrap_or(GpuAddr(0)),
            src_dim: dim,
            dst,
            dst_dim: dim,
            flags: self.transfer_flags,
        }
    }
}

fn color_fill_width(format: ColorFormat) -> FillWidth {
    match format {
        ColorFormat::Rgba8 => FillWidth::Bits32,
        ColorFormat::Rgb8 => FillWidth::Bits24,
        _ => FillWidth::Bits16,
    }
}

fn depth_fill_width(format: DepthFormat) -> FillWidth {
    match format {
        DepthFormat::Depth16 => FillWidth::Bits16,
        DepthFormat::Depth24 => FillWidth::Bits24,
        DepthFormat::Depth24Stencil8 => FillWidth::Bits32,
    }
}

/// Pack a normalized RGBA color into the RGBA8 clear value
pub fn pack_clear_color(color: glam::Vec4) -> u32 {
    let c = (color.clamp(glam::Vec4::ZERO, glam::Vec4::ONE) * 255.0).round();
    (c.x as u32) << 24 | (c.y as u32) << 16 | (c.z as u32) << 8 | c.w as u32
}

#[cfg(test)]
#[path = "render_target_tests.rs"]
mod tests;
