/// Tests for FrameBuffer descriptors and buffer sizes

use crate::gpu::{color_buffer_size, depth_buffer_size, ColorFormat, DepthFormat, FrameBuffer, GpuAddr};

// ============================================================================
// Tests: Sizes
// ============================================================================

#[test]
fn test_color_sizes_per_format() {
    assert_eq!(color_buffer_size(400, 240, ColorFormat::Rgba8), 400 * 240 * 4);
    assert_eq!(color_buffer_size(400, 240, ColorFormat::Rgb8), 400 * 240 * 3);
    assert_eq!(color_buffer_size(320, 240, ColorFormat::Rgb565), 320 * 240 * 2);
    assert_eq!(color_buffer_size(320, 240, ColorFormat::Rgba4), 320 * 240 * 2);
}

#[test]
fn test_depth_sizes_per_format() {
    assert_eq!(depth_buffer_size(400, 240, DepthFormat::Depth16), 400 * 240 * 2);
    assert_eq!(depth_buffer_size(400, 240, DepthFormat::Depth24), 400 * 240 * 3);
    assert_eq!(depth_buffer_size(400, 240, DepthFormat::Depth24Stencil8), 400 * 240 * 4);
}

// ============================================================================
// Tests: Masks and registers
// ============================================================================

#[test]
fn test_masks_follow_present_buffers() {
    let stencil = FrameBuffer::new(
        240, 400, Some(GpuAddr(0x1800_0000)), ColorFormat::Rgba8,
        Some((GpuAddr(0x1810_0000), DepthFormat::Depth24Stencil8)),
    );
    assert_eq!(stencil.color_mask, 0xF);
    assert_eq!(stencil.depth_mask, 0x3);

    let depth_only = FrameBuffer::new(
        240, 400, Some(GpuAddr(0x1800_0000)), ColorFormat::Rgba8,
        Some((GpuAddr(0x1810_0000), DepthFormat::Depth16)),
    );
    assert_eq!(depth_only.depth_mask, 0x2);

    let no_depth = FrameBuffer::new(240, 400, Some(GpuAddr(0x1800_0000)), ColorFormat::Rgba8, None);
    assert_eq!(no_depth.depth_mask, 0);
    assert_eq!(no_depth.depth_size(), 0);
    assert_eq!(no_depth.access_regs(), [0xF, 0xF, 0, 0]);
}

#[test]
fn test_location_regs_pack_addresses_and_dimensions() {
    let fb = FrameBuffer::new(
        240, 400, Some(GpuAddr(0x1800_0000)), ColorFormat::Rgba8,
        Some((GpuAddr(0x1810_0000), DepthFormat::Depth24)),
    );
    let regs = fb.location_regs();
    assert_eq!(regs.color_loc, 0x1800_0000 >> 3);
    assert_eq!(regs.depth_loc, 0x1810_0000 >> 3);
    assert_eq!(regs.dim & 0xFFF, 240);
    assert_eq!((regs.dim >> 12) & 0xFFF, 399);
    assert_eq!(regs.words(), &[regs.depth_loc, regs.color_loc, regs.dim]);
}

#[test]
fn test_format_registers() {
    let fb = FrameBuffer::new(
        240, 400, Some(GpuAddr(0x1800_0000)), ColorFormat::Rgb8,
        Some((GpuAddr(0x1810_0000), DepthFormat::Depth24Stencil8)),
    );
    assert_eq!(fb.color_format_reg(), 1 | (1 << 16));
    assert_eq!(fb.depth_format_reg(), 3);
}
