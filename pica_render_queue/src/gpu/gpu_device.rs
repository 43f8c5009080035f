/// GpuDevice trait - the hardware side of the GPU Context collaborator
///
/// Everything the render queue needs from the coprocessor and the display
/// subsystem: memory, asynchronous operations, screen framebuffers and the
/// blocking event wait. Every asynchronous operation reports completion
/// exactly once through `wait_for_event()`.

use crate::gpu::CommandList;

/// Physical address as seen by the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuAddr(pub u32);

impl GpuAddr {
    /// Address `bytes` past this one
    pub fn offset(self, bytes: u32) -> GpuAddr {
        GpuAddr(self.0.wrapping_add(bytes))
    }
}

/// Memory pool an allocation comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// Video memory (render buffers)
    Vram,
    /// CPU/GPU shared linear heap (command buffers)
    Linear,
}

/// Physical display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Top,
    Bottom,
}

/// Eye of a stereoscopic display (the bottom screen only has `Left`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

/// Completion and timing signals delivered by the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareEvent {
    /// A submitted command list finished executing
    RenderDone,
    /// A display transfer or texture copy finished
    TransferDone,
    /// A memory fill finished
    ClearDone,
    /// Top screen vertical blank
    VBlankTop,
    /// Bottom screen vertical blank
    VBlankBottom,
}

bitflags::bitflags! {
    /// Flags handed through to command list submission
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SubmitFlags: u8 {
        /// The caller already flushed the data caches touched by the list
        const FLUSH = 1 << 1;
        /// Update the GPU command-list registers before running
        const UPDATE = 1 << 0;
    }
}

/// Packed display-transfer control word (formats, scaling, tiling)
///
/// The layout is hardware specific and passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TransferFlags(pub u32);

/// Copy of a color buffer into a display framebuffer (format converting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayTransfer {
    pub src: GpuAddr,
    /// (width, height) of the source
    pub src_dim: (u16, u16),
    pub dst: GpuAddr,
    /// (width, height) of the destination
    pub dst_dim: (u16, u16),
    pub flags: TransferFlags,
}

/// Raw copy between two buffers through the transfer engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCopy {
    pub src: GpuAddr,
    /// Packed (line width, gap) of the source
    pub src_dim: u32,
    pub dst: GpuAddr,
    /// Packed (line width, gap) of the destination
    pub dst_dim: u32,
    pub size: u32,
    pub flags: TransferFlags,
}

/// Fill value width for one memory fill range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillWidth {
    Bits16,
    Bits24,
    Bits32,
}

/// One of the two ranges a memory fill can clear in a single operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillRange {
    pub start: GpuAddr,
    pub end: GpuAddr,
    pub value: u32,
    pub width: FillWidth,
}

/// Hardware memory fill of up to two ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryFill {
    pub ranges: [Option<FillRange>; 2],
}

/// Hardware + memory interface consumed by the scheduler
///
/// Calls returning `()` start asynchronous work: control returns at once and
/// the matching `HardwareEvent` is delivered later by `wait_for_event()`.
pub trait GpuDevice {
    /// Allocate `size` bytes from `kind`. `None` when the pool is exhausted.
    fn alloc(&mut self, kind: MemoryKind, size: u32) -> Option<GpuAddr>;

    /// Release an allocation made by `alloc`
    fn free(&mut self, addr: GpuAddr);

    /// Run a finalized command list. Completes with `RenderDone`.
    fn submit(&mut self, commands: &CommandList, flags: SubmitFlags);

    /// Start a display transfer. Completes with `TransferDone`.
    fn display_transfer(&mut self, transfer: &DisplayTransfer);

    /// Start a texture copy. Completes with `TransferDone`.
    fn texture_copy(&mut self, copy: &TextureCopy);

    /// Start a memory fill. Completes with `ClearDone`.
    fn memory_fill(&mut self, fill: &MemoryFill);

    /// Address of the current back framebuffer of a screen/side
    fn framebuffer(&mut self, screen: Screen, side: Side) -> GpuAddr;

    /// Reconfigure a screen before writing into it (`flip` swaps immediately)
    fn configure_screen(&mut self, screen: Screen, flip: bool);

    /// Whether the top screen currently shows stereoscopic 3D
    fn is_3d(&self) -> bool;

    /// Block until the next hardware event and return it
    fn wait_for_event(&mut self) -> HardwareEvent;
}
