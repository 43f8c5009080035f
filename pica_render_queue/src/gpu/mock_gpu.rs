/// Mock GPU device (no hardware required)
///
/// Simulates the coprocessor and display subsystem on a virtual vblank
/// clock so the scheduler can be driven deterministically by tests and
/// host-side tools. Every asynchronous operation completes after its
/// configured latency (in vblank ticks); `None` latency means the operation
/// never completes by itself and the caller fires the event by hand through
/// `Scheduler::advance`.

use std::collections::VecDeque;
use rustc_hash::FxHashMap;

use crate::gpu::{
    CommandList, DisplayTransfer, GpuAddr, GpuDevice, HardwareEvent, MemoryFill, MemoryKind,
    Screen, Side, SubmitFlags, TextureCopy,
};

const VRAM_BASE: u32 = 0x1F00_0000;
const LINEAR_BASE: u32 = 0x1400_0000;
const SCREEN_BASE: u32 = 0x1800_0000;
const ALLOC_ALIGN: u32 = 0x80;

/// Mock device configuration
#[derive(Debug, Clone)]
pub struct MockGpuConfig {
    /// VRAM pool size in bytes
    pub vram_size: u32,
    /// Linear heap size in bytes
    pub linear_size: u32,
    /// Ticks from `submit` to `RenderDone`
    pub render_latency: Option<u32>,
    /// Ticks from a transfer/copy to `TransferDone`
    pub transfer_latency: Option<u32>,
    /// Ticks from a memory fill to `ClearDone`
    pub clear_latency: Option<u32>,
    /// Top screen stereoscopic 3D enabled
    pub stereo_3d: bool,
}

impl Default for MockGpuConfig {
    fn default() -> Self {
        Self {
            vram_size: 0x60_0000,
            linear_size: 0x200_0000,
            render_latency: Some(0),
            transfer_latency: Some(0),
            clear_latency: Some(0),
            stereo_3d: false,
        }
    }
}

impl MockGpuConfig {
    /// Nothing completes on its own; tests fire every completion
    pub fn manual() -> Self {
        Self {
            render_latency: None,
            transfer_latency: None,
            clear_latency: None,
            ..Self::default()
        }
    }
}

/// Operation recorded by the mock device
#[derive(Debug, Clone, PartialEq)]
pub enum GpuOp {
    Alloc { kind: MemoryKind, addr: GpuAddr, size: u32 },
    Free { addr: GpuAddr },
    Submit { commands: CommandList, flags: SubmitFlags },
    DisplayTransfer(DisplayTransfer),
    TextureCopy(TextureCopy),
    MemoryFill(MemoryFill),
    ConfigureScreen { screen: Screen, flip: bool },
}

struct PendingCompletion {
    event: HardwareEvent,
    due: u64,
    seq: u64,
}

struct Pool {
    next: u32,
    size: u32,
    used: u32,
}

impl Pool {
    fn new(base: u32, size: u32) -> Self {
        Self { next: base, size, used: 0 }
    }
}

/// Simulated coprocessor + display
pub struct MockGpu {
    config: MockGpuConfig,
    tick: u64,
    seq: u64,
    pending: Vec<PendingCompletion>,
    vblanks: VecDeque<HardwareEvent>,
    vram: Pool,
    linear: Pool,
    allocations: FxHashMap<GpuAddr, (MemoryKind, u32)>,
    ops: Vec<GpuOp>,
    delivered: Vec<HardwareEvent>,
}

impl MockGpu {
    /// Create a mock device
    pub fn new(config: MockGpuConfig) -> Self {
        Self {
            vram: Pool::new(VRAM_BASE, config.vram_size),
            linear: Pool::new(LINEAR_BASE, config.linear_size),
            config,
            tick: 0,
            seq: 0,
            pending: Vec::new(),
            vblanks: VecDeque::new(),
            allocations: FxHashMap::default(),
            ops: Vec::new(),
            delivered: Vec::new(),
        }
    }

    fn pool_mut(&mut self, kind: MemoryKind) -> &mut Pool {
        match kind {
            MemoryKind::Vram => &mut self.vram,
            MemoryKind::Linear => &mut self.linear,
        }
    }

    fn schedule(&mut self, event: HardwareEvent, latency: Option<u32>) {
        let Some(latency) = latency else {
            return;
        };
        self.seq += 1;
        self.pending.push(PendingCompletion {
            event,
            due: self.tick + u64::from(latency),
            seq: self.seq,
        });
    }

    /// Toggle stereoscopic 3D on the top screen
    pub fn set_3d(&mut self, enabled: bool) {
        self.config.stereo_3d = enabled;
    }

    /// Change completion latencies for operations started from now on
    pub fn set_latencies(&mut self, render: Option<u32>, transfer: Option<u32>, clear: Option<u32>) {
        self.config.render_latency = render;
        self.config.transfer_latency = transfer;
        self.config.clear_latency = clear;
    }

    /// Elapsed vblank ticks
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Every recorded operation, oldest first
    pub fn ops(&self) -> &[GpuOp] {
        &self.ops
    }

    /// Every delivered event, oldest first
    pub fn delivered_events(&self) -> &[HardwareEvent] {
        &self.delivered
    }

    /// Recorded display transfers
    pub fn display_transfers(&self) -> Vec<DisplayTransfer> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                GpuOp::DisplayTransfer(t) => Some(*t),
                _ => None,
            })
            .collect()
    }

    /// Recorded memory fills
    pub fn memory_fills(&self) -> Vec<MemoryFill> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                GpuOp::MemoryFill(f) => Some(*f),
                _ => None,
            })
            .collect()
    }

    /// Number of command lists submitted
    pub fn submit_count(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, GpuOp::Submit { .. })).count()
    }

    /// Completions scheduled but not yet delivered
    pub fn pending_completions(&self) -> usize {
        self.pending.len()
    }

    /// Bytes currently allocated from `kind`
    pub fn used(&self, kind: MemoryKind) -> u32 {
        match kind {
            MemoryKind::Vram => self.vram.used,
            MemoryKind::Linear => self.linear.used,
        }
    }

    /// Number of live allocations
    pub fn live_allocations(&self) -> usize {
        self.allocations.len()
    }

    /// Forget recorded operations and delivered events
    pub fn clear_log(&mut self) {
        self.ops.clear();
        self.delivered.clear();
    }
}

impl GpuDevice for MockGpu {
    fn alloc(&mut self, kind: MemoryKind, size: u32) -> Option<GpuAddr> {
        let aligned = size.checked_add(ALLOC_ALIGN - 1)? & !(ALLOC_ALIGN - 1);
        let pool = self.pool_mut(kind);
        if pool.used.checked_add(aligned)? > pool.size {
            crate::pica_warn!("pica::MockGpu",
                "{:?} exhausted: {} of {} bytes used, {} requested",
                kind, pool.used, pool.size, size);
            return None;
        }
        let addr = GpuAddr(pool.next);
        pool.next = pool.next.checked_add(aligned)?;
        pool.used += aligned;

        self.allocations.insert(addr, (kind, aligned));
        self.ops.push(GpuOp::Alloc { kind, addr, size });
        Some(addr)
    }

    fn free(&mut self, addr: GpuAddr) {
        match self.allocations.remove(&addr) {
            Some((kind, size)) => {
                self.pool_mut(kind).used -= size;
                self.ops.push(GpuOp::Free { addr });
            }
            None => {
                crate::pica_error!("pica::MockGpu", "free of unknown address {:#x}", addr.0);
            }
        }
    }

    fn submit(&mut self, commands: &CommandList, flags: SubmitFlags) {
        self.ops.push(GpuOp::Submit { commands: commands.clone(), flags });
        self.schedule(HardwareEvent::RenderDone, self.config.render_latency);
    }

    fn display_transfer(&mut self, transfer: &DisplayTransfer) {
        self.ops.push(GpuOp::DisplayTransfer(*transfer));
        self.schedule(HardwareEvent::TransferDone, self.config.transfer_latency);
    }

    fn texture_copy(&mut self, copy: &TextureCopy) {
        self.ops.push(GpuOp::TextureCopy(*copy));
        self.schedule(HardwareEvent::TransferDone, self.config.transfer_latency);
    }

    fn memory_fill(&mut self, fill: &MemoryFill) {
        self.ops.push(GpuOp::MemoryFill(*fill));
        self.schedule(HardwareEvent::ClearDone, self.config.clear_latency);
    }

    fn framebuffer(&mut self, screen: Screen, side: Side) -> GpuAddr {
        let index = match (screen, side) {
            (Screen::Top, Side::Left) => 0,
            (Screen::Top, Side::Right) => 1,
            (Screen::Bottom, _) => 2,
        };
        GpuAddr(SCREEN_BASE + index * 0x10_0000)
    }

    fn configure_screen(&mut self, screen: Screen, flip: bool) {
        self.ops.push(GpuOp::ConfigureScreen { screen, flip });
    }

    fn is_3d(&self) -> bool {
        self.config.stereo_3d
    }

    fn wait_for_event(&mut self) -> HardwareEvent {
        loop {
            let due = self
                .pending
                .iter()
                .enumerate()
                .filter(|(_, p)| p.due <= self.tick)
                .min_by_key(|(_, p)| (p.due, p.seq))
                .map(|(i, _)| i);
            if let Some(index) = due {
                let event = self.pending.remove(index).event;
                self.delivered.push(event);
                return event;
            }

            if let Some(event) = self.vblanks.pop_front() {
                self.delivered.push(event);
                return event;
            }

            self.tick += 1;
            self.vblanks.push_back(HardwareEvent::VBlankTop);
            self.vblanks.push_back(HardwareEvent::VBlankBottom);
        }
    }
}

#[cfg(test)]
#[path = "mock_gpu_tests.rs"]
mod tests;
