/// Scheduler - the render queue driven by hardware events
///
/// Owns the GPU device, the command buffer context and every queue. Client
/// code builds frames with `frame_begin` / `frame_draw_on` / `frame_end`;
/// hardware completions and vblanks enter through `advance(event)`, either
/// pumped internally while an operation blocks or fed by the caller.
///
/// Per-target flow:
///
/// ```text
/// Drawable -> Queued -> Rendering -+-> Transferring -+-> Clearing -> Drawable
///                                  |                 '-------------> Drawable
///                                  +-> Clearing ------------------> Drawable
///                                  '-------------------------------> Drawable
/// ```

use std::time::{Duration, Instant};
use crate::error::{Error, Result};
use crate::gpu::{
    color_buffer_size, depth_buffer_size, ColorFormat, DepthFormat, DisplayTransfer, FrameBuffer,
    GpuAddr, GpuContext, GpuDevice, HardwareEvent, MemoryFill, MemoryKind, Screen, Side,
    SubmitFlags, TextureCopy, TransferFlags,
};
use super::frame_queue::{FrameFlags, FrameQueue};
use super::output::{OutputSlot, OutputSlots};
use super::pacing::{FramePacer, REFRESH_RATE};
use super::pending_queue::PendingQueue;
use super::render_target::{ClearBits, QueueNode, RenderTarget, Stage, TargetKey};
use super::target_registry::TargetRegistry;
use super::{invariant_violation, pacing};

const SOURCE: &str = "pica::Scheduler";

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Command buffer size in bytes (non-zero multiple of 16)
    pub command_buffer_size: usize,
    /// Maximum number of live render targets
    pub max_targets: usize,
    /// Initial frame rate (0 < rate <= 60)
    pub frame_rate: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 0x40000,
            max_targets: 16,
            frame_rate: REFRESH_RATE,
        }
    }
}

impl SchedulerConfig {
    /// Check every field
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.command_buffer_size == 0
            || self.command_buffer_size % 16 != 0
            || u32::try_from(self.command_buffer_size).is_err()
        {
            return Err(Error::InitializationFailed(format!(
                "command_buffer_size {:#x} must be a non-zero multiple of 16",
                self.command_buffer_size
            )));
        }
        if self.max_targets == 0 {
            return Err(Error::InitializationFailed("max_targets must be at least 1".to_string()));
        }
        if !pacing::is_valid_rate(self.frame_rate) {
            return Err(Error::InitializationFailed(format!(
                "frame_rate {} outside 0 < rate <= {}",
                self.frame_rate, REFRESH_RATE
            )));
        }
        Ok(())
    }
}

/// Scheduler statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerStats {
    /// Command lists handed to the GPU
    pub frames_submitted: u64,
    /// Render completions consumed
    pub frames_rendered: u64,
    /// Display transfers completed by the transfer queue
    pub transfers: u64,
    /// Memory fills completed by the clear queue
    pub clears: u64,
    /// Submit to render-done of the last rendered frame
    pub drawing_time: Duration,
    /// FrameBegin to FrameEnd of the last ended frame
    pub processing_time: Duration,
}

/// Render queue scheduler
pub struct Scheduler<G: GpuDevice> {
    gpu: G,
    config: SchedulerConfig,
    context: GpuContext,
    /// Linear-heap reservation backing the command lists handed to the
    /// device; held for the scheduler's lifetime and freed by `shutdown`
    command_memory: GpuAddr,
    registry: TargetRegistry,
    frames: FrameQueue,
    clear_queue: PendingQueue,
    transfer_queue: PendingQueue,
    outputs: OutputSlots,
    pacer: FramePacer,
    /// Completion owned by an out-of-band operation has arrived
    borrowed_done: bool,
    frame_started: Option<Instant>,
    render_started: Option<Instant>,
    stats: SchedulerStats,
}

impl<G: GpuDevice> Scheduler<G> {
    /// Create the scheduler and allocate its command buffer from linear memory
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` for an invalid config or when the
    /// command buffer cannot be allocated.
    pub fn new(mut gpu: G, config: SchedulerConfig) -> Result<Self> {
        config.validate()?;

        let size = config.command_buffer_size as u32;
        let Some(command_memory) = gpu.alloc(MemoryKind::Linear, size) else {
            crate::pica_error!(SOURCE, "Cannot allocate {:#x} byte command buffer", size);
            return Err(Error::InitializationFailed(format!(
                "command buffer allocation of {:#x} bytes failed", size
            )));
        };

        crate::pica_info!(SOURCE,
            "Render queue ready: {:#x} byte command buffer, {} targets max, {} fps",
            size, config.max_targets, config.frame_rate);

        Ok(Self {
            gpu,
            context: GpuContext::new(config.command_buffer_size),
            command_memory,
            registry: TargetRegistry::new(config.max_targets),
            frames: FrameQueue::new(),
            clear_queue: PendingQueue::new(Stage::Clear),
            transfer_queue: PendingQueue::new(Stage::Transfer),
            outputs: OutputSlots::new(),
            pacer: FramePacer::new(config.frame_rate),
            borrowed_done: false,
            frame_started: None,
            render_started: None,
            stats: SchedulerStats::default(),
            config,
        })
    }

    // ===== ACCESSORS =====

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut G {
        &mut self.gpu
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Look up a live target
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` for a deleted or foreign key.
    pub fn target(&self, key: TargetKey) -> Result<&RenderTarget> {
        self.registry
            .get(key)
            .ok_or_else(|| Error::InvalidResource(format!("unknown render target {:?}", key)))
    }

    fn target_mut(&mut self, key: TargetKey) -> Result<&mut RenderTarget> {
        self.registry
            .get_mut(key)
            .ok_or_else(|| Error::InvalidResource(format!("unknown render target {:?}", key)))
    }

    pub fn target_count(&self) -> usize {
        self.registry.len()
    }

    /// Target installed in an output slot
    pub fn output(&self, slot: OutputSlot) -> Option<TargetKey> {
        self.outputs.get(slot)
    }

    /// Frames ended but not yet rendered
    pub fn queued_frames(&self) -> usize {
        self.frames.queued_count()
    }

    pub fn is_rendering(&self) -> bool {
        self.frames.is_rendering()
    }

    /// Whether a frame is open between `frame_begin` and `frame_end`
    pub fn in_frame(&self) -> bool {
        self.frames.in_frame()
    }

    /// Members of the clear queue, head first
    pub fn clear_queue(&self) -> Vec<QueueNode> {
        self.clear_queue.members(&self.registry)
    }

    /// Members of the transfer queue, head first
    pub fn transfer_queue(&self) -> Vec<QueueNode> {
        self.transfer_queue.members(&self.registry)
    }

    // ===== TARGETS =====

    /// Allocate a render target (color buffer, then optional depth buffer)
    ///
    /// # Errors
    ///
    /// `Error::OutOfMemory` when VRAM or the registry is exhausted. Nothing
    /// stays allocated on failure.
    pub fn create_target(
        &mut self,
        width: u16,
        height: u16,
        color_format: ColorFormat,
        depth_format: Option<DepthFormat>,
    ) -> Result<TargetKey> {
        let size = color_buffer_size(width, height, color_format);
        let Some(color) = self.gpu.alloc(MemoryKind::Vram, size) else {
            crate::pica_warn!(SOURCE, "No VRAM for {}x{} {:?} color buffer", width, height, color_format);
            return Err(Error::OutOfMemory);
        };
        self.build_target(width, height, (color, true), color_format, depth_format)
    }

    /// Wrap a caller-owned color buffer (e.g. a texture) as a render target
    ///
    /// The color buffer is never freed by the scheduler; the depth buffer,
    /// if requested, is allocated and owned as usual.
    ///
    /// # Errors
    ///
    /// `Error::OutOfMemory` when the depth buffer or registry slot cannot be had.
    pub fn create_target_from_buffer(
        &mut self,
        color: GpuAddr,
        width: u16,
        height: u16,
        color_format: ColorFormat,
        depth_format: Option<DepthFormat>,
    ) -> Result<TargetKey> {
        self.build_target(width, height, (color, false), color_format, depth_format)
    }

    fn build_target(
        &mut self,
        width: u16,
        height: u16,
        (color, owns_color): (GpuAddr, bool),
        color_format: ColorFormat,
        depth_format: Option<DepthFormat>,
    ) -> Result<TargetKey> {
        let release_color = |gpu: &mut G| {
            if owns_color {
                gpu.free(color);
            }
        };

        let depth = match depth_format {
            Some(format) => {
                let size = depth_buffer_size(width, height, format);
                match self.gpu.alloc(MemoryKind::Vram, size) {
                    Some(addr) => Some((addr, format)),
                    None => {
                        crate::pica_warn!(SOURCE,
                            "No VRAM for {}x{} {:?} depth buffer", width, height, format);
                        release_color(&mut self.gpu);
                        return Err(Error::OutOfMemory);
                    }
                }
            }
            None => None,
        };

        let frame_buffer = FrameBuffer::new(width, height, Some(color), color_format, depth);
        match self.registry.insert(RenderTarget::new(frame_buffer, owns_color, depth.is_some())) {
            Ok(key) => {
                crate::pica_debug!(SOURCE, "Created target {:?}: {}x{} {:?} depth {:?}",
                    key, width, height, color_format, depth_format);
                Ok(key)
            }
            Err(err) => {
                if let Some((addr, _)) = depth {
                    self.gpu.free(addr);
                }
                release_color(&mut self.gpu);
                Err(err)
            }
        }
    }

    /// Delete a target once no hardware stage uses it any more
    ///
    /// Detaches the target from its output and drops its clear bits so no
    /// new stage is spawned, then pumps events until it is drawable and out
    /// of every queued frame, frees owned buffers and unlinks it.
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` for a stale key, `Error::InvalidState` if the
    /// open frame draws on the target.
    pub fn delete_target(&mut self, key: TargetKey) -> Result<()> {
        let target = self.target(key)?;
        if self.frames.in_frame() && target.in_frame(self.frames.build_slot()) {
            return Err(Error::InvalidState(format!(
                "render target {:?} is drawn on by the open frame", key
            )));
        }

        if let Some(slot) = self.outputs.find(key) {
            self.outputs.take(slot);
        }
        self.target_mut(key)?.clear_bits = ClearBits::empty();
        self.unlink(key);

        while self.target(key).is_ok_and(|t| !t.draw_ok || t.in_frame(0) || t.in_frame(1)) {
            self.pump();
        }

        let Some(target) = self.registry.remove(key) else {
            return Err(Error::InvalidResource(format!("unknown render target {:?}", key)));
        };
        self.context.unbind_if(&target.frame_buffer);
        if target.owns_color {
            if let Some(addr) = target.frame_buffer.color {
                self.gpu.free(addr);
            }
        }
        if target.owns_depth {
            if let Some(addr) = target.frame_buffer.depth {
                self.gpu.free(addr);
            }
        }
        crate::pica_debug!(SOURCE, "Deleted target {:?}", key);
        Ok(())
    }

    /// Configure the buffers cleared after each completed frame
    ///
    /// Bits for absent buffers are dropped. Newly requested bits on a
    /// drawable target start a clear right away.
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` for a stale key.
    pub fn set_clear(&mut self, key: TargetKey, bits: ClearBits, color: u32, depth: u32) -> Result<()> {
        let target = self.target_mut(key)?;
        let mut bits = bits;
        if target.frame_buffer.color.is_none() {
            bits.remove(ClearBits::COLOR);
        }
        if target.frame_buffer.depth.is_none() {
            bits.remove(ClearBits::DEPTH);
        }

        let added = bits.difference(target.clear_bits);
        target.clear_bits = bits;
        target.clear_color = color;
        target.clear_depth = depth;

        if !added.is_empty() && target.draw_ok {
            target.draw_ok = false;
            self.clear_target(QueueNode::Target(key));
        }
        Ok(())
    }

    // ===== OUTPUTS =====

    /// Link a target to a screen output
    ///
    /// A different target already in that slot is unlinked; a target linked
    /// elsewhere leaves its previous slot.
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` for a stale key.
    pub fn set_output(&mut self, key: TargetKey, screen: Screen, side: Side, flags: TransferFlags) -> Result<()> {
        self.target(key)?;
        let slot = OutputSlot::new(screen, side);
        let side = if screen == Screen::Bottom { Side::Left } else { side };

        if let Some(previous) = self.outputs.find(key).filter(|s| *s != slot) {
            self.outputs.take(previous);
        }
        if let Some(displaced) = self.outputs.set(slot, key) {
            crate::pica_debug!(SOURCE, "{:?} replaces {:?} on {:?}", key, displaced, slot);
            self.unlink(displaced);
        }

        let target = self.target_mut(key)?;
        target.linked = true;
        target.screen = screen;
        target.side = side;
        target.transfer_flags = flags;
        crate::pica_debug!(SOURCE, "Linked {:?} to {:?}", key, slot);
        Ok(())
    }

    /// Remove a target from whatever output holds it
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` for a stale key.
    pub fn detach_output(&mut self, key: TargetKey) -> Result<()> {
        self.target(key)?;
        if let Some(slot) = self.outputs.find(key) {
            self.outputs.take(slot);
            crate::pica_debug!(SOURCE, "Detached {:?} from {:?}", key, slot);
        }
        self.unlink(key);
        Ok(())
    }

    /// Clear `linked` and drop a display transfer the target was waiting for
    fn unlink(&mut self, key: TargetKey) {
        if let Some(target) = self.registry.get_mut(key) {
            target.linked = false;
        }
        self.drop_pending_transfer(key);
    }

    /// Release a rendered target whose vblank transfer will not happen
    fn drop_pending_transfer(&mut self, key: TargetKey) {
        let Some(target) = self.registry.get_mut(key).filter(|t| t.transfer_ok) else {
            return;
        };
        target.transfer_ok = false;
        if target.clear_bits.is_empty() {
            target.draw_ok = true;
            self.update_frame_queue();
        } else {
            self.clear_target(QueueNode::Target(key));
        }
    }

    // ===== FRAMES =====

    /// Open a frame
    ///
    /// Blocks while the in-flight frame cap is reached (1 with `SYNCDRAW`,
    /// else 2). Returns `false` when a frame is already open, or when the
    /// cap is reached under `NONBLOCK`.
    pub fn frame_begin(&mut self, flags: FrameFlags) -> bool {
        if self.frames.in_frame() {
            return false;
        }
        while !self.frames.has_room(flags) {
            if flags.contains(FrameFlags::NONBLOCK) {
                return false;
            }
            self.pump();
        }
        self.frames.open();
        self.frame_started = Some(Instant::now());
        true
    }

    /// Draw the following commands into `key`
    ///
    /// Adds the target to the open frame and binds its frame buffer.
    /// Returns `false` outside a frame or for a stale key.
    pub fn frame_draw_on(&mut self, key: TargetKey) -> bool {
        if !self.frames.in_frame() {
            return false;
        }
        let Some(target) = self.registry.get(key) else {
            crate::pica_warn!(SOURCE, "Draw on unknown render target {:?}", key);
            return false;
        };
        let frame_buffer = target.frame_buffer;

        self.frames.add_target(&mut self.registry, key);
        if let Some(target) = self.registry.get_mut(key) {
            target.used = true;
        }
        self.context.bind(&frame_buffer);
        true
    }

    /// Append draw words to the open frame
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` outside a frame or before any `frame_draw_on`,
    /// `Error::OutOfMemory` when the command buffer is full.
    pub fn record_commands(&mut self, words: &[u32]) -> Result<()> {
        if !self.frames.in_frame() {
            return Err(Error::InvalidState("commands recorded outside a frame".to_string()));
        }
        if self.frames.build_slot_is_empty() || self.context.bound_frame_buffer().is_none() {
            return Err(Error::InvalidState("no render target bound in this frame".to_string()));
        }
        self.context.record(words)
    }

    /// Close the open frame and queue it for rendering
    ///
    /// A frame that drew on no target is dropped. Does nothing outside a
    /// frame.
    ///
    /// # Errors
    ///
    /// `Error::OutOfMemory` when the command buffer cannot be finalized; the
    /// frame is dropped.
    pub fn frame_end(&mut self, flags: SubmitFlags) -> Result<()> {
        if !self.frames.in_frame() {
            return Ok(());
        }
        let slot = self.frames.build_slot();
        for key in self.frames.targets(&self.registry, slot) {
            if let Some(target) = self.registry.get_mut(key) {
                target.used = false;
            }
        }
        if let Some(started) = self.frame_started.take() {
            self.stats.processing_time = started.elapsed();
        }

        if self.frames.build_slot_is_empty() {
            self.context.discard();
            self.frames.close(None, flags);
            return Ok(());
        }

        let commands = match self.context.finalize() {
            Ok(commands) => commands,
            Err(err) => {
                crate::pica_error!(SOURCE, "Frame dropped: {}", err);
                self.context.discard();
                self.frames.abandon(&mut self.registry);
                return Err(err);
            }
        };
        self.frames.close(Some(commands), flags);
        crate::pica_trace!(SOURCE, "Frame queued in slot {} ({} queued)",
            slot, self.frames.queued_count());
        self.update_frame_queue();
        Ok(())
    }

    /// Submit the oldest queued frame if every target it touches is drawable
    fn update_frame_queue(&mut self) {
        if !self.frames.ready_to_submit(&self.registry) {
            return;
        }
        let (commands, flags) = self.frames.start(&mut self.registry);
        self.render_started = Some(Instant::now());
        self.stats.frames_submitted += 1;
        crate::pica_trace!(SOURCE, "Submit frame slot {} ({} bytes)",
            self.frames.queue_swap(), commands.size());
        self.gpu.submit(&commands, flags);
    }

    // ===== PACING =====

    /// Set the frame rate; returns the previous one
    ///
    /// Rates outside `0 < fps <= 60` are ignored.
    pub fn frame_rate(&mut self, fps: f32) -> f32 {
        self.pacer.set_rate(fps)
    }

    /// Block until both screens have seen a due vblank
    pub fn frame_sync(&mut self) {
        let top = self.pacer.counter(Screen::Top);
        let bottom = self.pacer.counter(Screen::Bottom);
        while self.pacer.counter(Screen::Top) == top || self.pacer.counter(Screen::Bottom) == bottom {
            self.pump();
        }
    }

    /// Due vblanks seen on `screen`
    pub fn frame_counter(&self, screen: Screen) -> u32 {
        self.pacer.counter(screen)
    }

    // ===== EVENTS =====

    /// Handle one hardware event
    ///
    /// # Panics
    ///
    /// On `RenderDone` while no frame is rendering: host and hardware
    /// disagree about in-flight work.
    pub fn advance(&mut self, event: HardwareEvent) {
        match event {
            HardwareEvent::RenderDone => self.on_render_done(),
            HardwareEvent::TransferDone => self.on_transfer_done(),
            HardwareEvent::ClearDone => self.on_clear_done(),
            HardwareEvent::VBlankTop => self.on_vblank_top(),
            HardwareEvent::VBlankBottom => self.on_vblank_bottom(),
        }
    }

    /// Wait for the next hardware event, handle it and return it
    pub fn wait_for_event(&mut self) -> HardwareEvent {
        let event = self.gpu.wait_for_event();
        self.advance(event);
        event
    }

    fn pump(&mut self) {
        self.wait_for_event();
    }

    /// Block until no frame is queued and both pending queues are empty
    pub fn wait_idle(&mut self) {
        while self.frames.queued_count() > 0
            || !self.transfer_queue.is_empty()
            || !self.clear_queue.is_empty()
        {
            self.pump();
        }
    }

    fn on_render_done(&mut self) {
        if !self.frames.is_rendering() {
            invariant_violation(SOURCE, "render-done while no frame is rendering".to_string());
        }
        if let Some(started) = self.render_started.take() {
            self.stats.drawing_time = started.elapsed();
        }
        self.stats.frames_rendered += 1;

        for key in self.frames.complete(&mut self.registry) {
            let Some(target) = self.registry.get_mut(key) else {
                continue;
            };
            if target.linked {
                target.transfer_ok = true;
            } else if !target.clear_bits.is_empty() {
                self.clear_target(QueueNode::Target(key));
            } else {
                target.draw_ok = true;
            }
        }
        crate::pica_trace!(SOURCE, "Frame rendered ({} still queued)", self.frames.queued_count());

        self.update_frame_queue();
    }

    fn on_transfer_done(&mut self) {
        if self.transfer_queue.is_borrowed() {
            self.borrowed_done = true;
            return;
        }
        let Some(node) = self.transfer_queue.pop(&mut self.registry) else {
            crate::pica_warn!(SOURCE, "Transfer completion with empty transfer queue ignored");
            return;
        };
        self.stats.transfers += 1;

        if let Some(target) = self.registry.node_mut(node) {
            if target.clear_bits.is_empty() {
                target.draw_ok = true;
            } else {
                self.clear_target(node);
            }
        }
        if let Some(head) = self.transfer_queue.head() {
            self.perform_transfer(head);
        }
        self.update_frame_queue();
    }

    fn on_clear_done(&mut self) {
        if self.clear_queue.is_borrowed() {
            self.borrowed_done = true;
            return;
        }
        let Some(node) = self.clear_queue.pop(&mut self.registry) else {
            crate::pica_warn!(SOURCE, "Clear completion with empty clear queue ignored");
            return;
        };
        self.stats.clears += 1;

        if let Some(target) = self.registry.node_mut(node) {
            target.draw_ok = true;
        }
        if let Some(head) = self.clear_queue.head() {
            self.perform_clear(head);
        }
        self.update_frame_queue();
    }

    fn awaiting_transfer(&self, key: Option<TargetKey>) -> Option<TargetKey> {
        key.filter(|k| self.registry.get(*k).is_some_and(|t| t.transfer_ok))
    }

    fn on_vblank_top(&mut self) {
        if !self.pacer.tick(Screen::Top) {
            return;
        }

        let stereo = self.gpu.is_3d();
        let left = self.outputs.get(OutputSlot::TopLeft);
        match self.awaiting_transfer(self.outputs.get(OutputSlot::TopRight)) {
            Some(right) if stereo => self.transfer_target(QueueNode::Target(right)),
            // Right eye is not shown in 2D
            Some(right) => self.drop_pending_transfer(right),
            None if stereo => {
                if let Some(left) = self.awaiting_transfer(left) {
                    self.transfer_stereo_copy(left);
                }
            }
            None => {}
        }

        if let Some(left) = self.awaiting_transfer(left) {
            self.transfer_target(QueueNode::Target(left));
        }
    }

    /// Show the left image on the right eye too
    fn transfer_stereo_copy(&mut self, left: TargetKey) {
        if self.registry.stereo_scratch().stage.is_some() {
            crate::pica_debug!(SOURCE, "Stereo copy still queued, right eye skipped");
            return;
        }
        let Some(copy) = self.registry.get(left).map(RenderTarget::stereo_copy) else {
            return;
        };
        if let Some(scratch) = self.registry.node_mut(QueueNode::StereoScratch) {
            *scratch = copy;
        }
        self.transfer_target(QueueNode::StereoScratch);
    }

    fn on_vblank_bottom(&mut self) {
        if !self.pacer.tick(Screen::Bottom) {
            return;
        }
        if let Some(bottom) = self.awaiting_transfer(self.outputs.get(OutputSlot::Bottom)) {
            self.transfer_target(QueueNode::Target(bottom));
        }
    }

    // ===== PENDING STAGES =====

    fn transfer_target(&mut self, node: QueueNode) {
        if let Some(target) = self.registry.node_mut(node) {
            target.transfer_ok = false;
        }
        if self.transfer_queue.enqueue(&mut self.registry, node) {
            self.perform_transfer(node);
        }
    }

    fn clear_target(&mut self, node: QueueNode) {
        if self.clear_queue.enqueue(&mut self.registry, node) {
            self.perform_clear(node);
        }
    }

    fn perform_transfer(&mut self, node: QueueNode) {
        let Some(target) = self.registry.node(node) else {
            invariant_violation(SOURCE, format!("transfer of stale node {:?}", node));
        };
        let dst = self.gpu.framebuffer(target.screen, target.side);
        if target.side == Side::Left {
            self.gpu.configure_screen(target.screen, false);
        }
        crate::pica_trace!(SOURCE, "Transfer {:?} to {:?}/{:?}", node, target.screen, target.side);
        self.gpu.display_transfer(&target.display_transfer(dst));
    }

    fn perform_clear(&mut self, node: QueueNode) {
        let Some(target) = self.registry.node(node) else {
            invariant_violation(SOURCE, format!("clear of stale node {:?}", node));
        };
        let fill = target.clear_fill();
        crate::pica_trace!(SOURCE, "Clear {:?} ({:?})", node, target.clear_bits);
        self.gpu.memory_fill(&fill);
    }

    fn pending_mut(&mut self, stage: Stage) -> &mut PendingQueue {
        match stage {
            Stage::Clear => &mut self.clear_queue,
            Stage::Transfer => &mut self.transfer_queue,
        }
    }

    /// Run one operation on a queue's engine outside the queue and wait for it
    fn run_borrowed(&mut self, stage: Stage, start: impl FnOnce(&mut G)) {
        while !self.pending_mut(stage).is_empty() {
            self.pump();
        }
        self.pending_mut(stage).borrow_signal();
        self.borrowed_done = false;

        start(&mut self.gpu);
        while !self.borrowed_done {
            self.pump();
        }
        self.borrowed_done = false;

        if let Some(head) = self.pending_mut(stage).release_signal() {
            match stage {
                Stage::Clear => self.perform_clear(head),
                Stage::Transfer => self.perform_transfer(head),
            }
        }
    }

    /// Display transfer outside the render queue; returns once it completed
    pub fn safe_display_transfer(&mut self, transfer: &DisplayTransfer) {
        self.run_borrowed(Stage::Transfer, |gpu| gpu.display_transfer(transfer));
    }

    /// Texture copy outside the render queue; returns once it completed
    pub fn safe_texture_copy(&mut self, copy: &TextureCopy) {
        self.run_borrowed(Stage::Transfer, |gpu| gpu.texture_copy(copy));
    }

    /// Memory fill outside the render queue; returns once it completed
    pub fn safe_memory_fill(&mut self, fill: &MemoryFill) {
        self.run_borrowed(Stage::Clear, |gpu| gpu.memory_fill(fill));
    }

    // ===== STATISTICS =====

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Submit to render-done of the last rendered frame
    pub fn drawing_time(&self) -> Duration {
        self.stats.drawing_time
    }

    /// FrameBegin to FrameEnd of the last ended frame
    pub fn processing_time(&self) -> Duration {
        self.stats.processing_time
    }

    /// Peak command buffer usage (0.0 ..= 1.0)
    pub fn command_buffer_usage(&self) -> f32 {
        self.context.usage()
    }

    // ===== SHUTDOWN =====

    /// Drain every queue, delete every target and hand the device back
    pub fn shutdown(mut self) -> G {
        if self.frames.in_frame() {
            crate::pica_warn!(SOURCE, "Shutdown with an open frame; frame dropped");
            self.context.discard();
            self.frames.abandon(&mut self.registry);
        }
        self.wait_idle();

        let keys: Vec<TargetKey> = self.registry.keys().collect();
        for key in keys {
            if let Err(err) = self.delete_target(key) {
                crate::pica_error!(SOURCE, "Cannot delete {:?} at shutdown: {}", key, err);
            }
        }
        self.gpu.free(self.command_memory);
        crate::pica_info!(SOURCE, "Render queue shut down");
        self.gpu
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
