/// GPU module - the hardware boundary of the render queue
///
/// The device trait, frame-buffer descriptors, the command buffer and its
/// dirty-state context, plus a simulated device for hardware-free use.

pub mod gpu_device;
pub mod frame_buffer;
pub mod command_buffer;
pub mod gpu_context;
pub mod mock_gpu;

pub use gpu_device::{
    GpuAddr, MemoryKind, Screen, Side, HardwareEvent, SubmitFlags, TransferFlags,
    DisplayTransfer, TextureCopy, FillWidth, FillRange, MemoryFill, GpuDevice,
};
pub use frame_buffer::{
    FrameBuffer, FrameBufferRegs, ColorFormat, DepthFormat, color_buffer_size, depth_buffer_size,
};
pub use command_buffer::{CommandBuffer, CommandList, reg};
pub use gpu_context::{GpuContext, StateFlags};
pub use mock_gpu::{MockGpu, MockGpuConfig, GpuOp};
