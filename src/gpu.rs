pub mod backends;
pub mod bridge;
pub mod commands;
pub mod device;

pub use bridge::GpuBridge;
pub use device::GpuDevice;
