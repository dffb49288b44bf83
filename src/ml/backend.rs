// ============================================================
// Layer 5: Backend Selection
// ============================================================
// Training runs on WGPU by default; the NdArray backend is the
// CPU fallback for machines without a usable GPU adapter.

use serde::{Deserialize, Serialize};

pub type GpuBackend      = burn::backend::Wgpu;
pub type CpuBackend      = burn::backend::NdArray;
pub type GpuTrainBackend = burn::backend::Autodiff<GpuBackend>;
pub type CpuTrainBackend = burn::backend::Autodiff<CpuBackend>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Wgpu,
    Cpu,
}

pub fn gpu_device() -> burn::backend::wgpu::WgpuDevice {
    burn::backend::wgpu::WgpuDevice::default()
}

pub fn cpu_device() -> burn::backend::ndarray::NdArrayDevice {
    burn::backend::ndarray::NdArrayDevice::Cpu
}
