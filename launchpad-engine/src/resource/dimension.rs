//! Resource dimensions and their stepping rules.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

/// A kind of accelerator that can be attached to a session.
///
/// The declaration order is the priority order used when picking which
/// accelerator is active for an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum AcceleratorKind {
    /// Whole CUDA devices.
    #[serde(rename = "cuda.device")]
    CudaDevice,

    /// Fractional CUDA shares.
    #[serde(rename = "cuda.shares")]
    CudaShares,

    /// ROCm devices.
    #[serde(rename = "rocm.device")]
    RocmDevice,

    /// TPU devices.
    #[serde(rename = "tpu.device")]
    TpuDevice,

    /// IPU devices.
    #[serde(rename = "ipu.device")]
    IpuDevice,

    /// ATOM devices.
    #[serde(rename = "atom.device")]
    AtomDevice,

    /// ATOM+ devices.
    #[serde(rename = "atom-plus.device")]
    AtomPlusDevice,

    /// Gaudi 2 devices.
    #[serde(rename = "gaudi2.device")]
    Gaudi2Device,

    /// Warboy devices.
    #[serde(rename = "warboy.device")]
    WarboyDevice,
}

impl AcceleratorKind {
    /// Every accelerator kind in priority order.
    pub const ALL: [AcceleratorKind; 9] = [
        AcceleratorKind::CudaDevice,
        AcceleratorKind::CudaShares,
        AcceleratorKind::RocmDevice,
        AcceleratorKind::TpuDevice,
        AcceleratorKind::IpuDevice,
        AcceleratorKind::AtomDevice,
        AcceleratorKind::AtomPlusDevice,
        AcceleratorKind::Gaudi2Device,
        AcceleratorKind::WarboyDevice,
    ];

    /// Gets the resource slot name of the accelerator.
    pub fn slot(&self) -> &'static str {
        match self {
            AcceleratorKind::CudaDevice => "cuda.device",
            AcceleratorKind::CudaShares => "cuda.shares",
            AcceleratorKind::RocmDevice => "rocm.device",
            AcceleratorKind::TpuDevice => "tpu.device",
            AcceleratorKind::IpuDevice => "ipu.device",
            AcceleratorKind::AtomDevice => "atom.device",
            AcceleratorKind::AtomPlusDevice => "atom-plus.device",
            AcceleratorKind::Gaudi2Device => "gaudi2.device",
            AcceleratorKind::WarboyDevice => "warboy.device",
        }
    }

    /// Whether the accelerator can only be allocated in whole units.
    pub fn is_integral(&self) -> bool {
        !matches!(self, AcceleratorKind::CudaShares)
    }
}

impl fmt::Display for AcceleratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slot())
    }
}

impl FromStr for AcceleratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AcceleratorKind::ALL
            .into_iter()
            .find(|kind| kind.slot() == s)
            .ok_or_else(|| format!("unknown accelerator slot `{s}`"))
    }
}

/// One independently bounded quantity offered to a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// CPU cores.
    Cpu,

    /// Memory (in GiB).
    Memory,

    /// Shared memory (in GiB).
    SharedMemory,

    /// An accelerator.
    Accelerator(AcceleratorKind),

    /// The number of sessions launched together.
    Sessions,

    /// The number of containers (single-node) or nodes (multi-node).
    ClusterSize,
}

/// The memory granularity (in GiB).
///
/// One sixteenth is exactly representable, so multiples never drift.
pub const MEMORY_STEP: f64 = 0.0625;

impl Dimension {
    /// Gets the slot name used in resource maps and messages.
    pub fn slot(&self) -> &'static str {
        match self {
            Dimension::Cpu => "cpu",
            Dimension::Memory => "mem",
            Dimension::SharedMemory => "shmem",
            Dimension::Accelerator(kind) => kind.slot(),
            Dimension::Sessions => "session-count",
            Dimension::ClusterSize => "cluster-size",
        }
    }

    /// Whether the dimension is a per-container resource value that presets
    /// set together.
    pub fn is_per_container(&self) -> bool {
        matches!(
            self,
            Dimension::Cpu
                | Dimension::Memory
                | Dimension::SharedMemory
                | Dimension::Accelerator(_)
        )
    }

    /// Gets the step between adjacent legal values.
    pub fn step(&self) -> f64 {
        match self {
            Dimension::Memory | Dimension::SharedMemory => MEMORY_STEP,
            Dimension::Accelerator(kind) if !kind.is_integral() => 0.1,
            _ => 1.0,
        }
    }

    /// Gets the number of decimal places values are rounded to.
    fn precision(&self) -> i32 {
        match self {
            Dimension::Memory | Dimension::SharedMemory => 4,
            Dimension::Accelerator(kind) if !kind.is_integral() => 1,
            _ => 0,
        }
    }

    /// Gets the minimum used when no source declares one.
    pub fn default_min(&self) -> f64 {
        match self {
            Dimension::Memory | Dimension::SharedMemory => MEMORY_STEP,
            Dimension::Accelerator(_) => 0.0,
            Dimension::Cpu | Dimension::Sessions | Dimension::ClusterSize => 1.0,
        }
    }

    /// Gets the ceiling used when every source, including the platform
    /// ceiling, is unbounded.
    pub fn fallback_ceiling(&self) -> f64 {
        match self {
            Dimension::Cpu => 64.0,
            Dimension::Memory | Dimension::SharedMemory => 64.0,
            Dimension::Accelerator(_) => 8.0,
            Dimension::Sessions => 1.0,
            Dimension::ClusterSize => 1.0,
        }
    }

    /// Rounds away floating point noise at the dimension's precision.
    fn tidy(&self, value: f64) -> f64 {
        let scale = 10f64.powi(self.precision());
        (value * scale).round() / scale
    }

    /// Snaps a value to the nearest step.
    pub fn snap(&self, value: f64) -> f64 {
        self.tidy((value / self.step()).round() * self.step())
    }

    /// Snaps a value down to the step at or below it.
    pub fn snap_down(&self, value: f64) -> f64 {
        // NOTE: the value is tidied first so that something like `0.30000001`
        // shares are not floored to `0.2`.
        let value = self.tidy(value);
        self.tidy((value / self.step() + 1e-9).floor() * self.step())
    }

    /// Snaps a value up to the step at or above it.
    pub fn snap_up(&self, value: f64) -> f64 {
        let value = self.tidy(value);
        self.tidy((value / self.step() - 1e-9).ceil() * self.step())
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slot())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn accelerator_slots_round_trip() {
        for kind in AcceleratorKind::ALL {
            assert_eq!(kind.slot().parse::<AcceleratorKind>().unwrap(), kind);
        }

        assert_eq!(
            "gaudi2.device".parse::<AcceleratorKind>(),
            Ok(AcceleratorKind::Gaudi2Device)
        );
        assert!("gaudi.device".parse::<AcceleratorKind>().is_err());
    }

    #[test]
    fn priority_follows_the_declaration_order() {
        let mut sorted = AcceleratorKind::ALL;
        sorted.sort();
        assert_eq!(sorted, AcceleratorKind::ALL);
        assert!(AcceleratorKind::AtomPlusDevice < AcceleratorKind::WarboyDevice);
    }

    #[test]
    fn snapping_follows_the_step() {
        assert_eq!(Dimension::Cpu.snap(2.6), 3.0);
        assert_eq!(Dimension::Cpu.snap_down(2.6), 2.0);
        assert_eq!(Dimension::Memory.snap(1.03), 1.0);
        assert_eq!(Dimension::Memory.snap_up(1.01), 1.0625);

        let shares = Dimension::Accelerator(AcceleratorKind::CudaShares);
        assert_relative_eq!(shares.snap(0.34), 0.3);
        assert_relative_eq!(shares.snap_down(0.1 + 0.2), 0.3);
    }

    #[test]
    fn minimums_follow_the_dimension() {
        assert_eq!(Dimension::Cpu.default_min(), 1.0);
        assert_eq!(Dimension::SharedMemory.default_min(), MEMORY_STEP);
        assert_eq!(
            Dimension::Accelerator(AcceleratorKind::CudaDevice).default_min(),
            0.0
        );
    }
}
