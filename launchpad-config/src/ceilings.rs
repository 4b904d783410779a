//! Platform-wide hard ceilings for each resource dimension.

use anyhow::Result;
use anyhow::bail;
use bon::Builder;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

/// The default CPU core ceiling.
const DEFAULT_CPU: f64 = 64.0;

/// The default memory ceiling (in GiB).
const DEFAULT_MEM: f64 = 64.0;

/// The default shared memory ceiling (in GiB).
const DEFAULT_SHMEM: f64 = 2.0;

/// The default cluster size ceiling (containers in a single node).
const DEFAULT_CLUSTER_SIZE: u32 = 16;

/// The default cluster node ceiling (nodes in a multi-node cluster).
const DEFAULT_CLUSTER_NODES: u32 = 16;

/// The default per-accelerator ceilings, keyed by slot name.
const DEFAULT_ACCELERATORS: &[(&str, f64)] = &[
    ("cuda.device", 16.0),
    ("cuda.shares", 16.0),
    ("rocm.device", 10.0),
    ("tpu.device", 8.0),
    ("ipu.device", 8.0),
    ("atom.device", 8.0),
    ("atom-plus.device", 8.0),
    ("gaudi2.device", 8.0),
    ("warboy.device", 8.0),
];

/// Hard ceilings applied on top of image, policy and capacity bounds.
///
/// A ceiling is the last line of bounding: when every other source is
/// unbounded, the ceiling becomes the effective maximum.
#[derive(Builder, Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
#[builder(builder_type = Builder)]
pub struct Ceilings {
    /// The maximum number of CPU cores per container.
    #[builder(default = DEFAULT_CPU)]
    cpu: f64,

    /// The maximum memory per container (in GiB).
    #[builder(default = DEFAULT_MEM)]
    mem: f64,

    /// The maximum shared memory per container (in GiB).
    ///
    /// Shared memory is additionally bounded by the chosen memory.
    #[builder(default = DEFAULT_SHMEM)]
    shmem: f64,

    /// The maximum amount per accelerator slot (e.g., `cuda.device`).
    #[builder(default = default_accelerators())]
    accelerators: IndexMap<String, f64>,

    /// The maximum number of containers in a single-node cluster.
    #[builder(default = DEFAULT_CLUSTER_SIZE)]
    cluster_size: u32,

    /// The maximum number of nodes in a multi-node cluster.
    #[builder(default = DEFAULT_CLUSTER_NODES)]
    cluster_nodes: u32,
}

/// Builds the default accelerator ceiling table.
fn default_accelerators() -> IndexMap<String, f64> {
    DEFAULT_ACCELERATORS
        .iter()
        .map(|(slot, max)| (slot.to_string(), *max))
        .collect()
}

impl Default for Ceilings {
    fn default() -> Self {
        Self {
            cpu: DEFAULT_CPU,
            mem: DEFAULT_MEM,
            shmem: DEFAULT_SHMEM,
            accelerators: default_accelerators(),
            cluster_size: DEFAULT_CLUSTER_SIZE,
            cluster_nodes: DEFAULT_CLUSTER_NODES,
        }
    }
}

impl Ceilings {
    /// Gets the CPU core ceiling.
    pub fn cpu(&self) -> f64 {
        self.cpu
    }

    /// Gets the memory ceiling (in GiB).
    pub fn mem(&self) -> f64 {
        self.mem
    }

    /// Gets the shared memory ceiling (in GiB).
    pub fn shmem(&self) -> f64 {
        self.shmem
    }

    /// Gets the ceiling for an accelerator slot, if one is configured.
    pub fn accelerator(&self, slot: &str) -> Option<f64> {
        self.accelerators.get(slot).copied()
    }

    /// Gets every configured accelerator ceiling.
    pub fn accelerators(&self) -> impl Iterator<Item = (&str, f64)> {
        self.accelerators
            .iter()
            .map(|(slot, max)| (slot.as_str(), *max))
    }

    /// Gets the single-node cluster size ceiling.
    pub fn cluster_size(&self) -> u32 {
        self.cluster_size
    }

    /// Gets the multi-node cluster node ceiling.
    pub fn cluster_nodes(&self) -> u32 {
        self.cluster_nodes
    }

    /// Validates the ceilings.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("cpu", self.cpu), ("mem", self.mem), ("shmem", self.shmem)] {
            if !(value.is_finite() && value > 0.0) {
                bail!("ceiling `{name}` must be a positive number (found {value})");
            }
        }

        for (slot, value) in &self.accelerators {
            if !(value.is_finite() && *value >= 0.0) {
                bail!("ceiling for accelerator `{slot}` must not be negative (found {value})");
            }
        }

        if self.cluster_size == 0 {
            bail!("ceiling `cluster-size` must be at least 1");
        }

        if self.cluster_nodes == 0 {
            bail!("ceiling `cluster-nodes` must be at least 1");
        }

        Ok(())
    }
}
