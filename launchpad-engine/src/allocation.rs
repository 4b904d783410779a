//! The working set of chosen resource values.
//!
//! An [`Allocation`] is created fresh when a launch dialog opens and is kept
//! consistent with its [`Limits`] after every mutation:
//!
//! * every value is snapped to its step and clamped into its range,
//! * shared memory never exceeds memory (it is silently lowered and an
//!   [`Adjustment::SharedMemoryReduced`] is recorded), and once it sits at
//!   the memory ceiling it follows memory up and down,
//! * multi-node clusters always launch a single session.
//!
//! A cluster size that no longer fits the CPU or accelerator maximums after
//! another value changed is *not* lowered; the allocation is reported as
//! infeasible instead so that the user has to resolve it.

use bon::Builder;
use indexmap::IndexMap;
use launchpad_events::Event;
use launchpad_events::Sender;
use launchpad_events::send_event;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::resource::AcceleratorKind;
use crate::resource::Dimension;
use crate::resource::Limits;
use crate::resource::Range;

/// How the containers of a session are laid out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterMode {
    /// Every container runs on the same node.
    #[default]
    SingleNode,

    /// Containers are spread across nodes.
    MultiNode,
}

/// The cluster topology of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Cluster {
    /// The layout mode.
    pub mode: ClusterMode,

    /// The number of containers (single-node) or nodes (multi-node).
    pub size: u32,
}

impl Default for Cluster {
    fn default() -> Self {
        Self {
            mode: ClusterMode::SingleNode,
            size: 1,
        }
    }
}

/// An amount of a specific accelerator.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct AcceleratorAmount {
    /// The accelerator kind.
    pub kind: AcceleratorKind,

    /// The amount requested.
    pub amount: f64,
}

/// A named bundle of pre-chosen resource values.
#[derive(Builder, Clone, Debug, PartialEq, Deserialize, Serialize)]
#[builder(builder_type = PresetBuilder)]
pub struct Preset {
    /// The name shown to the user.
    #[builder(into)]
    name: String,

    /// The number of CPU cores.
    cpu: f64,

    /// The memory (in GiB).
    mem: f64,

    /// The shared memory (in GiB), if the preset sets it.
    #[serde(default)]
    shmem: Option<f64>,

    /// The accelerator, if the preset includes one.
    #[serde(default)]
    accelerator: Option<AcceleratorAmount>,
}

impl Preset {
    /// Gets the name of the preset.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A correction the allocation made on its own.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Adjustment {
    /// Shared memory was lowered to stay within memory.
    SharedMemoryReduced {
        /// The previous value (GiB).
        from: f64,
        /// The new value (GiB).
        to: f64,
    },

    /// The session count was reset to one because of a multi-node cluster.
    SessionsReset,
}

/// The mutable set of chosen resource values.
#[derive(Debug)]
pub struct Allocation {
    /// The resolved limits.
    limits: Limits,

    /// The CPU cores per container.
    cpu: f64,

    /// The memory per container (GiB).
    mem: f64,

    /// The shared memory per container (GiB).
    shmem: f64,

    /// The active accelerator and its amount per container.
    accelerator: Option<(AcceleratorKind, f64)>,

    /// The number of sessions to launch.
    sessions: u32,

    /// The cluster topology.
    cluster: Cluster,

    /// The name of the applied preset, if no value was edited since.
    preset: Option<String>,

    /// Whether shared memory sits at its ceiling and should track it.
    shmem_follows_mem: bool,

    /// Whether per-container values can only be changed through presets.
    presets_only: bool,

    /// The display totals (value × cluster size × sessions) per slot.
    totals: IndexMap<String, f64>,

    /// The corrections made since they were last drained.
    adjustments: Vec<Adjustment>,

    /// The event sender.
    events: Option<Sender>,
}

impl Allocation {
    /// Creates an allocation with every value at its minimum.
    pub fn new(limits: Limits) -> Self {
        let cpu = limits.cpu().min();
        let mem = limits.memory().min();
        let shmem = limits.shared_memory(mem).min();
        let sessions = limits.sessions().min() as u32;

        let mut allocation = Self {
            limits,
            cpu,
            mem,
            shmem,
            accelerator: None,
            sessions,
            cluster: Cluster::default(),
            preset: None,
            shmem_follows_mem: false,
            presets_only: false,
            totals: Default::default(),
            adjustments: Default::default(),
            events: None,
        };

        allocation.reconcile();
        allocation
    }

    /// Attaches an event sender to the allocation.
    pub fn with_events(mut self, sender: Sender) -> Self {
        self.events = Some(sender);
        self
    }

    /// Restricts per-container values to presets.
    ///
    /// Manual edits of CPU, memory, shared memory and accelerators are refused
    /// while the session count and the cluster stay editable.
    pub fn with_presets_only(mut self, presets_only: bool) -> Self {
        self.presets_only = presets_only;
        self
    }

    /// Whether per-container values can only be changed through presets.
    pub fn is_presets_only(&self) -> bool {
        self.presets_only
    }

    /// Gets the resolved limits.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Replaces the limits (e.g., after a capacity refresh) and re-clamps
    /// every value against them.
    pub fn update_limits(&mut self, limits: Limits) {
        self.limits = limits;
        self.reconcile();
    }

    /// Gets the current range of a dimension.
    ///
    /// Returns `None` for accelerators that are not usable.
    pub fn range(&self, dimension: Dimension) -> Option<Range> {
        match dimension {
            Dimension::Cpu => Some(self.limits.cpu()),
            Dimension::Memory => Some(self.limits.memory()),
            Dimension::SharedMemory => Some(self.limits.shared_memory(self.mem)),
            Dimension::Accelerator(kind) => self.limits.accelerator(kind),
            Dimension::Sessions => Some(match self.cluster.mode {
                ClusterMode::SingleNode => self.limits.sessions(),
                ClusterMode::MultiNode => Range::fixed(Dimension::Sessions, 1.0),
            }),
            Dimension::ClusterSize => Some(self.cluster_range()),
        }
    }

    /// Gets the current value of a dimension.
    ///
    /// Returns `None` for accelerators that are not active.
    pub fn value(&self, dimension: Dimension) -> Option<f64> {
        match dimension {
            Dimension::Cpu => Some(self.cpu),
            Dimension::Memory => Some(self.mem),
            Dimension::SharedMemory => Some(self.shmem),
            Dimension::Accelerator(kind) => self
                .accelerator
                .filter(|(active, _)| *active == kind)
                .map(|(_, amount)| amount),
            Dimension::Sessions => Some(f64::from(self.sessions)),
            Dimension::ClusterSize => Some(f64::from(self.cluster.size)),
        }
    }

    /// Gets the active accelerator and its amount.
    pub fn accelerator(&self) -> Option<(AcceleratorKind, f64)> {
        self.accelerator
    }

    /// Gets the number of sessions to launch.
    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    /// Gets the cluster topology.
    pub fn cluster(&self) -> Cluster {
        self.cluster
    }

    /// Gets the name of the applied preset.
    ///
    /// This is `None` once any value has been edited by hand.
    pub fn preset(&self) -> Option<&str> {
        self.preset.as_deref()
    }

    /// Sets the value of a dimension.
    ///
    /// Out of range values are clamped silently. Any applied preset is
    /// cleared. Setting an accelerator that is usable makes it the active one.
    ///
    /// Returns the value that was stored, or `None` if the dimension could not
    /// be set.
    pub fn set_value(&mut self, dimension: Dimension, value: f64) -> Option<f64> {
        if self.presets_only && dimension.is_per_container() {
            debug!("`{dimension}` can only be changed by applying a preset");
            return None;
        }

        if dimension == Dimension::ClusterSize {
            return Some(f64::from(self.set_cluster_size(value.max(0.0) as u32)));
        }

        if !self.assign(dimension, value) {
            return None;
        }

        if let Some(preset) = self.preset.take() {
            debug!("preset `{preset}` cleared by a manual `{dimension}` edit");
        }

        self.reconcile();
        self.value(dimension)
    }

    /// Assigns a clamped value without reconciling.
    ///
    /// Returns `false` if the dimension cannot be set.
    fn assign(&mut self, dimension: Dimension, value: f64) -> bool {
        match dimension {
            Dimension::Cpu => self.cpu = self.limits.cpu().clamp(value),
            Dimension::Memory => self.mem = self.limits.memory().clamp(value),
            Dimension::SharedMemory => {
                self.shmem = self.limits.shared_memory(self.mem).clamp(value);
                self.shmem_follows_mem = false;
            }
            Dimension::Accelerator(kind) => match self.limits.accelerator(kind) {
                Some(range) => self.accelerator = Some((kind, range.clamp(value))),
                None => {
                    warn!("accelerator `{kind}` is not usable with the current image");
                    return false;
                }
            },
            Dimension::Sessions => match self.cluster.mode {
                ClusterMode::SingleNode => {
                    self.sessions = self.limits.sessions().clamp(value) as u32;
                }
                ClusterMode::MultiNode => {
                    debug!("session count is fixed to one for multi-node clusters");
                    return false;
                }
            },
            Dimension::ClusterSize => {
                self.cluster.size = self.cluster_range().clamp(value) as u32;
            }
        }

        true
    }

    /// Applies a preset.
    ///
    /// CPU, memory, shared memory and the accelerator are set together and
    /// re-clamped against the current limits. The preset stays active until
    /// any value is edited by hand.
    pub fn apply_preset(&mut self, preset: &Preset) {
        debug!("applying preset `{}`", preset.name);

        self.cpu = self.limits.cpu().clamp(preset.cpu);
        self.mem = self.limits.memory().clamp(preset.mem);

        match preset.accelerator {
            Some(AcceleratorAmount { kind, amount }) => match self.limits.accelerator(kind) {
                Some(range) => self.accelerator = Some((kind, range.clamp(amount))),
                None => {
                    warn!(
                        "preset `{}` asks for `{kind}`, which is not usable; keeping the \
                         current accelerator at its minimum",
                        preset.name
                    );
                    self.reset_accelerator();
                }
            },
            None => self.reset_accelerator(),
        }

        // NOTE: the preset's shared memory is taken as-is so that reconciling
        // reports a reduction if it exceeds the preset's memory.
        self.shmem_follows_mem = false;
        if let Some(shmem) = preset.shmem {
            self.shmem = shmem;
        }

        self.reconcile();
        self.preset = Some(preset.name.clone());
    }

    /// Sets the active accelerator's amount to its minimum.
    fn reset_accelerator(&mut self) {
        if let Some((kind, _)) = self.accelerator {
            self.accelerator = self
                .limits
                .accelerator(kind)
                .map(|range| (kind, range.min()));
        }
    }

    /// Whether a preset fits within the current limits without clamping.
    pub fn preset_fits(&self, preset: &Preset) -> bool {
        let accelerator_fits = match preset.accelerator {
            Some(AcceleratorAmount { kind, amount }) => self
                .limits
                .accelerator(kind)
                .map(|range| range.contains(amount))
                .unwrap_or(amount <= 0.0),
            None => true,
        };

        let shmem_fits = preset
            .shmem
            .map(|shmem| self.limits.shared_memory(preset.mem).contains(shmem))
            .unwrap_or(true);

        self.limits.cpu().contains(preset.cpu)
            && self.limits.memory().contains(preset.mem)
            && shmem_fits
            && accelerator_fits
    }

    /// Sets the cluster size.
    ///
    /// In single-node mode the size is clamped so the replicas fit the CPU and
    /// accelerator maximums and the per-session container limit. In multi-node
    /// mode it is clamped to the number of nodes allowed.
    pub fn set_cluster_size(&mut self, size: u32) -> u32 {
        self.cluster.size = self.cluster_range().clamp(f64::from(size)) as u32;
        self.reconcile();
        self.cluster.size
    }

    /// Sets the cluster mode.
    ///
    /// Switching to multi-node resets the session count to one.
    pub fn set_cluster_mode(&mut self, mode: ClusterMode) {
        self.cluster.mode = mode;
        self.cluster.size = self.cluster_range().clamp(f64::from(self.cluster.size)) as u32;
        self.reconcile();
    }

    /// Gets the cluster size range for the current mode and values.
    fn cluster_range(&self) -> Range {
        match self.cluster.mode {
            ClusterMode::SingleNode => self.limits.replicas(self.cpu, self.accelerator),
            ClusterMode::MultiNode => self.limits.nodes(),
        }
    }

    /// Brings every value back within its range and refreshes the totals.
    fn reconcile(&mut self) {
        self.cpu = self.limits.cpu().clamp(self.cpu);
        self.mem = self.limits.memory().clamp(self.mem);

        self.accelerator = match self.accelerator {
            Some((kind, amount)) => match self.limits.accelerator(kind) {
                Some(range) => Some((kind, range.clamp(amount))),
                None => self.default_accelerator(),
            },
            None => self.default_accelerator(),
        };

        let shmem = self.limits.shared_memory(self.mem);
        let target = if self.shmem_follows_mem {
            shmem.max()
        } else {
            self.shmem
        };
        let clamped = shmem.clamp(target);

        if clamped < self.shmem && !self.shmem_follows_mem {
            self.record(Adjustment::SharedMemoryReduced {
                from: self.shmem,
                to: clamped,
            });
        }
        self.shmem = clamped;

        // NOTE: a collapsed range has no ceiling to follow.
        self.shmem_follows_mem =
            shmem.is_feasible() && !shmem.is_disabled() && self.shmem >= shmem.max();

        match self.cluster.mode {
            ClusterMode::SingleNode => {
                self.sessions = self.limits.sessions().clamp(f64::from(self.sessions)) as u32;
            }
            ClusterMode::MultiNode => {
                if self.sessions > 1 {
                    self.record(Adjustment::SessionsReset);
                }
                self.sessions = 1;
            }
        }

        self.cluster.size = self.cluster.size.max(1);

        let multiplier = f64::from(self.cluster.size) * f64::from(self.sessions);
        self.totals = self
            .resources()
            .into_iter()
            .map(|(slot, value)| (slot, value * multiplier))
            .collect();
    }

    /// Gets the default accelerator at its minimum amount.
    fn default_accelerator(&self) -> Option<(AcceleratorKind, f64)> {
        let kind = self.limits.default_accelerator()?;
        self.limits
            .accelerator(kind)
            .map(|range| (kind, range.min()))
    }

    /// Records an adjustment and broadcasts it.
    fn record(&mut self, adjustment: Adjustment) {
        if let Adjustment::SharedMemoryReduced { from, to } = adjustment {
            debug!("shared memory reduced from {from} GiB to {to} GiB");
            send_event!(self.events, Event::SharedMemoryReduced { from, to });
        }

        self.adjustments.push(adjustment);
    }

    /// Takes the adjustments recorded since the last call.
    pub fn drain_adjustments(&mut self) -> Vec<Adjustment> {
        std::mem::take(&mut self.adjustments)
    }

    /// Gets the per-container resource values keyed by slot name.
    ///
    /// Accelerators with a zero amount are omitted.
    pub fn resources(&self) -> IndexMap<String, f64> {
        let mut resources = IndexMap::new();
        resources.insert(Dimension::Cpu.slot().to_string(), self.cpu);
        resources.insert(Dimension::Memory.slot().to_string(), self.mem);
        resources.insert(Dimension::SharedMemory.slot().to_string(), self.shmem);

        if let Some((kind, amount)) = self.accelerator.filter(|(_, amount)| *amount > 0.0) {
            resources.insert(kind.slot().to_string(), amount);
        }

        resources
    }

    /// Gets the display totals (value × cluster size × sessions) per slot.
    pub fn totals(&self) -> &IndexMap<String, f64> {
        &self.totals
    }

    /// Gets the dimensions that block submission.
    pub fn infeasible(&self) -> Vec<Dimension> {
        let mut infeasible = self.limits.infeasible();

        // NOTE: the shared memory range only collapses once it is capped at the
        // chosen memory.
        if !self.limits.shared_memory(self.mem).is_feasible()
            && !infeasible.contains(&Dimension::SharedMemory)
        {
            infeasible.push(Dimension::SharedMemory);
        }

        let cluster = self.cluster_range();
        if !cluster.is_feasible() || !cluster.contains(f64::from(self.cluster.size)) {
            infeasible.push(Dimension::ClusterSize);
        }

        infeasible
    }

    /// Whether every dimension can be satisfied.
    pub fn is_feasible(&self) -> bool {
        self.infeasible().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use launchpad_config::Ceilings;
    use launchpad_config::Session;

    use super::*;
    use crate::resource::Bound;
    use crate::resource::Capacity;
    use crate::resource::ImageLimit;
    use crate::resource::Policy;

    fn limits(max_containers: u32) -> Limits {
        limits_with(
            IndexMap::from([(String::from("cuda.device"), ImageLimit::default())]),
            max_containers,
            &Ceilings::builder().shmem(16.0).build(),
        )
    }

    fn limits_with(
        image: IndexMap<String, ImageLimit>,
        max_containers: u32,
        ceilings: &Ceilings,
    ) -> Limits {
        let capacity = Capacity::builder()
            .slots(IndexMap::from([
                (String::from("cpu"), Bound::Finite(8.0)),
                (String::from("mem"), Bound::Finite(16.0)),
                (String::from("cuda.device"), Bound::Finite(4.0)),
            ]))
            .max_nodes(Bound::Finite(3.0))
            .build();
        let policy = Policy::builder()
            .concurrency_max(Bound::Finite(5.0))
            .max_containers_per_session(max_containers)
            .build();

        Limits::resolve(
            &image,
            &policy,
            &capacity,
            ceilings,
            &Session::default(),
        )
    }

    #[test]
    fn starts_at_the_minimums() {
        let allocation = Allocation::new(limits(1));
        assert_eq!(allocation.value(Dimension::Cpu), Some(1.0));
        assert_eq!(allocation.value(Dimension::Memory), Some(0.0625));
        assert_eq!(
            allocation.accelerator(),
            Some((AcceleratorKind::CudaDevice, 0.0))
        );
        assert_eq!(allocation.sessions(), 1);
        assert!(allocation.is_feasible());
    }

    #[test]
    fn values_are_clamped_into_range() {
        let mut allocation = Allocation::new(limits(1));

        for (dimension, value) in [
            (Dimension::Cpu, 100.0),
            (Dimension::Cpu, -4.0),
            (Dimension::Memory, 1000.0),
            (Dimension::SharedMemory, 1000.0),
            (Dimension::Accelerator(AcceleratorKind::CudaDevice), 9.0),
            (Dimension::Sessions, 12.0),
        ] {
            allocation.set_value(dimension, value);
            let range = allocation.range(dimension).unwrap();
            let stored = allocation.value(dimension).unwrap();
            assert!(range.contains(stored), "{dimension} = {stored}");
        }

        assert_eq!(allocation.value(Dimension::Memory), Some(16.0));
        assert_eq!(allocation.sessions(), 3);
    }

    #[test]
    fn lowering_memory_reduces_shared_memory() {
        let mut allocation = Allocation::new(limits(1));
        allocation.set_value(Dimension::Memory, 4.0);
        allocation.set_value(Dimension::SharedMemory, 3.0);
        allocation.drain_adjustments();

        allocation.set_value(Dimension::Memory, 2.0);

        assert_eq!(allocation.value(Dimension::SharedMemory), Some(2.0));
        assert_eq!(
            allocation.drain_adjustments(),
            vec![Adjustment::SharedMemoryReduced { from: 3.0, to: 2.0 }]
        );
    }

    #[test]
    fn shared_memory_at_the_ceiling_rides_memory() {
        let mut allocation = Allocation::new(limits(1));
        allocation.set_value(Dimension::Memory, 4.0);
        allocation.set_value(Dimension::SharedMemory, 4.0);

        allocation.set_value(Dimension::Memory, 8.0);
        assert_eq!(allocation.value(Dimension::SharedMemory), Some(8.0));

        allocation.set_value(Dimension::Memory, 2.0);
        assert_eq!(allocation.value(Dimension::SharedMemory), Some(2.0));
        assert!(allocation.drain_adjustments().is_empty());
    }

    #[test]
    fn shared_memory_reduced_to_memory_follows_it_back_up() {
        let mut allocation = Allocation::new(limits(1));
        allocation.set_value(Dimension::Memory, 4.0);
        allocation.set_value(Dimension::SharedMemory, 3.0);
        allocation.set_value(Dimension::Memory, 2.0);
        assert_eq!(allocation.value(Dimension::SharedMemory), Some(2.0));

        allocation.set_value(Dimension::Memory, 8.0);
        assert_eq!(allocation.value(Dimension::SharedMemory), Some(8.0));
    }

    #[test]
    fn shared_memory_below_the_ceiling_stays_put() {
        let mut allocation = Allocation::new(limits(1));
        allocation.set_value(Dimension::Memory, 4.0);
        allocation.set_value(Dimension::SharedMemory, 1.0);

        allocation.set_value(Dimension::Memory, 8.0);
        assert_eq!(allocation.value(Dimension::SharedMemory), Some(1.0));
    }

    #[test]
    fn preset_shared_memory_at_memory_follows_it() {
        let mut allocation = Allocation::new(limits(1));
        let preset = Preset::builder()
            .name("even")
            .cpu(2.0)
            .mem(4.0)
            .shmem(4.0)
            .build();

        allocation.apply_preset(&preset);
        assert_eq!(allocation.value(Dimension::SharedMemory), Some(4.0));

        allocation.set_value(Dimension::Memory, 8.0);
        assert_eq!(allocation.value(Dimension::SharedMemory), Some(8.0));
        assert!(allocation.drain_adjustments().is_empty());
    }

    #[test]
    fn default_ceiling_caps_shared_memory() {
        let image = IndexMap::from([(String::from("cuda.device"), ImageLimit::default())]);
        let mut allocation = Allocation::new(limits_with(image, 1, &Ceilings::default()));
        allocation.set_value(Dimension::Memory, 8.0);

        assert_eq!(allocation.set_value(Dimension::SharedMemory, 4.0), Some(2.0));
        assert_eq!(allocation.range(Dimension::SharedMemory).unwrap().max(), 2.0);

        // At its own ceiling shared memory still follows memory down.
        allocation.set_value(Dimension::Memory, 1.0);
        assert_eq!(allocation.value(Dimension::SharedMemory), Some(1.0));
        allocation.set_value(Dimension::Memory, 8.0);
        assert_eq!(allocation.value(Dimension::SharedMemory), Some(2.0));
    }

    #[test]
    fn shared_memory_minimum_above_memory_is_infeasible() {
        let image = IndexMap::from([(
            String::from("shmem"),
            ImageLimit::new(Some(1.0), Bound::Unbounded),
        )]);
        let mut allocation = Allocation::new(limits_with(image, 1, &Ceilings::default()));
        assert_eq!(allocation.value(Dimension::Memory), Some(0.0625));
        assert!(allocation.limits().infeasible().is_empty());
        assert_eq!(allocation.infeasible(), vec![Dimension::SharedMemory]);

        allocation.set_value(Dimension::Memory, 2.0);
        assert!(allocation.is_feasible());
    }

    #[test]
    fn presets_only_refuses_manual_resource_edits() {
        let mut allocation = Allocation::new(limits(2)).with_presets_only(true);
        assert!(allocation.is_presets_only());

        assert_eq!(allocation.set_value(Dimension::Cpu, 4.0), None);
        assert_eq!(allocation.set_value(Dimension::SharedMemory, 1.0), None);
        assert_eq!(
            allocation.set_value(Dimension::Accelerator(AcceleratorKind::CudaDevice), 1.0),
            None
        );
        assert_eq!(allocation.value(Dimension::Cpu), Some(1.0));

        let preset = Preset::builder().name("medium").cpu(4.0).mem(8.0).build();
        allocation.apply_preset(&preset);
        assert_eq!(allocation.value(Dimension::Cpu), Some(4.0));
        assert_eq!(allocation.preset(), Some("medium"));

        assert_eq!(allocation.set_value(Dimension::Sessions, 2.0), Some(2.0));
        assert_eq!(allocation.set_value(Dimension::ClusterSize, 2.0), Some(2.0));
    }

    #[test]
    fn preset_with_oversized_shared_memory_is_reduced() {
        let mut allocation = Allocation::new(limits(1));
        let preset = Preset::builder()
            .name("small")
            .cpu(2.0)
            .mem(2.0)
            .shmem(3.0)
            .build();

        allocation.apply_preset(&preset);

        assert_eq!(allocation.value(Dimension::SharedMemory), Some(2.0));
        assert_eq!(
            allocation.drain_adjustments(),
            vec![Adjustment::SharedMemoryReduced { from: 3.0, to: 2.0 }]
        );
        assert!(!allocation.preset_fits(&preset));
    }

    #[test]
    fn manual_edit_clears_the_preset() {
        let mut allocation = Allocation::new(limits(1));
        let preset = Preset::builder()
            .name("gpu")
            .cpu(4.0)
            .mem(8.0)
            .accelerator(AcceleratorAmount {
                kind: AcceleratorKind::CudaDevice,
                amount: 1.0,
            })
            .build();

        allocation.apply_preset(&preset);
        assert_eq!(allocation.preset(), Some("gpu"));
        assert_eq!(
            allocation.accelerator(),
            Some((AcceleratorKind::CudaDevice, 1.0))
        );
        assert!(allocation.preset_fits(&preset));

        allocation.set_value(Dimension::Cpu, 2.0);
        assert_eq!(allocation.preset(), None);
    }

    #[test]
    fn multi_node_forces_a_single_session() {
        let mut allocation = Allocation::new(limits(1));
        allocation.set_value(Dimension::Sessions, 3.0);
        assert_eq!(allocation.sessions(), 3);

        allocation.set_cluster_mode(ClusterMode::MultiNode);
        assert_eq!(allocation.sessions(), 1);
        assert!(allocation.range(Dimension::Sessions).unwrap().is_disabled());
        assert_eq!(allocation.set_value(Dimension::Sessions, 2.0), None);
        assert_eq!(allocation.sessions(), 1);
        assert!(allocation.drain_adjustments().contains(&Adjustment::SessionsReset));

        assert_eq!(allocation.set_cluster_size(10), 3);
    }

    #[test]
    fn single_node_cluster_size_fits_the_accelerators() {
        let mut allocation = Allocation::new(limits(8));
        allocation.set_value(Dimension::Accelerator(AcceleratorKind::CudaDevice), 2.0);

        assert_eq!(allocation.set_cluster_size(8), 2);
        assert!(allocation.is_feasible());

        // Raising the per-container amount afterwards blocks submission rather
        // than shrinking the cluster.
        allocation.set_value(Dimension::Accelerator(AcceleratorKind::CudaDevice), 4.0);
        assert_eq!(allocation.cluster().size, 2);
        assert_eq!(allocation.infeasible(), vec![Dimension::ClusterSize]);
    }

    #[test]
    fn totals_multiply_by_cluster_and_sessions() {
        let mut allocation = Allocation::new(limits(4));
        allocation.set_value(Dimension::Memory, 2.5);
        allocation.set_cluster_size(2);
        allocation.set_value(Dimension::Sessions, 3.0);

        assert_eq!(allocation.totals()["mem"], 15.0);
        assert_eq!(allocation.totals()["cpu"], 6.0);
    }
}
