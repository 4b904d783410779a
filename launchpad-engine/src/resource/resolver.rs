//! Resolution of the legal range for each resource dimension.

use indexmap::IndexMap;
use launchpad_config::Ceilings;
use launchpad_config::Session;
use tracing::debug;
use tracing::warn;

use crate::resource::AcceleratorKind;
use crate::resource::Bound;
use crate::resource::Capacity;
use crate::resource::Dimension;
use crate::resource::ImageLimit;
use crate::resource::Policy;

/// The legal range of a single dimension.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Range {
    /// The dimension this range applies to.
    dimension: Dimension,

    /// The smallest legal value.
    min: f64,

    /// The largest legal value.
    max: f64,

    /// Whether the sources could be satisfied at all.
    feasible: bool,
}

impl Range {
    /// Creates a range that admits exactly one value.
    pub fn fixed(dimension: Dimension, value: f64) -> Self {
        Self {
            dimension,
            min: value,
            max: value,
            feasible: true,
        }
    }

    /// Gets the dimension.
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Gets the smallest legal value.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Gets the largest legal value.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Gets the step between adjacent legal values.
    pub fn step(&self) -> f64 {
        self.dimension.step()
    }

    /// Whether the sources could be satisfied.
    ///
    /// An infeasible range has been collapsed to `min == max` and must block
    /// submission.
    pub fn is_feasible(&self) -> bool {
        self.feasible
    }

    /// Whether the dimension cannot be adjusted.
    pub fn is_disabled(&self) -> bool {
        self.min >= self.max
    }

    /// Whether a value lies within the range.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Snaps a value to the dimension's step and clamps it into the range.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }

        self.dimension.snap(value).clamp(self.min, self.max)
    }

    /// Returns the range with its maximum lowered to `ceiling`.
    pub fn capped(self, ceiling: f64) -> Self {
        let max = self.dimension.snap_down(ceiling.max(0.0)).min(self.max);
        Self::bounded(self.dimension, self.min, max, self.feasible)
    }

    /// Builds a range, collapsing it when `min` exceeds `max`.
    fn bounded(dimension: Dimension, min: f64, max: f64, feasible: bool) -> Self {
        if min > max {
            warn!("no legal value for `{dimension}`: minimum {min} exceeds maximum {max}");
            return Self {
                dimension,
                min: max,
                max,
                feasible: false,
            };
        }

        Self {
            dimension,
            min,
            max,
            feasible,
        }
    }
}

/// Resolves the legal range of a dimension from its four bounding sources.
///
/// The maximum is the smallest finite bound among the sources. Unbounded
/// sources are ignored; when every source is unbounded the dimension's
/// fallback ceiling is used. The minimum is the image's declared minimum (or
/// the dimension's default minimum).
///
/// If the minimum exceeds the maximum, the range collapses to the maximum and
/// is flagged as infeasible.
pub fn resolve(
    dimension: Dimension,
    image: ImageLimit,
    policy: Bound,
    capacity: Bound,
    ceiling: Bound,
) -> Range {
    let max = [image.max, policy, capacity, ceiling]
        .into_iter()
        .filter_map(Bound::finite)
        .reduce(f64::min)
        .unwrap_or_else(|| dimension.fallback_ceiling());
    let max = dimension.snap_down(max.max(0.0));

    let min = image
        .min
        .map(|min| min.max(dimension.default_min()))
        .unwrap_or_else(|| dimension.default_min());
    let min = dimension.snap_up(min);

    debug!(
        "resolved `{dimension}` from image={}, policy={policy}, capacity={capacity}, \
         ceiling={ceiling}: [{min}, {max}]",
        image.max
    );

    Range::bounded(dimension, min, max, true)
}

/// Picks the accelerator kind a session should use.
///
/// This is the first kind (in priority order) that the image declares and
/// that has capacity available.
pub fn select_accelerator(
    image: &IndexMap<String, ImageLimit>,
    capacity: &Capacity,
) -> Option<AcceleratorKind> {
    available_accelerators(image, capacity).next()
}

/// Iterates the accelerator kinds the image declares that have capacity, in
/// priority order.
fn available_accelerators<'a>(
    image: &'a IndexMap<String, ImageLimit>,
    capacity: &'a Capacity,
) -> impl Iterator<Item = AcceleratorKind> + 'a {
    AcceleratorKind::ALL.into_iter().filter(move |kind| {
        image.contains_key(kind.slot())
            && match capacity.available(Dimension::Accelerator(*kind)) {
                Bound::Finite(available) => available > 0.0,
                Bound::Unbounded => true,
            }
    })
}

/// The resolved ranges for every dimension that does not depend on the
/// currently chosen values.
#[derive(Clone, Debug)]
pub struct Limits {
    /// The CPU core range.
    cpu: Range,

    /// The memory range.
    mem: Range,

    /// The shared memory range, before capping at the chosen memory.
    shmem: Range,

    /// The ranges of the usable accelerators, in priority order.
    accelerators: IndexMap<AcceleratorKind, Range>,

    /// The session count range.
    sessions: Range,

    /// The node count range for multi-node clusters.
    nodes: Range,

    /// The policy's limit on containers per session.
    max_containers: Bound,

    /// The platform ceiling on containers per session.
    cluster_ceiling: Bound,
}

impl Limits {
    /// Resolves the limits for an image against a policy, the available
    /// capacity and the platform configuration.
    pub fn resolve(
        image: &IndexMap<String, ImageLimit>,
        policy: &Policy,
        capacity: &Capacity,
        ceilings: &Ceilings,
        session: &Session,
    ) -> Self {
        let resolve_slot = |dimension: Dimension, ceiling: Option<f64>| {
            resolve(
                dimension,
                image.get(dimension.slot()).copied().unwrap_or_default(),
                policy.limit(dimension),
                capacity.available(dimension),
                Bound::from(ceiling),
            )
        };

        let cpu = resolve_slot(Dimension::Cpu, Some(ceilings.cpu()));
        let mem = resolve_slot(Dimension::Memory, Some(ceilings.mem()));
        let shmem = resolve_slot(Dimension::SharedMemory, Some(ceilings.shmem()));

        let accelerators = available_accelerators(image, capacity)
            .map(|kind| {
                let range = resolve_slot(
                    Dimension::Accelerator(kind),
                    ceilings.accelerator(kind.slot()),
                );
                (kind, range)
            })
            .collect();

        let sessions = resolve(
            Dimension::Sessions,
            ImageLimit::default(),
            policy.remaining_sessions(),
            Bound::Unbounded,
            Bound::Finite(f64::from(session.max_sessions_per_launch())),
        );

        let nodes = resolve(
            Dimension::ClusterSize,
            ImageLimit::default(),
            Bound::Unbounded,
            capacity.max_nodes(),
            Bound::Finite(f64::from(ceilings.cluster_nodes())),
        );

        Self {
            cpu,
            mem,
            shmem,
            accelerators,
            sessions,
            nodes,
            max_containers: Bound::Finite(f64::from(policy.max_containers_per_session())),
            cluster_ceiling: Bound::Finite(f64::from(ceilings.cluster_size())),
        }
    }

    /// Gets the CPU core range.
    pub fn cpu(&self) -> Range {
        self.cpu
    }

    /// Gets the memory range.
    pub fn memory(&self) -> Range {
        self.mem
    }

    /// Gets the shared memory range capped at the chosen memory.
    pub fn shared_memory(&self, mem: f64) -> Range {
        self.shmem.capped(mem)
    }

    /// Gets the range of an accelerator kind, if it is usable.
    pub fn accelerator(&self, kind: AcceleratorKind) -> Option<Range> {
        self.accelerators.get(&kind).copied()
    }

    /// Gets the usable accelerator kinds in priority order.
    pub fn accelerators(&self) -> impl Iterator<Item = AcceleratorKind> + '_ {
        self.accelerators.keys().copied()
    }

    /// Gets the accelerator kind that is active by default.
    pub fn default_accelerator(&self) -> Option<AcceleratorKind> {
        self.accelerators.keys().next().copied()
    }

    /// Gets the session count range.
    pub fn sessions(&self) -> Range {
        self.sessions
    }

    /// Gets the node count range for multi-node clusters.
    pub fn nodes(&self) -> Range {
        self.nodes
    }

    /// Gets the replica count range for a single-node cluster given the
    /// per-replica CPU and accelerator amounts.
    ///
    /// The replicas must all fit within the CPU and accelerator maximums.
    pub fn replicas(&self, cpu: f64, accelerator: Option<(AcceleratorKind, f64)>) -> Range {
        let mut fit = Bound::Unbounded;

        if cpu > 0.0 {
            fit = fit.tightest(Bound::Finite((self.cpu.max / cpu).floor()));
        }

        if let Some((kind, amount)) = accelerator {
            if let Some(range) = self.accelerator(kind).filter(|_| amount > 0.0) {
                // NOTE: the division is tidied before flooring so that `0.9 /
                // 0.3` shares still count as three replicas.
                let replicas = ((range.max / amount) * 1e6).round() / 1e6;
                fit = fit.tightest(Bound::Finite(replicas.floor()));
            }
        }

        resolve(
            Dimension::ClusterSize,
            ImageLimit::default(),
            self.max_containers,
            fit,
            self.cluster_ceiling,
        )
    }

    /// Gets the dimensions (among those resolved here) that are infeasible.
    ///
    /// Shared memory is checked before it is capped at the chosen memory;
    /// [`Allocation::infeasible`](crate::allocation::Allocation::infeasible)
    /// also checks the capped range.
    pub fn infeasible(&self) -> Vec<Dimension> {
        [self.cpu, self.mem, self.shmem, self.sessions]
            .into_iter()
            .chain(self.accelerators.values().copied())
            .filter(|range| !range.is_feasible())
            .map(|range| range.dimension())
            .collect()
    }
}
