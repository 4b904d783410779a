//! The sources that bound each resource dimension.

use bon::Builder;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

use crate::resource::Bound;
use crate::resource::Dimension;

/// The bounds an image declares for one resource slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageLimit {
    /// The declared minimum, if any.
    pub min: Option<f64>,

    /// The declared maximum.
    pub max: Bound,
}

impl ImageLimit {
    /// Creates an image limit from a minimum and a maximum.
    pub fn new(min: Option<f64>, max: impl Into<Bound>) -> Self {
        Self {
            min,
            max: max.into(),
        }
    }
}

/// The default number of containers a policy allows per session.
fn default_max_containers() -> u32 {
    1
}

/// An account/keypair level resource policy.
#[derive(Builder, Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
#[builder(builder_type = PolicyBuilder)]
pub struct Policy {
    /// The per-slot limits, keyed by slot name (e.g., `cpu` or `cuda.device`).
    #[serde(default)]
    #[builder(default)]
    limits: IndexMap<String, Bound>,

    /// The maximum number of concurrently running sessions.
    #[serde(default)]
    #[builder(default)]
    concurrency_max: Bound,

    /// The number of sessions currently running.
    #[serde(default)]
    #[builder(default)]
    concurrency_used: u32,

    /// The maximum number of containers in a single session.
    #[serde(default = "default_max_containers")]
    #[builder(default = default_max_containers())]
    max_containers_per_session: u32,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            limits: Default::default(),
            concurrency_max: Bound::Unbounded,
            concurrency_used: 0,
            max_containers_per_session: default_max_containers(),
        }
    }
}

impl Policy {
    /// Gets the policy limit for a dimension.
    ///
    /// A slot missing from the policy is unbounded.
    pub fn limit(&self, dimension: Dimension) -> Bound {
        self.limits
            .get(dimension.slot())
            .copied()
            .unwrap_or_default()
    }

    /// Gets the number of sessions that can still be started.
    pub fn remaining_sessions(&self) -> Bound {
        self.concurrency_max.remaining(f64::from(self.concurrency_used))
    }

    /// Gets the maximum number of containers per session.
    pub fn max_containers_per_session(&self) -> u32 {
        self.max_containers_per_session
    }
}

/// The capacity currently available in a scaling group.
#[derive(Builder, Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
#[builder(builder_type = CapacityBuilder)]
pub struct Capacity {
    /// The available amount per slot.
    #[serde(default)]
    #[builder(default)]
    slots: IndexMap<String, Bound>,

    /// The number of nodes a multi-node session may span.
    #[serde(default)]
    #[builder(default)]
    max_nodes: Bound,
}

impl Capacity {
    /// Gets the available capacity for a dimension.
    ///
    /// Accelerators that are not reported are not installed, so they have
    /// no capacity. Every other missing slot is unbounded.
    pub fn available(&self, dimension: Dimension) -> Bound {
        match (self.slots.get(dimension.slot()), dimension) {
            (Some(bound), _) => *bound,
            (None, Dimension::Accelerator(_)) => Bound::Finite(0.0),
            (None, _) => Bound::Unbounded,
        }
    }

    /// Gets the number of nodes available to a multi-node session.
    pub fn max_nodes(&self) -> Bound {
        self.max_nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::AcceleratorKind;

    #[test]
    fn missing_accelerators_have_no_capacity() {
        let capacity = Capacity::builder()
            .slots(IndexMap::from([(String::from("cpu"), Bound::Finite(4.0))]))
            .build();

        assert_eq!(capacity.available(Dimension::Cpu), Bound::Finite(4.0));
        assert_eq!(capacity.available(Dimension::Memory), Bound::Unbounded);
        assert_eq!(
            capacity.available(Dimension::Accelerator(AcceleratorKind::CudaDevice)),
            Bound::Finite(0.0)
        );
    }

    #[test]
    fn remaining_sessions_subtract_used() {
        let policy = Policy::builder()
            .concurrency_max(Bound::Finite(5.0))
            .concurrency_used(2)
            .build();
        assert_eq!(policy.remaining_sessions(), Bound::Finite(3.0));
        assert_eq!(Policy::default().remaining_sessions(), Bound::Unbounded);
    }

    #[test]
    fn policy_deserializes_infinity() {
        let policy: Policy = serde_json::from_str(
            r#"{ "limits": { "cpu": "Infinity", "mem": 16 }, "concurrency_max": 3 }"#,
        )
        .unwrap();

        assert_eq!(policy.limit(Dimension::Cpu), Bound::Unbounded);
        assert_eq!(policy.limit(Dimension::Memory), Bound::Finite(16.0));
        assert_eq!(policy.max_containers_per_session(), 1);
    }
}
