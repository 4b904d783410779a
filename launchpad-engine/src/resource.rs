//! Resource dimensions and the resolution of their legal ranges.

mod bound;
mod dimension;
pub mod resolver;
mod sources;

pub use bound::Bound;
pub use dimension::AcceleratorKind;
pub use dimension::Dimension;
pub use dimension::MEMORY_STEP;
pub use resolver::Limits;
pub use resolver::Range;
pub use resolver::resolve;
pub use resolver::select_accelerator;
pub use sources::Capacity;
pub use sources::CapacityBuilder;
pub use sources::ImageLimit;
pub use sources::Policy;
pub use sources::PolicyBuilder;

/// An allocation with one or more dimensions that cannot be satisfied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(
    "the requested resources cannot be satisfied (`{}`)",
    .0.iter().map(|dimension| dimension.slot()).collect::<Vec<_>>().join("`, `")
)]
pub struct Infeasible(pub Vec<Dimension>);
