//! Hierarchical approximate convex decomposition of polytope unions.
//!
//! A region given as a union of convex polytopes (possibly overlapping,
//! possibly disconnected) is recursively split into pieces whose convex
//! hulls approximate them within a volume-error tolerance. Disconnected
//! pieces are separated for free along the polytope incidence graph; the
//! rest is split by candidate hyperplane cuts found either by stochastic
//! sweep-direction search ([`cuts::SweepCuts`]) or by enumerating the
//! region's own facets ([`cuts::FacetCuts`]), scored through the
//! convexity-gap evaluator in [`gap`].
//!
//! Layering, bottom up:
//! - [`geom`], [`region`], [`sweep`]: the 2D geometry engine (hyperplanes,
//!   event derivation, exact sweep-plane volumes).
//! - [`gap`], [`cluster`], [`cuts`]: gap evaluation, incidence clustering,
//!   and the two cut strategies.
//! - [`node`], [`tree`]: decomposition nodes and the tree builder; the flat
//!   id-keyed report map from [`tree::build_acd`] is the output artifact.
//!
//! The crate logs through `tracing`; installing a subscriber is left to the
//! caller.

pub mod cluster;
pub mod cuts;
pub mod gap;
pub mod geom;
pub mod node;
pub mod region;
pub mod sweep;
pub mod tree;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use geom::Vec2;
pub use nalgebra::Vector2;

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::cuts::{CandidateCut, CutStrategy, FacetCuts, SweepCuts};
    pub use crate::gap::{gap_growth_at, max_gap_growth, GapProbe};
    pub use crate::geom::{Hyperplane, Orientation, Vec2};
    pub use crate::node::{AcdError, IdGen, Node, NodeCfg, NodeId};
    pub use crate::region::{Event, PolytopeUnion};
    pub use crate::sweep::Sweep;
    pub use crate::tree::{build_acd, AcdParams, AcdTree, NodeReport};
}
