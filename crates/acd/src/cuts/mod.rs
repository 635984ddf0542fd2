//! Candidate-cut generation strategies.
//!
//! A strategy proposes up to `limit` splitting hyperplanes for a region,
//! ranked by a local heuristic (gap growth). Selection and scoring of the
//! actual split live on the node; strategies are injected at tree-build time
//! as trait objects so both searches share one seam.

mod facet;
mod sweep;

pub use facet::FacetCuts;
pub use sweep::SweepCuts;

use crate::geom::Hyperplane;
use crate::region::PolytopeUnion;

/// A proposed splitting hyperplane.
#[derive(Clone, Debug)]
pub struct CandidateCut {
    pub plane: Hyperplane,
    /// Generator-local ranking score (gap growth at the scored event).
    pub score: f64,
    /// Hyperplanes active at the event the score was computed at.
    pub active: Vec<usize>,
}

/// A candidate-cut search strategy.
pub trait CutStrategy: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Up to `limit` candidates for splitting `union`, best first. `seed`
    /// makes any internal sampling reproducible; deterministic strategies
    /// may ignore it.
    fn candidates(
        &self,
        union: &PolytopeUnion,
        hull: &PolytopeUnion,
        limit: usize,
        seed: u64,
    ) -> Vec<CandidateCut>;
}
