//! Facet-enumeration cut search.
//!
//! Every hyperplane already present in the region is a candidate; it is
//! scored by the gap growth at the first multi-polytope event lying on it in
//! sweep order. The sweep direction is the hyperplane's perturbed normal,
//! since the sweep machinery needs a direction that is not orthogonal to any
//! event edge. Candidates are exact existing hyperplanes, so no
//! deduplication is needed.

use super::{CandidateCut, CutStrategy};
use crate::gap::{gap_growth_at, near_border};
use crate::region::PolytopeUnion;
use crate::sweep::Sweep;

#[derive(Clone, Copy, Debug, Default)]
pub struct FacetCuts;

impl CutStrategy for FacetCuts {
    fn name(&self) -> &'static str {
        "facet"
    }

    fn candidates(
        &self,
        union: &PolytopeUnion,
        hull: &PolytopeUnion,
        limit: usize,
        _seed: u64,
    ) -> Vec<CandidateCut> {
        let mut cuts: Vec<CandidateCut> = union
            .hyperplanes()
            .iter()
            .enumerate()
            .map(|(idx, plane)| {
                let dir = plane.perturbed().unit_normal();
                let (us, hs) = Sweep::pair(union.events(), hull.events(), dir);
                let score = facet_growth(&us, &hs, idx);
                tracing::debug!(hyperplane = idx, score, "scored facet");
                CandidateCut {
                    plane: *plane,
                    score,
                    active: vec![idx],
                }
            })
            .collect();
        cuts.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        cuts.truncate(limit);
        cuts
    }
}

/// Gap growth attributed to one hyperplane: evaluated at the first event on
/// it in sweep order that is incident to more than one polytope. An on-plane
/// event at the sweep border marks an outer facet, which scores zero.
fn facet_growth(union: &Sweep<'_>, hull: &Sweep<'_>, hyperplane: usize) -> f64 {
    let Some((lo, hi)) = union.range() else {
        return 0.0;
    };
    for (event, lam) in union.sorted_events() {
        if !event.incidences.contains(&hyperplane) {
            continue;
        }
        if near_border(lam, lo, hi) {
            return 0.0;
        }
        if event.incident_polytopes.len() > 1 {
            return gap_growth_at(union, hull, lam);
        }
    }
    0.0
}
