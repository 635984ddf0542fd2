//! Stochastic sweep-direction cut search.
//!
//! Sample many unit directions from a seeded source, score each by the
//! maximal gap growth along it, keep the best pairwise-distinct directions,
//! and snap a kept cut onto an exactly coinciding region hyperplane when one
//! of its active hyperplanes is close enough. Same seed ⇒ same candidates.

use super::{CandidateCut, CutStrategy};
use crate::gap::{max_gap_growth, GapProbe};
use crate::geom::{direction_distance, unit_directions, Hyperplane, Vec2};
use crate::region::PolytopeUnion;
use crate::sweep::Sweep;

/// Sweep-strategy configuration.
#[derive(Clone, Copy, Debug)]
pub struct SweepCuts {
    /// Directions sampled per orthant; the total is `× 2^dim`.
    pub sweeps_per_orthant: usize,
}

impl Default for SweepCuts {
    fn default() -> Self {
        Self {
            sweeps_per_orthant: 100,
        }
    }
}

impl CutStrategy for SweepCuts {
    fn name(&self) -> &'static str {
        "sweep"
    }

    fn candidates(
        &self,
        union: &PolytopeUnion,
        hull: &PolytopeUnion,
        limit: usize,
        seed: u64,
    ) -> Vec<CandidateCut> {
        if limit == 0 {
            return Vec::new();
        }
        let dim = union.dim();
        let count = self.sweeps_per_orthant << dim;
        tracing::debug!(count, seed, "sampling sweep directions");

        let mut probes: Vec<(Vec2, GapProbe)> = Vec::new();
        for dir in unit_directions(count, seed) {
            let (us, hs) = Sweep::pair(union.events(), hull.events(), dir);
            if let Some(probe) = max_gap_growth(&us, &hs) {
                // The cut plane must use the direction the sweep actually
                // ran with, which may have been nudged.
                probes.push((us.direction(), probe));
            }
        }
        probes.sort_by(|a, b| {
            b.1.growth
                .partial_cmp(&a.1.growth)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Tolerance scales with the request size and dimension so a larger
        // request is allowed to pick closer directions.
        let distinct_tol = 0.005 / (limit as f64).sqrt() * (1usize << dim) as f64;
        let mut kept: Vec<(Vec2, GapProbe)> = Vec::new();
        for (dir, probe) in probes {
            if kept.len() == limit {
                break;
            }
            if kept
                .iter()
                .all(|(d, _)| direction_distance(*d, dir) > distinct_tol)
            {
                kept.push((dir, probe));
            }
        }

        kept.into_iter()
            .map(|(dir, probe)| snap_to_active(union, dir, probe, distinct_tol * 0.5))
            .collect()
    }
}

/// Replace a sampled cut by an exact region hyperplane when one of the
/// hyperplanes active at its event is within `tol` of the cut normal.
fn snap_to_active(
    union: &PolytopeUnion,
    dir: Vec2,
    probe: GapProbe,
    tol: f64,
) -> CandidateCut {
    if probe.active.is_empty() {
        tracing::debug!(?dir, lam = probe.lam, "no hyperplanes active at cut");
        return CandidateCut {
            plane: Hyperplane::new(dir, -probe.lam),
            score: probe.growth,
            active: probe.active,
        };
    }
    let mut closest: Option<(f64, usize)> = None;
    for &k in &probe.active {
        let d = direction_distance(union.hyperplanes()[k].unit_normal(), dir);
        if closest.map_or(true, |(bd, _)| d < bd) {
            closest = Some((d, k));
        }
    }
    let plane = match closest {
        Some((d, k)) if d < tol => {
            tracing::debug!(hyperplane = k, dist = d, "snapping cut to region hyperplane");
            union.hyperplanes()[k]
        }
        _ => Hyperplane::new(dir, -probe.lam),
    };
    CandidateCut {
        plane,
        score: probe.growth,
        active: probe.active,
    }
}
