//! Convexity-gap evaluation along a sweep direction.
//!
//! The gap `g(λ) = hull_volume_at(λ) − union_volume_at(λ)` is piecewise
//! smooth with breakpoints at boundary events. Cut generators rank events by
//! how fast the gap grows locally: a corner-robust estimate is the larger of
//! the backward and forward one-sided differences sampled at `λ ± ε`, which
//! needs no differentiability at the event itself.

use crate::sweep::Sweep;

/// Step used for the one-sided difference probes.
pub const DERIV_STEP: f64 = 1e-6;
/// Events within this fraction of the sweep range from either end are
/// boundary artifacts and are never scored.
pub const BORDER_FRAC: f64 = 0.01;

/// Result of a gap-growth scan: the best event's parameter, its growth rate,
/// and the hyperplanes active there.
#[derive(Clone, Debug)]
pub struct GapProbe {
    pub lam: f64,
    pub growth: f64,
    pub active: Vec<usize>,
}

/// Whether `lam` lies within [`BORDER_FRAC`] of either end of the range.
pub fn near_border(lam: f64, lo: f64, hi: f64) -> bool {
    let scale = hi - lo;
    lam - lo < BORDER_FRAC * scale || hi - lam < BORDER_FRAC * scale
}

/// Local growth rate of the gap at `lam`: the larger one-sided difference
/// over a `DERIV_STEP` probe (not divided by the step).
pub fn gap_growth_at(union: &Sweep<'_>, hull: &Sweep<'_>, lam: f64) -> f64 {
    let times = [lam - DERIV_STEP, lam, lam + DERIV_STEP];
    let u = union.volumes_at(&times);
    let h = hull.volumes_at(&times);
    let g = [h[0] - u[0], h[1] - u[1], h[2] - u[2]];
    (g[1] - g[0]).max(g[2] - g[1])
}

/// Scan the union's interior multi-polytope events for the maximal gap
/// growth. Returns `None` when no event qualifies (convex regions, tiny
/// regions whose events all sit at the sweep border).
pub fn max_gap_growth(union: &Sweep<'_>, hull: &Sweep<'_>) -> Option<GapProbe> {
    let (lo, hi) = union.range()?;
    let mut best: Option<GapProbe> = None;
    for (event, lam) in union.sorted_events() {
        if event.incident_polytopes.len() < 2 || near_border(lam, lo, hi) {
            continue;
        }
        let growth = gap_growth_at(union, hull, lam);
        if best.as_ref().map_or(true, |b| growth > b.growth) {
            best = Some(GapProbe {
                lam,
                growth,
                active: event.incidences.clone(),
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Hyperplane, Orientation};
    use crate::region::PolytopeUnion;
    use nalgebra::vector;

    /// Two congruent triangles meeting in the origin, translated copies of
    /// each other; the origin is the only interior multi-polytope vertex.
    fn translated_triangles() -> PolytopeUnion {
        let hyperplanes = vec![
            Hyperplane::new(vector![0.0, 1.0], 0.0),
            Hyperplane::new(vector![-1.0, 1.0], -1.0),
            Hyperplane::new(vector![1.0, 1.0], 0.0),
            Hyperplane::new(vector![-1.0, 1.0], 0.0),
            Hyperplane::new(vector![1.0, 1.0], -1.0),
        ];
        let left = vec![
            (0, Orientation::Pos),
            (1, Orientation::Neg),
            (2, Orientation::Neg),
        ];
        let right = vec![
            (0, Orientation::Pos),
            (3, Orientation::Neg),
            (4, Orientation::Neg),
        ];
        PolytopeUnion::new(hyperplanes, vec![left, right])
    }

    #[test]
    fn border_guard() {
        assert!(near_border(0.001, 0.0, 1.0));
        assert!(near_border(0.9999, 0.0, 1.0));
        assert!(!near_border(0.5, 0.0, 1.0));
    }

    #[test]
    fn growth_peaks_at_the_meeting_point() {
        let region = translated_triangles();
        let hull = region.hull_of().expect("hull");
        let (us, hs) = crate::sweep::Sweep::pair(region.events(), hull.events(), vector![1.0, 0.0]);
        assert!((us.total_volume() - 0.5).abs() < 1e-9);
        assert!((hs.total_volume() - 0.75).abs() < 1e-6);

        let probe = max_gap_growth(&us, &hs).expect("an interior event qualifies");
        assert!(probe.lam.abs() < 1e-9, "lam = {}", probe.lam);
        assert_eq!(probe.active, vec![0, 2, 3]);
        assert!(probe.growth > 0.0);
    }

    #[test]
    fn convex_region_yields_no_probe() {
        let square = PolytopeUnion::from_convex_parts(&[vec![
            Hyperplane::new(vector![-1.0, 0.0], 0.0),
            Hyperplane::new(vector![1.0, 0.0], -1.0),
            Hyperplane::new(vector![0.0, -1.0], 0.0),
            Hyperplane::new(vector![0.0, 1.0], -1.0),
        ]]);
        let hull = square.hull_of().unwrap();
        let (us, hs) = crate::sweep::Sweep::pair(square.events(), hull.events(), vector![0.7, 0.3]);
        // A single polytope has no multi-polytope events to score.
        assert!(max_gap_growth(&us, &hs).is_none());
    }
}
