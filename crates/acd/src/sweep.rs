//! Sweep-plane volumes over region events.
//!
//! Purpose
//! - Exact volume of a polytope union as a function of a hyperplane sweeping
//!   along a fixed direction. The union volume up to parameter λ is a
//!   piecewise quadratic `Σ_{λ_v ≤ λ} c_v (λ − λ_v)²`, with one knot per
//!   event; the coefficient `c_v` folds the event's signed cones against the
//!   sweep direction (flip edges against the direction, count sign changes).
//! - `total_volume` is the value at the last knot; `volumes_at` evaluates
//!   arbitrary parameters for the gap evaluator.
//!
//! Degenerate directions
//! - The formula divides by `dir·u` per cone edge, so a direction orthogonal
//!   to any event edge is replaced by a deterministically rotated nearby one
//!   before coefficients are built. Paired construction keeps the union and
//!   hull sweeps on one shared, mutually generic direction.

use crate::geom::{rotate, wedge, Vec2};
use crate::region::{Event, SignedCone};

/// A direction is degenerate when some cone edge is this close to orthogonal.
const DEGEN_EPS: f64 = 1e-9;
/// First rotation applied to a degenerate direction; doubled per retry.
const NUDGE_ANGLE: f64 = 1e-7;
const MAX_NUDGES: usize = 48;

#[derive(Clone, Copy, Debug)]
struct Entry {
    event: usize,
    lam: f64,
    coef: f64,
}

/// Sweep of one event set along a fixed generic direction.
#[derive(Clone, Debug)]
pub struct Sweep<'a> {
    events: &'a [Event],
    direction: Vec2,
    entries: Vec<Entry>,
}

impl<'a> Sweep<'a> {
    /// Build a sweep, replacing `direction` by a nearby generic one if
    /// needed.
    pub fn new(events: &'a [Event], direction: Vec2) -> Self {
        let dir = generic_direction(direction, &[events]);
        Self::with_generic(events, dir)
    }

    /// Build two sweeps sharing one direction generic for both event sets;
    /// the gap evaluator needs union and hull volumes along the same λ axis.
    pub fn pair<'b>(
        union_events: &'a [Event],
        hull_events: &'b [Event],
        direction: Vec2,
    ) -> (Sweep<'a>, Sweep<'b>) {
        let dir = generic_direction(direction, &[union_events, hull_events]);
        (
            Sweep::with_generic(union_events, dir),
            Sweep::with_generic(hull_events, dir),
        )
    }

    fn with_generic(events: &'a [Event], direction: Vec2) -> Self {
        let mut entries: Vec<Entry> = events
            .iter()
            .enumerate()
            .map(|(i, e)| Entry {
                event: i,
                lam: direction.dot(&e.vertex),
                coef: e.cones.iter().map(|c| cone_coefficient(c, direction)).sum(),
            })
            .collect();
        entries.sort_by(|a, b| a.lam.partial_cmp(&b.lam).unwrap_or(std::cmp::Ordering::Equal));
        Self {
            events,
            direction,
            entries,
        }
    }

    /// The direction actually used (after any degeneracy nudge). Unit length.
    pub fn direction(&self) -> Vec2 {
        self.direction
    }

    /// Events with their sweep parameters, in ascending order.
    pub fn sorted_events(&self) -> impl Iterator<Item = (&Event, f64)> + '_ {
        self.entries.iter().map(|en| (&self.events[en.event], en.lam))
    }

    /// First and last event parameters, if any events exist.
    pub fn range(&self) -> Option<(f64, f64)> {
        match (self.entries.first(), self.entries.last()) {
            (Some(a), Some(b)) => Some((a.lam, b.lam)),
            _ => None,
        }
    }

    /// Volume of the region intersected with `dir·x <= lam`, for each given
    /// parameter.
    pub fn volumes_at(&self, lams: &[f64]) -> Vec<f64> {
        lams.iter()
            .map(|&lam| {
                self.entries
                    .iter()
                    .take_while(|en| en.lam <= lam)
                    .map(|en| {
                        let d = lam - en.lam;
                        en.coef * d * d
                    })
                    .sum()
            })
            .collect()
    }

    /// Total volume of the region.
    pub fn total_volume(&self) -> f64 {
        match self.entries.last() {
            Some(last) => self.volumes_at(&[last.lam])[0],
            None => 0.0,
        }
    }
}

fn cone_coefficient(cone: &SignedCone, dir: Vec2) -> f64 {
    let mut sign = cone.sign;
    let mut u1 = cone.u1;
    let mut u2 = cone.u2;
    if dir.dot(&u1) < 0.0 {
        u1 = -u1;
        sign = -sign;
    }
    if dir.dot(&u2) < 0.0 {
        u2 = -u2;
        sign = -sign;
    }
    sign * wedge(u1, u2).abs() / (2.0 * dir.dot(&u1) * dir.dot(&u2))
}

fn is_degenerate_for(events: &[Event], dir: Vec2) -> bool {
    events.iter().any(|e| {
        e.cones
            .iter()
            .any(|c| dir.dot(&c.u1).abs() < DEGEN_EPS || dir.dot(&c.u2).abs() < DEGEN_EPS)
    })
}

fn generic_direction(direction: Vec2, event_sets: &[&[Event]]) -> Vec2 {
    let norm = direction.norm();
    debug_assert!(norm > 0.0, "sweep direction must be nonzero");
    let mut dir = direction / norm;
    let mut angle = NUDGE_ANGLE;
    for _ in 0..MAX_NUDGES {
        if !event_sets.iter().any(|&evs| is_degenerate_for(evs, dir)) {
            return dir;
        }
        dir = rotate(dir, angle);
        angle *= 2.0;
    }
    tracing::warn!(?dir, "no generic sweep direction found; proceeding anyway");
    dir
}
