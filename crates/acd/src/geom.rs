//! Low-level 2D geometry shared by regions, sweeps, and cut generators.
//!
//! Purpose
//! - One hyperplane value type plus the small vertex/hull/direction helpers
//!   the region layer builds on. Everything here is dimension-concrete; the
//!   decomposition layer above only talks to the region API.
//!
//! Conventions
//! - A hyperplane is `a·x + b = 0` with unnormalized normal `a`. We do not
//!   require `||a|| = 1`; predicates that need a scale-free answer divide by
//!   `||a||` explicitly (`signed_distance`).
//! - [`Orientation::Pos`] denotes the side `a·x + b >= 0`, `Neg` the
//!   opposite. Membership vectors pair hyperplane indices with orientations.
//! - Numerical tolerance: predicates use `GEOM_EPS = 1e-9`. Degeneracy
//!   handling is intentionally light; inputs are expected near O(1) scale.

use nalgebra::{matrix, Vector2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 2D vector alias used throughout the crate.
pub type Vec2 = Vector2<f64>;

/// Numerical tolerance used for geometric predicates.
pub const GEOM_EPS: f64 = 1e-9;

/// Rotation applied by [`Hyperplane::perturbed`]. Large enough that sweep
/// coefficients stay well conditioned, small enough that event parameters
/// move by less than the derivative step of the gap evaluator.
const PERTURB_ANGLE: f64 = 1e-6;

/// Side of a hyperplane, as recorded in membership vectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    /// The half-space `a·x + b <= 0`.
    Neg,
    /// The half-space `a·x + b >= 0`.
    Pos,
}

impl Orientation {
    #[inline]
    pub fn signum(self) -> f64 {
        match self {
            Orientation::Neg => -1.0,
            Orientation::Pos => 1.0,
        }
    }

    #[inline]
    pub fn flipped(self) -> Self {
        match self {
            Orientation::Neg => Orientation::Pos,
            Orientation::Pos => Orientation::Neg,
        }
    }
}

/// Hyperplane `a·x + b = 0`.
#[derive(Clone, Copy, Debug)]
pub struct Hyperplane {
    pub a: Vec2,
    pub b: f64,
}

impl Hyperplane {
    #[inline]
    pub fn new(a: Vec2, b: f64) -> Self {
        debug_assert!(a.norm() > 0.0, "hyperplane normal must be nonzero");
        Self { a, b }
    }

    #[inline]
    pub fn eval(&self, p: Vec2) -> f64 {
        self.a.dot(&p) + self.b
    }

    /// Distance of `p` from the hyperplane, signed toward the `Pos` side.
    #[inline]
    pub fn signed_distance(&self, p: Vec2) -> f64 {
        self.eval(p) / self.a.norm()
    }

    #[inline]
    pub fn unit_normal(&self) -> Vec2 {
        self.a / self.a.norm()
    }

    /// Offset normalized to a unit normal; equal for coincident hyperplanes
    /// regardless of how the stored normal is scaled.
    #[inline]
    pub fn offset_norm(&self) -> f64 {
        self.b / self.a.norm()
    }

    /// Nearby non-degenerate replacement: the normal rotated by a fixed tiny
    /// angle. Deterministic, so repeated runs see the same sweep directions.
    pub fn perturbed(&self) -> Hyperplane {
        Hyperplane::new(rotate(self.a, PERTURB_ANGLE), self.b)
    }
}

/// Rotate `v` by `angle` radians (counterclockwise).
#[inline]
pub fn rotate(v: Vec2, angle: f64) -> Vec2 {
    let (s, c) = angle.sin_cos();
    Vec2::new(c * v.x - s * v.y, s * v.x + c * v.y)
}

/// Intersection point of two hyperplane boundary lines.
///
/// Uses a simple 2×2 solve on unit-normalized rows; returns `None` when the
/// lines are parallel or near-parallel. Callers decide what to do with the
/// candidate (e.g. containment checks).
pub fn line_intersection(h1: &Hyperplane, h2: &Hyperplane) -> Option<Vec2> {
    let n1 = h1.unit_normal();
    let n2 = h2.unit_normal();
    let m = matrix![n1.x, n1.y; n2.x, n2.y];
    if m.determinant().abs() < GEOM_EPS {
        return None;
    }
    let rhs = Vec2::new(-h1.offset_norm(), -h2.offset_norm());
    m.try_inverse().map(|inv| inv * rhs)
}

/// Distance between unit directions with the sign folded out, since `d` and
/// `-d` generate the same family of sweep cuts.
#[inline]
pub fn direction_distance(u: Vec2, v: Vec2) -> f64 {
    (u - v).norm().min((u + v).norm())
}

/// Andrew's monotone chain convex hull (CCW order, deduped).
///
/// Complexity: O(N log N) for sort + linear passes. Returns `None` for fewer
/// than 3 effective points (lower-dimensional input).
pub fn convex_hull(points: &[Vec2]) -> Option<Vec<Vec2>> {
    if points.len() < 3 {
        return None;
    }
    let mut pts: Vec<_> = points.to_vec();
    pts.sort_by(|a, b| {
        match a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal) {
            std::cmp::Ordering::Equal => a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal),
            o => o,
        }
    });
    pts.dedup_by(|a, b| (*a - *b).norm() < 1e-12);
    if pts.len() < 3 {
        return None;
    }
    let mut lower: Vec<Vec2> = Vec::with_capacity(pts.len());
    for p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], *p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }
    let mut upper: Vec<Vec2> = Vec::with_capacity(pts.len());
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], *p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }
    lower.pop();
    upper.pop();
    let mut hull = lower;
    hull.extend(upper);
    if hull.len() < 3 {
        return None;
    }
    Some(hull)
}

/// Outward half-spaces of a CCW hull polygon, as hyperplanes whose `Neg`
/// side is the interior.
///
/// For each edge `p → q` the outward normal is the CW rotation
/// `(e.y, -e.x)`; with `a = n` and `b = -n·p` the interior satisfies
/// `a·x + b <= 0`.
pub fn hull_halfspaces(hull: &[Vec2]) -> Vec<Hyperplane> {
    let mut hs = Vec::with_capacity(hull.len());
    for k in 0..hull.len() {
        let p = hull[k];
        let q = hull[(k + 1) % hull.len()];
        let e = q - p;
        let n = Vec2::new(e.y, -e.x);
        hs.push(Hyperplane::new(n, -n.dot(&p)));
    }
    hs
}

#[inline]
fn cross(a: Vec2, b: Vec2, c: Vec2) -> f64 {
    let ab = b - a;
    let ac = c - a;
    ab.x * ac.y - ab.y * ac.x
}

/// Signed area of the parallelogram spanned by `u` and `v`.
#[inline]
pub fn wedge(u: Vec2, v: Vec2) -> f64 {
    u.x * v.y - u.y * v.x
}

/// Sample `count` unit directions from a seeded generator.
///
/// Same seed ⇒ same directions, which is what makes the stochastic cut
/// search reproducible per node.
pub fn unit_directions(count: usize, seed: u64) -> Vec<Vec2> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let th = rng.gen::<f64>() * std::f64::consts::TAU;
            Vec2::new(th.cos(), th.sin())
        })
        .collect()
}

/// SplitMix64-style mixing of a base seed and an index, cheap and stable.
/// Used to derive per-node sampling seeds from the root seed and node id.
pub fn mix_seed(seed: u64, index: u64) -> u64 {
    fn mix(mut x: u64) -> u64 {
        x ^= x >> 30;
        x = x.wrapping_mul(0xbf58476d1ce4e5b9);
        x ^= x >> 27;
        x = x.wrapping_mul(0x94d049bb133111eb);
        x ^ (x >> 31)
    }
    mix(seed ^ mix(index.wrapping_add(0x9e3779b97f4a7c15)))
}
