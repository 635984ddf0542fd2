//! Polytope-union region representation.
//!
//! Purpose
//! - A region is a finite union of convex polytopes over a shared hyperplane
//!   arrangement: one hyperplane list plus, per polytope, a membership vector
//!   of (hyperplane index, orientation) constraints.
//! - From that description we derive the boundary *events*: arrangement
//!   vertices contained in the union, each carrying its incident hyperplanes
//!   and polytopes plus a precomputed local cone expansion. Sweeps integrate
//!   volumes from the events alone; the cluster detector reads the per-event
//!   polytope links.
//!
//! Why precompute cones per event
//! - The signed simplicial cones of the local inclusion–exclusion expansion
//!   are direction-independent, while a sweep needs per-direction
//!   coefficients. Splitting the work this way makes every additional sweep
//!   direction O(events) instead of O(arrangement).
//!
//! Assumptions
//! - Few polytopes meet in any single vertex (the subset expansion is
//!   exponential in that count; realistic inputs stay in single digits).
//! - Inputs are bounded polytopes near O(1) scale; see `geom` for tolerance
//!   conventions.

use crate::geom::{
    convex_hull, hull_halfspaces, line_intersection, rotate, wedge, Hyperplane, Orientation, Vec2,
    GEOM_EPS,
};

/// Default tolerance on unit normals when merging near-duplicate hyperplanes.
pub const DEDUP_NORMAL_TOL: f64 = 1e-8;
/// Default tolerance on normalized offsets when merging near-duplicates.
pub const DEDUP_OFFSET_TOL: f64 = 1e-5;

/// Angular tolerance for cone feasibility and width classification.
const ANGLE_EPS: f64 = 1e-9;

/// Membership vector of one polytope: the side of each constraining
/// hyperplane the polytope lies on.
pub type Membership = Vec<(usize, Orientation)>;

/// One simplicial term of an event's local volume expansion: the wedge
/// spanned CCW from `u1` to `u2`, weighted by `sign`.
#[derive(Clone, Copy, Debug)]
pub struct SignedCone {
    pub sign: f64,
    pub u1: Vec2,
    pub u2: Vec2,
}

/// Boundary vertex of the union.
#[derive(Clone, Debug)]
pub struct Event {
    pub vertex: Vec2,
    /// Hyperplanes passing through the vertex (sorted indices).
    pub incidences: Vec<usize>,
    /// Polytopes containing the vertex (sorted indices).
    pub incident_polytopes: Vec<usize>,
    /// Local volume expansion; empty for candidates that contribute nothing
    /// (interior vertices, lower-dimensional contacts).
    pub cones: Vec<SignedCone>,
    /// Polytope pairs whose tangent cones at this vertex share a nonzero
    /// direction; the raw edges of the incidence graph.
    pub links: Vec<(usize, usize)>,
}

/// Axis-aligned bounding box over event vertices.
#[derive(Clone, Copy, Debug)]
pub struct Bbox {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bbox {
    pub fn diagonal(&self) -> f64 {
        (self.max - self.min).norm()
    }
}

/// A union of convex polytopes with derived boundary events.
#[derive(Clone, Debug)]
pub struct PolytopeUnion {
    hyperplanes: Vec<Hyperplane>,
    members: Vec<Membership>,
    bbox: Option<Bbox>,
    candidates: Vec<Event>,
    events: Vec<Event>,
}

impl PolytopeUnion {
    /// Build a region from a shared hyperplane list and per-polytope
    /// membership vectors, deriving all events.
    pub fn new(hyperplanes: Vec<Hyperplane>, members: Vec<Membership>) -> Self {
        let mut region = Self {
            hyperplanes,
            members,
            bbox: None,
            candidates: Vec::new(),
            events: Vec::new(),
        };
        region.recompute_events();
        region
    }

    /// Build a region from per-polytope half-space lists, each half-space
    /// meaning `a·x + b <= 0`. Shared facets are merged by the default
    /// dedup tolerances.
    pub fn from_convex_parts(parts: &[Vec<Hyperplane>]) -> Self {
        let mut hyperplanes = Vec::new();
        let mut members = Vec::new();
        for part in parts {
            let base = hyperplanes.len();
            hyperplanes.extend(part.iter().copied());
            members.push((0..part.len()).map(|i| (base + i, Orientation::Neg)).collect());
        }
        Self::new(hyperplanes, members).reduced(DEDUP_NORMAL_TOL, DEDUP_OFFSET_TOL)
    }

    /// Ambient dimension of the region.
    pub fn dim(&self) -> usize {
        2
    }

    pub fn hyperplanes(&self) -> &[Hyperplane] {
        &self.hyperplanes
    }

    pub fn members(&self) -> &[Membership] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Pre-pruning boundary vertices (arrangement vertices in the union).
    pub fn candidates(&self) -> &[Event] {
        &self.candidates
    }

    /// Pruned events: candidates with a non-trivial local volume expansion.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn bbox(&self) -> Option<Bbox> {
        self.bbox
    }

    /// Recompute candidates, events, and the bounding box from the current
    /// hyperplanes and membership vectors.
    pub fn recompute_events(&mut self) {
        let candidates = self.collect_candidates();
        self.bbox = bbox_of(candidates.iter().map(|e| e.vertex));
        self.events = candidates.iter().filter(|e| !e.cones.is_empty()).cloned().collect();
        self.candidates = candidates;
    }

    /// Pure half-space restriction: a new region further constrained to one
    /// side of `cut`. The receiver is untouched; children never alias their
    /// parent's representation.
    pub fn restricted(&self, cut: &Hyperplane, side: Orientation) -> PolytopeUnion {
        let mut hyperplanes = self.hyperplanes.clone();
        // Reuse an existing hyperplane when the cut coincides with one
        // (snapped sweep cuts, facet cuts), so membership vectors stay
        // free of duplicated constraints.
        let idx = hyperplanes
            .iter()
            .position(|h| coincident(h, cut))
            .unwrap_or_else(|| {
                hyperplanes.push(*cut);
                hyperplanes.len() - 1
            });
        let members = self
            .members
            .iter()
            .map(|m| {
                let mut m = m.clone();
                if !m.contains(&(idx, side)) {
                    m.push((idx, side));
                }
                m
            })
            .collect();
        PolytopeUnion::new(hyperplanes, members)
    }

    /// Restriction to a subset of the polytopes (cluster split). Polytope
    /// indices are re-densified to `0..keep.len()`.
    pub fn restricted_to_members(&self, keep: &[usize]) -> PolytopeUnion {
        let members = keep.iter().map(|&p| self.members[p].clone()).collect();
        PolytopeUnion::new(self.hyperplanes.clone(), members)
    }

    /// Region of the convex hull of this region's events, or `None` when the
    /// events span less than the full dimension.
    pub fn hull_of(&self) -> Option<PolytopeUnion> {
        let pts: Vec<Vec2> = self.events.iter().map(|e| e.vertex).collect();
        let hull = convex_hull(&pts)?;
        let hs = hull_halfspaces(&hull);
        let member: Membership = (0..hs.len()).map(|k| (k, Orientation::Neg)).collect();
        Some(Self::new(hs, vec![member]).reduced(DEDUP_NORMAL_TOL, DEDUP_OFFSET_TOL))
    }

    /// Merge near-duplicate hyperplanes into one representative each and
    /// remap all membership vectors. Reduces noise from near-degenerate
    /// facets before cut generation.
    pub fn reduced(&self, normal_tol: f64, offset_tol: f64) -> PolytopeUnion {
        let (reps, remap) = dedup_hyperplanes(&self.hyperplanes, normal_tol, offset_tol);
        if reps.len() < self.hyperplanes.len() {
            tracing::debug!(
                dropped = self.hyperplanes.len() - reps.len(),
                total = self.hyperplanes.len(),
                "merged near-duplicate hyperplanes"
            );
        }
        let members = self
            .members
            .iter()
            .map(|m| {
                let mut out: Membership = Vec::with_capacity(m.len());
                for &(k, o) in m {
                    let entry = (remap[k], o);
                    if !out.contains(&entry) {
                        out.push(entry);
                    }
                }
                out
            })
            .collect();
        PolytopeUnion::new(reps, members)
    }

    fn collect_candidates(&self) -> Vec<Event> {
        let hs = &self.hyperplanes;
        let mut verts: Vec<Vec2> = Vec::new();
        for i in 0..hs.len() {
            for j in (i + 1)..hs.len() {
                let Some(v) = line_intersection(&hs[i], &hs[j]) else {
                    continue;
                };
                if !(v.x.is_finite() && v.y.is_finite()) {
                    continue;
                }
                let eps = GEOM_EPS * (1.0 + v.norm());
                if !verts.iter().any(|w| (w - v).norm() < eps) {
                    verts.push(v);
                }
            }
        }
        let mut out = Vec::new();
        for v in verts {
            let eps = GEOM_EPS * (1.0 + v.norm());
            let pos: Vec<i8> = hs
                .iter()
                .map(|h| {
                    let d = h.signed_distance(v);
                    if d.abs() <= eps {
                        0
                    } else if d > 0.0 {
                        1
                    } else {
                        -1
                    }
                })
                .collect();
            let incident: Vec<usize> = (0..self.members.len())
                .filter(|&p| contains_with_pos(&self.members[p], &pos))
                .collect();
            if incident.is_empty() {
                continue;
            }
            let incidences: Vec<usize> = pos
                .iter()
                .enumerate()
                .filter(|&(_, &s)| s == 0)
                .map(|(k, _)| k)
                .collect();
            let (cones, links) = self.event_analysis(&pos, &incident);
            out.push(Event {
                vertex: v,
                incidences,
                incident_polytopes: incident,
                cones,
                links,
            });
        }
        out
    }

    /// Unit inward normals of the constraints of polytope `p` active at a
    /// vertex with position vector `pos`.
    fn active_normals(&self, p: usize, pos: &[i8]) -> Vec<Vec2> {
        self.members[p]
            .iter()
            .filter(|&&(k, _)| pos[k] == 0)
            .map(|&(k, o)| self.hyperplanes[k].unit_normal() * o.signum())
            .collect()
    }

    /// Local cone expansion and incidence links at one candidate vertex.
    fn event_analysis(&self, pos: &[i8], incident: &[usize]) -> (Vec<SignedCone>, Vec<(usize, usize)>) {
        let per: Vec<Vec<Vec2>> = incident.iter().map(|&p| self.active_normals(p, pos)).collect();

        let mut links = Vec::new();
        for i in 0..incident.len() {
            for j in (i + 1)..incident.len() {
                let combined: Vec<Vec2> = per[i].iter().chain(per[j].iter()).copied().collect();
                if local_cone(&combined).has_direction() {
                    links.push((incident[i], incident[j]));
                }
            }
        }

        // A polytope holding the vertex strictly inside makes the whole
        // neighborhood interior: all inclusion–exclusion terms cancel.
        if per.iter().any(|ns| ns.is_empty()) {
            return (Vec::new(), links);
        }

        let n = incident.len();
        debug_assert!(n <= 16, "unexpectedly many polytopes share a vertex");
        let mut cones = Vec::new();
        for mask in 1u32..(1u32 << n) {
            let mut normals = Vec::new();
            for (i, ns) in per.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    normals.extend_from_slice(ns);
                }
            }
            if let Some((u1, u2, _)) = local_cone(&normals).arc {
                let sign = if mask.count_ones() % 2 == 1 { 1.0 } else { -1.0 };
                cones.push(SignedCone { sign, u1, u2 });
            }
        }
        (cones, links)
    }
}

fn contains_with_pos(member: &Membership, pos: &[i8]) -> bool {
    member.iter().all(|&(k, o)| match o {
        Orientation::Neg => pos[k] <= 0,
        Orientation::Pos => pos[k] >= 0,
    })
}

fn coincident(h: &Hyperplane, g: &Hyperplane) -> bool {
    (h.unit_normal() - g.unit_normal()).norm() < GEOM_EPS
        && (h.offset_norm() - g.offset_norm()).abs() < GEOM_EPS
}

fn bbox_of(points: impl Iterator<Item = Vec2>) -> Option<Bbox> {
    let mut bbox: Option<Bbox> = None;
    for p in points {
        bbox = Some(match bbox {
            None => Bbox { min: p, max: p },
            Some(b) => Bbox {
                min: Vec2::new(b.min.x.min(p.x), b.min.y.min(p.y)),
                max: Vec2::new(b.max.x.max(p.x), b.max.y.max(p.y)),
            },
        });
    }
    bbox
}

/// Tangent cone of a set of inward half-plane constraints through the origin.
struct LocalCone {
    /// No active constraints: the cone is the whole plane.
    full: bool,
    /// Feasible boundary rays (empty iff the cone is `{0}` and not full).
    rays: Vec<Vec2>,
    /// `(u1, u2, width)` when the feasible set is a full-dimensional pointed
    /// wedge, CCW from `u1` to `u2` with `width` in (0, π).
    arc: Option<(Vec2, Vec2, f64)>,
}

impl LocalCone {
    /// Whether the cone contains any nonzero direction.
    fn has_direction(&self) -> bool {
        self.full || !self.rays.is_empty()
    }
}

fn local_cone(normals: &[Vec2]) -> LocalCone {
    if normals.is_empty() {
        return LocalCone {
            full: true,
            rays: Vec::new(),
            arc: None,
        };
    }
    // Every extreme ray of an intersection of half-planes lies on some
    // constraint boundary, so the boundary tangents are a complete
    // candidate set.
    let mut rays: Vec<Vec2> = Vec::new();
    for g in normals {
        let t = Vec2::new(-g.y, g.x);
        for s in [t, -t] {
            if normals.iter().all(|h| h.dot(&s) >= -ANGLE_EPS)
                && !rays.iter().any(|r| (r - s).norm() < ANGLE_EPS)
            {
                rays.push(s);
            }
        }
    }
    let arc = arc_between(&rays, normals);
    LocalCone {
        full: false,
        rays,
        arc,
    }
}

/// Span the feasible rays into a pointed wedge, if they form one.
///
/// Anchored on the first ray; all other feasible rays sit within ±π of it,
/// so the relative-angle span is unambiguous for pointed cones. The midpoint
/// feasibility check rejects the width-π half-plane case (where the span
/// picks an arbitrary side) and antipodal line cones.
fn arc_between(rays: &[Vec2], normals: &[Vec2]) -> Option<(Vec2, Vec2, f64)> {
    if rays.len() < 2 {
        return None;
    }
    let r0 = rays[0];
    let mut lo = 0.0_f64;
    let mut hi = 0.0_f64;
    for s in &rays[1..] {
        let rel = wedge(r0, *s).atan2(r0.dot(s));
        lo = lo.min(rel);
        hi = hi.max(rel);
    }
    let width = hi - lo;
    if width < ANGLE_EPS || width > std::f64::consts::PI - ANGLE_EPS {
        return None;
    }
    let mid = rotate(r0, 0.5 * (lo + hi));
    if !normals.iter().all(|g| g.dot(&mid) >= -ANGLE_EPS) {
        return None;
    }
    Some((rotate(r0, lo), rotate(r0, hi), width))
}

fn dedup_hyperplanes(
    hs: &[Hyperplane],
    normal_tol: f64,
    offset_tol: f64,
) -> (Vec<Hyperplane>, Vec<usize>) {
    let mut reps: Vec<Hyperplane> = Vec::new();
    let mut remap = Vec::with_capacity(hs.len());
    for h in hs {
        let found = reps.iter().position(|r| {
            (r.unit_normal() - h.unit_normal()).norm() < normal_tol
                && (r.offset_norm() - h.offset_norm()).abs() < offset_tol
        });
        match found {
            Some(i) => remap.push(i),
            None => {
                reps.push(*h);
                remap.push(reps.len() - 1);
            }
        }
    }
    (reps, remap)
}
