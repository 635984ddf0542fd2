//! Decomposition-tree nodes: lifecycle, termination, cluster splits, cut
//! selection.
//!
//! A node owns the union region of its piece and the region of that union's
//! convex hull; both volumes are computed once at construction. Tolerances
//! are validated at the root and inherited unchanged by every descendant, so
//! child construction is infallible. The cut search simulates candidate
//! splits, scores them by the total hull volume of the resulting children,
//! rejects pathological candidates, and stops early once every child of the
//! current best split is individually within tolerance.

use crate::cluster;
use crate::cuts::{CandidateCut, CutStrategy};
use crate::geom::{mix_seed, Hyperplane, Orientation, Vec2};
use crate::region::PolytopeUnion;
use crate::sweep::Sweep;

/// Slack added to both error tolerances in the termination test.
pub const ERROR_EPS: f64 = 1e-5;
/// Sanity factor for cut scores: a cut may not grow the total hull volume by
/// more than 0.5%, and its children must cover the parent volume up to the
/// same factor.
pub const CUT_SANITY: f64 = 1.005;

/// Default sweep direction for volume computation; any generic direction
/// gives the exact volume, this one avoids axis-aligned degeneracies for
/// typical inputs. (cos 1, sin 1)
const VOLUME_DIR: (f64, f64) = (0.5403023058681398, 0.8414709848078965);

/// Errors surfaced by decomposition construction.
#[derive(Debug)]
pub enum AcdError {
    /// A construction parameter is outside its valid range.
    InvalidParameter { name: &'static str, value: f64 },
}

impl std::fmt::Display for AcdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcdError::InvalidParameter { name, value } => {
                write!(f, "invalid parameter {name} = {value}")
            }
        }
    }
}

impl std::error::Error for AcdError {}

/// Identifier of a node, unique per tree build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dense id allocator, passed explicitly down the recursion.
#[derive(Debug, Default)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// Node construction parameters, validated once at the root.
#[derive(Clone, Copy, Debug)]
pub struct NodeCfg {
    /// Relative volume-error tolerance, in [0, 1].
    pub tol_rel: f64,
    /// Absolute volume-error tolerance; derived as `tol_rel × root volume`
    /// when unset.
    pub tol_abs: Option<f64>,
    /// Maximum tree depth, > 0.
    pub max_depth: u32,
}

impl Default for NodeCfg {
    fn default() -> Self {
        Self {
            tol_rel: 0.05,
            tol_abs: None,
            max_depth: 10,
        }
    }
}

/// One node of the decomposition tree.
#[derive(Debug)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub depth: u32,
    pub union: PolytopeUnion,
    pub hull: PolytopeUnion,
    pub volume: f64,
    pub hull_volume: f64,
    pub tol_rel: f64,
    pub tol_abs: f64,
    pub max_depth: u32,
    pub children: Vec<Node>,
    /// Per-node sampling seed, mixed from the parent seed and the node id.
    pub seed: u64,
}

impl Node {
    /// Build and validate the root node.
    pub fn root(
        union: PolytopeUnion,
        hull: PolytopeUnion,
        cfg: &NodeCfg,
        seed: u64,
        ids: &mut IdGen,
    ) -> Result<Node, AcdError> {
        if !(cfg.tol_rel.is_finite() && (0.0..=1.0).contains(&cfg.tol_rel)) {
            return Err(AcdError::InvalidParameter {
                name: "tol_rel",
                value: cfg.tol_rel,
            });
        }
        if cfg.max_depth == 0 {
            return Err(AcdError::InvalidParameter {
                name: "max_depth",
                value: 0.0,
            });
        }
        if let Some(tol_abs) = cfg.tol_abs {
            if !(tol_abs.is_finite() && tol_abs >= 0.0) {
                return Err(AcdError::InvalidParameter {
                    name: "tol_abs",
                    value: tol_abs,
                });
            }
        }
        Ok(Self::build(
            ids.next_id(),
            None,
            0,
            union,
            hull,
            cfg.tol_rel,
            cfg.tol_abs,
            cfg.max_depth,
            seed,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        id: NodeId,
        parent: Option<NodeId>,
        depth: u32,
        union: PolytopeUnion,
        hull: PolytopeUnion,
        tol_rel: f64,
        tol_abs: Option<f64>,
        max_depth: u32,
        seed: u64,
    ) -> Node {
        let dir = Vec2::new(VOLUME_DIR.0, VOLUME_DIR.1);
        let volume = Sweep::new(union.events(), dir).total_volume();
        let hull_volume = Sweep::new(hull.events(), dir).total_volume();
        let tol_abs = tol_abs.unwrap_or(volume * tol_rel);
        let node = Node {
            id,
            parent,
            depth,
            union,
            hull,
            volume,
            hull_volume,
            tol_rel,
            tol_abs,
            max_depth,
            children: Vec::new(),
            seed,
        };
        tracing::info!(
            id = %node.id,
            parent = ?node.parent,
            depth = node.depth,
            volume = node.volume,
            hull_volume = node.hull_volume,
            "initialized node"
        );
        node
    }

    /// Spawn a child one level deeper, inheriting all tolerances unchanged.
    fn child(&self, union: PolytopeUnion, hull: PolytopeUnion, ids: &mut IdGen) -> Node {
        let id = ids.next_id();
        Self::build(
            id,
            Some(self.id),
            self.depth + 1,
            union,
            hull,
            self.tol_rel,
            Some(self.tol_abs),
            self.max_depth,
            mix_seed(self.seed, id.0),
        )
    }

    /// Gap between hull volume and union volume.
    pub fn total_error(&self) -> f64 {
        self.hull_volume - self.volume
    }

    /// Relative convexity error `hull/volume − 1`, with a guard for
    /// measure-zero regions.
    pub fn relative_error(&self) -> f64 {
        if self.volume > 0.0 {
            self.hull_volume / self.volume - 1.0
        } else if self.hull_volume > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }

    /// Whether the convexity error is within the relative or the absolute
    /// tolerance.
    pub fn error_small(&self) -> bool {
        self.relative_error() <= self.tol_rel + ERROR_EPS
            || self.total_error() <= self.tol_abs + ERROR_EPS
    }

    /// Termination test: small enough error, or the depth budget is spent.
    /// Pure over the volumes stored at construction.
    pub fn terminal(&self) -> bool {
        if self.error_small() {
            tracing::debug!(id = %self.id, "volume error small enough; no further decomposition");
            return true;
        }
        if self.depth >= self.max_depth {
            tracing::debug!(id = %self.id, "maximum depth reached; no further decomposition");
            return true;
        }
        false
    }

    /// Connected components of the union's polytope incidence graph.
    pub fn find_clusters(&self) -> Vec<Vec<usize>> {
        let clusters = cluster::find_clusters(&self.union);
        tracing::debug!(id = %self.id, ?clusters, "clusters found");
        clusters
    }

    /// Children for a cluster split: one per cluster, skipping clusters
    /// whose restriction is lower-dimensional.
    pub fn clusters_to_nodes(&self, clusters: &[Vec<usize>], ids: &mut IdGen) -> Vec<Node> {
        let mut children = Vec::new();
        for cluster in clusters {
            let union = self.union.restricted_to_members(cluster);
            if union.events().is_empty() {
                tracing::debug!(id = %self.id, ?cluster, "dropping lower-dimensional cluster");
                continue;
            }
            let Some(hull) = union.hull_of() else {
                tracing::debug!(id = %self.id, ?cluster, "cluster hull is degenerate; dropping");
                continue;
            };
            children.push(self.child(union, hull, ids));
        }
        children
    }

    /// Ranked cut candidates from the injected strategy.
    pub fn find_cuts(&self, strategy: &dyn CutStrategy, limit: usize) -> Vec<CandidateCut> {
        strategy.candidates(&self.union, &self.hull, limit, self.seed)
    }

    /// Restrict the union to both sides of `cut` and build the surviving
    /// children. A side whose restriction has no events is dropped, so this
    /// may yield 0, 1, or 2 children; fewer than 2 is a degenerate cut and
    /// must not be treated as progress by the caller.
    pub fn apply_cut(&self, cut: &Hyperplane, ids: &mut IdGen) -> Vec<Node> {
        let mut children = Vec::new();
        for side in [Orientation::Neg, Orientation::Pos] {
            let union = self.union.restricted(cut, side);
            if union.events().is_empty() {
                tracing::debug!(id = %self.id, ?cut, ?side, "cut side is empty");
                continue;
            }
            let Some(hull) = union.hull_of() else {
                tracing::debug!(id = %self.id, ?cut, ?side, "cut side hull is degenerate");
                continue;
            };
            children.push(self.child(union, hull, ids));
        }
        children
    }

    /// Sanity test on a simulated split: rejects cuts that increase the
    /// total hull volume, and splits whose children cannot even cover the
    /// parent's true volume (numerically inconsistent).
    pub fn problematic_cut(&self, cut: &Hyperplane, score: f64) -> bool {
        if score > CUT_SANITY * self.hull_volume {
            tracing::warn!(id = %self.id, ?cut, score, hull_volume = self.hull_volume,
                "problematic cut: increased total hull volume");
            return true;
        }
        if CUT_SANITY * score < self.volume {
            tracing::warn!(id = %self.id, ?cut, score, volume = self.volume,
                "problematic cut: children hulls below union volume");
            return true;
        }
        false
    }

    /// Simulate every candidate in ranked order, keep the best valid split,
    /// and store its children on `self`.
    ///
    /// Candidates producing fewer than two children are degenerate and
    /// skipped. Problematic candidates are skipped but tracked as a
    /// least-bad fallback so a node where every candidate fails the sanity
    /// test still splits deterministically instead of reusing stale state.
    /// Returns the applied cut, or `None` (forced leaf) when no candidate
    /// split two ways.
    pub fn best_cut(&mut self, cuts: Vec<CandidateCut>, ids: &mut IdGen) -> Option<Hyperplane> {
        tracing::info!(id = %self.id, count = cuts.len(), "searching best cut");
        struct Pick {
            score: f64,
            plane: Hyperplane,
            children: Vec<Node>,
        }
        let mut best: Option<Pick> = None;
        let mut fallback: Option<Pick> = None;
        for cut in cuts {
            let children = self.apply_cut(&cut.plane, ids);
            if children.len() < 2 {
                tracing::debug!(id = %self.id, cut = ?cut.plane, sides = children.len(),
                    "degenerate cut skipped");
                continue;
            }
            let score: f64 = children.iter().map(|c| c.hull_volume).sum();
            tracing::debug!(id = %self.id, cut = ?cut.plane, score,
                hull_volume = self.hull_volume, "simulated cut");
            if self.problematic_cut(&cut.plane, score) {
                if best.is_none() && fallback.as_ref().map_or(true, |f| score < f.score) {
                    fallback = Some(Pick {
                        score,
                        plane: cut.plane,
                        children,
                    });
                }
                continue;
            }
            if best.as_ref().map_or(true, |b| score < b.score) {
                let all_within = children.iter().all(Node::error_small);
                best = Some(Pick {
                    score,
                    plane: cut.plane,
                    children,
                });
                if all_within {
                    tracing::debug!(id = %self.id, "children within tolerance; stopping early");
                    break;
                }
            }
        }
        let pick = match (best, fallback) {
            (Some(best), _) => best,
            (None, Some(fallback)) => {
                tracing::warn!(id = %self.id, cut = ?fallback.plane,
                    "every candidate was problematic; using least-bad cut");
                fallback
            }
            (None, None) => {
                tracing::info!(id = %self.id, "no candidate split two ways; node becomes a leaf");
                return None;
            }
        };
        tracing::info!(id = %self.id, cut = ?pick.plane, score = pick.score, "best cut");
        self.children = pick.children;
        Some(pick.plane)
    }

    /// Debug-level summary of the node, logged when it is processed.
    pub fn log_statistics(&self) {
        tracing::debug!(
            id = %self.id,
            depth = self.depth,
            tol_rel = self.tol_rel,
            tol_abs = self.tol_abs,
            polytopes = self.union.member_count(),
            volume = self.volume,
            hull_volume = self.hull_volume,
            "node statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Hyperplane as H;
    use nalgebra::vector;

    fn box_part(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<H> {
        vec![
            H::new(vector![-1.0, 0.0], x0),
            H::new(vector![1.0, 0.0], -x1),
            H::new(vector![0.0, -1.0], y0),
            H::new(vector![0.0, 1.0], -y1),
        ]
    }

    fn square_node(cfg: &NodeCfg, ids: &mut IdGen) -> Node {
        let union = PolytopeUnion::from_convex_parts(&[box_part(0.0, 0.0, 1.0, 1.0)]);
        let hull = union.hull_of().unwrap();
        Node::root(union, hull, cfg, 1, ids).unwrap()
    }

    #[test]
    fn root_validates_parameters() {
        let union = PolytopeUnion::from_convex_parts(&[box_part(0.0, 0.0, 1.0, 1.0)]);
        let hull = union.hull_of().unwrap();
        let mut ids = IdGen::default();

        let bad_tol = NodeCfg {
            tol_rel: 1.5,
            ..NodeCfg::default()
        };
        assert!(matches!(
            Node::root(union.clone(), hull.clone(), &bad_tol, 1, &mut ids),
            Err(AcdError::InvalidParameter { name: "tol_rel", .. })
        ));

        let bad_depth = NodeCfg {
            max_depth: 0,
            ..NodeCfg::default()
        };
        assert!(matches!(
            Node::root(union.clone(), hull.clone(), &bad_depth, 1, &mut ids),
            Err(AcdError::InvalidParameter { name: "max_depth", .. })
        ));

        let bad_abs = NodeCfg {
            tol_abs: Some(-1.0),
            ..NodeCfg::default()
        };
        assert!(matches!(
            Node::root(union, hull, &bad_abs, 1, &mut ids),
            Err(AcdError::InvalidParameter { name: "tol_abs", .. })
        ));
    }

    #[test]
    fn convex_region_is_terminal() {
        let mut ids = IdGen::default();
        let node = square_node(&NodeCfg::default(), &mut ids);
        assert!((node.volume - 1.0).abs() < 1e-9);
        assert!(node.relative_error().abs() < 1e-9);
        assert!(node.terminal());
        assert_eq!(node.depth, 0);
        assert!(node.parent.is_none());
    }

    #[test]
    fn tol_abs_defaults_to_share_of_root_volume() {
        let mut ids = IdGen::default();
        let node = square_node(
            &NodeCfg {
                tol_rel: 0.1,
                ..NodeCfg::default()
            },
            &mut ids,
        );
        assert!((node.tol_abs - 0.1 * node.volume).abs() < 1e-12);
    }

    #[test]
    fn apply_cut_splits_and_inherits() {
        let mut ids = IdGen::default();
        let node = square_node(&NodeCfg::default(), &mut ids);
        let cut = H::new(vector![1.0, 0.0], -0.5);
        let children = node.apply_cut(&cut, &mut ids);
        assert_eq!(children.len(), 2);
        let vol: f64 = children.iter().map(|c| c.volume).sum();
        assert!((vol - node.volume).abs() < 1e-9);
        for c in &children {
            assert_eq!(c.depth, 1);
            assert_eq!(c.parent, Some(node.id));
            assert_eq!(c.tol_abs, node.tol_abs);
            assert_ne!(c.seed, node.seed);
            assert!(c.hull_volume >= c.volume - 1e-9);
        }
        assert_ne!(children[0].id, children[1].id);
    }

    #[test]
    fn apply_cut_misses_region() {
        let mut ids = IdGen::default();
        let node = square_node(&NodeCfg::default(), &mut ids);
        let cut = H::new(vector![1.0, 0.0], -5.0); // x = 5, outside
        let children = node.apply_cut(&cut, &mut ids);
        assert_eq!(children.len(), 1); // only the x <= 5 side survives
    }

    #[test]
    fn best_cut_rejects_degenerate_candidates_and_falls_back() {
        let mut ids = IdGen::default();
        let mut node = square_node(&NodeCfg::default(), &mut ids);
        // Only a missing cut: no candidate splits two ways -> forced leaf.
        let miss = CandidateCut {
            plane: H::new(vector![1.0, 0.0], -5.0),
            score: 1.0,
            active: vec![],
        };
        assert!(node.best_cut(vec![miss], &mut ids).is_none());
        assert!(node.children.is_empty());

        // A degenerate candidate followed by a real one: the real one wins.
        let miss = CandidateCut {
            plane: H::new(vector![1.0, 0.0], -5.0),
            score: 1.0,
            active: vec![],
        };
        let real = CandidateCut {
            plane: H::new(vector![1.0, 0.0], -0.5),
            score: 0.5,
            active: vec![],
        };
        let applied = node.best_cut(vec![miss, real], &mut ids).unwrap();
        assert!((applied.b - -0.5).abs() < 1e-12);
        assert_eq!(node.children.len(), 2);
    }

    #[test]
    fn cluster_split_partitions_indices() {
        let union = PolytopeUnion::from_convex_parts(&[
            box_part(0.0, 0.0, 1.0, 1.0),
            box_part(1.0, 1.0, 2.0, 2.0),
        ]);
        let hull = union.hull_of().unwrap();
        let mut ids = IdGen::default();
        let node = Node::root(union, hull, &NodeCfg::default(), 1, &mut ids).unwrap();
        assert!(!node.terminal());
        let clusters = node.find_clusters();
        assert_eq!(clusters, vec![vec![0], vec![1]]);
        let children = node.clusters_to_nodes(&clusters, &mut ids);
        assert_eq!(children.len(), 2);
        for c in &children {
            assert!((c.volume - 1.0).abs() < 1e-9);
            assert!(c.relative_error().abs() < 1e-9);
        }
    }
}
