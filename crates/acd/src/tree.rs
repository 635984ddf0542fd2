//! Tree construction: drive pending nodes to completion and assemble the
//! flat report map.
//!
//! The builder maintains a work stack seeded with the root (order is
//! irrelevant for correctness: siblings are independent and children always
//! sit one level deeper, so no node is ever revisited). Terminal nodes are
//! recorded as leaves; non-terminal nodes first try a cluster split, which
//! is free and lossless, and only then the configured cut strategy. The
//! id-keyed report map is the sole persisted artifact.

use std::collections::BTreeMap;

use crate::cuts::CutStrategy;
use crate::node::{AcdError, IdGen, Node, NodeCfg, NodeId};
use crate::region::PolytopeUnion;

/// Parameters of one decomposition run.
#[derive(Clone, Copy, Debug)]
pub struct AcdParams {
    /// Maximal relative volume error tolerated in any leaf, in [0, 1].
    pub max_vol_error: f64,
    /// Absolute error tolerance; derived from the root volume when unset.
    pub tol_abs: Option<f64>,
    /// Maximum tree depth, > 0.
    pub max_depth: u32,
    /// Number of cut candidates tried per node, > 0.
    pub nr_cuts: usize,
    /// Root seed for the stochastic cut search.
    pub seed: u64,
}

impl Default for AcdParams {
    fn default() -> Self {
        Self {
            max_vol_error: 0.05,
            tol_abs: None,
            max_depth: 10,
            nr_cuts: 10,
            seed: 1,
        }
    }
}

/// Per-node record in the output mapping.
#[derive(Clone, Debug)]
pub struct NodeReport {
    pub depth: u32,
    pub volume: f64,
    pub hull_volume: f64,
    pub total_error: f64,
    pub relative_error: f64,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// The decomposition result: every node (leaf and internal), keyed by id.
pub type AcdTree = BTreeMap<NodeId, NodeReport>;

/// Decompose `union` (with `hull` the region of its convex hull) into a tree
/// of approximately convex pieces.
pub fn build_acd(
    union: PolytopeUnion,
    hull: PolytopeUnion,
    strategy: &dyn CutStrategy,
    params: &AcdParams,
) -> Result<AcdTree, AcdError> {
    if params.nr_cuts == 0 {
        return Err(AcdError::InvalidParameter {
            name: "nr_cuts",
            value: 0.0,
        });
    }
    let cfg = NodeCfg {
        tol_rel: params.max_vol_error,
        tol_abs: params.tol_abs,
        max_depth: params.max_depth,
    };
    let mut ids = IdGen::default();
    let root = Node::root(union, hull, &cfg, params.seed, &mut ids)?;
    tracing::info!(
        strategy = strategy.name(),
        max_vol_error = params.max_vol_error,
        max_depth = params.max_depth,
        nr_cuts = params.nr_cuts,
        seed = params.seed,
        "building decomposition tree"
    );

    let mut tree = AcdTree::new();
    let mut pending = vec![root];
    while let Some(mut node) = pending.pop() {
        node.log_statistics();
        if !node.terminal() {
            let clusters = node.find_clusters();
            if clusters.len() > 1 {
                tracing::info!(id = %node.id, count = clusters.len(),
                    "splitting along disconnected clusters");
                node.children = node.clusters_to_nodes(&clusters, &mut ids);
            } else {
                let cuts = node.find_cuts(strategy, params.nr_cuts);
                if node.best_cut(cuts, &mut ids).is_none() {
                    tracing::info!(id = %node.id, strategy = strategy.name(),
                        "no usable cut; node recorded as leaf");
                }
            }
        }
        let children = std::mem::take(&mut node.children);
        tree.insert(node.id, report(&node, &children));
        pending.extend(children);
    }
    tracing::info!(nodes = tree.len(), "decomposition finished");
    Ok(tree)
}

fn report(node: &Node, children: &[Node]) -> NodeReport {
    NodeReport {
        depth: node.depth,
        volume: node.volume,
        hull_volume: node.hull_volume,
        total_error: node.total_error(),
        relative_error: node.relative_error(),
        parent: node.parent,
        children: children.iter().map(|c| c.id).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cuts::{FacetCuts, SweepCuts};
    use crate::geom::Hyperplane as H;
    use nalgebra::vector;
    use proptest::prelude::*;

    fn box_part(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<H> {
        vec![
            H::new(vector![-1.0, 0.0], x0),
            H::new(vector![1.0, 0.0], -x1),
            H::new(vector![0.0, -1.0], y0),
            H::new(vector![0.0, 1.0], -y1),
        ]
    }

    /// Square [0,2]² plus the triangle (1,2)-(2,2)-(2,3); the hull closes a
    /// notch over the top edge left of the triangle.
    fn notched() -> PolytopeUnion {
        let square = box_part(0.0, 0.0, 2.0, 2.0);
        let triangle = vec![
            H::new(vector![0.0, -1.0], 2.0),  // y >= 2
            H::new(vector![1.0, 0.0], -2.0),  // x <= 2
            H::new(vector![-1.0, 1.0], -1.0), // y <= x + 1
        ];
        PolytopeUnion::from_convex_parts(&[square, triangle])
    }

    fn check_invariants(tree: &AcdTree, max_depth: u32) {
        for (id, report) in tree {
            assert!(
                report.hull_volume >= report.volume - 1e-9,
                "node {id}: hull {} < volume {}",
                report.hull_volume,
                report.volume
            );
            assert!(report.depth <= max_depth);
            match report.parent {
                None => assert_eq!(report.depth, 0),
                Some(p) => assert_eq!(tree[&p].depth + 1, report.depth),
            }
            for child in &report.children {
                assert_eq!(tree[child].parent, Some(*id));
            }
        }
    }

    #[test]
    fn corner_touching_squares_split_into_clusters() {
        let union = PolytopeUnion::from_convex_parts(&[
            box_part(0.0, 0.0, 1.0, 1.0),
            box_part(1.0, 1.0, 2.0, 2.0),
        ]);
        let hull = union.hull_of().unwrap();
        let params = AcdParams::default();
        let tree = build_acd(union, hull, &FacetCuts, &params).unwrap();

        assert_eq!(tree.len(), 3);
        let root = &tree[&crate::node::NodeId(0)];
        assert_eq!(root.children.len(), 2);
        assert!(root.relative_error > 0.05);
        for child in &root.children {
            let leaf = &tree[child];
            assert_eq!(leaf.depth, 1);
            assert!(leaf.children.is_empty());
            assert!(leaf.relative_error.abs() < 1e-9);
            assert!((leaf.volume - 1.0).abs() < 1e-9);
        }
        check_invariants(&tree, params.max_depth);
    }

    #[test]
    fn notch_is_resolved_by_one_facet_cut() {
        let union = notched();
        let hull = union.hull_of().unwrap();
        let params = AcdParams::default();
        let tree = build_acd(union, hull, &FacetCuts, &params).unwrap();

        let root = &tree[&crate::node::NodeId(0)];
        assert!(root.relative_error > 0.05);
        assert_eq!(root.children.len(), 2, "exactly one cut at the root");
        assert_eq!(tree.len(), 3);
        let child_hulls: f64 = root.children.iter().map(|c| tree[c].hull_volume).sum();
        assert!(child_hulls <= 1.005 * root.hull_volume + 1e-9);
        for child in &root.children {
            assert!(tree[child].relative_error <= 0.05 + 1e-5);
        }
        check_invariants(&tree, params.max_depth);
    }

    #[test]
    fn convex_input_is_a_single_node() {
        let union = PolytopeUnion::from_convex_parts(&[box_part(0.0, 0.0, 3.0, 1.0)]);
        let hull = union.hull_of().unwrap();
        let sweep = SweepCuts::default();
        for strategy in [&FacetCuts as &dyn CutStrategy, &sweep] {
            let tree = build_acd(
                union.clone(),
                hull.clone(),
                strategy,
                &AcdParams::default(),
            )
            .unwrap();
            assert_eq!(tree.len(), 1);
            let root = tree.values().next().unwrap();
            assert!(root.children.is_empty());
            assert!(root.relative_error.abs() < 1e-9);
        }
    }

    #[test]
    fn facet_and_sweep_both_converge() {
        let union = notched();
        let hull = union.hull_of().unwrap();
        let params = AcdParams {
            seed: 3,
            ..AcdParams::default()
        };
        let sweep = SweepCuts {
            sweeps_per_orthant: 40,
        };
        for strategy in [&FacetCuts as &dyn CutStrategy, &sweep] {
            let tree = build_acd(union.clone(), hull.clone(), strategy, &params).unwrap();
            check_invariants(&tree, params.max_depth);
            let tol_abs = params.max_vol_error * tree[&crate::node::NodeId(0)].volume;
            for report in tree.values() {
                if report.children.is_empty() && report.depth < params.max_depth {
                    assert!(
                        report.relative_error <= params.max_vol_error + 1e-5
                            || report.total_error <= tol_abs + 1e-5,
                        "leaf above tolerance: {report:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn identical_runs_build_identical_trees() {
        let union = notched();
        let hull = union.hull_of().unwrap();
        let params = AcdParams {
            seed: 42,
            ..AcdParams::default()
        };
        let sweep = SweepCuts {
            sweeps_per_orthant: 30,
        };
        let a = build_acd(union.clone(), hull.clone(), &sweep, &params).unwrap();
        let b = build_acd(union, hull, &sweep, &params).unwrap();
        assert_eq!(a.len(), b.len());
        for ((ida, ra), (idb, rb)) in a.iter().zip(b.iter()) {
            assert_eq!(ida, idb);
            assert_eq!(ra.children, rb.children);
            assert!((ra.volume - rb.volume).abs() < 1e-9);
            assert!((ra.hull_volume - rb.hull_volume).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_nr_cuts_is_rejected() {
        let union = notched();
        let hull = union.hull_of().unwrap();
        let params = AcdParams {
            nr_cuts: 0,
            ..AcdParams::default()
        };
        assert!(matches!(
            build_acd(union, hull, &FacetCuts, &params),
            Err(AcdError::InvalidParameter { name: "nr_cuts", .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Random small box unions keep every tree invariant.
        #[test]
        fn random_box_unions_keep_invariants(
            boxes in prop::collection::vec((0u8..6, 0u8..6, 1u8..5, 1u8..5), 1..4)
        ) {
            let parts: Vec<Vec<H>> = boxes
                .iter()
                .map(|&(x0, y0, w, h)| {
                    box_part(x0 as f64, y0 as f64, (x0 + w) as f64, (y0 + h) as f64)
                })
                .collect();
            let union = PolytopeUnion::from_convex_parts(&parts);
            prop_assume!(!union.events().is_empty());
            let hull = match union.hull_of() {
                Some(h) => h,
                None => return Ok(()),
            };
            let params = AcdParams {
                max_depth: 6,
                nr_cuts: 4,
                ..AcdParams::default()
            };
            let tree = build_acd(union, hull, &FacetCuts, &params).unwrap();
            check_invariants(&tree, params.max_depth);
            prop_assert!(tree.values().filter(|r| r.parent.is_none()).count() == 1);
        }
    }
}
