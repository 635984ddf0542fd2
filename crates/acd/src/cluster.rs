//! Connected components of the polytope incidence graph.
//!
//! Polytopes are linked wherever some candidate event records their tangent
//! cones sharing a direction (see `region::Event::links`). Components of
//! that graph are clusters; more than one cluster means the region is
//! disconnected, or connected only through a point contact, and can be split
//! without losing any volume.

use crate::region::PolytopeUnion;

/// Cluster the region's polytopes by local incidence.
///
/// Polytopes incident to no candidate event (emptied or lower-dimensional
/// after a restriction) are left out of the universe entirely; they would
/// only produce degenerate children.
pub fn find_clusters(region: &PolytopeUnion) -> Vec<Vec<usize>> {
    let n = region.member_count();
    let mut dsu = Dsu::new(n);
    let mut present = vec![false; n];
    for event in region.candidates() {
        for &p in &event.incident_polytopes {
            present[p] = true;
        }
        for &(i, j) in &event.links {
            dsu.union(i, j);
        }
    }
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut slot = vec![usize::MAX; n];
    for p in 0..n {
        if !present[p] {
            continue;
        }
        let root = dsu.find(p);
        if slot[root] == usize::MAX {
            slot[root] = clusters.len();
            clusters.push(Vec::new());
        }
        clusters[slot[root]].push(p);
    }
    // Members ascend by construction; order clusters by first member for a
    // reproducible split order.
    clusters.sort_by_key(|c| c[0]);
    clusters
}

/// Minimal union–find with path halving.
struct Dsu {
    parent: Vec<usize>,
}

impl Dsu {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}
