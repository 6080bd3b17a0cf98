//! Exact k-nearest-neighbor search over a fixed point set.
//!
//! A k-d tree built once over the points; each query descends to the
//! nearest leaf and only visits subtrees whose splitting plane is closer than
//! the current k-th best distance. Distances are squared Euclidean.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

const LEAF_SIZE: usize = 16;

/// Ordered by distance, then index, so equal distances resolve to the lower index.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    distance: f64,
    index: usize,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    /// Range into `order`.
    Leaf { start: usize, end: usize },
    /// Left subtree holds coordinates `<= value` on `axis`, right holds `>= value`.
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

pub struct KdTree<'a> {
    points: &'a [&'a [f64]],
    order: Vec<usize>,
    nodes: Vec<Node>,
}

impl<'a> KdTree<'a> {
    pub fn build(points: &'a [&'a [f64]]) -> Self {
        let mut tree = Self {
            points,
            order: (0..points.len()).collect(),
            nodes: Vec::new(),
        };
        if !points.is_empty() {
            tree.build_node(0, points.len());
        }
        tree
    }

    fn build_node(&mut self, start: usize, end: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { start, end });
        if end - start <= LEAF_SIZE {
            return id;
        }
        let Some(axis) = self.widest_axis(start, end) else {
            return id;
        };

        let points = self.points;
        let mid = start + (end - start) / 2;
        self.order[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
            points[a][axis].total_cmp(&points[b][axis])
        });
        let value = points[self.order[mid]][axis];

        let left = self.build_node(start, mid);
        let right = self.build_node(mid, end);
        self.nodes[id] = Node::Split {
            axis,
            value,
            left,
            right,
        };
        id
    }

    /// Axis with the largest spread over `order[start..end]`; `None` when every point coincides.
    fn widest_axis(&self, start: usize, end: usize) -> Option<usize> {
        let dims = self.points[self.order[start]].len();
        let mut best = None;
        let mut best_spread = 0.0;
        for axis in 0..dims {
            let (lo, hi) = self.order[start..end]
                .iter()
                .map(|&i| self.points[i][axis])
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
            if hi - lo > best_spread {
                best_spread = hi - lo;
                best = Some(axis);
            }
        }
        best
    }

    /// Indices of the `k` points closest to `points[i]`, excluding `i`, nearest first.
    pub fn nearest(&self, i: usize, k: usize) -> Vec<usize> {
        let mut heap = BinaryHeap::with_capacity(k + 1);
        if k > 0 && !self.nodes.is_empty() {
            self.search(0, i, k, &mut heap);
        }
        heap.into_sorted_vec().into_iter().map(|c| c.index).collect()
    }

    fn search(&self, node: usize, query: usize, k: usize, heap: &mut BinaryHeap<Candidate>) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for &j in &self.order[start..end] {
                    if j == query {
                        continue;
                    }
                    let candidate = Candidate {
                        distance: squared_distance(self.points[query], self.points[j]),
                        index: j,
                    };
                    if heap.len() < k {
                        heap.push(candidate);
                    } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                        heap.pop();
                        heap.push(candidate);
                    }
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = self.points[query][axis] - value;
                let (near, far) = if diff < 0.0 {
                    (left, right)
                } else {
                    (right, left)
                };
                self.search(near, query, k, heap);
                let plane = diff * diff;
                if heap.len() < k || heap.peek().is_some_and(|worst| plane <= worst.distance) {
                    self.search(far, query, k, heap);
                }
            }
        }
    }
}

pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
