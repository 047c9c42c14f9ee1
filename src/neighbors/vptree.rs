use std::collections::BinaryHeap;

use anyhow::bail;
use rayon::prelude::*;

use super::{check_request, Candidate, LocalNeighbors, NeighborFinder, NeighborMetric, Neighbors};

/// Vantage-point tree search. Needs only the metric (no coordinates), so it
/// works for both distance and kernel callbacks. Exact as long as the metric
/// satisfies the triangle inequality.
#[derive(Debug, Clone, Copy, Default)]
pub struct VpTree;

struct Node {
    point: usize,
    /// Points in `inside` are at most this far from `point`, points in
    /// `outside` at least this far.
    radius: f64,
    inside: Option<Box<Node>>,
    outside: Option<Box<Node>>,
}

fn build(items: &mut [usize], metric: &NeighborMetric<'_>) -> anyhow::Result<Option<Box<Node>>> {
    let Some((&mut vantage, rest)) = items.split_first_mut() else {
        return Ok(None);
    };
    if rest.is_empty() {
        return Ok(Some(Box::new(Node {
            point: vantage,
            radius: 0.0,
            inside: None,
            outside: None,
        })));
    }

    let mut by_distance = Vec::with_capacity(rest.len());
    for &item in rest.iter() {
        let distance = metric.distance(vantage, item);
        if distance.is_nan() {
            bail!("Distance between points {} and {} is NaN", vantage, item);
        }
        by_distance.push(Candidate {
            distance,
            index: item,
        });
    }
    by_distance.sort_unstable();

    let median = by_distance.len() / 2;
    let radius = by_distance[median].distance;
    for (slot, candidate) in rest.iter_mut().zip(by_distance.iter()) {
        *slot = candidate.index;
    }

    let (inside, outside) = rest.split_at_mut(median);
    Ok(Some(Box::new(Node {
        point: vantage,
        radius,
        inside: build(inside, metric)?,
        outside: build(outside, metric)?,
    })))
}

struct Search<'m, 'a> {
    metric: &'m NeighborMetric<'a>,
    query: usize,
    k: usize,
    heap: BinaryHeap<Candidate>,
    tau: f64,
}

impl Search<'_, '_> {
    fn visit(&mut self, node: &Node) {
        let distance = self.metric.distance(self.query, node.point);

        if node.point != self.query {
            let candidate = Candidate {
                distance,
                index: node.point,
            };
            if self.heap.len() < self.k {
                self.heap.push(candidate);
            } else if self.heap.peek().is_some_and(|worst| candidate < *worst) {
                self.heap.pop();
                self.heap.push(candidate);
            }
            if self.heap.len() == self.k {
                self.tau = self.heap.peek().map_or(f64::INFINITY, |c| c.distance);
            }
        }

        if distance < node.radius {
            if let Some(inside) = &node.inside {
                self.visit(inside);
            }
            if distance + self.tau >= node.radius {
                if let Some(outside) = &node.outside {
                    self.visit(outside);
                }
            }
        } else {
            if let Some(outside) = &node.outside {
                self.visit(outside);
            }
            if distance - self.tau <= node.radius {
                if let Some(inside) = &node.inside {
                    self.visit(inside);
                }
            }
        }
    }
}

impl NeighborFinder for VpTree {
    fn find_neighbors(
        &self,
        n_points: usize,
        k: usize,
        metric: &NeighborMetric<'_>,
    ) -> anyhow::Result<Neighbors> {
        check_request(n_points, k)?;

        let mut items: Vec<usize> = (0..n_points).collect();
        let Some(root) = build(&mut items, metric)? else {
            return Ok(Vec::new());
        };

        Ok((0..n_points)
            .into_par_iter()
            .map(|query| {
                let mut search = Search {
                    metric,
                    query,
                    k,
                    heap: BinaryHeap::with_capacity(k + 1),
                    tau: f64::INFINITY,
                };
                search.visit(&root);
                search
                    .heap
                    .into_sorted_vec()
                    .into_iter()
                    .map(|c| c.index)
                    .collect::<LocalNeighbors>()
            })
            .collect())
    }
}
