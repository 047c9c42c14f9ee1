use anyhow::ensure;
use ndarray::{Array2, Axis};
use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use rayon::prelude::*;

use super::mds::{classical_scaling, landmark_scaling, landmarks};
use super::{Context, Fitted, SpectralArguments};
use crate::callbacks::DistanceCallback;
use crate::error::Result;
use crate::neighbors::Neighbors;

/// Undirected neighbor graph weighted by distance.
fn neighbor_graph(
    n: usize,
    neighbors: &Neighbors,
    distance: &dyn DistanceCallback,
) -> UnGraph<(), f64> {
    let edges: usize = neighbors.iter().map(Vec::len).sum();
    let mut graph = UnGraph::with_capacity(n, edges);
    for _ in 0..n {
        graph.add_node(());
    }
    for (i, local) in neighbors.iter().enumerate() {
        for &j in local {
            graph.add_edge(NodeIndex::new(i), NodeIndex::new(j), distance.distance(i, j));
        }
    }
    graph
}

/// Shortest-path distances from every source to every node, one row per
/// source.
fn geodesic_distances(graph: &UnGraph<(), f64>, sources: &[usize]) -> anyhow::Result<Array2<f64>> {
    let n = graph.node_count();
    let mut geodesics = Array2::zeros((sources.len(), n));
    geodesics
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(sources.par_iter())
        .try_for_each(|(mut row, &source)| -> anyhow::Result<()> {
            let reached = dijkstra(graph, NodeIndex::new(source), None, |edge| *edge.weight());
            ensure!(
                reached.len() == n,
                "Neighbor graph is disconnected: point {} reaches {} of {} points, raise the number of neighbors",
                source,
                reached.len(),
                n
            );
            for (node, cost) in reached {
                row[node.index()] = cost;
            }
            Ok(())
        })?;
    Ok(geodesics)
}

fn graph_of(ctx: &Context<'_>) -> Result<UnGraph<(), f64>> {
    let distance = ctx.distance()?;
    Ok(neighbor_graph(ctx.n_points(), ctx.neighbors()?, distance))
}

pub(super) fn isomap(ctx: &Context<'_>, spectral: SpectralArguments) -> Result<Fitted> {
    let graph = graph_of(ctx)?;
    let all: Vec<usize> = (0..ctx.n_points()).collect();
    let geodesics = geodesic_distances(&graph, &all).map_err(|e| ctx.embedding_failure(e))?;
    classical_scaling(ctx, geodesics.mapv(|d| d * d), spectral.target_dimension)
}

pub(super) fn landmark_isomap(
    ctx: &Context<'_>,
    spectral: SpectralArguments,
    ratio: f64,
) -> Result<Fitted> {
    let graph = graph_of(ctx)?;
    let chosen = landmarks(ctx.n_points(), ratio, spectral.target_dimension);
    let geodesics = geodesic_distances(&graph, &chosen).map_err(|e| ctx.embedding_failure(e))?;
    landmark_scaling(ctx, geodesics, &chosen, spectral.target_dimension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::distance_fn;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_geodesics_follow_the_chain() {
        let distance = distance_fn(|a: usize, b: usize| a.abs_diff(b) as f64 * 2.0);
        // 0 - 1 - 2 - 3, only direct neighbors linked
        let neighbors = vec![vec![1], vec![0], vec![1], vec![2]];
        let graph = neighbor_graph(4, &neighbors, &distance);

        let geodesics = geodesic_distances(&graph, &[0, 3]).unwrap();
        assert_abs_diff_eq!(geodesics[[0, 3]], 6.0);
        assert_abs_diff_eq!(geodesics[[1, 0]], 6.0);
        assert_abs_diff_eq!(geodesics[[1, 1]], 4.0);
        assert_abs_diff_eq!(geodesics[[0, 0]], 0.0);
    }

    #[test]
    fn test_disconnected_graph_is_an_error() {
        let distance = distance_fn(|_: usize, _: usize| 1.0);
        let neighbors = vec![vec![1], vec![0], vec![3], vec![2]];
        let graph = neighbor_graph(4, &neighbors, &distance);
        let error = geodesic_distances(&graph, &[0]).unwrap_err();
        assert!(error.to_string().contains("disconnected"));
    }
}
