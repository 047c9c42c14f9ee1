use anyhow::ensure;
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{Context, Fitted, SpeArguments};
use crate::callbacks::DistanceCallback;
use crate::error::Result;
use crate::neighbors::Neighbors;

const SPE_SEED: u64 = 42;

/// Where the partner of a randomly drawn point comes from.
#[derive(Clone, Copy)]
enum Pairing<'a> {
    Global,
    Local(&'a Neighbors),
}

/// Stochastic proximity embedding: random pairwise updates pulling the
/// embedded distance of each pair towards its input distance, with a learning
/// rate decaying over the cycles.
fn proximity_updates(
    n: usize,
    distance: &dyn DistanceCallback,
    pairing: Pairing<'_>,
    args: &SpeArguments,
) -> anyhow::Result<Array2<f64>> {
    ensure!(n >= 2, "At least two points are needed, got {}", n);
    let target = args.target_dimension;
    let mut rng = ChaCha8Rng::seed_from_u64(SPE_SEED);
    let mut embedding = Array2::from_shape_fn((n, target), |_| rng.random::<f64>());

    let mut learning_rate = 1.0;
    let decay = learning_rate / args.max_iteration as f64;
    for _ in 0..args.max_iteration {
        for _ in 0..args.updates {
            let i = rng.random_range(0..n);
            let j = match pairing {
                Pairing::Global => {
                    // uniform over the other points
                    let j = rng.random_range(0..n - 1);
                    if j >= i { j + 1 } else { j }
                }
                Pairing::Local(neighbors) => {
                    let local = &neighbors[i];
                    ensure!(!local.is_empty(), "Point {} has no neighbors", i);
                    local[rng.random_range(0..local.len())]
                }
            };

            let input = distance.distance(i, j);
            let difference: Array1<f64> = &embedding.row(i) - &embedding.row(j);
            let embedded = difference.dot(&difference).sqrt();
            let step = learning_rate * 0.5 * (input - embedded) / (embedded + args.tolerance);

            let mut row = embedding.row_mut(i);
            row.scaled_add(step, &difference);
            let mut row = embedding.row_mut(j);
            row.scaled_add(-step, &difference);
        }
        learning_rate -= decay;
    }
    Ok(embedding)
}

pub(super) fn stochastic_proximity(ctx: &Context<'_>, args: SpeArguments) -> Result<Fitted> {
    let distance = ctx.distance()?;
    let pairing = if args.global {
        Pairing::Global
    } else {
        Pairing::Local(ctx.neighbors()?)
    };
    let embedding = proximity_updates(ctx.n_points(), distance, pairing, &args)
        .map_err(|e| ctx.embedding_failure(e))?;
    // no spectral diagnostics for an iterative method
    Ok(Fitted::new(embedding, Array1::zeros(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::EuclideanDistance;

    fn arguments() -> SpeArguments {
        SpeArguments {
            target_dimension: 2,
            global: true,
            tolerance: 1e-9,
            updates: 200,
            max_iteration: 200,
            local: None,
        }
    }

    fn stress(embedding: &Array2<f64>, distance: &dyn DistanceCallback) -> f64 {
        let n = embedding.nrows();
        let mut total = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let difference = &embedding.row(i) - &embedding.row(j);
                let embedded = difference.dot(&difference).sqrt();
                total += (embedded - distance.distance(i, j)).powi(2);
            }
        }
        total
    }

    #[test]
    fn test_recovers_planar_distances() {
        let data = Array2::from_shape_fn((12, 2), |(i, j)| {
            if j == 0 {
                (i % 4) as f64
            } else {
                (i / 4) as f64
            }
        });
        let distance = EuclideanDistance::new(data.view());

        let start = {
            let mut rng = ChaCha8Rng::seed_from_u64(SPE_SEED);
            Array2::from_shape_fn((12, 2), |_| rng.random::<f64>())
        };
        let embedding = proximity_updates(12, &distance, Pairing::Global, &arguments()).unwrap();
        assert_eq!(embedding.dim(), (12, 2));
        assert!(stress(&embedding, &distance) < 0.1 * stress(&start, &distance));
    }

    #[test]
    fn test_local_pairs_and_reproducibility() {
        let data = Array2::from_shape_fn((8, 2), |(i, j)| (i * (j + 1)) as f64);
        let distance = EuclideanDistance::new(data.view());
        let neighbors: Neighbors = (0..8).map(|i| vec![if i == 0 { 1 } else { i - 1 }]).collect();

        let pairing = Pairing::Local(&neighbors);
        let first = proximity_updates(8, &distance, pairing, &arguments()).unwrap();
        let second = proximity_updates(8, &distance, pairing, &arguments()).unwrap();
        assert_eq!(first, second);
    }
}
