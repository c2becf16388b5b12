use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MiniBatchParams {
    pub k: usize,
    pub seed: u64,
    pub restarts: usize,
    pub batch_size: usize,
    pub max_iterations: usize,
}

impl MiniBatchParams {
    pub fn new(k: usize, n_samples: usize) -> Self {
        Self {
            k,
            seed: 42,
            restarts: 3,
            batch_size: n_samples.clamp(1, 100),
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    pub centroids: Vec<Vec<f64>>,
    pub assignments: Vec<usize>,
    pub inertia: f64,
}

impl KMeans {
    /// Seeded mini-batch k-means: k-means++ seeding, then per-sample centre
    /// updates with a learning rate of `1 / hits`. The best of
    /// `params.restarts` runs by inertia is kept; the same seed and data
    /// always give the same result.
    pub fn fit(data: &[Vec<f64>], params: MiniBatchParams) -> Self {
        if data.is_empty() || params.k == 0 {
            return Self { centroids: vec![], assignments: vec![], inertia: 0.0 };
        }
        let k = params.k.min(data.len());
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut best: Option<KMeans> = None;
        for _ in 0..params.restarts.max(1) {
            let mut centroids = seed_plus_plus(data, k, &mut rng);
            refine(data, &mut centroids, &params, &mut rng);
            let (assignments, inertia) = assign(data, &centroids);
            if best.as_ref().map_or(true, |b| inertia < b.inertia) {
                best = Some(KMeans { centroids, assignments, inertia });
            }
        }
        best.unwrap_or(KMeans { centroids: vec![], assignments: vec![], inertia: 0.0 })
    }
}

fn seed_plus_plus(data: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = vec![data[rng.random_range(0..data.len())].clone()];
    let mut dist: Vec<f64> = data.iter().map(|p| distance_sq(p, &centroids[0])).collect();
    while centroids.len() < k {
        let total: f64 = dist.iter().sum();
        let pick = if total <= 0.0 {
            // every point sits on a centre already
            rng.random_range(0..data.len())
        } else {
            let mut target = rng.random::<f64>() * total;
            let mut chosen = data.len() - 1;
            for (i, d) in dist.iter().enumerate() {
                if target < *d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        };
        let centre = data[pick].clone();
        for (d, p) in dist.iter_mut().zip(data) {
            *d = d.min(distance_sq(p, &centre));
        }
        centroids.push(centre);
    }
    centroids
}

fn refine(data: &[Vec<f64>], centroids: &mut [Vec<f64>], params: &MiniBatchParams, rng: &mut StdRng) {
    let batch_size = params.batch_size.clamp(1, data.len());
    let mut hits = vec![0usize; centroids.len()];
    for _ in 0..params.max_iterations {
        let mut shift = 0.0;
        for i in index::sample(rng, data.len(), batch_size) {
            let point = &data[i];
            let c = nearest(point, centroids).0;
            hits[c] += 1;
            let lr = 1.0 / hits[c] as f64;
            for (v, x) in centroids[c].iter_mut().zip(point) {
                let next = (1.0 - lr) * *v + lr * x;
                shift += (next - *v) * (next - *v);
                *v = next;
            }
        }
        if shift < 1e-12 {
            break;
        }
    }
}

fn assign(data: &[Vec<f64>], centroids: &[Vec<f64>]) -> (Vec<usize>, f64) {
    let mut inertia = 0.0;
    let labels = data
        .iter()
        .map(|p| {
            let (c, d) = nearest(p, centroids);
            inertia += d;
            c
        })
        .collect();
    (labels, inertia)
}

/// Index of the closest centre and its squared distance; ties go to the lower index.
fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::MAX);
    for (j, c) in centroids.iter().enumerate() {
        let d = distance_sq(point, c);
        if d < best.1 {
            best = (j, d);
        }
    }
    best
}

fn distance_sq(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}
