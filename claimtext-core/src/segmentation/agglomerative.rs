//! Average-linkage agglomerative clustering over cosine distance
//!
//! No target cluster count: the two closest clusters merge until the smallest
//! inter-cluster distance reaches the threshold. Cluster distances are kept
//! up to date with the Lance-Williams update for average linkage (UPGMA).

/// Cosine distance `1 - cos(a, b)`. A zero vector is maximally distant from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// Assign a cluster label to every vector. Labels are dense and numbered in
/// order of each cluster's first member.
pub fn cluster_labels(vectors: &[Vec<f32>], distance_threshold: f32) -> Vec<usize> {
    let n = vectors.len();
    if n == 0 {
        return Vec::new();
    }

    let mut distances = vec![vec![0.0f32; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = cosine_distance(&vectors[i], &vectors[j]);
            distances[i][j] = d;
            distances[j][i] = d;
        }
    }

    // members[i] is empty once cluster i has been merged into another
    let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();

    loop {
        let mut closest: Option<(usize, usize, f32)> = None;
        for i in 0..n {
            if members[i].is_empty() {
                continue;
            }
            for j in (i + 1)..n {
                if members[j].is_empty() {
                    continue;
                }
                let d = distances[i][j];
                if closest.map_or(true, |(_, _, best)| d < best) {
                    closest = Some((i, j, d));
                }
            }
        }

        let Some((a, b, d)) = closest else { break };
        if d >= distance_threshold {
            break;
        }

        let size_a = members[a].len() as f32;
        let size_b = members[b].len() as f32;
        for k in 0..n {
            if k == a || k == b || members[k].is_empty() {
                continue;
            }
            let merged = (size_a * distances[a][k] + size_b * distances[b][k]) / (size_a + size_b);
            distances[a][k] = merged;
            distances[k][a] = merged;
        }

        let absorbed = std::mem::take(&mut members[b]);
        members[a].extend(absorbed);
    }

    let mut labels = vec![0usize; n];
    let mut roots: Vec<usize> = (0..n).filter(|&i| !members[i].is_empty()).collect();
    roots.sort_by_key(|&root| members[root].iter().copied().min().unwrap_or(root));
    for (label, root) in roots.into_iter().enumerate() {
        for &member in &members[root] {
            labels[member] = label;
        }
    }
    labels
}
