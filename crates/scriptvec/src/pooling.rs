//! Pure numeric reduction of token vectors: mean pooling, L2 normalization,
//! and the fixed-width line format used on stdout.

/// A single per-token vector as yielded by an embedding model.
pub type TokenVector = Vec<f64>;

/// Norm floor below which normalization is skipped to avoid division blow-up.
pub const NORM_EPSILON: f64 = 1e-10;

/// Element-wise arithmetic mean of a sequence of equal-dimension vectors.
///
/// An empty input yields an empty vector; callers treat that as a pipeline
/// failure upstream. Dimension uniformity is guaranteed by the model.
pub fn mean_pool(vectors: &[TokenVector]) -> Vec<f64> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let mut pooled = vec![0.0; first.len()];
    for vector in vectors {
        for (acc, component) in pooled.iter_mut().zip(vector) {
            *acc += component;
        }
    }
    let count = vectors.len() as f64;
    for acc in &mut pooled {
        *acc /= count;
    }
    pooled
}

/// Scale a vector to unit Euclidean length.
///
/// Vectors with norm <= `NORM_EPSILON` are returned unchanged.
pub fn l2_normalize(mut vector: Vec<f64>) -> Vec<f64> {
    let norm = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm <= NORM_EPSILON {
        return vector;
    }
    for component in &mut vector {
        *component /= norm;
    }
    vector
}

/// Render a vector as one comma-separated line, 8 decimal digits per
/// component, no brackets or whitespace.
pub fn format_vector(vector: &[f64]) -> String {
    vector
        .iter()
        .map(|component| format!("{:.8}", component))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    fn norm(v: &[f64]) -> f64 {
        v.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    #[test]
    fn test_mean_pool_componentwise_mean() {
        let pooled = mean_pool(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        assert!((pooled[0] - 3.0).abs() < TOL);
        assert!((pooled[1] - 4.0).abs() < TOL);
    }

    #[test]
    fn test_mean_pool_single_vector_identity() {
        let pooled = mean_pool(&[vec![0.25, -1.5, 7.0]]);
        assert_eq!(pooled, vec![0.25, -1.5, 7.0]);
    }

    #[test]
    fn test_mean_pool_empty_returns_empty() {
        assert!(mean_pool(&[]).is_empty());
    }

    #[test]
    fn test_l2_normalize_unit_norm() {
        let normalized = l2_normalize(vec![3.0, 4.0]);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
        assert!((norm(&normalized) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_preserves_direction() {
        let input = vec![1.0, 2.0, 3.0];
        let normalized = l2_normalize(input.clone());
        let dot: f64 = input.iter().zip(&normalized).map(|(a, b)| a * b).sum();
        let cosine = dot / norm(&input);
        assert!((cosine - 1.0).abs() < TOL);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        let normalized = l2_normalize(vec![0.0, 0.0, 0.0]);
        assert_eq!(normalized, vec![0.0, 0.0, 0.0]);
        assert!(!normalized.iter().any(|x| x.is_nan()));
    }

    #[test]
    fn test_l2_normalize_below_epsilon_unchanged() {
        let tiny = vec![1e-12, -1e-12];
        assert_eq!(l2_normalize(tiny.clone()), tiny);
    }

    #[test]
    fn test_l2_normalize_idempotent() {
        let once = l2_normalize(vec![0.2, -0.7, 1.3]);
        let twice = l2_normalize(once.clone());
        for (a, b) in once.iter().zip(&twice) {
            assert!((a - b).abs() < TOL);
        }
    }

    #[test]
    fn test_pool_then_normalize_known_values() {
        let pooled = mean_pool(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(pooled, vec![0.5, 0.5]);
        let normalized = l2_normalize(pooled);
        assert!((normalized[0] - 0.707_106_781_186).abs() < 1e-6);
        assert!((normalized[1] - 0.707_106_781_186).abs() < 1e-6);
    }

    #[test]
    fn test_format_vector_eight_decimals() {
        let line = format_vector(&l2_normalize(mean_pool(&[vec![1.0, 0.0], vec![0.0, 1.0]])));
        assert_eq!(line, "0.70710678,0.70710678");
    }

    #[test]
    fn test_format_vector_plain_csv() {
        assert_eq!(format_vector(&[-1.0, 0.125]), "-1.00000000,0.12500000");
    }
}
