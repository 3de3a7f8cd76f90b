//! Representative selection among near-duplicate snapshot texts.
//!
//! Cost is O(n²) edit-distance computations, fine for the handful of rows a
//! lookback window holds.

/// Normalized edit similarity in `[0, 1]`; two empty strings are identical.
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Full symmetric n×n similarity matrix with a unit diagonal.
pub fn similarity_matrix(candidates: &[String]) -> Vec<Vec<f64>> {
    let n = candidates.len();
    let mut matrix = vec![vec![1.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let sim = edit_similarity(&candidates[i], &candidates[j]);
            matrix[i][j] = sim;
            matrix[j][i] = sim;
        }
    }
    matrix
}

/// Index of the representative candidate, or `None` for an empty set.
///
/// Candidates must be in chronological order. When every pair is at least
/// `threshold` similar, the candidate with the largest similarity row-sum
/// wins (ties go to the earliest). Otherwise the last candidate wins.
pub fn select_representative(candidates: &[String], threshold: f64) -> Option<usize> {
    match candidates.len() {
        0 => return None,
        1 => return Some(0),
        _ => {}
    }

    let matrix = similarity_matrix(candidates);
    let all_near = matrix.iter().enumerate().all(|(i, row)| {
        row.iter()
            .enumerate()
            .all(|(j, &sim)| i == j || sim >= threshold)
    });

    if !all_near {
        return Some(candidates.len() - 1);
    }

    let mut best = 0;
    let mut best_sum = f64::MIN;
    for (i, row) in matrix.iter().enumerate() {
        let sum: f64 = row.iter().sum();
        if sum > best_sum {
            best = i;
            best_sum = sum;
        }
    }
    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let m = similarity_matrix(&owned(&["abc", "abd", "xyz"]));
        for i in 0..3 {
            assert_eq!(m[i][i], 1.0);
            for j in 0..3 {
                assert_eq!(m[i][j], m[j][i]);
                assert!((0.0..=1.0).contains(&m[i][j]));
            }
        }
    }

    #[test]
    fn empty_and_single() {
        assert_eq!(select_representative(&[], 0.8), None);
        assert_eq!(select_representative(&owned(&["x"]), 0.8), Some(0));
    }

    #[test]
    fn near_duplicate_pair_tie_goes_to_earliest() {
        let c = owned(&["Nesreča na AC.", "Nesreča na AC,"]);
        assert!(edit_similarity(&c[0], &c[1]) >= 0.9);
        assert_eq!(select_representative(&c, 0.8), Some(0));
    }

    #[test]
    fn near_duplicates_pick_most_central_not_latest() {
        let c = owned(&[
            "Zastoj na AC pri Kozarjah",
            "Zastoj na AC pri Kozarjah.",
            "Zastoj na AC pri Kozarjah..",
        ]);
        assert_eq!(select_representative(&c, 0.9), Some(1));
    }

    #[test]
    fn divergence_picks_latest() {
        let c = owned(&[
            "Zastoj na AC pri Kozarjah.",
            "Nesreča na regionalni cesti Koper-Izola, promet poteka izmenično.",
            "Zastoj na AC pri Kozarjah",
        ]);
        assert_eq!(select_representative(&c, 0.85), Some(2));
    }

    #[test]
    fn threshold_is_respected() {
        let c = owned(&["Zastoj 2 km", "Zastoj 3 km", "Zastoj 4 km!"]);
        // Pairwise similarity ranges 0.83..0.91.
        assert_eq!(select_representative(&c, 0.75), Some(0));
        assert_eq!(select_representative(&c, 0.9), Some(2));
    }
}
