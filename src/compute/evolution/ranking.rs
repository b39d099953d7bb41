//! Ranking of a generation's model records.

use crate::schema::ModelRecord;

/// Sort records by accuracy, best first.
///
/// The sort is stable: records with equal accuracy keep their input order, so
/// selection on tied scores is reproducible across runs.
pub fn rank(mut records: Vec<ModelRecord>) -> Vec<ModelRecord> {
    records.sort_by(|a, b| b.accuracy.total_cmp(&a.accuracy));
    records
}

/// The first `k` records of an already ranked list.
pub fn top_k(ranked: &[ModelRecord], k: usize) -> Vec<ModelRecord> {
    ranked.iter().take(k).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(records: &[ModelRecord]) -> Vec<&str> {
        records.iter().map(|r| r.model_name.as_str()).collect()
    }

    #[test]
    fn test_descending() {
        let ranked = rank(vec![
            ModelRecord::new("a", 0.2),
            ModelRecord::new("b", 0.9),
            ModelRecord::new("c", 0.5),
        ]);
        assert_eq!(names(&ranked), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let ranked = rank(vec![
            ModelRecord::new("model-1", 0.5),
            ModelRecord::new("model-2", 0.7),
            ModelRecord::new("model-3", 0.5),
            ModelRecord::new("model-4", 0.7),
            ModelRecord::new("model-5", 0.5),
        ]);
        assert_eq!(
            names(&ranked),
            vec!["model-2", "model-4", "model-1", "model-3", "model-5"]
        );
    }

    #[test]
    fn test_all_equal_is_identity() {
        let input: Vec<_> = (1..=20)
            .map(|i| ModelRecord::new(format!("model-{i}"), 0.1))
            .collect();
        let ranked = rank(input.clone());
        assert_eq!(ranked, input);
    }

    #[test]
    fn test_top_k() {
        let ranked = rank(vec![
            ModelRecord::new("a", 0.2),
            ModelRecord::new("b", 0.9),
            ModelRecord::new("c", 0.5),
        ]);
        assert_eq!(names(&top_k(&ranked, 2)), vec!["b", "c"]);
        assert_eq!(top_k(&ranked, 10).len(), 3);
        assert!(top_k(&ranked, 0).is_empty());
    }
}
