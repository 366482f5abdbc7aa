use std::collections::BTreeMap;

use uuid::Uuid;

/// Reciprocal rank fusion over any number of ranked lists. Each candidate
/// accumulates `1/(k + rank)` per list it appears in (rank is 1-based). A
/// pure function of its inputs: identical lists always produce identical
/// scores and ordering, with ties broken by entity id ascending.
pub fn reciprocal_rank_fusion(rank_lists: &[Vec<Uuid>], k: f32) -> Vec<(Uuid, f32)> {
    let mut scores: BTreeMap<Uuid, f32> = BTreeMap::new();
    for list in rank_lists {
        for (index, id) in list.iter().enumerate() {
            let contribution = 1.0 / (k + (index as f32 + 1.0));
            *scores.entry(*id).or_insert(0.0) += contribution;
        }
    }

    let mut ranked: Vec<(Uuid, f32)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn identical_inputs_yield_identical_output() {
        let ids = ids(4);
        let lists = vec![
            vec![ids[0], ids[1], ids[2]],
            vec![ids[2], ids[3], ids[0]],
        ];
        let first = reciprocal_rank_fusion(&lists, 60.0);
        let second = reciprocal_rank_fusion(&lists, 60.0);
        assert_eq!(first, second);
    }

    #[test]
    fn candidate_in_both_lists_outranks_single_list_candidates() {
        let ids = ids(3);
        let lists = vec![vec![ids[1], ids[0]], vec![ids[1], ids[2]]];
        let ranked = reciprocal_rank_fusion(&lists, 60.0);
        assert_eq!(ranked[0].0, ids[1]);
        let expected = 2.0 / 61.0;
        assert!((ranked[0].1 - expected).abs() < 1e-6);
    }

    #[test]
    fn ties_break_by_entity_id_ascending() {
        let ids = ids(2);
        // Same rank in symmetric lists: identical scores.
        let lists = vec![vec![ids[0], ids[1]], vec![ids[1], ids[0]]];
        let ranked = reciprocal_rank_fusion(&lists, 60.0);
        assert!((ranked[0].1 - ranked[1].1).abs() < 1e-9);
        assert!(ranked[0].0 < ranked[1].0);
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(reciprocal_rank_fusion(&[], 60.0).is_empty());
    }
}
