use itertools::Itertools;
use proptest::prelude::*;

use crate::combinatorics::{
    checked_multiset_coefficient, combinations_with_replacement, generate_combinations,
    lexicographic_rank, lexicographic_unrank, multinomial_coefficient, multiset_coefficient,
};

#[test]
fn test_combinatorics_four_choose_two() {
    let combs = generate_combinations(&[0usize, 1, 2, 3], 2);
    assert_eq!(
        combs,
        vec![
            vec![0, 0],
            vec![0, 1],
            vec![0, 2],
            vec![0, 3],
            vec![1, 1],
            vec![1, 2],
            vec![1, 3],
            vec![2, 2],
            vec![2, 3],
            vec![3, 3],
        ]
    );
}

#[test]
fn test_combinatorics_degenerate_sizes() {
    assert_eq!(
        generate_combinations(&[3usize, 1], 0),
        vec![Vec::<usize>::new()]
    );
    assert!(generate_combinations::<usize>(&[], 2).is_empty());
    assert_eq!(
        generate_combinations::<usize>(&[], 0),
        vec![Vec::<usize>::new()]
    );
    assert_eq!(
        generate_combinations(&[7usize], 3),
        vec![vec![7, 7, 7]]
    );
}

#[test]
fn test_combinatorics_duplicated_candidates() {
    assert_eq!(
        generate_combinations(&[2usize, 0, 2, 1, 0], 2),
        generate_combinations(&[0usize, 1, 2], 2)
    );
    assert_eq!(
        generate_combinations(&['b', 'a', 'b'], 2),
        vec![vec!['a', 'a'], vec!['a', 'b'], vec!['b', 'b']]
    );
}

#[test]
fn test_combinatorics_iterator_rewind() {
    let mut cwr = combinations_with_replacement(&[0usize, 1, 2], 2);
    assert_eq!(cwr.total(), 6);
    let first_pass = cwr.by_ref().collect_vec();
    assert_eq!(first_pass.len(), 6);
    assert!(cwr.next().is_none());
    assert!(cwr.next().is_none());

    cwr.rewind();
    let second_pass = cwr.collect_vec();
    assert_eq!(first_pass, second_pass);
}

#[test]
fn test_combinatorics_multiset_coefficient() {
    assert_eq!(multiset_coefficient(4, 2), 10);
    assert_eq!(multiset_coefficient(12, 1), 12);
    assert_eq!(multiset_coefficient(12, 2), 78);
    assert_eq!(multiset_coefficient(12, 3), 364);
    assert_eq!(multiset_coefficient(6, 4), 126);
    assert_eq!(multiset_coefficient(0, 0), 1);
    assert_eq!(multiset_coefficient(0, 3), 0);
    assert_eq!(multiset_coefficient(5, 0), 1);
    assert_eq!(checked_multiset_coefficient(12, 3), Some(364));
    assert_eq!(checked_multiset_coefficient(usize::MAX / 2, 8), None);
    assert_eq!(checked_multiset_coefficient(usize::MAX, 2), None);
}

#[test]
fn test_combinatorics_rank_unrank() {
    assert_eq!(lexicographic_rank(&[2, 3], 4), Some(8));
    assert_eq!(lexicographic_rank(&[0, 0], 4), Some(0));
    assert_eq!(lexicographic_rank(&[3, 3], 4), Some(9));
    assert_eq!(lexicographic_rank(&[], 4), Some(0));
    assert_eq!(lexicographic_rank(&[3, 2], 4), None);
    assert_eq!(lexicographic_rank(&[1, 4], 4), None);

    assert_eq!(lexicographic_unrank(8, 4, 2), Some(vec![2, 3]));
    assert_eq!(lexicographic_unrank(0, 4, 0), Some(vec![]));
    assert_eq!(lexicographic_unrank(10, 4, 2), None);
}

#[test]
fn test_combinatorics_multinomial_coefficient() {
    assert_eq!(multinomial_coefficient(&[]), 1);
    assert_eq!(multinomial_coefficient(&[3]), 1);
    assert_eq!(multinomial_coefficient(&[1, 1]), 2);
    assert_eq!(multinomial_coefficient(&[2, 1]), 3);
    assert_eq!(multinomial_coefficient(&[2, 2]), 6);
    assert_eq!(multinomial_coefficient(&[1, 2, 3]), 60);
    assert_eq!(multinomial_coefficient(&[0, 2]), 1);
}

proptest! {
    #[test]
    fn prop_combinations_count_matches_multiset_coefficient(n in 0usize..7, k in 0usize..5) {
        let candidates = (0..n).collect_vec();
        prop_assert_eq!(
            generate_combinations(&candidates, k).len(),
            multiset_coefficient(n, k)
        );
    }

    #[test]
    fn prop_combinations_sorted_and_unique(
        candidates in prop::collection::vec(0usize..6, 0..8),
        k in 0usize..4,
    ) {
        let combs = generate_combinations(&candidates, k);
        for comb in combs.iter() {
            prop_assert_eq!(comb.len(), k);
            prop_assert!(comb.windows(2).all(|pair| pair[0] <= pair[1]));
            prop_assert!(comb.iter().all(|c| candidates.contains(c)));
        }
        prop_assert!(combs.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn prop_rank_matches_enumeration_position(n in 1usize..7, k in 0usize..5) {
        let candidates = (0..n).collect_vec();
        for (pos, comb) in generate_combinations(&candidates, k).iter().enumerate() {
            prop_assert_eq!(lexicographic_rank(comb, n), Some(pos));
            prop_assert_eq!(lexicographic_unrank(pos, n, k), Some(comb.clone()));
        }
    }

    #[test]
    fn prop_combinations_match_itertools(n in 1usize..6, k in 1usize..4) {
        let candidates = (0..n).collect_vec();
        let expected = candidates
            .iter()
            .cloned()
            .combinations_with_replacement(k)
            .collect_vec();
        prop_assert_eq!(generate_combinations(&candidates, k), expected);
    }
}
