use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::ReassembleError;
use crate::types::FragmentCollection;

/// Interpret a raw order key as an integer position
pub fn parse_order_key(key: &str) -> Result<i64, ReassembleError> {
    key.trim()
        .parse::<i64>()
        .map_err(|_| ReassembleError::MalformedKey {
            key: key.to_string(),
        })
}

/// Join fragment words in ascending order-key order, separated by single spaces.
///
/// Any key that is not an integer fails the whole reassembly. Distinct raw
/// keys naming the same position (`"1"` and `"01"`) collapse to one entry;
/// the key that comes later in collection order wins.
pub fn reassemble(fragments: &FragmentCollection) -> Result<String, ReassembleError> {
    let mut ordered: BTreeMap<i64, (&str, &str)> = BTreeMap::new();

    for (key, word) in fragments.iter() {
        let position = parse_order_key(key)?;
        if let Some((previous_key, previous_word)) = ordered.insert(position, (key, word)) {
            warn!(
                position,
                previous_key,
                previous_word,
                key,
                word,
                "order keys name the same position, keeping the latter"
            );
        }
    }

    let phrase = ordered
        .values()
        .map(|(_, word)| *word)
        .collect::<Vec<_>>()
        .join(" ");

    debug!(fragments = fragments.len(), phrase = %phrase, "reassembled phrase");
    Ok(phrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Fragment;
    use maplit::btreemap;
    use proptest::prelude::*;

    fn collection(pairs: &[(&str, &str)]) -> FragmentCollection {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_orders_by_integer_key() {
        let fragments = collection(&[("2", "world"), ("1", "hello")]);
        assert_eq!(reassemble(&fragments).unwrap(), "hello world");
    }

    #[test]
    fn test_integer_order_not_lexicographic() {
        let fragments = collection(&[("10", "k"), ("9", "j"), ("1", "a"), ("-3", "first")]);
        assert_eq!(reassemble(&fragments).unwrap(), "first a j k");
    }

    #[test]
    fn test_empty_collection_is_empty_phrase() {
        assert_eq!(reassemble(&FragmentCollection::new()).unwrap(), "");
    }

    #[test]
    fn test_tolerates_surrounding_whitespace_in_key() {
        let fragments = collection(&[(" 2 ", "b"), ("1", "a")]);
        assert_eq!(reassemble(&fragments).unwrap(), "a b");
    }

    #[test]
    fn test_malformed_key_is_an_error() {
        let fragments = collection(&[("1", "hello"), ("two", "world")]);
        assert_eq!(
            reassemble(&fragments),
            Err(ReassembleError::MalformedKey {
                key: "two".to_string()
            })
        );
    }

    #[test]
    fn test_keys_naming_same_position_collapse() {
        let fragments = collection(&[("1", "a"), ("01", "b"), ("2", "c")]);
        // "01" sorts before "1", so "1" is the later key and wins
        assert_eq!(reassemble(&fragments).unwrap(), "a c");
    }

    #[test]
    fn test_duplicate_delivery_same_word_is_unchanged() {
        let mut fragments = collection(&[("1", "hello"), ("2", "world")]);
        fragments.insert(Fragment {
            order_key: "2".to_string(),
            word: "world".to_string(),
        });
        assert_eq!(reassemble(&fragments).unwrap(), "hello world");
    }

    fn unique_fragments() -> impl Strategy<Value = Vec<(i64, String)>> {
        prop::collection::btree_map(any::<i64>(), "[a-z]{1,8}", 0..24)
            .prop_map(|map| map.into_iter().collect::<Vec<_>>())
    }

    proptest! {
        #[test]
        fn prop_matches_sorted_join(entries in unique_fragments()) {
            let fragments: FragmentCollection = entries
                .iter()
                .map(|(key, word)| (key.to_string(), word.clone()))
                .collect();

            let expected = entries
                .iter()
                .map(|(_, word)| word.as_str())
                .collect::<Vec<_>>()
                .join(" ");

            prop_assert_eq!(reassemble(&fragments).unwrap(), expected);
        }

        #[test]
        fn prop_independent_of_insertion_order(
            shuffled in unique_fragments().prop_shuffle(),
        ) {
            let forward: FragmentCollection = shuffled
                .iter()
                .map(|(key, word)| (key.to_string(), word.clone()))
                .collect();
            let backward: FragmentCollection = shuffled
                .iter()
                .rev()
                .map(|(key, word)| (key.to_string(), word.clone()))
                .collect();

            prop_assert_eq!(reassemble(&forward).unwrap(), reassemble(&backward).unwrap());
        }

        /// Redelivered keys: the last delivery of each key wins
        #[test]
        fn prop_duplicate_deliveries_last_write_wins(
            deliveries in prop::collection::vec((0i64..6, "[a-z]{1,4}"), 1..40),
        ) {
            let mut fragments = FragmentCollection::new();
            let mut last = btreemap! {};
            for (key, word) in &deliveries {
                fragments.insert(Fragment {
                    order_key: key.to_string(),
                    word: word.clone(),
                });
                last.insert(*key, word.clone());
            }

            let expected = last.values().cloned().collect::<Vec<_>>().join(" ");
            prop_assert_eq!(reassemble(&fragments).unwrap(), expected);
        }
    }
}
