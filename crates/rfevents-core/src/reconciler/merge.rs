// ── Filter merging ──
//
// Co-located subscriptions share one southbound registration per device,
// so their filters are folded together. An empty list means "no filter";
// once any contributor is unfiltered on a dimension, the merged dimension
// stays unfiltered for the rest of the fold.

use crate::model::{EventDestination, Subscription};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilters {
    pub event_types: Vec<String>,
    pub message_ids: Vec<String>,
    pub resource_types: Vec<String>,
}

impl EventFilters {
    pub fn of_subscription(sub: &Subscription) -> Self {
        Self {
            event_types: sub.event_types.clone(),
            message_ids: sub.message_ids.clone(),
            resource_types: sub.resource_types.clone(),
        }
    }

    pub fn of_destination(dest: &EventDestination) -> Self {
        Self {
            event_types: dest.event_types.clone(),
            message_ids: dest.message_ids.clone(),
            resource_types: dest.resource_types.clone(),
        }
    }

    /// Overwrite the filters of `dest` with these.
    pub fn apply_to(self, dest: &mut EventDestination) {
        dest.event_types = self.event_types;
        dest.message_ids = self.message_ids;
        dest.resource_types = self.resource_types;
    }

    /// Fold `sources` into `self`, then drop duplicates.
    ///
    /// For each dimension and the source at position `index`: a non-empty
    /// source is appended when it is the first source or the accumulator is
    /// still non-empty; anything else clears the accumulator.
    #[must_use]
    pub fn merge<'a, I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = &'a Subscription>,
    {
        for (index, source) in sources.into_iter().enumerate() {
            fold(&mut self.event_types, index, &source.event_types);
            fold(&mut self.message_ids, index, &source.message_ids);
            fold(&mut self.resource_types, index, &source.resource_types);
        }
        dedup(&mut self.event_types);
        dedup(&mut self.message_ids);
        dedup(&mut self.resource_types);
        self
    }
}

fn fold(acc: &mut Vec<String>, index: usize, source: &[String]) {
    if !source.is_empty() && (index == 0 || !acc.is_empty()) {
        acc.extend(source.iter().cloned());
    } else {
        acc.clear();
    }
}

/// Remove repeats, keeping first occurrences in order.
pub fn dedup(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

/// Order-insensitive comparison of two filter lists.
pub fn same_set(a: &[String], b: &[String]) -> bool {
    let left: std::collections::BTreeSet<&String> = a.iter().collect();
    let right: std::collections::BTreeSet<&String> = b.iter().collect();
    left == right
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn sub(event_types: &[&str], message_ids: &[&str]) -> Subscription {
        Subscription {
            event_types: event_types.iter().map(|s| (*s).to_owned()).collect(),
            message_ids: message_ids.iter().map(|s| (*s).to_owned()).collect(),
            ..Subscription::default()
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn typed(lists: Vec<Vec<String>>) -> Vec<Subscription> {
        lists
            .into_iter()
            .map(|event_types| Subscription {
                event_types,
                ..Subscription::default()
            })
            .collect()
    }

    fn filter_list(min: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[A-Za-z]{1,6}", min..4)
    }

    proptest! {
        #[test]
        fn an_unfiltered_source_empties_the_merge(
            seed in filter_list(0),
            lists in prop::collection::vec(filter_list(0), 1..6)
        ) {
            prop_assume!(lists.iter().any(Vec::is_empty));
            let seed = EventFilters { event_types: seed, ..EventFilters::default() };
            let merged = seed.merge(&typed(lists));
            prop_assert!(merged.event_types.is_empty());
        }

        #[test]
        fn filtered_sources_merge_into_their_union(
            seed in filter_list(0),
            lists in prop::collection::vec(filter_list(1), 1..6)
        ) {
            let mut expected: Vec<String> = seed.iter().chain(lists.iter().flatten()).cloned().collect();
            dedup(&mut expected);
            let seed = EventFilters { event_types: seed, ..EventFilters::default() };
            let merged = seed.merge(&typed(lists));
            prop_assert_eq!(merged.event_types, expected);
        }
    }

    #[test]
    fn union_of_filtered_sources() {
        let merged = EventFilters::default()
            .merge(&[sub(&["Alert"], &["A"]), sub(&["StatusChange", "Alert"], &["B"])]);
        assert_eq!(merged.event_types, strings(&["Alert", "StatusChange"]));
        assert_eq!(merged.message_ids, strings(&["A", "B"]));
    }

    #[test]
    fn empty_source_poisons_the_dimension() {
        let merged = EventFilters::default().merge(&[sub(&["Alert"], &[]), sub(&[], &[])]);
        assert!(merged.event_types.is_empty());

        // Once empty, later filtered sources cannot repopulate it.
        let merged =
            EventFilters::default().merge(&[sub(&[], &[]), sub(&["Alert"], &[]), sub(&["Other"], &[])]);
        assert!(merged.event_types.is_empty());
    }

    #[test]
    fn first_filtered_source_overrides_an_empty_request() {
        let merged = EventFilters::default().merge(&[sub(&["Alert"], &[])]);
        assert_eq!(merged.event_types, strings(&["Alert"]));
    }

    #[test]
    fn request_filters_seed_the_fold() {
        let seed = EventFilters {
            event_types: strings(&["ResourceAdded"]),
            ..EventFilters::default()
        };
        let merged = seed.merge(&[sub(&["Alert"], &["X"]), sub(&["Alert"], &["Y"])]);
        assert_eq!(merged.event_types, strings(&["ResourceAdded", "Alert"]));
        // The seed had no message IDs, but index 0 may still append.
        assert_eq!(merged.message_ids, strings(&["X", "Y"]));
    }

    #[test]
    fn fold_result_is_independent_of_duplicate_sources() {
        let a = sub(&["Alert"], &[]);
        let once = EventFilters::default().merge([&a]);
        let twice = EventFilters::default().merge([&a, &a]);
        assert_eq!(once.event_types, twice.event_types);
    }

    #[test]
    fn same_set_ignores_order_and_repeats() {
        assert!(same_set(&strings(&["Alert", "Other"]), &strings(&["Other", "Alert"])));
        assert!(same_set(&strings(&["Alert", "Alert"]), &strings(&["Alert"])));
        assert!(!same_set(&strings(&["Alert"]), &strings(&["Other"])));
    }
}
