//! Overwrite-merge of two todo maps.

use super::StoreMap;

/// Every item of `base`, then every item of `overlay` on top of it.
///
/// `overlay` wins when both contain the same task. Neither input is touched.
/// Callers choose the direction deliberately: create/update drains the
/// buffer as `merge(buffer, stored)` so durable entries win, delete drains
/// it as `merge(stored, buffer)` so buffered entries win.
pub fn merge(base: &StoreMap, overlay: &StoreMap) -> StoreMap {
    let mut merged = base.clone();
    for item in overlay {
        merged.upsert(item.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TodoItem;

    fn map(items: &[(&str, &str)]) -> StoreMap {
        items
            .iter()
            .map(|(task, status)| TodoItem::new(*task, *status))
            .collect()
    }

    #[test]
    fn test_merge_contains_union_of_keys() {
        let a = map(&[("a", "todo"), ("b", "todo")]);
        let b = map(&[("c", "done")]);

        let merged = merge(&a, &b);
        let tasks: Vec<&str> = merged.tasks().collect();
        assert_eq!(tasks, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_overlay_wins_on_collision() {
        let base = map(&[("a", "todo"), ("b", "todo")]);
        let overlay = map(&[("a", "done")]);

        let merged = merge(&base, &overlay);
        assert_eq!(merged.get("a").unwrap().status, "done");
        assert_eq!(merged.get("b").unwrap().status, "todo");

        let reversed = merge(&overlay, &base);
        assert_eq!(reversed.get("a").unwrap().status, "todo");
    }

    #[test]
    fn test_merge_leaves_inputs_untouched() {
        let base = map(&[("a", "todo")]);
        let overlay = map(&[("a", "done"), ("b", "todo")]);

        let _ = merge(&base, &overlay);
        assert_eq!(base, map(&[("a", "todo")]));
        assert_eq!(overlay, map(&[("a", "done"), ("b", "todo")]));
    }

    #[test]
    fn test_merge_with_empty_sides() {
        let some = map(&[("a", "todo")]);
        let empty = StoreMap::default();

        assert_eq!(merge(&empty, &some), some);
        assert_eq!(merge(&some, &empty), some);
        assert!(merge(&empty, &empty).is_empty());
    }
}
