//! Hierarchical Keys
//!
//! Keys are `/`-separated segment paths such as `"org/team/user"`.

/// Segment separator for hierarchical keys.
pub const KEY_SEPARATOR: char = '/';

/// Returns the key with its last segment removed.
///
/// A single-segment key is its own parent, so resolution looks it up once.
pub fn parent_key(key: &str) -> &str {
    match key.rfind(KEY_SEPARATOR) {
        Some(i) => &key[..i],
        None => key,
    }
}

/// True when `candidate` equals `key` or is nested below it (`key/...`).
pub fn is_nested_under(candidate: &str, key: &str) -> bool {
    match candidate.strip_prefix(key) {
        Some("") => true,
        Some(rest) => rest.starts_with(KEY_SEPARATOR),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parent_key() {
        assert_eq!(parent_key("org/team/user"), "org/team");
        assert_eq!(parent_key("org/team"), "org");
        assert_eq!(parent_key("org"), "org");
        assert_eq!(parent_key(""), "");
        assert_eq!(parent_key("a/"), "a");
    }

    #[test]
    fn test_is_nested_under() {
        assert!(is_nested_under("p", "p"));
        assert!(is_nested_under("p/c", "p"));
        assert!(is_nested_under("p/c/d", "p"));
        assert!(!is_nested_under("q", "p"));
        assert!(!is_nested_under("pq", "p"));
        assert!(!is_nested_under("p", "p/c"));
    }

    proptest! {
        #[test]
        fn prop_child_is_nested_under_parent(
            segments in prop::collection::vec("[a-z0-9]{1,8}", 2..6)
        ) {
            let key = segments.join("/");
            let parent = parent_key(&key);
            prop_assert!(is_nested_under(&key, parent));
            prop_assert_eq!(parent, segments[..segments.len() - 1].join("/"));
        }

        #[test]
        fn prop_sibling_prefix_is_not_nested(
            base in "[a-z]{1,8}",
            suffix in "[a-z0-9]{1,8}"
        ) {
            let sibling = format!("{}{}", base, suffix);
            prop_assert!(!is_nested_under(&sibling, &base));
        }
    }
}
