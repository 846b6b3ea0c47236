//! Free-text clamping and owner-scoped id resolution.
//!
//! Every id submitted by a client goes through [`resolve_owned_id`]: a parse
//! failure or an id that does not belong to the product in context degrades
//! to the first owned record, or to none. The wizard never hard-fails on a
//! bad id.

use stampdesk_model::HasId;

/// Trims surrounding whitespace and hard-clamps to `max_len` characters.
/// Absent input becomes the empty string. Idempotent for any `max_len`:
/// the clamp can cut right before interior whitespace, so the result is
/// trimmed again or a second pass would shrink it further.
pub(crate) fn truncate(value: Option<&str>, max_len: usize) -> String {
    let trimmed = value.unwrap_or_default().trim();
    let clamped: String = trimmed.chars().take(max_len).collect();
    clamped.trim_end().to_string()
}

pub(crate) fn parse_id(candidate: &str) -> Option<i64> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<i64>().ok().filter(|id| *id > 0)
}

/// True iff `candidate` parses to the id of a record in the owner-scoped
/// list. The sole defense against cross-product id injection.
pub(crate) fn belongs_to<T: HasId>(candidate: &str, owned: &[T]) -> bool {
    match parse_id(candidate) {
        Some(id) => owned.iter().any(|record| record.id() == id),
        None => false,
    }
}

/// Ordered resolution chain: parse, validate ownership, fall back to the
/// first owned record, else none.
pub(crate) fn resolve_owned_id<T: HasId>(candidate: Option<&str>, owned: &[T]) -> Option<i64> {
    if let Some(raw) = candidate {
        if belongs_to(raw, owned) {
            return parse_id(raw);
        }
    }
    owned.first().map(HasId::id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampdesk_model::Layout;

    fn layouts(ids: &[i64]) -> Vec<Layout> {
        ids.iter()
            .map(|id| Layout {
                id: *id,
                product_id: 1,
                name: format!("layout-{id}"),
                price: 750,
                sort_order: 0,
            })
            .collect()
    }

    #[test]
    fn truncate_clamps_and_trims() {
        assert_eq!(truncate(Some("  hello  "), 10), "hello");
        assert_eq!(truncate(Some("abcdef"), 3), "abc");
        assert_eq!(truncate(None, 5), "");
        assert_eq!(truncate(Some("   "), 5), "");
    }

    #[test]
    fn truncate_clamp_does_not_leave_trailing_whitespace() {
        assert_eq!(truncate(Some("a b"), 2), "a");
        assert_eq!(truncate(Some("word  next"), 6), "word");
    }

    #[test]
    fn truncate_is_idempotent() {
        for (value, max_len) in [
            ("  padded value  ", 5usize),
            ("плюс юникод", 4),
            ("short", 100),
            ("", 0),
            ("exact", 5),
            ("a b", 2),
            ("word  next", 6),
            ("tab\tsplit", 4),
        ] {
            let once = truncate(Some(value), max_len);
            let twice = truncate(Some(&once), max_len);
            assert_eq!(once, twice, "value={value:?} max_len={max_len}");
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let clamped = truncate(Some("печать"), 3);
        assert_eq!(clamped, "печ");
    }

    #[test]
    fn parse_id_rejects_garbage_and_non_positive() {
        assert_eq!(parse_id("17"), Some(17));
        assert_eq!(parse_id(" 4 "), Some(4));
        assert_eq!(parse_id("abc"), None);
        assert_eq!(parse_id(""), None);
        assert_eq!(parse_id("0"), None);
        assert_eq!(parse_id("-3"), None);
        assert_eq!(parse_id("2.5"), None);
    }

    #[test]
    fn belongs_to_requires_membership() {
        let owned = layouts(&[3, 5]);
        assert!(belongs_to("3", &owned));
        assert!(belongs_to("5", &owned));
        assert!(!belongs_to("4", &owned));
        assert!(!belongs_to("x", &owned));
        assert!(!belongs_to("3", &layouts(&[])));
    }

    #[test]
    fn resolve_prefers_valid_candidate() {
        let owned = layouts(&[3, 5]);
        assert_eq!(resolve_owned_id(Some("5"), &owned), Some(5));
    }

    #[test]
    fn resolve_falls_back_to_first_on_foreign_id() {
        let owned = layouts(&[3, 5]);
        assert_eq!(resolve_owned_id(Some("99"), &owned), Some(3));
        assert_eq!(resolve_owned_id(Some("garbage"), &owned), Some(3));
        assert_eq!(resolve_owned_id(None, &owned), Some(3));
    }

    #[test]
    fn resolve_yields_none_when_nothing_owned() {
        let owned = layouts(&[]);
        assert_eq!(resolve_owned_id(Some("7"), &owned), None);
        assert_eq!(resolve_owned_id(None, &owned), None);
    }
}
