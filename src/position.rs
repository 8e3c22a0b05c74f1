//! The position-token state machine (spec §4.2). The eight tokens a caller
//! can pass to `add_sibling`/`add_child`/`move` are modeled as one tagged
//! enum; the normalization rules that collapse them down to the three
//! canonical sibling-form placements (`first-sibling`, `last-sibling`,
//! `left`) are pure functions over an already-fetched sibling list, so they
//! can be unit tested without a database. The orchestration that fetches
//! those siblings and dispatches the canonical placement to a concrete SQL
//! effect lives in `mutate.rs`, since it needs the connection.

use crate::model::Node;

/// One of the eight tokens a mutation can be positioned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    FirstChild,
    LastChild,
    SortedChild,
    FirstSibling,
    LastSibling,
    SortedSibling,
    Left,
    Right,
}

impl Position {
    pub fn is_child_form(self) -> bool {
        matches!(
            self,
            Position::FirstChild | Position::LastChild | Position::SortedChild
        )
    }

    /// Maps a `*-child` token to its `*-sibling` counterpart; leaves
    /// sibling-form tokens untouched.
    pub fn as_sibling_form(self) -> Position {
        match self {
            Position::FirstChild => Position::FirstSibling,
            Position::LastChild => Position::LastSibling,
            Position::SortedChild => Position::SortedSibling,
            other => other,
        }
    }
}

/// The three placements left once normalization is done: everything else
/// (`right`, `sorted-sibling`, and `first-sibling` against a non-first pivot)
/// reduces to one of these against a concrete anchor node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Canonical {
    FirstSibling,
    LastSibling,
    Left,
}

/// Resolves `left` / `right` / `first-sibling` against an already-fetched,
/// DFS-ordered sibling list (which must include the pivot). Returns the
/// canonical placement and the index into `siblings` of the node the
/// placement effect should anchor on.
///
/// `last-sibling` is not handled here: there's nothing to resolve, it's
/// already canonical and doesn't need a specific anchor sibling (the
/// dispatch step only needs the family, i.e. any sibling or the parent).
pub fn resolve_sibling_position(
    siblings: &[Node],
    pivot_id: i64,
    pos: Position,
) -> (Canonical, usize) {
    let pivot_idx = siblings
        .iter()
        .position(|s| s.id == pivot_id)
        .expect("pivot must be one of its own siblings");

    match pos {
        Position::LastSibling => (Canonical::LastSibling, pivot_idx),
        Position::FirstSibling => (Canonical::FirstSibling, 0),
        Position::Right => {
            if pivot_idx + 1 == siblings.len() {
                (Canonical::LastSibling, pivot_idx)
            } else {
                (Canonical::Left, pivot_idx + 1)
            }
        }
        Position::Left => {
            if pivot_idx == 0 {
                (Canonical::FirstSibling, 0)
            } else {
                (Canonical::Left, pivot_idx)
            }
        }
        Position::SortedSibling | Position::FirstChild | Position::LastChild | Position::SortedChild => {
            panic!("resolve_sibling_position called with a non-sibling-form token: {pos:?}")
        }
    }
}

/// `sorted-sibling` resolution (spec §4.2): find the first sibling (in DFS
/// order) whose sort key is not less than `new_key`'s; if found, the new
/// node goes `left` of it, otherwise it becomes the `last-sibling`.
pub fn resolve_sorted_position(
    siblings: &[Node],
    order_by: &[String],
    new_key: &serde_json::Value,
) -> (Canonical, Option<usize>) {
    for (idx, sibling) in siblings.iter().enumerate() {
        if crate::sort::compare_keys(&sibling.payload, new_key, order_by) != std::cmp::Ordering::Less
        {
            return (Canonical::Left, Some(idx));
        }
    }
    (Canonical::LastSibling, None)
}
