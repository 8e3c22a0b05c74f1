//! A pure in-memory reimplementation of the interval algebra (spec §8: "a
//! pure in-memory model of the interval algebra" the property suite runs
//! against). Reuses the crate's own position-normalization and sort-key
//! comparison functions directly — they're already pure and DB-free — and
//! reimplements just the arithmetic `encoding.rs` would otherwise run as SQL,
//! translated statement-for-statement from the `UPDATE ... SET ... WHERE`
//! shapes in `encoding.rs` into in-place slice mutation.

use nstree::model::{Node, NodeRow};
use nstree::position::{self, Canonical, Position};
use serde_json::{json, Value};

pub fn key_of(payload: &Value) -> i32 {
    payload.get("k").and_then(Value::as_i64).unwrap_or(0) as i32
}

fn mem_shift_right(rows: &mut [Node], tree_id: i32, pivot: i32, include_pivot: bool, delta: i32) {
    for n in rows.iter_mut() {
        if n.tree_id == tree_id && n.rgt >= pivot {
            n.rgt += delta;
            let shifts_lft = if include_pivot { n.lft >= pivot } else { n.lft > pivot };
            if shifts_lft {
                n.lft += delta;
            }
        }
    }
}

fn mem_shift_tree_ids(rows: &mut [Node], from_tree_id: i32) {
    for n in rows.iter_mut() {
        if n.tree_id >= from_tree_id {
            n.tree_id += 1;
        }
    }
}

fn mem_close_tree_gap(rows: &mut [Node], from_tree_id: i32) {
    for n in rows.iter_mut() {
        if n.tree_id > from_tree_id {
            n.tree_id -= 1;
        }
    }
}

fn mem_close_gap(rows: &mut [Node], tree_id: i32, drop_lft: i32, drop_rgt: i32) {
    let width = drop_rgt - drop_lft + 1;
    for n in rows.iter_mut() {
        if n.tree_id != tree_id {
            continue;
        }
        if n.lft > drop_lft {
            n.lft -= width;
        }
        if n.rgt > drop_lft {
            n.rgt -= width;
        }
    }
}

fn mem_tree_is_empty(rows: &[Node], tree_id: i32) -> bool {
    !rows.iter().any(|n| n.tree_id == tree_id)
}

#[derive(Debug)]
pub struct Forest {
    pub rows: Vec<Node>,
    next_id: i64,
    pub sorted: bool,
    order_by: Vec<String>,
}

impl Forest {
    pub fn new(sorted: bool) -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
            sorted,
            order_by: vec!["k".to_string()],
        }
    }

    pub fn get(&self, id: i64) -> Node {
        self.rows
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .expect("id must name a live row")
    }

    pub fn root_nodes(&self) -> Vec<Node> {
        let mut v: Vec<Node> = self.rows.iter().filter(|n| n.lft == 1).cloned().collect();
        v.sort_by_key(|n| n.tree_id);
        v
    }

    pub fn children(&self, node: &Node) -> Vec<Node> {
        let mut v: Vec<Node> = self
            .rows
            .iter()
            .filter(|n| n.tree_id == node.tree_id && n.lft > node.lft && n.rgt < node.rgt && n.depth == node.depth + 1)
            .cloned()
            .collect();
        v.sort_by_key(|n| n.lft);
        v
    }

    pub fn descendants(&self, node: &Node) -> Vec<Node> {
        let mut v: Vec<Node> = self
            .rows
            .iter()
            .filter(|n| n.tree_id == node.tree_id && n.lft > node.lft && n.rgt < node.rgt)
            .cloned()
            .collect();
        v.sort_by_key(|n| n.lft);
        v
    }

    pub fn ancestors(&self, node: &Node) -> Vec<Node> {
        let mut v: Vec<Node> = self
            .rows
            .iter()
            .filter(|n| n.tree_id == node.tree_id && n.lft < node.lft && n.rgt > node.rgt)
            .cloned()
            .collect();
        v.sort_by_key(|n| n.lft);
        v
    }

    pub fn parent(&self, node: &Node) -> Option<Node> {
        if node.is_root() {
            return None;
        }
        self.rows
            .iter()
            .filter(|n| n.tree_id == node.tree_id && n.lft < node.lft && n.rgt > node.rgt)
            .max_by_key(|n| n.lft)
            .cloned()
    }

    fn siblings_inclusive(&self, node: &Node) -> Vec<Node> {
        match self.parent(node) {
            Some(p) => self.children(&p),
            None => self.root_nodes(),
        }
    }

    fn next_tree_id(&self) -> i32 {
        self.rows.iter().map(|n| n.tree_id).max().unwrap_or(0) + 1
    }

    fn insert_node(&mut self, tree_id: i32, lft: i32, rgt: i32, depth: i32, key: i32) -> Node {
        let id = self.next_id;
        self.next_id += 1;
        let node: Node = NodeRow {
            id,
            tree_id,
            lft,
            rgt,
            depth,
            payload: json!({ "k": key }),
        }
        .into();
        self.rows.push(node.clone());
        node
    }

    pub fn add_root(&mut self, key: i32) -> Node {
        let roots = self.root_nodes();
        if roots.is_empty() {
            return self.insert_node(1, 1, 2, 1, key);
        }
        if self.sorted {
            let last_root = roots.last().expect("checked non-empty above").clone();
            return self.add_sibling(&last_root, key, Position::SortedSibling);
        }
        let tree_id = self.next_tree_id();
        self.insert_node(tree_id, 1, 2, 1, key)
    }

    pub fn add_child(&mut self, receiver: &Node, key: i32) -> Node {
        let pos = if self.sorted { Position::SortedChild } else { Position::LastChild };
        let (tree_id, lft, depth) = self.resolve_placement(receiver, pos, Some(key), 2);
        self.insert_node(tree_id, lft, lft + 1, depth, key)
    }

    pub fn add_sibling(&mut self, pivot: &Node, key: i32, pos: Position) -> Node {
        let (tree_id, lft, depth) = self.resolve_placement(pivot, pos, Some(key), 2);
        self.insert_node(tree_id, lft, lft + 1, depth, key)
    }

    fn resolve_placement(&mut self, reference: &Node, pos: Position, sort_key: Option<i32>, delta: i32) -> (i32, i32, i32) {
        let (reference, pos) = if pos.is_child_form() {
            let children = self.children(reference);
            if children.is_empty() {
                mem_shift_right(&mut self.rows, reference.tree_id, reference.rgt, false, delta);
                return (reference.tree_id, reference.lft + 1, reference.depth + 1);
            }
            let sort_pos = if self.sorted { Position::SortedSibling } else { Position::LastSibling };
            (children.into_iter().last().expect("checked non-empty above"), sort_pos)
        } else {
            (reference.clone(), pos)
        };

        if reference.is_root() {
            return self.resolve_root_placement(&reference, pos, sort_key);
        }
        let parent = self.parent(&reference).expect("non-root node must have a parent");
        let siblings = self.siblings_inclusive(&reference);
        let (canonical, idx) = match pos {
            Position::SortedSibling => {
                let key = sort_key.expect("sorted placement requires a key");
                match position::resolve_sorted_position(&siblings, &self.order_by, &json!({ "k": key })) {
                    (Canonical::Left, Some(idx)) => (Canonical::Left, idx),
                    (Canonical::LastSibling, None) => (Canonical::LastSibling, siblings.len() - 1),
                    _ => unreachable!("resolve_sorted_position only returns Left or LastSibling"),
                }
            }
            _ => position::resolve_sibling_position(&siblings, reference.id, pos),
        };
        let (pivot, include_pivot, new_lft) = match canonical {
            Canonical::FirstSibling => (parent.lft, false, parent.lft + 1),
            Canonical::LastSibling => (parent.rgt, false, parent.rgt),
            Canonical::Left => (siblings[idx].lft, true, siblings[idx].lft),
        };
        mem_shift_right(&mut self.rows, reference.tree_id, pivot, include_pivot, delta);
        (reference.tree_id, new_lft, parent.depth + 1)
    }

    fn resolve_root_placement(&mut self, reference: &Node, pos: Position, sort_key: Option<i32>) -> (i32, i32, i32) {
        let roots = self.root_nodes();
        let (canonical, idx) = match pos {
            Position::SortedSibling => {
                let key = sort_key.expect("sorted placement requires a key");
                match position::resolve_sorted_position(&roots, &self.order_by, &json!({ "k": key })) {
                    (Canonical::Left, Some(idx)) => (Canonical::Left, idx),
                    (Canonical::LastSibling, None) => (Canonical::LastSibling, roots.len().saturating_sub(1)),
                    _ => unreachable!("resolve_sorted_position only returns Left or LastSibling"),
                }
            }
            _ => position::resolve_sibling_position(&roots, reference.id, pos),
        };
        let new_tree_id = match canonical {
            Canonical::FirstSibling => {
                mem_shift_tree_ids(&mut self.rows, 1);
                1
            }
            Canonical::LastSibling => self.next_tree_id(),
            Canonical::Left => {
                let target_tree_id = roots[idx].tree_id;
                mem_shift_tree_ids(&mut self.rows, target_tree_id);
                target_tree_id
            }
        };
        (new_tree_id, 1, 1)
    }

    pub fn move_node(&mut self, node_id: i64, target_id: i64, pos: Position) -> Result<(), &'static str> {
        let node = self.get(node_id);
        let target = self.get(target_id);
        if target.id != node.id && target.is_descendant_of(&node) {
            return Err("cannot move a node into its own subtree");
        }

        let mut effective_target_id = target_id;
        let mut effective_pos = pos;
        if target.id == node.id {
            if pos.is_child_form() {
                return Err("cannot become its own child");
            }
            let siblings = self.siblings_inclusive(&node);
            let idx = siblings
                .iter()
                .position(|s| s.id == node.id)
                .expect("node must be among its own siblings");
            let is_first = idx == 0;
            let is_last = idx + 1 == siblings.len();
            let is_noop = matches!(pos, Position::Left)
                || (pos == Position::Right && is_last)
                || (pos == Position::FirstSibling && is_first)
                || (pos == Position::LastSibling && is_last);
            if is_noop {
                return Ok(());
            }
            let (anchor, anchor_pos) = if pos == Position::Right {
                (siblings[idx + 1].clone(), Position::Left)
            } else {
                let anchor = siblings
                    .iter()
                    .find(|s| s.id != node.id)
                    .cloned()
                    .expect("a real self-relative reposition always has another sibling");
                (anchor, pos)
            };
            effective_target_id = anchor.id;
            effective_pos = anchor_pos;
        }

        let gap = node.rgt - node.lft + 1;
        let old_tree_id = node.tree_id;
        let old_lft = node.lft;
        let old_depth = node.depth;
        let key = key_of(&node.payload);
        let sentinel = -node.id;

        for n in self.rows.iter_mut() {
            if n.tree_id == old_tree_id && n.lft >= node.lft && n.rgt <= node.rgt {
                n.tree_id = sentinel;
            }
        }
        mem_close_gap(&mut self.rows, old_tree_id, old_lft, node.rgt);
        if mem_tree_is_empty(&self.rows, old_tree_id) {
            mem_close_tree_gap(&mut self.rows, old_tree_id);
        }

        let placement_ref = self.get(effective_target_id);
        let (new_tree_id, new_lft, new_depth) = self.resolve_placement(&placement_ref, effective_pos, Some(key), gap);

        let offset = new_lft - old_lft;
        let depth_delta = new_depth - old_depth;
        for n in self.rows.iter_mut() {
            if n.tree_id == sentinel {
                n.tree_id = new_tree_id;
                n.lft += offset;
                n.rgt += offset;
                n.depth += depth_delta;
            }
        }
        Ok(())
    }

    pub fn delete_cold(&mut self, ids: &[i64]) -> usize {
        let mut nodes: Vec<Node> = ids.iter().map(|&id| self.get(id)).collect();
        nodes.sort_by_key(|n| (n.tree_id, n.lft));
        let mut cover: Vec<(i32, i32, i32)> = Vec::new();
        for n in &nodes {
            let covered = cover.iter().any(|&(t, l, r)| t == n.tree_id && l <= n.lft && n.rgt <= r);
            if !covered {
                cover.push((n.tree_id, n.lft, n.rgt));
            }
        }
        self.delete_hot(&cover)
    }

    fn delete_hot(&mut self, ranges: &[(i32, i32, i32)]) -> usize {
        let mut total = 0;
        for &(tree_id, lft, rgt) in ranges {
            let before = self.rows.len();
            self.rows.retain(|n| !(n.tree_id == tree_id && n.lft >= lft && n.rgt <= rgt));
            total += before - self.rows.len();
        }
        let mut descending = ranges.to_vec();
        descending.sort_by(|a, b| b.cmp(a));
        for (tree_id, lft, rgt) in descending {
            mem_close_gap(&mut self.rows, tree_id, lft, rgt);
            if mem_tree_is_empty(&self.rows, tree_id) {
                mem_close_tree_gap(&mut self.rows, tree_id);
            }
        }
        total
    }
}

/// Checks invariants 1-6 and 8 (contiguous intervals, descendant count,
/// depth-via-ancestors, descendant/ancestor symmetry, tree-id contiguity).
/// Invariant 7 (sort order) is checked separately by callers that build a
/// sorted `Forest`.
pub fn check_structural_invariants(forest: &Forest) -> Result<(), String> {
    use std::collections::BTreeMap;

    let mut by_tree: BTreeMap<i32, Vec<&Node>> = BTreeMap::new();
    for n in &forest.rows {
        by_tree.entry(n.tree_id).or_default().push(n);
    }

    for (&tree_id, nodes) in &by_tree {
        let mut bounds: Vec<i32> = nodes.iter().flat_map(|n| [n.lft, n.rgt]).collect();
        bounds.sort_unstable();
        let expected: Vec<i32> = (1..=bounds.len() as i32).collect();
        if bounds != expected {
            return Err(format!("tree {tree_id} intervals not contiguous: {bounds:?}"));
        }
        for n in nodes {
            if n.lft >= n.rgt {
                return Err(format!("node {} has lft >= rgt", n.id));
            }
        }
    }

    if !forest.rows.is_empty() {
        let mut tree_ids: Vec<i32> = by_tree.keys().copied().collect();
        tree_ids.sort_unstable();
        let expected: Vec<i32> = (1..=tree_ids.len() as i32).collect();
        if tree_ids != expected {
            return Err(format!("tree_ids not contiguous: {tree_ids:?}"));
        }
    }

    for n in &forest.rows {
        let descendants = forest.descendants(n);
        if descendants.len() as i64 != n.descendant_count() {
            return Err(format!("node {} descendant_count mismatch", n.id));
        }
        let ancestors = forest.ancestors(n);
        if ancestors.len() as i32 + 1 != n.depth {
            return Err(format!("node {} depth != ancestors().len() + 1", n.id));
        }
        for a in &ancestors {
            if !n.is_descendant_of(a) {
                return Err(format!("node {} ancestor {} not reciprocated by is_descendant_of", n.id, a.id));
            }
        }
        for d in &descendants {
            if !d.is_descendant_of(n) {
                return Err(format!("node {} descendant {} not reciprocated by is_descendant_of", n.id, d.id));
            }
        }
    }

    Ok(())
}

pub fn check_sort_invariant(forest: &Forest) -> Result<(), String> {
    use std::collections::BTreeMap;

    let mut by_parent: BTreeMap<Option<i64>, Vec<&Node>> = BTreeMap::new();
    for n in &forest.rows {
        let parent_id = forest.parent(n).map(|p| p.id);
        by_parent.entry(parent_id).or_default().push(n);
    }
    for siblings in by_parent.values() {
        let mut ordered = siblings.to_vec();
        ordered.sort_by_key(|n| n.lft);
        for w in ordered.windows(2) {
            if key_of(&w[0].payload) > key_of(&w[1].payload) {
                return Err("siblings not non-decreasing by sort key".to_string());
            }
        }
    }
    Ok(())
}
