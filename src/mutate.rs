//! The mutation surface (spec §4.3-§4.7): `add_root`, `add_child`,
//! `add_sibling`, `move_node`, and cascading `delete`. `resolve_placement` is
//! the single driver the design notes call for — the position-token state
//! machine collapsed into one function that both `add_*` and `move_node`
//! drive, parameterized by the width of hole to open (`2` for a brand new
//! leaf, the whole subtree's width for a move).

use serde_json::Value;

use crate::{
    encoding,
    errors::TreeError,
    model::{Node, NodeRow},
    position::{self, Canonical, Position},
    TreeDal,
};

impl<'a, 'c> TreeDal<'a, 'c> {
    pub async fn add_root(&mut self, payload: Value) -> Result<Node, TreeError> {
        let roots = self.get_root_nodes().await?;
        if roots.is_empty() {
            tracing::debug!(table = %self.table.name, "adding the first root node");
            let node = self.insert_node(1, 1, 2, 1, payload).await?;
            tracing::info!(node_id = node.id, "root added as the first tree");
            return Ok(node);
        }
        if self.table.is_sorted() {
            let last_root = roots.last().expect("checked non-empty above").clone();
            tracing::debug!(pivot_id = last_root.id, "delegating sorted add_root to add_sibling");
            return self.add_sibling(&last_root, payload, Position::SortedSibling).await;
        }
        let tree_id = self.next_tree_id().await?;
        tracing::debug!(tree_id, "adding root under a fresh tree_id");
        let node = self.insert_node(tree_id, 1, 2, 1, payload).await?;
        tracing::info!(node_id = node.id, tree_id, "root added");
        Ok(node)
    }

    /// Always appends: `pos` isn't a caller knob here (the position-token
    /// surface only applies to `add_sibling`/`move_node`). A receiver with
    /// existing children delegates to `add_sibling` off its last child; a
    /// leaf receiver opens its own width-2 hole directly.
    pub async fn add_child(&mut self, receiver: &Node, payload: Value) -> Result<Node, TreeError> {
        let pos = if self.table.is_sorted() {
            Position::SortedChild
        } else {
            Position::LastChild
        };
        tracing::debug!(receiver_id = receiver.id, ?pos, "opening a hole for a new child");
        let (tree_id, lft, depth) = self.resolve_placement(receiver, pos, Some(&payload), 2).await?;
        let node = self.insert_node(tree_id, lft, lft + 1, depth, payload).await?;
        tracing::info!(node_id = node.id, parent_id = receiver.id, "child added");
        Ok(node)
    }

    pub async fn add_sibling(&mut self, pivot: &Node, payload: Value, pos: Position) -> Result<Node, TreeError> {
        if pos.is_child_form() {
            return Err(TreeError::InvalidPosition(
                "add_sibling requires a sibling-form, left, or right position token",
            ));
        }
        tracing::debug!(pivot_id = pivot.id, ?pos, "opening a hole for a new sibling");
        let (tree_id, lft, depth) = self.resolve_placement(pivot, pos, Some(&payload), 2).await?;
        let node = self.insert_node(tree_id, lft, lft + 1, depth, payload).await?;
        tracing::info!(node_id = node.id, pivot_id = pivot.id, "sibling added");
        Ok(node)
    }

    /// Moves `node` (and its whole subtree) to sit relative to `target` per
    /// `pos`. Rejects moving a node into its own subtree or becoming its own
    /// child. A handful of self-relative placements that would land `node`
    /// back where it already is are detected as noops and return without
    /// touching storage (spec §4.6: `self == target` combined with `left`,
    /// `right` while already last sibling, `first-sibling` while already
    /// first, or `last-sibling` while already last). Any other self-relative
    /// sibling-form placement is a real reposition among `node`'s own
    /// siblings; since `target` (being `node` itself) is about to be
    /// detached from the family, such a move re-anchors on another member of
    /// that family before detaching (`right` of self becomes `left` of the
    /// sibling that used to follow it; `first-sibling`/`last-sibling`/
    /// `sorted-sibling` anchor on any other remaining sibling, since those
    /// tokens don't depend on which family member resolves them).
    ///
    /// Mechanically this detaches the subtree under a sentinel `tree_id`
    /// before touching anything else: the spec's literal three-step
    /// "open hole at destination, relocate, close gap at source" can
    /// double-shift the moving subtree when source and destination share a
    /// `tree_id` and the destination lies to the right of the source,
    /// because opening the destination hole and closing the source gap both
    /// match rows inside the subtree's own new position. Tagging the
    /// subtree out of `tree_id` participation for the middle of the
    /// operation sidesteps that overlap without changing the conceptual
    /// three-step shape or its final result.
    pub async fn move_node(&mut self, node: &Node, target: &Node, pos: Position) -> Result<(), TreeError> {
        let node = self.get_node(node.id).await?;
        let target = self.get_node(target.id).await?;
        if target.id != node.id && target.is_descendant_of(&node) {
            return Err(TreeError::InvalidMoveToDescendant {
                node: node.id,
                target: target.id,
            });
        }

        let mut effective_target_id = target.id;
        let mut effective_pos = pos;
        if target.id == node.id {
            if pos.is_child_form() {
                return Err(TreeError::InvalidMoveToDescendant {
                    node: node.id,
                    target: target.id,
                });
            }
            let siblings = self.get_siblings_inclusive(&node).await?;
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
                tracing::debug!(node_id = node.id, ?pos, "move_node is a noop against its own position");
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

        tracing::debug!(node_id = node.id, target_id = target.id, ?pos, "moving node: detaching subtree");
        let gap = node.rgt - node.lft + 1;
        let old_tree_id = node.tree_id;
        let old_lft = node.lft;
        let old_depth = node.depth;
        let sentinel = -node.id;

        let detach_sql = format!(
            "UPDATE {} SET tree_id = $1 WHERE tree_id = $2 AND lft >= $3 AND rgt <= $4",
            self.table.name
        );
        sqlx::query(&detach_sql)
            .bind(sentinel)
            .bind(old_tree_id)
            .bind(node.lft)
            .bind(node.rgt)
            .execute(self.storage.conn())
            .await?;

        tracing::debug!(tree_id = old_tree_id, old_lft, "closing the gap left at the source");
        encoding::close_gap(self.storage.conn(), &self.table.name, old_tree_id, old_lft, node.rgt).await?;
        if encoding::tree_is_empty(self.storage.conn(), &self.table.name, old_tree_id).await? {
            tracing::debug!(tree_id = old_tree_id, "source tree emptied, closing the tree_id gap");
            encoding::close_tree_gap(self.storage.conn(), &self.table.name, old_tree_id).await?;
        }

        let placement_ref = self.get_node(effective_target_id).await?;
        let (new_tree_id, new_lft, new_depth) = self
            .resolve_placement(&placement_ref, effective_pos, Some(&node.payload), gap)
            .await?;

        let offset = new_lft - old_lft;
        let depth_delta = new_depth - old_depth;
        tracing::debug!(new_tree_id, new_lft, depth_delta, "relocating detached subtree to destination");
        let relocate_sql = format!(
            "UPDATE {} SET tree_id = $1, lft = lft + $2, rgt = rgt + $2, depth = depth + $3 \
             WHERE tree_id = $4",
            self.table.name
        );
        sqlx::query(&relocate_sql)
            .bind(new_tree_id)
            .bind(offset)
            .bind(depth_delta)
            .bind(sentinel)
            .execute(self.storage.conn())
            .await?;

        tracing::info!(node_id = node.id, target_id = target.id, new_tree_id, "node moved");
        Ok(())
    }

    /// Cold-call delete (spec §4.7): accepts any set of nodes, reduces it to
    /// a minimal cover of disjoint subtree ranges (dropping any node already
    /// covered by an ancestor in the set), then hands the cover to
    /// `delete_hot`.
    pub async fn delete_cold(&mut self, nodes: &[Node]) -> Result<u64, TreeError> {
        let mut ordered: Vec<&Node> = nodes.iter().collect();
        ordered.sort_by_key(|n| (n.tree_id, n.lft));

        let mut cover: Vec<(i32, i32, i32)> = Vec::new();
        for n in ordered {
            let already_covered = cover
                .iter()
                .any(|&(tree_id, lft, rgt)| tree_id == n.tree_id && lft <= n.lft && n.rgt <= rgt);
            if !already_covered {
                cover.push((n.tree_id, n.lft, n.rgt));
            }
        }
        tracing::debug!(requested = nodes.len(), cover = cover.len(), "reduced delete set to a minimal cover");
        self.delete_hot(&cover).await
    }

    /// Hot-call delete (spec §4.7): `ranges` are disjoint `(tree_id, lft,
    /// rgt)` subtree covers. Deletes every range's rows, then closes each
    /// range's gap in descending `(tree_id, lft, rgt)` order — closing a
    /// lower-addressed gap first would shift the bounds still pending for
    /// the others.
    pub async fn delete_hot(&mut self, ranges: &[(i32, i32, i32)]) -> Result<u64, TreeError> {
        tracing::debug!(ranges = ranges.len(), "deleting rows covered by the supplied ranges");
        let mut total = 0u64;
        for &(tree_id, lft, rgt) in ranges {
            let sql = format!(
                "DELETE FROM {} WHERE tree_id = $1 AND lft >= $2 AND rgt <= $3",
                self.table.name
            );
            total += sqlx::query(&sql)
                .bind(tree_id)
                .bind(lft)
                .bind(rgt)
                .execute(self.storage.conn())
                .await?
                .rows_affected();
        }

        let mut descending = ranges.to_vec();
        descending.sort_by(|a, b| b.cmp(a));
        for (tree_id, lft, rgt) in descending {
            encoding::close_gap(self.storage.conn(), &self.table.name, tree_id, lft, rgt).await?;
            if encoding::tree_is_empty(self.storage.conn(), &self.table.name, tree_id).await? {
                tracing::debug!(tree_id, "tree emptied by delete, closing the tree_id gap");
                encoding::close_tree_gap(self.storage.conn(), &self.table.name, tree_id).await?;
            }
        }
        tracing::info!(rows_deleted = total, "delete complete");
        Ok(total)
    }

    /// The position-token state machine's single driver (design notes §9):
    /// normalizes `pos` against `reference`, opens a hole of width `delta`
    /// at the resolved destination, and returns `(tree_id, lft, depth)` for
    /// the caller to either insert a new leaf into or relocate an existing
    /// subtree onto.
    async fn resolve_placement(
        &mut self,
        reference: &Node,
        pos: Position,
        sort_key: Option<&Value>,
        delta: i32,
    ) -> Result<(i32, i32, i32), TreeError> {
        let (reference, pos) = if pos.is_child_form() {
            let children = self.get_children(reference).await?;
            if children.is_empty() {
                self.open_hole(reference.tree_id, reference.rgt, false, delta).await?;
                return Ok((reference.tree_id, reference.lft + 1, reference.depth + 1));
            }
            let sort_pos = if self.table.is_sorted() {
                Position::SortedSibling
            } else {
                Position::LastSibling
            };
            (children.into_iter().last().expect("checked non-empty above"), sort_pos)
        } else {
            (reference.clone(), pos)
        };

        if reference.is_root() {
            return self.resolve_root_placement(&reference, pos, sort_key).await;
        }

        let parent = self
            .get_parent(&reference)
            .await?
            .expect("non-root node must have a parent");
        let siblings = self.get_siblings_inclusive(&reference).await?;
        let (canonical, idx) = match pos {
            Position::SortedSibling => {
                let order_by = self.table.order_by.clone().ok_or(TreeError::InvalidPosition(
                    "sorted-sibling requires a table configured with an order_by key",
                ))?;
                let key = sort_key.expect("sorted placement requires a comparison key");
                match position::resolve_sorted_position(&siblings, &order_by, key) {
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
        self.open_hole(reference.tree_id, pivot, include_pivot, delta).await?;
        Ok((reference.tree_id, new_lft, parent.depth + 1))
    }

    async fn resolve_root_placement(
        &mut self,
        reference: &Node,
        pos: Position,
        sort_key: Option<&Value>,
    ) -> Result<(i32, i32, i32), TreeError> {
        let roots = self.get_root_nodes().await?;
        let (canonical, idx) = match pos {
            Position::SortedSibling => {
                let order_by = self.table.order_by.clone().ok_or(TreeError::InvalidPosition(
                    "sorted-sibling requires a table configured with an order_by key",
                ))?;
                let key = sort_key.expect("sorted placement requires a comparison key");
                match position::resolve_sorted_position(&roots, &order_by, key) {
                    (Canonical::Left, Some(idx)) => (Canonical::Left, idx),
                    (Canonical::LastSibling, None) => (Canonical::LastSibling, roots.len().saturating_sub(1)),
                    _ => unreachable!("resolve_sorted_position only returns Left or LastSibling"),
                }
            }
            _ => position::resolve_sibling_position(&roots, reference.id, pos),
        };

        let new_tree_id = match canonical {
            Canonical::FirstSibling => {
                encoding::shift_tree_ids(self.storage.conn(), &self.table.name, 1).await?;
                1
            }
            Canonical::LastSibling => self.next_tree_id().await?,
            Canonical::Left => {
                let target_tree_id = roots[idx].tree_id;
                encoding::shift_tree_ids(self.storage.conn(), &self.table.name, target_tree_id).await?;
                target_tree_id
            }
        };
        Ok((new_tree_id, 1, 1))
    }

    async fn open_hole(&mut self, tree_id: i32, pivot: i32, include_pivot: bool, delta: i32) -> Result<(), TreeError> {
        encoding::shift_right(self.storage.conn(), &self.table.name, tree_id, pivot, include_pivot, delta).await?;
        Ok(())
    }

    async fn insert_node(&mut self, tree_id: i32, lft: i32, rgt: i32, depth: i32, payload: Value) -> Result<Node, TreeError> {
        let sql = format!(
            "INSERT INTO {} (tree_id, lft, rgt, depth, payload) VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, tree_id, lft, rgt, depth, payload",
            self.table.name
        );
        let row: NodeRow = sqlx::query_as(&sql)
            .bind(tree_id)
            .bind(lft)
            .bind(rgt)
            .bind(depth)
            .bind(payload)
            .fetch_one(self.storage.conn())
            .await?;
        Ok(row.into())
    }

    async fn next_tree_id(&mut self) -> Result<i32, TreeError> {
        let sql = format!("SELECT COALESCE(MAX(tree_id), 0) + 1 FROM {}", self.table.name);
        let (next,): (i32,) = sqlx::query_as(&sql).fetch_one(self.storage.conn()).await?;
        Ok(next)
    }
}
