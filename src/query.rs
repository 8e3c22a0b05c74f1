//! The read surface (spec §5): pure index lookups over the nested-set
//! encoding, expressed as interval containment on `lft`/`rgt` within a
//! `tree_id`. No mutation here touches the interval numbering; every query
//! is a plain `SELECT`.

use crate::{
    errors::TreeError,
    model::{Node, NodeRow},
    TreeDal,
};

impl<'a, 'c> TreeDal<'a, 'c> {
    pub async fn get_node(&mut self, id: i64) -> Result<Node, TreeError> {
        let sql = format!(
            "SELECT id, tree_id, lft, rgt, depth, payload FROM {} WHERE id = $1",
            self.table.name
        );
        let row: Option<NodeRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.storage.conn())
            .await?;
        row.map(Node::from).ok_or(TreeError::NodeNotFound(id))
    }

    /// All roots (`lft == 1`), ordered by `tree_id`.
    pub async fn get_root_nodes(&mut self) -> Result<Vec<Node>, TreeError> {
        let sql = format!(
            "SELECT id, tree_id, lft, rgt, depth, payload FROM {} WHERE lft = 1 ORDER BY tree_id",
            self.table.name
        );
        let rows: Vec<NodeRow> = sqlx::query_as(&sql).fetch_all(self.storage.conn()).await?;
        Ok(rows.into_iter().map(Node::from).collect())
    }

    /// `node` and every descendant, in DFS order — the whole subtree rooted
    /// at `node` inclusive.
    pub async fn get_tree(&mut self, node: &Node) -> Result<Vec<Node>, TreeError> {
        let sql = format!(
            "SELECT id, tree_id, lft, rgt, depth, payload FROM {} \
             WHERE tree_id = $1 AND lft >= $2 AND rgt <= $3 ORDER BY lft",
            self.table.name
        );
        let rows: Vec<NodeRow> = sqlx::query_as(&sql)
            .bind(node.tree_id)
            .bind(node.lft)
            .bind(node.rgt)
            .fetch_all(self.storage.conn())
            .await?;
        Ok(rows.into_iter().map(Node::from).collect())
    }

    /// Strict descendants of `node`, in DFS order.
    pub async fn get_descendants(&mut self, node: &Node) -> Result<Vec<Node>, TreeError> {
        let sql = format!(
            "SELECT id, tree_id, lft, rgt, depth, payload FROM {} \
             WHERE tree_id = $1 AND lft > $2 AND rgt < $3 ORDER BY lft",
            self.table.name
        );
        let rows: Vec<NodeRow> = sqlx::query_as(&sql)
            .bind(node.tree_id)
            .bind(node.lft)
            .bind(node.rgt)
            .fetch_all(self.storage.conn())
            .await?;
        Ok(rows.into_iter().map(Node::from).collect())
    }

    /// Direct children only, DFS order — descendants one depth below `node`.
    pub async fn get_children(&mut self, node: &Node) -> Result<Vec<Node>, TreeError> {
        let sql = format!(
            "SELECT id, tree_id, lft, rgt, depth, payload FROM {} \
             WHERE tree_id = $1 AND lft > $2 AND rgt < $3 AND depth = $4 ORDER BY lft",
            self.table.name
        );
        let rows: Vec<NodeRow> = sqlx::query_as(&sql)
            .bind(node.tree_id)
            .bind(node.lft)
            .bind(node.rgt)
            .bind(node.depth + 1)
            .fetch_all(self.storage.conn())
            .await?;
        Ok(rows.into_iter().map(Node::from).collect())
    }

    /// Strict ancestors of `node`, root-first.
    pub async fn get_ancestors(&mut self, node: &Node) -> Result<Vec<Node>, TreeError> {
        let sql = format!(
            "SELECT id, tree_id, lft, rgt, depth, payload FROM {} \
             WHERE tree_id = $1 AND lft < $2 AND rgt > $3 ORDER BY lft",
            self.table.name
        );
        let rows: Vec<NodeRow> = sqlx::query_as(&sql)
            .bind(node.tree_id)
            .bind(node.lft)
            .bind(node.rgt)
            .fetch_all(self.storage.conn())
            .await?;
        Ok(rows.into_iter().map(Node::from).collect())
    }

    /// `node`'s parent, or `None` if `node` is a root. Doesn't consult or
    /// populate `node`'s own parent cache — callers that want memoization go
    /// through `get_parent_cached`.
    pub async fn get_parent(&mut self, node: &Node) -> Result<Option<Node>, TreeError> {
        if node.is_root() {
            return Ok(None);
        }
        let sql = format!(
            "SELECT id, tree_id, lft, rgt, depth, payload FROM {} \
             WHERE tree_id = $1 AND lft < $2 AND rgt > $3 ORDER BY lft DESC LIMIT 1",
            self.table.name
        );
        let row: Option<NodeRow> = sqlx::query_as(&sql)
            .bind(node.tree_id)
            .bind(node.lft)
            .bind(node.rgt)
            .fetch_optional(self.storage.conn())
            .await?;
        Ok(row.map(Node::from))
    }

    /// Same as `get_parent`, but checks and then fills `node`'s memoized
    /// parent id so repeated calls in a DFS walk skip the query.
    pub async fn get_parent_cached(&mut self, node: &mut Node) -> Result<Option<Node>, TreeError> {
        if let Some(cached) = node.cached_parent_id() {
            return match cached {
                Some(parent_id) => self.get_node(parent_id).await.map(Some),
                None => Ok(None),
            };
        }
        let parent = self.get_parent(node).await?;
        node.cache_parent_id(parent.as_ref().map(|p| p.id));
        Ok(parent)
    }

    /// All other children of `node`'s parent, DFS order, `node` excluded.
    pub async fn get_siblings(&mut self, node: &Node) -> Result<Vec<Node>, TreeError> {
        let parent = self.get_parent(node).await?;
        let siblings = match parent {
            Some(parent) => self.get_children(&parent).await?,
            None => self.get_root_nodes().await?,
        };
        Ok(siblings.into_iter().filter(|s| s.id != node.id).collect())
    }

    /// `node`'s full sibling list (including `node`), DFS order — the
    /// fetch `position::resolve_sibling_position` expects.
    pub async fn get_siblings_inclusive(&mut self, node: &Node) -> Result<Vec<Node>, TreeError> {
        let parent = self.get_parent(node).await?;
        match parent {
            Some(parent) => self.get_children(&parent).await,
            None => self.get_root_nodes().await,
        }
    }

    pub async fn is_descendant_of(&mut self, node: &Node, ancestor: &Node) -> Result<bool, TreeError> {
        Ok(node.is_descendant_of(ancestor))
    }

    pub fn get_descendant_count(&self, node: &Node) -> i64 {
        node.descendant_count()
    }
}
