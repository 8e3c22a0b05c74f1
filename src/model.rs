use std::collections::HashMap;

use serde_json::Value;

/// Describes the concrete table a `TreeDal` operates against: its name (used
/// to interpolate the SQL the encoding primitives emit) and, if the model is
/// sorted, the ordered list of payload keys siblings are kept sorted by.
#[derive(Debug, Clone)]
pub struct TreeTable {
    pub name: String,
    pub order_by: Option<Vec<String>>,
}

impl TreeTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order_by: None,
        }
    }

    pub fn sorted_by(name: impl Into<String>, order_by: Vec<String>) -> Self {
        Self {
            name: name.into(),
            order_by: Some(order_by),
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.order_by.is_some()
    }
}

/// Raw row shape as it comes back from Postgres.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NodeRow {
    pub id: i64,
    pub tree_id: i32,
    pub lft: i32,
    pub rgt: i32,
    pub depth: i32,
    pub payload: Value,
}

/// The in-memory node value handed back to callers. Carries an optional
/// memoized parent id so chained navigation (`get_parent` in a DFS loop)
/// doesn't re-issue the ancestor query every time; `invalidate_parent_cache`
/// clears it explicitly rather than baking invalidation into the read path.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: i64,
    pub tree_id: i32,
    pub lft: i32,
    pub rgt: i32,
    pub depth: i32,
    pub payload: Value,
    parent_cache: Option<Option<i64>>,
}

impl From<NodeRow> for Node {
    fn from(row: NodeRow) -> Self {
        Self {
            id: row.id,
            tree_id: row.tree_id,
            lft: row.lft,
            rgt: row.rgt,
            depth: row.depth,
            payload: row.payload,
            parent_cache: None,
        }
    }
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.lft == 1
    }

    pub fn is_leaf(&self) -> bool {
        self.rgt - self.lft == 1
    }

    pub fn descendant_count(&self) -> i64 {
        ((self.rgt - self.lft - 1) / 2) as i64
    }

    /// Same-tree interval containment, both strict — `self` is a descendant
    /// of `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &Node) -> bool {
        self.tree_id == ancestor.tree_id && self.lft > ancestor.lft && self.rgt < ancestor.rgt
    }

    pub fn cached_parent_id(&self) -> Option<Option<i64>> {
        self.parent_cache
    }

    pub fn cache_parent_id(&mut self, parent_id: Option<i64>) {
        self.parent_cache = Some(parent_id);
    }

    pub fn invalidate_parent_cache(&mut self) {
        self.parent_cache = None;
    }
}

/// A DFS-ordered bulk record: the payload plus an optional list of children
/// and, when `keep_ids` was requested, the node's own id.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Record {
    pub data: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}
