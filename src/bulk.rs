//! Bulk I/O (spec §4.9): serializing a subtree to a DFS-ordered record tree
//! and reconstructing one by iterative preorder insertion.

use std::collections::HashMap;

use serde_json::Value;

use crate::{errors::TreeError, model::{Node, Record}, TreeDal};

impl<'a, 'c> TreeDal<'a, 'c> {
    /// Walks `get_tree(parent)` (the whole forest if `parent` is `None`) in
    /// DFS order and folds the flat row list back into a record tree.
    pub async fn dump_bulk(&mut self, parent: Option<i64>, keep_ids: bool) -> Result<Vec<Record>, TreeError> {
        let rows = match parent {
            Some(id) => {
                let node = self.get_node(id).await?;
                self.get_tree(&node).await?
            }
            None => {
                let mut all = Vec::new();
                for root in self.get_root_nodes().await? {
                    all.extend(self.get_tree(&root).await?);
                }
                all
            }
        };
        let base_depth = rows.first().map(|r| r.depth).unwrap_or(1);
        let mut idx = 0;
        Ok(build_records(&rows, &mut idx, base_depth, keep_ids))
    }

    /// Iterative preorder reconstruction. The stack is seeded with
    /// `(parent_id, record)` pairs pushed in reverse so popping restores
    /// source order; each popped record is inserted under its parent (or as
    /// a fresh root), and its own children are pushed in reverse with the
    /// freshly assigned id as their parent.
    pub async fn load_bulk(
        &mut self,
        records: Vec<Record>,
        parent: Option<i64>,
        keep_ids: bool,
    ) -> Result<Vec<i64>, TreeError> {
        let mut stack: Vec<(Option<i64>, Record)> = records.into_iter().rev().map(|r| (parent, r)).collect();

        let mut created = Vec::new();
        while let Some((parent_id, record)) = stack.pop() {
            let mut fields = record.data.clone();
            if !keep_ids {
                fields.remove("id");
            } else if let Some(id) = &record.id {
                fields.insert("id".to_string(), id.clone());
            }
            let payload = Value::Object(fields.into_iter().collect());

            let new_node = match parent_id {
                Some(parent_id) => {
                    let parent_node = self.get_node(parent_id).await?;
                    self.add_child(&parent_node, payload).await?
                }
                None => self.add_root(payload).await?,
            };
            created.push(new_node.id);

            if let Some(children) = record.children {
                for child in children.into_iter().rev() {
                    stack.push((Some(new_node.id), child));
                }
            }
        }

        Ok(created)
    }
}

fn payload_to_map(payload: &Value) -> HashMap<String, Value> {
    match payload {
        Value::Object(map) => map.clone().into_iter().collect(),
        _ => HashMap::new(),
    }
}

/// Consumes consecutive rows at `depth` as siblings, recursing one level
/// deeper whenever the next row is nested under the one just consumed.
/// Relies on `rows` being in `(tree_id, lft)` order, i.e. DFS preorder.
fn build_records(rows: &[Node], idx: &mut usize, depth: i32, keep_ids: bool) -> Vec<Record> {
    let mut records = Vec::new();
    while *idx < rows.len() && rows[*idx].depth == depth {
        let row = &rows[*idx];
        let mut data = payload_to_map(&row.payload);
        data.remove("id");
        let id = keep_ids.then(|| Value::from(row.id));
        *idx += 1;

        let children = if *idx < rows.len() && rows[*idx].depth > depth {
            Some(build_records(rows, idx, depth + 1, keep_ids))
        } else {
            None
        };

        records.push(Record { data, children, id });
    }
    records
}
