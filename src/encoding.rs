//! The algebraic kernels: set-based `UPDATE` statements that open or close a
//! hole in the `lft`/`rgt` numbering of one tree, or in the `tree_id`
//! numbering of the whole forest. Each `*_sql` function is a pure function of
//! its table name and shape flags — it returns SQL text only, it never
//! touches a connection. The `shift_right`/`shift_tree_ids`/`close_gap`/
//! `close_tree_gap` wrappers bind the runtime parameters and execute.

use sqlx::PgConnection;

use crate::errors::TreeError;

/// "Open a hole of width `delta` to the right of `pivot`": every row with
/// `rgt >= pivot` gets `rgt += delta`; `lft` shifts too, for rows with
/// `lft > pivot` (or `lft >= pivot` when `include_pivot` is set — used when
/// `pivot` is the node whose own interval must grow, e.g. a leaf gaining its
/// first child).
pub fn shift_right_sql(table: &str, include_pivot: bool) -> String {
    let lft_op = if include_pivot { ">=" } else { ">" };
    format!(
        "UPDATE {table} \
         SET rgt = CASE WHEN rgt >= $2 THEN rgt + $3 ELSE rgt END, \
             lft = CASE WHEN lft {lft_op} $2 THEN lft + $3 ELSE lft END \
         WHERE tree_id = $1 AND rgt >= $2"
    )
}

pub async fn shift_right(
    conn: &mut PgConnection,
    table: &str,
    tree_id: i32,
    pivot: i32,
    include_pivot: bool,
    delta: i32,
) -> Result<u64, TreeError> {
    let sql = shift_right_sql(table, include_pivot);
    let affected = sqlx::query(&sql)
        .bind(tree_id)
        .bind(pivot)
        .bind(delta)
        .execute(conn)
        .await?
        .rows_affected();
    Ok(affected)
}

/// "Open a hole at tree index `from_tree_id`": every row with
/// `tree_id >= from_tree_id` gets `tree_id += 1`.
pub fn shift_tree_ids_sql(table: &str) -> String {
    format!("UPDATE {table} SET tree_id = tree_id + 1 WHERE tree_id >= $1")
}

pub async fn shift_tree_ids(
    conn: &mut PgConnection,
    table: &str,
    from_tree_id: i32,
) -> Result<u64, TreeError> {
    let sql = shift_tree_ids_sql(table);
    let affected = sqlx::query(&sql)
        .bind(from_tree_id)
        .execute(conn)
        .await?
        .rows_affected();
    Ok(affected)
}

/// The tree-id-dimension counterpart of `shift_tree_ids`, used to keep
/// invariant 5 (contiguous tree ids) after a whole root tree vanishes: every
/// row with `tree_id > from_tree_id` gets `tree_id -= 1`.
pub fn close_tree_gap_sql(table: &str) -> String {
    format!("UPDATE {table} SET tree_id = tree_id - 1 WHERE tree_id > $1")
}

pub async fn close_tree_gap(
    conn: &mut PgConnection,
    table: &str,
    from_tree_id: i32,
) -> Result<u64, TreeError> {
    let sql = close_tree_gap_sql(table);
    let affected = sqlx::query(&sql)
        .bind(from_tree_id)
        .execute(conn)
        .await?
        .rows_affected();
    Ok(affected)
}

/// "Close a gap of width `W = drop_rgt - drop_lft + 1` that starts at
/// `drop_lft`": every row in `tree_id` with `lft`/`rgt` beyond the gap slides
/// left by `W`.
pub fn close_gap_sql(table: &str) -> String {
    format!(
        "UPDATE {table} \
         SET lft = CASE WHEN lft > $2 THEN lft - $3 ELSE lft END, \
             rgt = CASE WHEN rgt > $2 THEN rgt - $3 ELSE rgt END \
         WHERE (lft > $2 OR rgt > $2) AND tree_id = $1"
    )
}

pub async fn close_gap(
    conn: &mut PgConnection,
    table: &str,
    tree_id: i32,
    drop_lft: i32,
    drop_rgt: i32,
) -> Result<u64, TreeError> {
    let width = drop_rgt - drop_lft + 1;
    let sql = close_gap_sql(table);
    let affected = sqlx::query(&sql)
        .bind(tree_id)
        .bind(drop_lft)
        .bind(width)
        .execute(conn)
        .await?
        .rows_affected();
    Ok(affected)
}

/// `true` once every row for `tree_id` has disappeared — callers use this to
/// decide whether `close_tree_gap` is needed after a `move`/`delete` that
/// touched a root's whole interval.
pub async fn tree_is_empty(
    conn: &mut PgConnection,
    table: &str,
    tree_id: i32,
) -> Result<bool, TreeError> {
    let sql = format!("SELECT 1 AS one FROM {table} WHERE tree_id = $1 LIMIT 1");
    let row: Option<(i32,)> = sqlx::query_as(&sql)
        .bind(tree_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_none())
}
