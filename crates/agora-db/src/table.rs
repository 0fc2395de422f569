use std::collections::HashSet;
use std::marker::PhantomData;

use rusqlite::types::Value;
use rusqlite::{Connection, Row, params_from_iter};
use tracing::debug;

use crate::error::{DbError, Result};
use crate::filter::Filter;

/// A row type bound to one table.
pub trait Record: Sized {
    const TABLE: &'static str;
    /// Selected columns, in the order `from_row` reads them. The first is `id`.
    const COLUMNS: &'static [&'static str];
    /// Columns written by an insert, in the order values must be supplied.
    const INSERT_FIELDS: &'static [&'static str];

    fn id(&self) -> i64;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// A record linked to its parent through `id_parent`.
pub trait TreeRecord: Record {
    fn parent_id(&self) -> Option<i64>;
}

/// Values for a new row, rendered in `INSERT_FIELDS` order.
pub trait NewRecord {
    type Record: Record;

    fn into_values(self) -> Vec<Value>;
}

/// Columns whose values never reach the logs.
const REDACTED_FIELDS: &[&str] = &["password_hash"];

/// `field=value` pairs for the insert log line.
fn describe_values(fields: &[&str], values: &[Value]) -> String {
    let pairs: Vec<String> = fields
        .iter()
        .zip(values)
        .map(|(field, value)| {
            let shown = if REDACTED_FIELDS.contains(field) {
                "<redacted>".to_string()
            } else {
                match value {
                    Value::Null => "NULL".to_string(),
                    Value::Integer(i) => i.to_string(),
                    Value::Real(f) => f.to_string(),
                    Value::Text(t) => format!("{:?}", t),
                    Value::Blob(b) => format!("<{} bytes>", b.len()),
                }
            };
            format!("{}={}", field, shown)
        })
        .collect();
    pairs.join(", ")
}

/// Accessor for the table behind `R`.
pub struct Table<R> {
    _record: PhantomData<fn() -> R>,
}

impl<R> Table<R> {
    pub const fn new() -> Self {
        Self {
            _record: PhantomData,
        }
    }
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Table<R> {
    pub fn name(&self) -> &'static str {
        R::TABLE
    }

    pub fn insert_fields(&self) -> &'static [&'static str] {
        R::INSERT_FIELDS
    }

    /// Inserts one row and returns its id. `values` must line up with
    /// `INSERT_FIELDS`; a count mismatch is reported without touching the
    /// database.
    pub fn insert(&self, conn: &Connection, values: Vec<Value>) -> Result<i64> {
        debug!(
            table = R::TABLE,
            values = %describe_values(R::INSERT_FIELDS, &values),
            "Inserting row"
        );

        if values.len() != R::INSERT_FIELDS.len() {
            let err = DbError::FieldCountMismatch {
                table: R::TABLE,
                expected: R::INSERT_FIELDS.len(),
                got: values.len(),
            };
            debug!("{}", err);
            return Err(err);
        }

        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            R::TABLE,
            R::INSERT_FIELDS.join(", "),
            placeholders.join(", ")
        );

        conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn create<N>(&self, conn: &Connection, new: N) -> Result<i64>
    where
        N: NewRecord<Record = R>,
    {
        self.insert(conn, new.into_values())
    }

    pub fn get_all(&self, conn: &Connection) -> Result<Vec<R>> {
        self.select(conn, None, None)
    }

    pub fn get_where(&self, conn: &Connection, filter: &Filter) -> Result<Vec<R>> {
        self.select(conn, Some(filter), None)
    }

    pub fn get_first_where(&self, conn: &Connection, filter: &Filter) -> Result<Option<R>> {
        Ok(self.select(conn, Some(filter), Some(1))?.into_iter().next())
    }

    pub fn find_by_id(&self, conn: &Connection, id: i64) -> Result<Option<R>> {
        self.get_first_where(conn, &Filter::id(id))
    }

    pub fn delete_where(&self, conn: &Connection, filter: &Filter) -> Result<usize> {
        let mut sql = format!("DELETE FROM {} WHERE ", R::TABLE);
        let mut params = Vec::new();
        filter.render(R::TABLE, R::COLUMNS, &mut sql, &mut params)?;

        Ok(conn.execute(&sql, params_from_iter(params.iter()))?)
    }

    pub fn delete_by_id(&self, conn: &Connection, id: i64) -> Result<usize> {
        self.delete_where(conn, &Filter::id(id))
    }

    pub fn has_any_where(&self, conn: &Connection, filter: &Filter) -> Result<bool> {
        let mut sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE ", R::TABLE);
        let mut params = Vec::new();
        filter.render(R::TABLE, R::COLUMNS, &mut sql, &mut params)?;
        sql.push(')');

        Ok(conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?)
    }

    pub fn has_id(&self, conn: &Connection, id: i64) -> Result<bool> {
        self.has_any_where(conn, &Filter::id(id))
    }

    pub fn count(&self, conn: &Connection) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", R::TABLE);
        let n: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Rows come back in insertion order.
    fn select(&self, conn: &Connection, filter: Option<&Filter>, limit: Option<usize>) -> Result<Vec<R>> {
        let mut sql = format!("SELECT {} FROM {}", R::COLUMNS.join(", "), R::TABLE);
        let mut params = Vec::new();

        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            filter.render(R::TABLE, R::COLUMNS, &mut sql, &mut params)?;
        }
        sql.push_str(" ORDER BY id");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| R::from_row(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

impl<R: TreeRecord> Table<R> {
    /// Children of `parent`; `None` lists the roots.
    pub fn find_all_by_parent(&self, conn: &Connection, parent: Option<i64>) -> Result<Vec<R>> {
        self.get_where(conn, &Filter::parent(parent))
    }

    /// Accepts `None` (a new root) or the id of an existing row.
    pub fn check_parent(&self, conn: &Connection, parent: Option<i64>) -> Result<()> {
        match parent {
            Some(id) if !self.has_id(conn, id)? => Err(DbError::ParentNotFound { table: R::TABLE, id }),
            _ => Ok(()),
        }
    }

    /// Deletes `id` and its whole subtree, children before parents.
    /// Returns the number of rows removed. Not atomic on its own: run it
    /// inside [`Database::with_tx`](crate::Database::with_tx).
    pub fn delete_recursive(&self, conn: &Connection, id: i64) -> Result<usize> {
        let mut visited = HashSet::new();
        let deleted = self.delete_subtree(conn, id, &mut visited)?;
        debug!(table = R::TABLE, root = id, deleted, "Deleted subtree");
        Ok(deleted)
    }

    fn delete_subtree(&self, conn: &Connection, id: i64, visited: &mut HashSet<i64>) -> Result<usize> {
        if !visited.insert(id) {
            return Err(DbError::CycleDetected { table: R::TABLE, id });
        }

        let mut deleted = 0;
        for child in self.find_all_by_parent(conn, Some(id))? {
            deleted += self.delete_subtree(conn, child.id(), visited)?;
        }

        deleted += self.delete_by_id(conn, id)?;
        Ok(deleted)
    }

    /// Pre-order walk below `parent` (`None` = whole forest). `f` sees each
    /// row before its children; depth is 0 for the direct children of
    /// `parent` and grows by one per level.
    pub fn for_children<F>(&self, conn: &Connection, parent: Option<i64>, mut f: F) -> Result<()>
    where
        F: FnMut(&R, usize),
    {
        let mut visited = HashSet::new();
        if let Some(id) = parent {
            visited.insert(id);
        }
        self.visit_children(conn, parent, 0, &mut f, &mut visited)
    }

    fn visit_children<F>(
        &self,
        conn: &Connection,
        parent: Option<i64>,
        depth: usize,
        f: &mut F,
        visited: &mut HashSet<i64>,
    ) -> Result<()>
    where
        F: FnMut(&R, usize),
    {
        for row in self.find_all_by_parent(conn, parent)? {
            if !visited.insert(row.id()) {
                return Err(DbError::CycleDetected { table: R::TABLE, id: row.id() });
            }
            f(&row, depth);
            self.visit_children(conn, Some(row.id()), depth + 1, f, visited)?;
        }
        Ok(())
    }

    /// Walks from `id` up to its root. `f` sees `id` itself at depth 0, its
    /// parent at depth 1, and so on. Returns `false` when `id` does not exist.
    pub fn for_parent<F>(&self, conn: &Connection, id: i64, mut f: F) -> Result<bool>
    where
        F: FnMut(&R, usize),
    {
        let mut visited = HashSet::new();
        let mut current = Some(id);
        let mut depth = 0;

        while let Some(id) = current {
            if !visited.insert(id) {
                return Err(DbError::CycleDetected { table: R::TABLE, id });
            }
            let Some(row) = self.find_by_id(conn, id)? else {
                return Ok(depth > 0);
            };
            f(&row, depth);
            current = row.parent_id();
            depth += 1;
        }

        Ok(true)
    }

    /// Collects the pre-order walk below `parent` with each row's depth.
    pub fn tree(&self, conn: &Connection, parent: Option<i64>) -> Result<Vec<(R, usize)>>
    where
        R: Clone,
    {
        let mut nodes = Vec::new();
        self.for_children(conn, parent, |row, depth| nodes.push((row.clone(), depth)))?;
        Ok(nodes)
    }

    /// One line per row of the forest, indented with `--->` per level.
    pub fn render_hierarchy<F>(&self, conn: &Connection, line: F) -> Result<String>
    where
        F: Fn(&R) -> String,
    {
        let mut out = String::new();
        self.for_children(conn, None, |row, depth| {
            out.push_str(&"--->".repeat(depth));
            out.push_str(&line(row));
            out.push('\n');
        })?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;
    use crate::models::{NewSection, SectionRow};
    use crate::tables::SECTIONS;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        migrations::run(&conn).unwrap();
        // Start from an empty section table.
        conn.execute("DELETE FROM tbl_group_section_permission", []).unwrap();
        conn.execute("DELETE FROM tbl_section", []).unwrap();
        conn
    }

    fn section(conn: &Connection, parent: Option<i64>, name: &str) -> i64 {
        SECTIONS
            .create(conn, NewSection { parent_id: parent, name: name.to_string() })
            .unwrap()
    }

    /// a
    /// ├── b
    /// │   └── d
    /// └── c
    /// e
    fn forest(conn: &Connection) -> [i64; 5] {
        let a = section(conn, None, "a");
        let b = section(conn, Some(a), "b");
        let c = section(conn, Some(a), "c");
        let d = section(conn, Some(b), "d");
        let e = section(conn, None, "e");
        [a, b, c, d, e]
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM tbl_section", [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn mismatched_insert_never_reaches_database() {
        let conn = conn();
        // Dropping the table means any executed statement would fail with a
        // SQLite error rather than a count mismatch.
        conn.execute("DROP TABLE tbl_section", []).unwrap();

        let err = SECTIONS.insert(&conn, vec![Value::Null]).unwrap_err();
        assert!(matches!(
            err,
            DbError::FieldCountMismatch { table: "tbl_section", expected: 2, got: 1 }
        ));
        assert!(err.to_string().contains("count of values does not match count of fields"));

        let err = SECTIONS
            .insert(&conn, vec![Value::Null, Value::Text("x".into()), Value::Integer(1)])
            .unwrap_err();
        assert!(matches!(err, DbError::FieldCountMismatch { got: 3, .. }));
    }

    #[test]
    fn insert_returns_new_id_and_get_all_keeps_insertion_order() {
        let conn = conn();
        let first = SECTIONS
            .insert(&conn, vec![Value::Null, Value::Text("first".into())])
            .unwrap();
        let second = section(&conn, Some(first), "second");
        assert!(second > first);

        let all = SECTIONS.get_all(&conn).unwrap();
        let names: Vec<&str> = all.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
        assert_eq!(all[1].parent_id, Some(first));
    }

    #[test]
    fn where_queries_and_existence() {
        let conn = conn();
        let [a, b, c, _, e] = forest(&conn);

        let children = SECTIONS.get_where(&conn, &Filter::parent(Some(a))).unwrap();
        assert_eq!(children.iter().map(|s| s.id).collect::<Vec<_>>(), [b, c]);

        let roots = SECTIONS.find_all_by_parent(&conn, None).unwrap();
        assert_eq!(roots.iter().map(|s| s.id).collect::<Vec<_>>(), [a, e]);

        let first = SECTIONS
            .get_first_where(&conn, &Filter::eq("name", "c".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(first.id, c);

        assert!(SECTIONS.has_id(&conn, e).unwrap());
        assert!(!SECTIONS.has_id(&conn, e + 100).unwrap());
        assert!(SECTIONS.find_by_id(&conn, e + 100).unwrap().is_none());
        assert!(SECTIONS.has_any_where(&conn, &Filter::eq("name", "d".to_string())).unwrap());
        assert!(!SECTIONS.has_any_where(&conn, &Filter::eq("name", "zz".to_string())).unwrap());
        assert_eq!(SECTIONS.count(&conn).unwrap(), 5);
    }

    #[test]
    fn delete_where_and_by_id() {
        let conn = conn();
        let [_, _, _, d, e] = forest(&conn);

        assert_eq!(SECTIONS.delete_by_id(&conn, e).unwrap(), 1);
        assert_eq!(SECTIONS.delete_by_id(&conn, e).unwrap(), 0);
        assert_eq!(SECTIONS.delete_where(&conn, &Filter::eq("name", "d".to_string())).unwrap(), 1);
        assert!(!SECTIONS.has_id(&conn, d).unwrap());
        assert_eq!(count(&conn), 3);
    }

    #[test]
    fn delete_recursive_removes_whole_subtree() {
        let conn = conn();
        let [a, _, _, _, e] = forest(&conn);

        assert_eq!(SECTIONS.delete_recursive(&conn, a).unwrap(), 4);

        let left: Vec<i64> = SECTIONS.get_all(&conn).unwrap().iter().map(|s| s.id).collect();
        assert_eq!(left, [e]);
    }

    #[test]
    fn delete_recursive_on_leaf_and_missing_id() {
        let conn = conn();
        let [_, _, _, d, _] = forest(&conn);

        assert_eq!(SECTIONS.delete_recursive(&conn, d).unwrap(), 1);
        assert_eq!(SECTIONS.delete_recursive(&conn, 9_999).unwrap(), 0);
        assert_eq!(count(&conn), 4);
    }

    #[test]
    fn for_children_is_preorder_with_depth() {
        let conn = conn();
        let [a, b, c, d, e] = forest(&conn);

        let mut seen = Vec::new();
        SECTIONS
            .for_children(&conn, None, |row, depth| seen.push((row.id, depth)))
            .unwrap();
        assert_eq!(seen, [(a, 0), (b, 1), (d, 2), (c, 1), (e, 0)]);

        let mut below_a = Vec::new();
        SECTIONS
            .for_children(&conn, Some(a), |row, depth| below_a.push((row.id, depth)))
            .unwrap();
        assert_eq!(below_a, [(b, 0), (d, 1), (c, 0)]);
    }

    #[test]
    fn depth_grows_by_one_along_every_path() {
        let conn = conn();
        let root = section(&conn, None, "root");
        let mut parent = root;
        for i in 0..6 {
            let sibling = section(&conn, Some(parent), &format!("s{}", i));
            let _ = section(&conn, Some(sibling), &format!("leaf{}", i));
            parent = section(&conn, Some(parent), &format!("n{}", i));
        }

        let nodes: Vec<(SectionRow, usize)> = SECTIONS.tree(&conn, None).unwrap();
        let depth_of = |id: i64| nodes.iter().find(|(s, _)| s.id == id).map(|(_, d)| *d);
        for (row, depth) in &nodes {
            match row.parent_id {
                None => assert_eq!(*depth, 0),
                Some(p) => assert_eq!(depth_of(p), Some(depth - 1)),
            }
        }
        assert_eq!(nodes.len(), 19);
    }

    #[test]
    fn for_parent_walks_to_root() {
        let conn = conn();
        let [a, b, _, d, _] = forest(&conn);

        let mut path = Vec::new();
        assert!(SECTIONS.for_parent(&conn, d, |row, depth| path.push((row.id, depth))).unwrap());
        assert_eq!(path, [(d, 0), (b, 1), (a, 2)]);

        let mut calls = 0;
        assert!(!SECTIONS.for_parent(&conn, 9_999, |_, _| calls += 1).unwrap());
        assert_eq!(calls, 0);
    }

    #[test]
    fn cycles_are_reported() {
        let conn = conn();
        let a = section(&conn, None, "a");
        let b = section(&conn, Some(a), "b");
        conn.execute("UPDATE tbl_section SET id_parent = ?1 WHERE id = ?2", [b, a]).unwrap();

        let err = SECTIONS.delete_recursive(&conn, a).unwrap_err();
        assert!(matches!(err, DbError::CycleDetected { id, .. } if id == a));

        let err = SECTIONS.for_children(&conn, Some(a), |_, _| {}).unwrap_err();
        assert!(matches!(err, DbError::CycleDetected { .. }));

        let err = SECTIONS.for_parent(&conn, b, |_, _| {}).unwrap_err();
        assert!(matches!(err, DbError::CycleDetected { id, .. } if id == b));
    }

    #[test]
    fn unknown_filter_column_fails_before_sql() {
        let conn = conn();
        let err = SECTIONS
            .delete_where(&conn, &Filter::eq("privileges", "1111".to_string()))
            .unwrap_err();
        assert!(matches!(err, DbError::UnknownColumn { table: "tbl_section", .. }));
    }

    #[test]
    fn insert_log_line_hides_password_hashes() {
        let line = describe_values(
            &["id_group", "username", "password_hash", "birth_date"],
            &[
                Value::Integer(2),
                Value::Text("ada".into()),
                Value::Text("$argon2id$v=19$secret".into()),
                Value::Null,
            ],
        );
        assert_eq!(line, "id_group=2, username=\"ada\", password_hash=<redacted>, birth_date=NULL");
        assert!(!line.contains("argon2"));
    }

    #[test]
    fn render_hierarchy_indents_per_level() {
        let conn = conn();
        forest(&conn);
        let text = SECTIONS.render_hierarchy(&conn, |s| s.name.clone()).unwrap();
        assert_eq!(text, "a\n--->b\n--->--->d\n--->c\ne\n");
    }
}
