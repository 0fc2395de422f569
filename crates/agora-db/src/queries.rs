use agora_types::models::{Privileges, SectionPermissions};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::Database;
use crate::error::{DbError, Result};
use crate::migrations::ADMIN_GROUP_ID;
use crate::models::{GroupRow, NewUser, SectionRow, ThreadView, UserRow};
use crate::table::Record;
use crate::tables::{GROUP_SECTION_PERMISSIONS, GROUPS, SECTIONS, THREADS, USERS};

impl Database {
    // -- Users --

    /// Creates a user. The very first user ever registered is placed in the
    /// administrators group regardless of `user.group_id`.
    /// Returns `(user_id, group_id)`.
    pub fn register_user(&self, mut user: NewUser) -> Result<(i64, i64)> {
        self.with_tx(|tx| {
            if USERS.count(tx)? == 0 {
                info!(username = %user.username, "First user registered, granting administrator group");
                user.group_id = ADMIN_GROUP_ID;
            }
            let group_id = user.group_id;
            let id = USERS.create_user(tx, user)?;
            Ok((id, group_id))
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| USERS.find_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| USERS.find_by_id(conn, id))
    }

    /// The user together with their group, or `None` when the user is gone.
    pub fn get_user_with_group(&self, user_id: i64) -> Result<Option<(UserRow, GroupRow)>> {
        self.with_conn(|conn| {
            let Some(user) = USERS.find_by_id(conn, user_id)? else {
                return Ok(None);
            };
            let group = GROUPS.find_by_id(conn, user.group_id)?.ok_or(DbError::NotFound {
                table: GroupRow::TABLE,
                id: user.group_id,
            })?;
            Ok(Some((user, group)))
        })
    }

    // -- Groups --

    pub fn create_group(&self, parent: Option<i64>, name: &str, privileges: Privileges) -> Result<i64> {
        self.with_conn(|conn| GROUPS.create_group(conn, parent, name, privileges))
    }

    pub fn get_group(&self, id: i64) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| GROUPS.find_by_id(conn, id))
    }

    pub fn group_tree(&self) -> Result<Vec<(GroupRow, usize)>> {
        self.with_conn(|conn| GROUPS.tree(conn, None))
    }

    pub fn group_hierarchy(&self) -> Result<String> {
        self.with_conn(|conn| GROUPS.hierarchy_string(conn))
    }

    /// Deletes the group and every group below it. Fails, leaving all groups
    /// in place, if any of them still has members.
    pub fn delete_group_tree(&self, id: i64) -> Result<usize> {
        self.with_tx(|tx| GROUPS.delete_recursive(tx, id))
    }

    // -- Sections --

    pub fn create_section(&self, parent: Option<i64>, name: &str) -> Result<i64> {
        self.with_conn(|conn| SECTIONS.create_section(conn, parent, name))
    }

    pub fn get_section(&self, id: i64) -> Result<Option<SectionRow>> {
        self.with_conn(|conn| SECTIONS.find_by_id(conn, id))
    }

    pub fn section_tree(&self) -> Result<Vec<(SectionRow, usize)>> {
        self.with_conn(|conn| SECTIONS.tree(conn, None))
    }

    pub fn section_hierarchy(&self) -> Result<String> {
        self.with_conn(|conn| SECTIONS.hierarchy_string(conn))
    }

    /// The section followed by its ancestors up to the root, or `None` when
    /// the section does not exist.
    pub fn section_path(&self, id: i64) -> Result<Option<Vec<SectionRow>>> {
        self.with_conn(|conn| {
            let mut path = Vec::new();
            let found = SECTIONS.for_parent(conn, id, |row, _| path.push(row.clone()))?;
            Ok(found.then_some(path))
        })
    }

    /// Deletes the section subtree together with the threads (and their
    /// creation data) posted anywhere in it, all in one transaction.
    pub fn delete_section_tree(&self, id: i64) -> Result<usize> {
        self.with_tx(|tx| {
            let mut section_ids = vec![id];
            SECTIONS.for_children(tx, Some(id), |row, _| section_ids.push(row.id))?;

            let mut threads = 0;
            for section_id in &section_ids {
                for thread in THREADS.find_by_section(tx, *section_id)? {
                    THREADS.delete_with_creation_data(tx, thread.id)?;
                    threads += 1;
                }
            }

            let sections = SECTIONS.delete_recursive(tx, id)?;
            debug!(root = id, sections, threads, "Deleted section tree");
            Ok(sections)
        })
    }

    // -- Permissions --

    pub fn get_permissions(&self, group_id: i64, section_id: i64) -> Result<Option<SectionPermissions>> {
        self.with_conn(|conn| {
            Ok(GROUP_SECTION_PERMISSIONS
                .find_for(conn, group_id, section_id)?
                .map(|row| row.permissions))
        })
    }

    pub fn set_permissions(&self, group_id: i64, section_id: i64, permissions: SectionPermissions) -> Result<i64> {
        self.with_tx(|tx| {
            if !GROUPS.has_id(tx, group_id)? {
                return Err(DbError::NotFound { table: GroupRow::TABLE, id: group_id });
            }
            if !SECTIONS.has_id(tx, section_id)? {
                return Err(DbError::NotFound { table: SectionRow::TABLE, id: section_id });
            }
            GROUP_SECTION_PERMISSIONS.replace(tx, group_id, section_id, permissions)
        })
    }

    /// Permissions of `group_id` in `section_id` as stored: the row of the
    /// nearest section on the way up to the root wins. A section with no row
    /// on its path grants nothing. `None` when the section does not exist.
    pub fn inherited_permissions(&self, group_id: i64, section_id: i64) -> Result<Option<SectionPermissions>> {
        self.with_conn(|conn| {
            let mut path = Vec::new();
            if !SECTIONS.for_parent(conn, section_id, |row, _| path.push(row.id))? {
                return Ok(None);
            }

            for id in path {
                if let Some(row) = GROUP_SECTION_PERMISSIONS.find_for(conn, group_id, id)? {
                    return Ok(Some(row.permissions));
                }
            }
            Ok(Some(SectionPermissions::default()))
        })
    }

    // -- Threads --

    /// Thread and creation data are written together or not at all.
    pub fn create_thread(&self, section_id: i64, title: &str, author_id: i64) -> Result<i64> {
        self.with_tx(|tx| THREADS.create_with_creation_data(tx, section_id, title, author_id))
    }

    pub fn get_thread(&self, id: i64) -> Result<Option<ThreadView>> {
        self.with_conn(|conn| query_thread(conn, id))
    }

    pub fn get_threads(&self, section_id: i64) -> Result<Vec<ThreadView>> {
        self.with_conn(|conn| query_threads(conn, section_id))
    }

    pub fn delete_thread(&self, id: i64) -> Result<usize> {
        self.with_tx(|tx| THREADS.delete_with_creation_data(tx, id))
    }
}

const THREAD_VIEW_SELECT: &str = "SELECT t.id, t.id_section, t.title, t.id_creation_data, c.creation_date, c.id_author
     FROM tbl_thread t
     JOIN tbl_creation_data c ON t.id_creation_data = c.id";

fn thread_view(row: &rusqlite::Row<'_>) -> rusqlite::Result<ThreadView> {
    Ok(ThreadView {
        id: row.get(0)?,
        section_id: row.get(1)?,
        title: row.get(2)?,
        creation_data_id: row.get(3)?,
        creation_date: row.get(4)?,
        author_id: row.get(5)?,
    })
}

fn query_thread(conn: &Connection, id: i64) -> Result<Option<ThreadView>> {
    let sql = format!("{} WHERE t.id = ?1", THREAD_VIEW_SELECT);
    let row = conn.query_row(&sql, [id], thread_view).optional()?;
    Ok(row)
}

fn query_threads(conn: &Connection, section_id: i64) -> Result<Vec<ThreadView>> {
    // JOIN creation data so the listing is a single query
    let sql = format!("{} WHERE t.id_section = ?1 ORDER BY t.id", THREAD_VIEW_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([section_id], thread_view)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::{GENERAL_SECTION_ID, MEMBER_GROUP_ID};
    use crate::tables::CREATION_DATA;
    use chrono::NaiveDate;

    fn new_user(name: &str, group_id: i64) -> NewUser {
        NewUser {
            group_id,
            username: name.to_string(),
            password_hash: "hash".to_string(),
            email: format!("{}@example.com", name),
            registration_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            firstname: String::new(),
            lastname: String::new(),
            birth_date: None,
        }
    }

    #[test]
    fn first_user_becomes_admin() {
        let db = Database::open_in_memory().unwrap();

        let (first, first_group) = db.register_user(new_user("root", MEMBER_GROUP_ID)).unwrap();
        let (second, second_group) = db.register_user(new_user("bob", MEMBER_GROUP_ID)).unwrap();

        assert_eq!(first_group, ADMIN_GROUP_ID);
        assert_eq!(second_group, MEMBER_GROUP_ID);
        assert_eq!(db.get_user_by_id(first).unwrap().unwrap().group_id, ADMIN_GROUP_ID);

        let (user, group) = db.get_user_with_group(second).unwrap().unwrap();
        assert_eq!(user.username, "bob");
        assert_eq!(group.privileges, Privileges::NONE);
        assert!(db.get_user_with_group(999).unwrap().is_none());
    }

    #[test]
    fn section_tree_delete_removes_threads_and_creation_data() {
        let db = Database::open_in_memory().unwrap();
        let (author, _) = db.register_user(new_user("ada", MEMBER_GROUP_ID)).unwrap();

        let news = db.create_section(Some(GENERAL_SECTION_ID), "News").unwrap();
        let old = db.create_section(Some(news), "Archive").unwrap();
        let other = db.create_section(None, "Other").unwrap();
        db.create_thread(news, "Launch", author).unwrap();
        db.create_thread(old, "Old launch", author).unwrap();
        let kept = db.create_thread(other, "Unrelated", author).unwrap();

        assert_eq!(db.delete_section_tree(GENERAL_SECTION_ID).unwrap(), 3);

        let remaining: Vec<i64> = db.section_tree().unwrap().iter().map(|(s, _)| s.id).collect();
        assert_eq!(remaining, [other]);
        assert_eq!(db.get_threads(other).unwrap().len(), 1);
        assert!(db.get_thread(kept).unwrap().is_some());
        assert_eq!(db.with_conn(|conn| CREATION_DATA.count(conn)).unwrap(), 1);
    }

    #[test]
    fn group_tree_delete_is_atomic() {
        let db = Database::open_in_memory().unwrap();
        db.register_user(new_user("root", MEMBER_GROUP_ID)).unwrap();

        let parent = db.create_group(None, "Clubs", Privileges::NONE).unwrap();
        let child = db.create_group(Some(parent), "Chess", Privileges::NONE).unwrap();
        let grandchild = db.create_group(Some(child), "Blitz", Privileges::NONE).unwrap();
        db.register_user(new_user("member", child)).unwrap();

        // "Blitz" is deleted before "Chess" fails on its member; the rollback
        // must bring it back.
        let err = db.delete_group_tree(parent).unwrap_err();
        assert!(err.is_constraint_violation());
        for id in [parent, child, grandchild] {
            assert!(db.get_group(id).unwrap().is_some(), "group {} should survive", id);
        }

        assert_eq!(db.delete_group_tree(grandchild).unwrap(), 1);
        assert!(db.get_group(grandchild).unwrap().is_none());
    }

    #[test]
    fn section_path_lists_ancestors() {
        let db = Database::open_in_memory().unwrap();
        let a = db.create_section(Some(GENERAL_SECTION_ID), "A").unwrap();
        let b = db.create_section(Some(a), "B").unwrap();

        let path: Vec<i64> = db.section_path(b).unwrap().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(path, [b, a, GENERAL_SECTION_ID]);
        assert!(db.section_path(12345).unwrap().is_none());
    }

    #[test]
    fn permissions_inherit_from_nearest_ancestor() {
        let db = Database::open_in_memory().unwrap();
        let child = db.create_section(Some(GENERAL_SECTION_ID), "Child").unwrap();
        let grandchild = db.create_section(Some(child), "Grandchild").unwrap();
        let detached = db.create_section(None, "Detached").unwrap();

        // Inherited from General.
        let perms = db.inherited_permissions(MEMBER_GROUP_ID, grandchild).unwrap().unwrap();
        assert!(perms.can_view && perms.can_create_thread);

        // An explicit row on the child overrides General for its subtree.
        let read_only = SectionPermissions {
            can_view: true,
            ..Default::default()
        };
        db.set_permissions(MEMBER_GROUP_ID, child, read_only).unwrap();
        assert_eq!(db.inherited_permissions(MEMBER_GROUP_ID, grandchild).unwrap(), Some(read_only));
        assert_eq!(db.get_permissions(MEMBER_GROUP_ID, child).unwrap(), Some(read_only));
        assert_eq!(db.get_permissions(MEMBER_GROUP_ID, grandchild).unwrap(), None);

        assert_eq!(
            db.inherited_permissions(MEMBER_GROUP_ID, detached).unwrap(),
            Some(SectionPermissions::default())
        );
        assert_eq!(db.inherited_permissions(MEMBER_GROUP_ID, 999).unwrap(), None);
    }

    #[test]
    fn set_permissions_checks_both_ends() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.set_permissions(42, GENERAL_SECTION_ID, SectionPermissions::ALL).unwrap_err(),
            DbError::NotFound { table: "tbl_group", id: 42 }
        ));
        assert!(matches!(
            db.set_permissions(MEMBER_GROUP_ID, 42, SectionPermissions::ALL).unwrap_err(),
            DbError::NotFound { table: "tbl_section", id: 42 }
        ));
    }

    #[test]
    fn thread_views_join_creation_data() {
        let db = Database::open_in_memory().unwrap();
        let (author, _) = db.register_user(new_user("ada", MEMBER_GROUP_ID)).unwrap();
        let first = db.create_thread(GENERAL_SECTION_ID, "First", author).unwrap();
        let second = db.create_thread(GENERAL_SECTION_ID, "Second", author).unwrap();

        let views = db.get_threads(GENERAL_SECTION_ID).unwrap();
        assert_eq!(views.iter().map(|t| t.id).collect::<Vec<_>>(), [first, second]);
        assert!(views.iter().all(|t| t.author_id == author));

        let view = db.get_thread(second).unwrap().unwrap();
        assert_eq!(view.title, "Second");
        assert_eq!(view.section_id, GENERAL_SECTION_ID);

        assert_eq!(db.delete_thread(first).unwrap(), 2);
        assert!(db.get_thread(first).unwrap().is_none());
    }

    #[test]
    fn failed_thread_insert_leaves_no_creation_data() {
        let db = Database::open_in_memory().unwrap();
        // Author 77 does not exist: the creation data insert fails on its
        // foreign key, nothing is left behind.
        assert!(db.create_thread(GENERAL_SECTION_ID, "Ghost", 77).is_err());
        assert_eq!(db.with_conn(|conn| CREATION_DATA.count(conn)).unwrap(), 0);
        assert!(db.get_threads(GENERAL_SECTION_ID).unwrap().is_empty());
    }
}
