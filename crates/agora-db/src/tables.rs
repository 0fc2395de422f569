//! The accessor registry and the per-table operations built on top of the
//! generic [`Table`] CRUD.

use agora_types::models::{Privileges, SectionPermissions};
use chrono::Utc;
use rusqlite::Connection;

use crate::error::{DbError, Result};
use crate::filter::Filter;
use crate::models::{
    CreationDataRow, GroupRow, NewCreationData, NewGroup, NewPermission, NewSection, NewThread,
    NewUser, PermissionRow, SectionRow, ThreadRow, UserRow,
};
use crate::table::{Record, Table};

pub const SECTIONS: Table<SectionRow> = Table::new();
pub const GROUPS: Table<GroupRow> = Table::new();
pub const USERS: Table<UserRow> = Table::new();
pub const GROUP_SECTION_PERMISSIONS: Table<PermissionRow> = Table::new();
pub const CREATION_DATA: Table<CreationDataRow> = Table::new();
pub const THREADS: Table<ThreadRow> = Table::new();

fn non_blank<'a>(what: &'static str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(DbError::EmptyField(what))
    } else {
        Ok(trimmed)
    }
}

// -- Sections --

impl Table<SectionRow> {
    pub fn create_section(&self, conn: &Connection, parent: Option<i64>, name: &str) -> Result<i64> {
        let name = non_blank("section name", name)?;
        self.check_parent(conn, parent)?;

        self.create(conn, NewSection {
            parent_id: parent,
            name: name.to_string(),
        })
    }

    /// `(id) name` per section, indented by depth.
    pub fn hierarchy_string(&self, conn: &Connection) -> Result<String> {
        self.render_hierarchy(conn, |s| format!("({}) {}", s.id, s.name))
    }
}

// -- Groups --

impl Table<GroupRow> {
    pub fn create_group(
        &self,
        conn: &Connection,
        parent: Option<i64>,
        name: &str,
        privileges: Privileges,
    ) -> Result<i64> {
        let name = non_blank("group name", name)?;
        self.check_parent(conn, parent)?;

        self.create(conn, NewGroup {
            parent_id: parent,
            name: name.to_string(),
            privileges,
        })
    }

    /// `(id) name [privileges]` per group, indented by depth.
    pub fn hierarchy_string(&self, conn: &Connection) -> Result<String> {
        self.render_hierarchy(conn, |g| format!("({}) {} [{}]", g.id, g.name, g.privileges))
    }
}

// -- Users --

impl Table<UserRow> {
    pub fn find_by_username(&self, conn: &Connection, username: &str) -> Result<Option<UserRow>> {
        self.get_first_where(conn, &Filter::eq("username", username.to_string()))
    }

    pub fn create_user(&self, conn: &Connection, user: NewUser) -> Result<i64> {
        non_blank("username", &user.username)?;
        if !GROUPS.has_id(conn, user.group_id)? {
            return Err(DbError::NotFound {
                table: GroupRow::TABLE,
                id: user.group_id,
            });
        }
        self.create(conn, user)
    }
}

// -- Group/section permissions --

impl Table<PermissionRow> {
    pub fn find_for(&self, conn: &Connection, group_id: i64, section_id: i64) -> Result<Option<PermissionRow>> {
        self.get_first_where(
            conn,
            &Filter::eq("id_group", group_id).and(Filter::eq("id_section", section_id)),
        )
    }

    /// Rows are never updated in place: any existing row for the pair is
    /// deleted and a fresh one inserted. Run inside a transaction.
    pub fn replace(
        &self,
        conn: &Connection,
        group_id: i64,
        section_id: i64,
        permissions: SectionPermissions,
    ) -> Result<i64> {
        self.delete_where(
            conn,
            &Filter::eq("id_group", group_id).and(Filter::eq("id_section", section_id)),
        )?;

        self.create(conn, NewPermission {
            group_id,
            section_id,
            permissions,
        })
    }
}

// -- Creation data --

impl Table<CreationDataRow> {
    /// Records today's date (UTC) and the author; returns the new row id.
    pub fn create_and_get_id(&self, conn: &Connection, author_id: i64) -> Result<i64> {
        self.create(conn, NewCreationData {
            creation_date: Utc::now().date_naive(),
            author_id,
        })
    }
}

// -- Threads --

impl Table<ThreadRow> {
    /// Inserts the creation data row and then the thread pointing at it.
    /// Run inside a transaction so neither row outlives a failure.
    pub fn create_with_creation_data(
        &self,
        conn: &Connection,
        section_id: i64,
        title: &str,
        author_id: i64,
    ) -> Result<i64> {
        let title = non_blank("thread title", title)?;
        if !SECTIONS.has_id(conn, section_id)? {
            return Err(DbError::NotFound {
                table: SectionRow::TABLE,
                id: section_id,
            });
        }

        let creation_data_id = CREATION_DATA.create_and_get_id(conn, author_id)?;
        self.create(conn, NewThread {
            creation_data_id,
            section_id,
            title: title.to_string(),
        })
    }

    pub fn find_by_section(&self, conn: &Connection, section_id: i64) -> Result<Vec<ThreadRow>> {
        self.get_where(conn, &Filter::eq("id_section", section_id))
    }

    /// Deletes the thread and its creation data row.
    pub fn delete_with_creation_data(&self, conn: &Connection, id: i64) -> Result<usize> {
        let Some(thread) = self.find_by_id(conn, id)? else {
            return Ok(0);
        };

        let mut deleted = self.delete_by_id(conn, id)?;
        deleted += CREATION_DATA.delete_by_id(conn, thread.creation_data_id)?;
        Ok(deleted)
    }
}
