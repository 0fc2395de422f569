//! Row types, one per `tbl_*` table, plus the values for inserting each.
//! Distinct from the agora-types API models to keep the DB layer independent.

use agora_types::models::{Privileges, SectionPermissions};
use chrono::NaiveDate;
use rusqlite::Row;
use rusqlite::types::{Type, Value};

use crate::table::{NewRecord, Record, TreeRecord};

fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format("%Y-%m-%d").to_string())
}

// -- Sections --

#[derive(Debug, Clone, PartialEq)]
pub struct SectionRow {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
}

impl Record for SectionRow {
    const TABLE: &'static str = "tbl_section";
    const COLUMNS: &'static [&'static str] = &["id", "id_parent", "name"];
    const INSERT_FIELDS: &'static [&'static str] = &["id_parent", "name"];

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            name: row.get(2)?,
        })
    }
}

impl TreeRecord for SectionRow {
    fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }
}

pub struct NewSection {
    pub parent_id: Option<i64>,
    pub name: String,
}

impl NewRecord for NewSection {
    type Record = SectionRow;

    fn into_values(self) -> Vec<Value> {
        vec![self.parent_id.into(), self.name.into()]
    }
}

// -- Groups --

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub privileges: Privileges,
}

impl Record for GroupRow {
    const TABLE: &'static str = "tbl_group";
    const COLUMNS: &'static [&'static str] = &["id", "id_parent", "name", "privileges"];
    const INSERT_FIELDS: &'static [&'static str] = &["id_parent", "name", "privileges"];

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let raw: String = row.get(3)?;
        let privileges = raw
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

        Ok(Self {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            name: row.get(2)?,
            privileges,
        })
    }
}

impl TreeRecord for GroupRow {
    fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }
}

pub struct NewGroup {
    pub parent_id: Option<i64>,
    pub name: String,
    pub privileges: Privileges,
}

impl NewRecord for NewGroup {
    type Record = GroupRow;

    fn into_values(self) -> Vec<Value> {
        vec![
            self.parent_id.into(),
            self.name.into(),
            self.privileges.to_string().into(),
        ]
    }
}

// -- Users --

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub id: i64,
    pub group_id: i64,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub registration_date: NaiveDate,
    pub firstname: String,
    pub lastname: String,
    pub birth_date: Option<NaiveDate>,
}

impl Record for UserRow {
    const TABLE: &'static str = "tbl_user";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "id_group",
        "username",
        "password_hash",
        "email",
        "registration_date",
        "firstname",
        "lastname",
        "birth_date",
    ];
    const INSERT_FIELDS: &'static [&'static str] = &[
        "id_group",
        "username",
        "password_hash",
        "email",
        "registration_date",
        "firstname",
        "lastname",
        "birth_date",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            group_id: row.get(1)?,
            username: row.get(2)?,
            password_hash: row.get(3)?,
            email: row.get(4)?,
            registration_date: row.get(5)?,
            firstname: row.get(6)?,
            lastname: row.get(7)?,
            birth_date: row.get(8)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub group_id: i64,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub registration_date: NaiveDate,
    pub firstname: String,
    pub lastname: String,
    pub birth_date: Option<NaiveDate>,
}

impl NewRecord for NewUser {
    type Record = UserRow;

    fn into_values(self) -> Vec<Value> {
        vec![
            self.group_id.into(),
            self.username.into(),
            self.password_hash.into(),
            self.email.into(),
            date_value(self.registration_date),
            self.firstname.into(),
            self.lastname.into(),
            self.birth_date.map(date_value).unwrap_or(Value::Null),
        ]
    }
}

// -- Group/section permissions --

#[derive(Debug, Clone, PartialEq)]
pub struct PermissionRow {
    pub id: i64,
    pub group_id: i64,
    pub section_id: i64,
    pub permissions: SectionPermissions,
}

impl Record for PermissionRow {
    const TABLE: &'static str = "tbl_group_section_permission";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "id_group",
        "id_section",
        "can_view",
        "can_post",
        "can_create_thread",
        "can_delete_post",
        "can_delete_thread",
        "can_delete_section",
    ];
    const INSERT_FIELDS: &'static [&'static str] = &[
        "id_group",
        "id_section",
        "can_view",
        "can_post",
        "can_create_thread",
        "can_delete_post",
        "can_delete_thread",
        "can_delete_section",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            group_id: row.get(1)?,
            section_id: row.get(2)?,
            permissions: SectionPermissions {
                can_view: row.get(3)?,
                can_post: row.get(4)?,
                can_create_thread: row.get(5)?,
                can_delete_post: row.get(6)?,
                can_delete_thread: row.get(7)?,
                can_delete_section: row.get(8)?,
            },
        })
    }
}

pub struct NewPermission {
    pub group_id: i64,
    pub section_id: i64,
    pub permissions: SectionPermissions,
}

impl NewRecord for NewPermission {
    type Record = PermissionRow;

    fn into_values(self) -> Vec<Value> {
        let p = self.permissions;
        vec![
            self.group_id.into(),
            self.section_id.into(),
            p.can_view.into(),
            p.can_post.into(),
            p.can_create_thread.into(),
            p.can_delete_post.into(),
            p.can_delete_thread.into(),
            p.can_delete_section.into(),
        ]
    }
}

// -- Creation data --

#[derive(Debug, Clone, PartialEq)]
pub struct CreationDataRow {
    pub id: i64,
    pub creation_date: NaiveDate,
    pub author_id: i64,
}

impl Record for CreationDataRow {
    const TABLE: &'static str = "tbl_creation_data";
    const COLUMNS: &'static [&'static str] = &["id", "creation_date", "id_author"];
    const INSERT_FIELDS: &'static [&'static str] = &["creation_date", "id_author"];

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            creation_date: row.get(1)?,
            author_id: row.get(2)?,
        })
    }
}

pub struct NewCreationData {
    pub creation_date: NaiveDate,
    pub author_id: i64,
}

impl NewRecord for NewCreationData {
    type Record = CreationDataRow;

    fn into_values(self) -> Vec<Value> {
        vec![date_value(self.creation_date), self.author_id.into()]
    }
}

// -- Threads --

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRow {
    pub id: i64,
    pub creation_data_id: i64,
    pub section_id: i64,
    pub title: String,
}

impl Record for ThreadRow {
    const TABLE: &'static str = "tbl_thread";
    const COLUMNS: &'static [&'static str] = &["id", "id_creation_data", "id_section", "title"];
    const INSERT_FIELDS: &'static [&'static str] = &["id_creation_data", "id_section", "title"];

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            creation_data_id: row.get(1)?,
            section_id: row.get(2)?,
            title: row.get(3)?,
        })
    }
}

pub struct NewThread {
    pub creation_data_id: i64,
    pub section_id: i64,
    pub title: String,
}

impl NewRecord for NewThread {
    type Record = ThreadRow;

    fn into_values(self) -> Vec<Value> {
        vec![
            self.creation_data_id.into(),
            self.section_id.into(),
            self.title.into(),
        ]
    }
}

/// A thread joined with its creation data.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadView {
    pub id: i64,
    pub section_id: i64,
    pub title: String,
    pub creation_data_id: i64,
    pub creation_date: NaiveDate,
    pub author_id: i64,
}
