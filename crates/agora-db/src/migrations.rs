use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

/// Root group seeded by the first migration; holds every privilege.
pub const ADMIN_GROUP_ID: i64 = 1;
/// Default group for registered users.
pub const MEMBER_GROUP_ID: i64 = 2;
/// Root section seeded by the first migration.
pub const GENERAL_SECTION_ID: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE tbl_section (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                id_parent   INTEGER REFERENCES tbl_section(id),
                name        TEXT NOT NULL
            );

            CREATE INDEX idx_section_parent ON tbl_section(id_parent);

            CREATE TABLE tbl_group (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                id_parent   INTEGER REFERENCES tbl_group(id),
                name        TEXT NOT NULL,
                privileges  TEXT NOT NULL DEFAULT '0000'
            );

            CREATE INDEX idx_group_parent ON tbl_group(id_parent);

            CREATE TABLE tbl_user (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                id_group            INTEGER NOT NULL REFERENCES tbl_group(id),
                username            TEXT NOT NULL UNIQUE,
                password_hash       TEXT NOT NULL,
                email               TEXT NOT NULL,
                registration_date   TEXT NOT NULL,
                firstname           TEXT NOT NULL DEFAULT '',
                lastname            TEXT NOT NULL DEFAULT '',
                birth_date          TEXT
            );

            CREATE TABLE tbl_group_section_permission (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                id_group            INTEGER NOT NULL REFERENCES tbl_group(id) ON DELETE CASCADE,
                id_section          INTEGER NOT NULL REFERENCES tbl_section(id) ON DELETE CASCADE,
                can_view            INTEGER NOT NULL DEFAULT 0,
                can_post            INTEGER NOT NULL DEFAULT 0,
                can_create_thread   INTEGER NOT NULL DEFAULT 0,
                can_delete_post     INTEGER NOT NULL DEFAULT 0,
                can_delete_thread   INTEGER NOT NULL DEFAULT 0,
                can_delete_section  INTEGER NOT NULL DEFAULT 0,
                UNIQUE(id_group, id_section)
            );

            CREATE TABLE tbl_creation_data (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                creation_date   TEXT NOT NULL,
                id_author       INTEGER NOT NULL REFERENCES tbl_user(id)
            );

            CREATE TABLE tbl_thread (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                id_creation_data    INTEGER NOT NULL REFERENCES tbl_creation_data(id),
                id_section          INTEGER NOT NULL REFERENCES tbl_section(id),
                title               TEXT NOT NULL
            );

            CREATE INDEX idx_thread_section ON tbl_thread(id_section);

            -- Seed the group tree and the default section
            INSERT INTO tbl_group (id, id_parent, name, privileges)
                VALUES (1, NULL, 'Administrators', '1111');
            INSERT INTO tbl_group (id, id_parent, name, privileges)
                VALUES (2, 1, 'Members', '0000');
            INSERT INTO tbl_section (id, id_parent, name)
                VALUES (1, NULL, 'General');
            INSERT INTO tbl_group_section_permission
                (id_group, id_section, can_view, can_post, can_create_thread)
                VALUES (2, 1, 1, 1, 1);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
