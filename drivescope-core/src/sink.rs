// Append-only tabular output

use crate::data::Database;
use crate::error::{AuditError, Result};
use crate::model::{Drive, Node};
use crate::roles::RoleColumns;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

pub const FILES_SHEET: &str = "Files";

pub const FILES_HEADER: [&str; 17] = [
    "Drive",
    "Path",
    "Name",
    "Type",
    "Depth",
    "Creator",
    "Created",
    "Modified",
    "Size (bytes)",
    "Organizers",
    "File Organizers",
    "Writers",
    "Editors",
    "Commenters",
    "Readers",
    "Sharing",
    "URL",
];

/// The header occupies row 1.
const FIRST_DATA_ROW: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// Identity of the row within its sheet; a key is written at most once.
    pub key: String,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendReport {
    /// Row number of the first row written, or where it would have gone.
    pub start_row: u64,
    pub written: usize,
    /// Rows whose key the sheet already had.
    pub skipped: usize,
}

pub trait ResultSink {
    /// Drop the sheet with all its rows and create it again with `header`.
    fn recreate_sheet(&self, name: &str, header: &[&str]) -> Result<()>;

    fn has_sheet(&self, name: &str) -> Result<bool>;

    /// Row number the next appended row gets.
    fn next_row(&self, name: &str) -> Result<u64>;

    fn append_rows(&self, name: &str, rows: &[SheetRow]) -> Result<AppendReport>;

    /// Header followed by every row, in row order.
    fn read_sheet(&self, name: &str) -> Result<Vec<Vec<String>>>;
}

/// Drop `name` with its rows and create it again, on a caller's connection or
/// transaction.
pub(crate) fn reset_sheet(conn: &Connection, name: &str, header: &[&str]) -> Result<()> {
    conn.execute("DELETE FROM sheet_rows WHERE sheet = ?1", params![name])?;
    conn.execute("DELETE FROM sheets WHERE name = ?1", params![name])?;
    conn.execute(
        "INSERT INTO sheets (name, header, created_at) VALUES (?1, ?2, ?3)",
        params![name, serde_json::to_string(header)?, Utc::now().timestamp()],
    )?;
    debug!("Recreated sheet {} with {} columns", name, header.len());
    Ok(())
}

impl ResultSink for Database {
    fn recreate_sheet(&self, name: &str, header: &[&str]) -> Result<()> {
        let tx = self.get_connection().unchecked_transaction()?;
        reset_sheet(&tx, name, header)?;
        tx.commit()?;
        Ok(())
    }

    fn has_sheet(&self, name: &str) -> Result<bool> {
        let found: Option<i64> = self
            .get_connection()
            .query_row(
                "SELECT 1 FROM sheets WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn next_row(&self, name: &str) -> Result<u64> {
        if !self.has_sheet(name)? {
            return Err(missing_sheet(name));
        }
        let last: Option<i64> = self.get_connection().query_row(
            "SELECT MAX(row_number) FROM sheet_rows WHERE sheet = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(last.map_or(FIRST_DATA_ROW, |row| row as u64 + 1))
    }

    fn append_rows(&self, name: &str, rows: &[SheetRow]) -> Result<AppendReport> {
        let start_row = self.next_row(name)?;
        let tx = self.get_connection().unchecked_transaction()?;
        let mut row_number = start_row;
        let mut written = 0;

        {
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO sheet_rows (sheet, row_number, row_key, cells)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in rows {
                let cells = serde_json::to_string(&row.cells)?;
                if insert.execute(params![name, row_number as i64, &row.key, cells])? > 0 {
                    row_number += 1;
                    written += 1;
                }
            }
        }
        tx.commit()?;

        let skipped = rows.len() - written;
        if skipped > 0 {
            debug!("Sheet {}: skipped {} rows already present", name, skipped);
        }
        Ok(AppendReport {
            start_row,
            written,
            skipped,
        })
    }

    fn read_sheet(&self, name: &str) -> Result<Vec<Vec<String>>> {
        let conn = self.get_connection();
        let header: Option<String> = conn
            .query_row(
                "SELECT header FROM sheets WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        let Some(header) = header else {
            return Err(missing_sheet(name));
        };

        let mut table = vec![serde_json::from_str::<Vec<String>>(&header)?];
        let mut stmt =
            conn.prepare("SELECT cells FROM sheet_rows WHERE sheet = ?1 ORDER BY row_number")?;
        let rows = stmt
            .query_map(params![name], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for cells in rows {
            table.push(serde_json::from_str(&cells)?);
        }
        Ok(table)
    }
}

fn missing_sheet(name: &str) -> AuditError {
    AuditError::Setup(format!("sheet '{}' does not exist", name))
}

/// Sheet row for one walked node, keyed by drive, parent and node id.
pub fn node_row(drive: &Drive, node: &Node) -> SheetRow {
    let roles = &node.roles;
    SheetRow {
        key: format!("{}:{}/{}", drive.id, node.parent_id, node.id),
        cells: vec![
            drive.name.clone(),
            node.path.clone(),
            node.name.clone(),
            node.kind.as_str().to_string(),
            node.depth.to_string(),
            node.creator.clone().unwrap_or_default(),
            node.created_at.clone().unwrap_or_default(),
            node.modified_at.clone().unwrap_or_default(),
            node.size_bytes.map(|s| s.to_string()).unwrap_or_default(),
            RoleColumns::render(&roles.organizers),
            RoleColumns::render(&roles.file_organizers),
            RoleColumns::render(&roles.writers),
            roles.render_editors(),
            RoleColumns::render(&roles.commenters),
            RoleColumns::render(&roles.readers),
            node.sharing.to_string(),
            node.url.clone().unwrap_or_default(),
        ],
    }
}
