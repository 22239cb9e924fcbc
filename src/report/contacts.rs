use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use super::csv_io::{self, Table};
use crate::error::{ErrorCode, PipelineError, Result};

pub const NOT_FOUND: &str = "Not Found";
pub const OWNER_COLUMN: &str = "Owner";
pub const EMAIL_COLUMN: &str = "Email";

const GROUP_HEADER: &str = "AssignmentGroup";
const CONTACT_HEADER: &str = "Contact";
const EMAIL_HEADER: &str = "Email";

/// Index of the group column when no header names it
const FALLBACK_GROUP_COLUMN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

/// Assignment group to contact lookup
#[derive(Debug, Clone, Default)]
pub struct ContactBook {
    entries: HashMap<String, Contact>,
}

impl ContactBook {
    pub fn from_table(table: &Table) -> Result<Self> {
        let column = |name: &str| {
            table.column(name).ok_or_else(|| {
                PipelineError::validation_with_code(
                    ErrorCode::VALIDATION_MISSING_COLUMN,
                    format!(
                        "contact mapping needs columns {}, {}, {} (found: {})",
                        GROUP_HEADER,
                        CONTACT_HEADER,
                        EMAIL_HEADER,
                        table.headers.join(", ")
                    ),
                    Some(name.to_string()),
                )
            })
        };
        let group_col = column(GROUP_HEADER)?;
        let contact_col = column(CONTACT_HEADER)?;
        let email_col = column(EMAIL_HEADER)?;

        let cell = |row: &[String], i: usize| row.get(i).map(|v| v.trim().to_string()).unwrap_or_default();

        let mut entries = HashMap::new();
        for (index, row) in table.rows.iter().enumerate() {
            let group = cell(row, group_col);
            if group.is_empty() {
                warn!("Contact mapping row {} has no {}", index + 1, GROUP_HEADER);
                continue;
            }
            entries.insert(
                group,
                Contact {
                    name: cell(row, contact_col),
                    email: cell(row, email_col),
                },
            );
        }
        info!("Loaded {} contact mappings", entries.len());
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_table(&csv_io::read_table_file(path)?)
    }

    pub fn lookup(&self, group: &str) -> Option<&Contact> {
        self.entries.get(group.trim())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub found: usize,
    pub not_found: usize,
}

/// Column holding the assignment group: a header mentioning "assignment",
/// else the fourth column when its first values look like names
pub fn find_group_column(table: &Table) -> Option<usize> {
    if let Some(i) = table
        .headers
        .iter()
        .position(|h| h.contains(GROUP_HEADER) || h.to_lowercase().contains("assignment"))
    {
        return Some(i);
    }
    if table.headers.len() <= FALLBACK_GROUP_COLUMN {
        return None;
    }
    let looks_like_names = table
        .rows
        .iter()
        .take(3)
        .filter_map(|r| r.get(FALLBACK_GROUP_COLUMN))
        .any(|v| v.trim().chars().count() > 2);
    looks_like_names.then_some(FALLBACK_GROUP_COLUMN)
}

/// Rename the first two columns to Owner and Email and fill them from the
/// contact book
pub fn enrich(table: &mut Table, book: &ContactBook) -> Result<EnrichStats> {
    let group_col = find_group_column(table).ok_or_else(|| {
        PipelineError::validation_with_code(
            ErrorCode::VALIDATION_MISSING_COLUMN,
            format!(
                "no assignment group column (found: {})",
                table.headers.join(", ")
            ),
            Some(GROUP_HEADER.to_string()),
        )
    })?;
    info!(
        "Assignment group column is '{}' (index {})",
        table.headers[group_col], group_col
    );

    for (i, name) in [OWNER_COLUMN, EMAIL_COLUMN].into_iter().enumerate() {
        if let Some(header) = table.headers.get_mut(i) {
            debug!("Renaming column '{}' to '{}'", header, name);
            *header = name.to_string();
        }
    }

    let width = table.headers.len();
    let mut stats = EnrichStats::default();
    for row in &mut table.rows {
        if row.len() < width {
            row.resize(width, String::new());
        }
        let (owner, email) = match row.get(group_col).and_then(|g| book.lookup(g)) {
            Some(contact) => {
                stats.found += 1;
                (contact.name.clone(), contact.email.clone())
            }
            None => {
                stats.not_found += 1;
                (NOT_FOUND.to_string(), NOT_FOUND.to_string())
            }
        };
        if let Some(cell) = row.get_mut(0) {
            *cell = owner;
        }
        if let Some(cell) = row.get_mut(1) {
            *cell = email;
        }
    }
    info!(
        "Contact lookup: {} found, {} not found",
        stats.found, stats.not_found
    );
    Ok(stats)
}
