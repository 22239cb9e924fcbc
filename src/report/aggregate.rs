use std::fmt;

use super::record::Record;

/// Severity classes, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }

    /// Case-insensitive match; the ticketing system's `"2 - Medium"` form is
    /// accepted too
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let name = match raw.split_once(" - ") {
            Some((prefix, name)) if prefix.trim().chars().all(|c| c.is_ascii_digit()) => name,
            _ => raw,
        };
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(name.trim()))
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Medium and above make a row stand out
    pub fn is_elevated(self) -> bool {
        self >= Severity::Medium
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateRow {
    pub owner: String,
    counts: [usize; 4],
    /// Includes records with an unrecognized severity
    pub total: usize,
}

impl AggregateRow {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ..Default::default()
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.counts[severity.index()]
    }

    pub fn add(&mut self, severity: Option<Severity>) {
        if let Some(s) = severity {
            self.counts[s.index()] += 1;
        }
        self.total += 1;
    }

    pub fn has_elevated(&self) -> bool {
        Severity::ALL
            .into_iter()
            .any(|s| s.is_elevated() && self.count(s) > 0)
    }
}

/// Per-owner counts in first-seen order plus the grand total
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateTable {
    pub rows: Vec<AggregateRow>,
    pub totals: AggregateRow,
}

impl AggregateTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn aggregate<'a, I>(records: I) -> AggregateTable
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut rows: Vec<AggregateRow> = Vec::new();
    let mut totals = AggregateRow::new("Total");

    for record in records {
        let severity = Severity::parse(&record.severity);
        let position = match rows.iter().position(|r| r.owner == record.owner) {
            Some(i) => i,
            None => {
                rows.push(AggregateRow::new(record.owner.clone()));
                rows.len() - 1
            }
        };
        rows[position].add(severity);
        totals.add(severity);
    }

    AggregateTable { rows, totals }
}
