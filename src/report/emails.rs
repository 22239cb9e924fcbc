use super::record::Record;

/// Deduplicated recipient addresses in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailList {
    addresses: Vec<String>,
}

impl EmailList {
    /// Add an address unless an identical one is already present. Comparison
    /// is case-sensitive.
    pub fn push(&mut self, address: &str) -> bool {
        if self.addresses.iter().any(|a| a == address) {
            return false;
        }
        self.addresses.push(address.to_string());
        true
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn join(&self, separator: &str) -> String {
        self.addresses.join(separator)
    }
}

/// Split a cell on `,` and `;`, dropping blank parts
pub fn split_cell(cell: &str) -> impl Iterator<Item = &str> {
    cell.split([',', ';'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
}

/// Collect addresses from the given fields of every record.
///
/// `is_null` decides which values are placeholders such as `null`.
pub fn extract_emails<'a, I, F>(records: I, fields: &[String], is_null: F) -> EmailList
where
    I: IntoIterator<Item = &'a Record>,
    F: Fn(&str) -> bool,
{
    let mut list = EmailList::default();
    for record in records {
        for field in fields {
            if let Some(cell) = record.field(field) {
                for address in split_cell(cell).filter(|a| !is_null(a)) {
                    list.push(address);
                }
            }
        }
    }
    list
}
