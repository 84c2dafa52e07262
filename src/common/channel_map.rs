//! Mapping from external (IEEE 802.11) channels to the TSCH (IEEE 802.15.4)
//! channels they overlap.
//!
//! The mapping is a CSV file with a header row naming the `ieee80211` and
//! `ieee802154` columns; the target list is dash-separated:
//!
//! ```text
//! ieee80211,ieee802154
//! 1,11-12-13-14
//! 6,15-20-25
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::error::ConfigError;

const SOURCE_COLUMN: &str = "ieee80211";
const TARGET_COLUMN: &str = "ieee802154";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMap {
    entries: BTreeMap<u32, Vec<u32>>,
}

impl ChannelMap {
    /// Load and parse the mapping file. An empty mapping is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse CSV content; `path` is only used for error reporting.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let csv_error = |line: usize, message: String| ConfigError::Csv {
            path: path.to_path_buf(),
            line,
            message,
        };

        let mut lines = content.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        let Some((header_index, header)) = lines.next() else {
            return Err(csv_error(1, "missing header row".to_string()));
        };
        let columns: Vec<&str> = split_row(header);
        let column = |name: &str| {
            columns
                .iter()
                .position(|c| *c == name)
                .ok_or_else(|| csv_error(header_index + 1, format!("missing column {:?}", name)))
        };
        let source_column = column(SOURCE_COLUMN)?;
        let target_column = column(TARGET_COLUMN)?;

        let mut entries = BTreeMap::new();
        for (index, row) in lines {
            let line = index + 1;
            let cells = split_row(row);
            let cell = |column: usize| {
                cells
                    .get(column)
                    .copied()
                    .ok_or_else(|| csv_error(line, format!("expected at least {} cells", column + 1)))
            };

            let source_cell = cell(source_column)?;
            let source: u32 = source_cell
                .parse()
                .map_err(|_| csv_error(line, format!("invalid channel {:?}", source_cell)))?;

            let targets = cell(target_column)?
                .split('-')
                .map(|t| {
                    let t = t.trim();
                    t.parse::<u32>().map_err(|_| csv_error(line, format!("invalid target channel {:?}", t)))
                })
                .collect::<Result<Vec<u32>, _>>()?;

            entries.insert(source, targets);
        }

        if entries.is_empty() {
            return Err(csv_error(header_index + 1, "mapping has no rows".to_string()));
        }

        Ok(Self { entries })
    }

    /// Target channels overlapped by `channel`, if mapped.
    pub fn targets(&self, channel: u32) -> Option<&[u32]> {
        self.entries.get(&channel).map(Vec::as_slice)
    }
}

fn split_row(row: &str) -> Vec<&str> {
    row.split(',').map(|c| c.trim().trim_matches('"')).collect()
}
