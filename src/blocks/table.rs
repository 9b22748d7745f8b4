//! Table reconstruction from TABLE and CELL blocks.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Block, BlockGraph, BlockType, EntityType};

/// A reconstructed table: rows of cell text, top to bottom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Rows after the first (header) row.
    pub fn body(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(|r| r.as_slice())
    }
}

impl BlockGraph {
    /// Reconstruct every TABLE block, in insertion order.
    pub fn tables(&self) -> Vec<Table> {
        self.blocks_of_type(BlockType::Table)
            .map(|table| self.table_from_block(table))
            .collect()
    }

    /// Place each CELL child on a (row, column) grid.
    ///
    /// Explicit `RowIndex`/`ColumnIndex` win. Cells without them continue
    /// from the previous cell in relationship order, wrapping at the table
    /// width: the largest explicit column index, or with no explicit index
    /// at all the run of leading COLUMN_HEADER cells. Without either every
    /// cell lands on a single row.
    fn table_from_block(&self, table: &Block) -> Table {
        let cells: Vec<&Block> = self
            .children_of(table)
            .into_iter()
            .filter(|b| b.block_type == BlockType::Cell)
            .collect();
        let cell_count = cells.len();

        let width = match cells.iter().filter_map(|c| c.column_index).max() {
            Some(width) => width,
            None => header_run(&cells),
        };

        let mut grid: BTreeMap<u32, BTreeMap<u32, String>> = BTreeMap::new();
        let mut cursor: Option<(u32, u32)> = None;

        for cell in cells {
            let position = match (cell.row_index, cell.column_index) {
                (Some(row), Some(column)) => Some((row, column)),
                _ => next_position(cursor, width),
            };
            let Some(position) = position else {
                debug!("Dropping cell {} in table {}: grid position overflows", cell.id, table.id);
                continue;
            };
            cursor = Some(position);

            let text = self.text_of(cell).trim().to_string();
            grid.entry(position.0).or_default().insert(position.1, text);
        }

        let layout = column_layout(&grid, cell_count);
        let rows = grid
            .into_values()
            .map(|mut row| {
                layout
                    .iter()
                    .map(|column| row.remove(column).unwrap_or_default())
                    .collect()
            })
            .collect();

        Table {
            id: table.id.clone(),
            rows,
        }
    }
}

/// Number of leading cells marked as column headers.
fn header_run(cells: &[&Block]) -> u32 {
    let run = cells
        .iter()
        .take_while(|c| c.entity_types.contains(&EntityType::ColumnHeader))
        .count();
    u32::try_from(run).unwrap_or(u32::MAX)
}

/// Slot after `cursor`, or `None` when the index would overflow.
fn next_position(cursor: Option<(u32, u32)>, width: u32) -> Option<(u32, u32)> {
    match cursor {
        None => Some((1, 1)),
        Some((row, column)) if width > 0 && column >= width => Some((row.checked_add(1)?, 1)),
        Some((row, column)) => Some((row, column.checked_add(1)?)),
    }
}

/// Column indices each output row is built over.
///
/// Normally `1..=max` so missing cells come out blank. When the largest
/// index exceeds the number of cells the indices are sparse; only the
/// columns actually present are kept, in order.
fn column_layout(grid: &BTreeMap<u32, BTreeMap<u32, String>>, cell_count: usize) -> Vec<u32> {
    let present: BTreeSet<u32> = grid.values().flat_map(|row| row.keys().copied()).collect();
    let max = present.last().copied().unwrap_or(0);
    if usize::try_from(max).map_or(false, |max| max <= cell_count) {
        (1..=max).collect()
    } else {
        present.into_iter().collect()
    }
}
