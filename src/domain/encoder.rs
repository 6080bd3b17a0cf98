//! Fixed-table ordinal encoding of categorical columns.

use crate::domain::frame::{Cell, Frame};
use tracing::{info, warn};

pub const DAY_OF_WEEK_COLUMN: &str = "dia_semana";

/// A closed categorical domain mapped to integer codes. Never fit from data.
#[derive(Debug, Clone, PartialEq)]
pub struct OrdinalMapping {
    table: Vec<(&'static str, i64)>,
}

impl OrdinalMapping {
    pub fn new(table: Vec<(&'static str, i64)>) -> Self {
        Self { table }
    }

    /// Monday = 0 … Sunday = 6. Spanish labels, with unaccented and English aliases.
    pub fn day_of_week() -> Self {
        Self::new(vec![
            ("Lunes", 0),
            ("Martes", 1),
            ("Miércoles", 2),
            ("Miercoles", 2),
            ("Jueves", 3),
            ("Viernes", 4),
            ("Sábado", 5),
            ("Sabado", 5),
            ("Domingo", 6),
            ("Monday", 0),
            ("Tuesday", 1),
            ("Wednesday", 2),
            ("Thursday", 3),
            ("Friday", 4),
            ("Saturday", 5),
            ("Sunday", 6),
        ])
    }

    pub fn code(&self, label: &str) -> Option<i64> {
        self.table
            .iter()
            .find(|(name, _)| *name == label)
            .map(|(_, code)| *code)
    }

    fn is_code(&self, value: f64) -> bool {
        value.fract() == 0.0 && self.table.iter().any(|(_, code)| *code as f64 == value)
    }

    /// Encode one cell. Codes already in the output domain pass through.
    pub fn encode_cell(&self, cell: &Cell) -> Cell {
        match cell {
            Cell::Text(label) => match self.code(label.trim()) {
                Some(code) => Cell::Number(code as f64),
                None => Cell::Missing,
            },
            Cell::Number(v) if self.is_code(*v) => Cell::Number(*v),
            _ => Cell::Missing,
        }
    }
}

/// Replace `column` values with their codes; unmapped values become missing.
///
/// An absent column is left alone with a warning.
pub fn encode(mut rows: Frame, column: &str, mapping: &OrdinalMapping) -> Frame {
    let Some(idx) = rows.column_index(column) else {
        warn!("column '{}' not found, skipping ordinal encoding", column);
        return rows;
    };

    let mut unmapped = 0usize;
    rows.map_column(idx, |cell| {
        let encoded = mapping.encode_cell(cell);
        if encoded.is_missing() && !cell.is_missing() {
            unmapped += 1;
        }
        encoded
    });

    if unmapped > 0 {
        warn!("{} unmapped values in '{}' set to missing", unmapped, column);
    }
    info!("ordinal encoding applied to '{}' ({} rows)", column, rows.len());
    rows
}
