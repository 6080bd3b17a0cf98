//! Optional removal of date/time-derived columns before model consumption.

use crate::domain::frame::Frame;
use tracing::info;

/// Date/time-derived columns of the grouped table.
pub const TEMPORAL_COLUMNS: [&str; 8] = [
    "date",
    "fecha",
    "hora_inicial",
    "hora_final",
    "dia",
    "mes",
    "anio",
    "dia_semana",
];

/// Identity when `keep_temporal`; otherwise drops whichever temporal columns are present.
pub fn filter(mut rows: Frame, keep_temporal: bool) -> Frame {
    if keep_temporal {
        info!("keeping temporal columns");
        return rows;
    }

    let dropped = rows.drop_columns(&TEMPORAL_COLUMNS);
    if dropped.is_empty() {
        info!("no temporal columns found to remove");
    } else {
        info!(
            "removed temporal columns {:?}, {} columns remain",
            dropped,
            rows.column_count()
        );
    }
    rows
}
