use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Render rows as a console table for progress output.
pub fn terminal_table<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows).with(Style::ascii()).to_string()
}
