use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Color, ExcelDateTime, Format, Workbook, Worksheet};
use tracing::info;

use crate::{Error, Result};

/// Excel number formats used by the exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    CurrencyEur,
    CurrencyUsd,
    Date,
}

impl NumberFormat {
    pub fn code(self) -> &'static str {
        match self {
            NumberFormat::CurrencyEur => "#,##0.00_-\"€\"",
            NumberFormat::CurrencyUsd => "\"$\"#,##0.00_-",
            NumberFormat::Date => "dd.mm.yyyy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontColor {
    Red,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
    /// A formula including the leading `=`.
    Formula(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cell {
    value: CellValue,
    number_format: Option<NumberFormat>,
    font_color: Option<FontColor>,
}

/// An in-memory worksheet.
///
/// Rows are 1-based and columns 0-based, the way the row numbers show up in
/// formulas like `=E2*F2`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    cells: BTreeMap<(u32, u16), Cell>,
    autosize: BTreeSet<u16>,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cell(&mut self, col: u16, row: u32, value: CellValue) {
        self.cells
            .entry((row, col))
            .and_modify(|cell| cell.value = value.clone())
            .or_insert(Cell {
                value,
                number_format: None,
                font_color: None,
            });
    }

    pub fn set_column_autosize(&mut self, col: u16) {
        self.autosize.insert(col);
    }

    /// Format an existing cell. Formatting an empty cell is a no-op.
    pub fn set_number_format(&mut self, col: u16, row: u32, format: NumberFormat) {
        if let Some(cell) = self.cells.get_mut(&(row, col)) {
            cell.number_format = Some(format);
        }
    }

    pub fn set_font_color(&mut self, col: u16, row: u32, color: FontColor) {
        if let Some(cell) = self.cells.get_mut(&(row, col)) {
            cell.font_color = Some(color);
        }
    }

    pub fn cell(&self, col: u16, row: u32) -> Option<&CellValue> {
        self.cells.get(&(row, col)).map(|cell| &cell.value)
    }

    pub fn number_format(&self, col: u16, row: u32) -> Option<NumberFormat> {
        self.cells.get(&(row, col)).and_then(|cell| cell.number_format)
    }

    pub fn font_color(&self, col: u16, row: u32) -> Option<FontColor> {
        self.cells.get(&(row, col)).and_then(|cell| cell.font_color)
    }

    /// Highest row holding a value, 0 for an empty sheet.
    pub fn last_row(&self) -> u32 {
        self.cells.keys().map(|(row, _)| *row).max().unwrap_or(0)
    }

    /// Write the sheet as an `.xlsx` workbook.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        for (&(row, col), cell) in &self.cells {
            write_cell(worksheet, row.saturating_sub(1), col, cell)?;
        }
        if !self.autosize.is_empty() {
            worksheet.autofit();
        }
        workbook.save(path)?;

        info!(path = %path.display(), rows = self.last_row(), "saved spreadsheet");
        Ok(())
    }
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<()> {
    let mut format = Format::new();
    if let Some(number_format) = cell.number_format {
        format = format.set_num_format(number_format.code());
    }
    if let Some(FontColor::Red) = cell.font_color {
        format = format.set_font_color(Color::Red);
    }

    match &cell.value {
        CellValue::Text(text) => {
            worksheet.write_string_with_format(row, col, text, &format)?;
        }
        CellValue::Number(number) => {
            let number = number
                .to_f64()
                .ok_or_else(|| Error::InvalidNumber(number.to_string()))?;
            worksheet.write_number_with_format(row, col, number, &format)?;
        }
        CellValue::Date(date) => {
            let date = ExcelDateTime::from_ymd(
                date.year() as u16,
                date.month() as u8,
                date.day() as u8,
            )?;
            worksheet.write_datetime_with_format(row, col, &date, &format)?;
        }
        CellValue::Formula(formula) => {
            worksheet.write_formula_with_format(row, col, formula.as_str(), &format)?;
        }
    }
    Ok(())
}

/// Spreadsheet column name for a 0-based index (`0` → `A`, `26` → `AA`).
pub fn column_letter(col: u16) -> String {
    let mut n = u32::from(col) + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push(char::from(b'A' + rem));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}
