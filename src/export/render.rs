use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::sheet::{column_letter, CellValue, FontColor, NumberFormat, Sheet};
use crate::normalize::{Currency, Money};

/// Conditional styling applied per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleRule {
    RedWhenNegative,
}

/// One column of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub header: &'static str,
    /// Number format for cells that don't bring their own.
    pub format: Option<NumberFormat>,
    pub style: Option<StyleRule>,
}

impl ColumnSpec {
    pub const fn new(header: &'static str) -> Self {
        Self {
            header,
            format: None,
            style: None,
        }
    }

    pub const fn with_format(mut self, format: NumberFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub const fn with_style(mut self, style: StyleRule) -> Self {
        self.style = Some(style);
        self
    }
}

/// A typed cell of an [`ExportRow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Text(String),
    Number(Decimal),
    /// Rendered as a number in the currency's format.
    Money(Money),
    Date(NaiveDate),
    /// Product of two cells of the same row, in the given currency's format.
    RowProduct {
        left: u16,
        right: u16,
        currency: Currency,
    },
}

impl Field {
    pub fn text(value: impl Into<String>) -> Self {
        Field::Text(value.into())
    }
}

fn currency_format(currency: Currency) -> NumberFormat {
    match currency {
        Currency::Eur => NumberFormat::CurrencyEur,
        Currency::Usd => NumberFormat::CurrencyUsd,
    }
}

/// A normalized row, one field per column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow(pub Vec<Field>);

/// How consecutive row groups are separated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSpacing {
    Contiguous,
    BlankRow,
}

/// Lay out a header row followed by `groups` of rows.
pub fn render(columns: &[ColumnSpec], groups: &[Vec<ExportRow>], spacing: GroupSpacing) -> Sheet {
    let mut sheet = Sheet::new();
    for (col, spec) in (0u16..).zip(columns) {
        sheet.set_cell(col, 1, CellValue::Text(spec.header.to_string()));
        sheet.set_column_autosize(col);
    }

    let mut row = 2u32;
    for group in groups {
        for export_row in group {
            for ((col, spec), field) in (0u16..).zip(columns).zip(&export_row.0) {
                write_field(&mut sheet, col, row, spec, field);
            }
            row += 1;
        }
        if spacing == GroupSpacing::BlankRow {
            row += 1;
        }
    }
    sheet
}

fn write_field(sheet: &mut Sheet, col: u16, row: u32, spec: &ColumnSpec, field: &Field) {
    let (value, own_format, negative) = match field {
        Field::Text(text) => (CellValue::Text(text.clone()), None, false),
        Field::Number(number) => (
            CellValue::Number(*number),
            None,
            number.is_sign_negative() && !number.is_zero(),
        ),
        Field::Money(money) => (
            CellValue::Number(money.amount),
            Some(currency_format(money.currency)),
            money.amount.is_sign_negative() && !money.amount.is_zero(),
        ),
        Field::Date(date) => (CellValue::Date(*date), None, false),
        Field::RowProduct {
            left,
            right,
            currency,
        } => (
            CellValue::Formula(format!(
                "={}{row}*{}{row}",
                column_letter(*left),
                column_letter(*right)
            )),
            Some(currency_format(*currency)),
            false,
        ),
    };

    sheet.set_cell(col, row, value);
    if let Some(format) = own_format.or(spec.format) {
        sheet.set_number_format(col, row, format);
    }
    if spec.style == Some(StyleRule::RedWhenNegative) && negative {
        sheet.set_font_color(col, row, FontColor::Red);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: [ColumnSpec; 4] = [
        ColumnSpec::new("Fund name"),
        ColumnSpec::new("Transaction date").with_format(NumberFormat::Date),
        ColumnSpec::new("Number").with_style(StyleRule::RedWhenNegative),
        ColumnSpec::new("Purchase price"),
    ];

    fn row(name: &str, number: i64) -> ExportRow {
        ExportRow(vec![
            Field::text(name),
            Field::Date(NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()),
            Field::Number(Decimal::from(number)),
            Field::RowProduct {
                left: 2,
                right: 3,
                currency: Currency::Usd,
            },
        ])
    }

    #[test]
    fn headers_then_rows() {
        let sheet = render(&COLUMNS, &[vec![row("A", 1)]], GroupSpacing::Contiguous);
        assert_eq!(sheet.cell(0, 1), Some(&CellValue::Text("Fund name".to_string())));
        assert_eq!(sheet.cell(0, 2), Some(&CellValue::Text("A".to_string())));
        assert_eq!(sheet.number_format(1, 2), Some(NumberFormat::Date));
        assert_eq!(sheet.cell(3, 2), Some(&CellValue::Formula("=C2*D2".to_string())));
        assert_eq!(sheet.number_format(3, 2), Some(NumberFormat::CurrencyUsd));
    }

    #[test]
    fn negative_numbers_turn_red() {
        let sheet = render(
            &COLUMNS,
            &[vec![row("A", 5), row("A", -5)]],
            GroupSpacing::Contiguous,
        );
        assert_eq!(sheet.font_color(2, 2), None);
        assert_eq!(sheet.font_color(2, 3), Some(FontColor::Red));
    }

    #[test]
    fn blank_row_between_groups() {
        let groups = vec![vec![row("A", 1), row("A", 2)], vec![row("B", 3)]];
        let sheet = render(&COLUMNS, &groups, GroupSpacing::BlankRow);

        assert_eq!(sheet.cell(0, 4), None);
        assert_eq!(sheet.cell(0, 5), Some(&CellValue::Text("B".to_string())));
        assert_eq!(sheet.cell(3, 5), Some(&CellValue::Formula("=C5*D5".to_string())));
    }

    #[test]
    fn money_brings_its_currency_format() {
        let columns = [ColumnSpec::new("Dividend").with_format(NumberFormat::CurrencyEur)];
        let rows = vec![ExportRow(vec![Field::Money(Money::new(
            Decimal::new(1200, 2),
            Currency::Usd,
        ))])];
        let sheet = render(&columns, &[rows], GroupSpacing::Contiguous);
        assert_eq!(sheet.number_format(0, 2), Some(NumberFormat::CurrencyUsd));
    }
}
