//! Single-sheet Excel workbook for an invoice.

use super::{InvoiceView, RenderSettings};
use crate::error::InvoicingError;
use crate::money::{format_currency, format_date};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, XlsxError};

const HEADERS: [&str; 7] = [
    "STT",
    "Mã hàng",
    "Tên hàng",
    "Đơn vị",
    "Số lượng",
    "Đơn giá",
    "Thành tiền",
];

const WIDTHS: [f64; 7] = [6.0, 12.0, 36.0, 10.0, 10.0, 16.0, 18.0];

const WHOLE_CURRENCY_FORMAT: &str = "#,##0 \"VND\"";
const CENTS_CURRENCY_FORMAT: &str = "#,##0.00 \"VND\"";
const LAST_COL: u16 = 6;

/// What a worksheet cell holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Money(Decimal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Title,
    Label,
    Plain,
    Header,
    Cell,
    Centered,
    Money,
    SummaryMoney,
    DiscountMoney,
    PayableLabel,
    Payable,
    Note,
    Footer,
}

/// One positioned cell. Cells with `last_col > col` are merged across.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub row: u32,
    pub col: u16,
    pub last_col: u16,
    pub value: Value,
    pub style: Style,
}

impl Cell {
    fn at(row: u32, col: u16, value: Value, style: Style) -> Self {
        Self {
            row,
            col,
            last_col: col,
            value,
            style,
        }
    }

    fn merged(row: u32, col: u16, last_col: u16, value: Value, style: Style) -> Self {
        Self {
            row,
            col,
            last_col,
            value,
            style,
        }
    }
}

impl From<XlsxError> for InvoicingError {
    fn from(err: XlsxError) -> Self {
        InvoicingError::Render(format!("Failed to write workbook: {}", err))
    }
}

fn text(value: impl Into<String>) -> Value {
    Value::Text(value.into())
}

/// Places every cell of the invoice sheet, top to bottom.
pub fn layout(view: &InvoiceView, settings: &RenderSettings) -> Vec<Cell> {
    let mut cells = vec![
        Cell::merged(0, 0, LAST_COL, text(settings.store_name.as_str()), Style::Title),
        Cell::merged(1, 0, LAST_COL, text("HÓA ĐƠN BÁN HÀNG"), Style::Title),
    ];

    // Info block
    let mut info: Vec<(&str, String)> = vec![
        ("Mã hóa đơn:", view.id.clone()),
        ("Ngày lập:", format_date(view.date)),
        ("Nhân viên:", view.employee_name.clone()),
    ];
    if let Some(customer) = &view.customer {
        info.push(("Khách hàng:", customer.name.clone()));
        if let Some(address) = &customer.address {
            info.push(("Địa chỉ:", address.clone()));
        }
        if let Some(phone) = &customer.phone {
            info.push(("Điện thoại:", phone.clone()));
        }
    }
    if let Some(discount) = &view.discount {
        let mut value = format!("{} ({}%)", discount.code, discount.percent_off);
        if let Some(description) = &discount.description {
            value.push_str(" - ");
            value.push_str(description);
        }
        info.push(("Mã giảm giá:", value));
    }

    let mut row: u32 = 3;
    for (name, value) in info {
        cells.push(Cell::merged(row, 0, 1, text(name), Style::Label));
        cells.push(Cell::merged(row, 2, LAST_COL, text(value), Style::Plain));
        row += 1;
    }

    // Table
    row += 1;
    for (col, title) in HEADERS.iter().enumerate() {
        cells.push(Cell::at(row, col as u16, text(*title), Style::Header));
    }
    row += 1;

    for line in &view.rows {
        cells.extend([
            Cell::at(row, 0, Value::Number(line.seq as f64), Style::Centered),
            Cell::at(row, 1, text(line.product_id.as_str()), Style::Cell),
            Cell::at(row, 2, text(line.product_name.as_str()), Style::Cell),
            Cell::at(
                row,
                3,
                text(line.unit.as_deref().unwrap_or_default()),
                Style::Centered,
            ),
            Cell::at(row, 4, Value::Number(f64::from(line.quantity)), Style::Centered),
            Cell::at(row, 5, Value::Money(line.unit_price), Style::Money),
            Cell::at(row, 6, Value::Money(line.line_total), Style::Money),
        ]);
        row += 1;
    }

    // Summary
    row += 1;
    cells.push(Cell::merged(row, 4, 5, text("Tổng tiền hàng:"), Style::Label));
    cells.push(Cell::at(row, 6, Value::Money(view.subtotal), Style::SummaryMoney));
    row += 1;

    if view.discount_amount > Decimal::ZERO {
        let label = match &view.discount {
            Some(discount) => format!("Giảm giá ({}%):", discount.percent_off),
            None => "Giảm giá:".to_string(),
        };
        cells.push(Cell::merged(row, 4, 5, text(label), Style::Label));
        cells.push(Cell::at(
            row,
            6,
            Value::Money(-view.discount_amount),
            Style::DiscountMoney,
        ));
        row += 1;
    }

    cells.push(Cell::merged(row, 4, 5, text("Thành tiền:"), Style::PayableLabel));
    cells.push(Cell::at(row, 6, Value::Money(view.payable), Style::Payable));
    row += 1;
    cells.push(Cell::merged(
        row,
        4,
        LAST_COL,
        text(format!("({})", format_currency(view.payable))),
        Style::Note,
    ));

    row += 2;
    cells.push(Cell::merged(
        row,
        0,
        LAST_COL,
        text("Cảm ơn quý khách đã mua hàng!"),
        Style::Footer,
    ));
    row += 1;
    cells.push(Cell::merged(
        row,
        0,
        LAST_COL,
        text(format!("{} - {}", settings.store_name, settings.store_contact)),
        Style::Footer,
    ));

    cells
}

/// Whole amounts print without decimals. Anything with cents keeps two places.
pub fn currency_format(amount: Decimal) -> &'static str {
    if amount.fract().is_zero() {
        WHOLE_CURRENCY_FORMAT
    } else {
        CENTS_CURRENCY_FORMAT
    }
}

fn format_for(style: Style) -> Format {
    let bordered = Format::new().set_border(FormatBorder::Thin);
    let highlight = Color::RGB(0xFFF2CC);
    match style {
        Style::Title => Format::new()
            .set_bold()
            .set_font_size(16)
            .set_align(FormatAlign::Center),
        Style::Label => Format::new().set_bold(),
        Style::Plain | Style::SummaryMoney => Format::new(),
        Style::Header => bordered
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(0x2F5597))
            .set_align(FormatAlign::Center),
        Style::Cell | Style::Money => bordered,
        Style::Centered => bordered.set_align(FormatAlign::Center),
        Style::DiscountMoney => Format::new().set_font_color(Color::RGB(0xC00000)),
        Style::PayableLabel | Style::Payable => Format::new()
            .set_bold()
            .set_font_size(12)
            .set_background_color(highlight),
        Style::Note => Format::new().set_italic().set_align(FormatAlign::Right),
        Style::Footer => Format::new().set_italic().set_align(FormatAlign::Center),
    }
}

pub fn render(view: &InvoiceView, settings: &RenderSettings) -> Result<Vec<u8>, InvoicingError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Hoa don")?;

    for (col, width) in WIDTHS.iter().enumerate() {
        sheet.set_column_width(col as u16, *width)?;
    }

    for cell in layout(view, settings) {
        let mut format = format_for(cell.style);
        if let Value::Money(amount) = &cell.value {
            format = format.set_num_format(currency_format(*amount));
        }

        if cell.last_col > cell.col {
            let merged_text = match &cell.value {
                Value::Text(value) => value.as_str(),
                _ => "",
            };
            sheet.merge_range(cell.row, cell.col, cell.row, cell.last_col, merged_text, &format)?;
            if matches!(cell.value, Value::Text(_)) {
                continue;
            }
        }

        match &cell.value {
            Value::Text(value) => {
                sheet.write_string_with_format(cell.row, cell.col, value, &format)?;
            }
            Value::Number(value) => {
                sheet.write_number_with_format(cell.row, cell.col, *value, &format)?;
            }
            Value::Money(amount) => {
                sheet.write_number_with_format(cell.row, cell.col, as_f64(*amount), &format)?;
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn as_f64(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::export::{DiscountView, InvoiceRow};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn view(rows: Vec<InvoiceRow>, subtotal: Decimal, percent_off: i32) -> InvoiceView {
        let discount_amount = crate::money::discount_amount(subtotal, percent_off);
        InvoiceView {
            id: "HD01".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            employee_name: "Nguyễn Văn An".to_string(),
            customer: None,
            discount: (percent_off > 0).then(|| DiscountView {
                code: "SALE10".to_string(),
                percent_off,
                description: None,
            }),
            rows,
            subtotal,
            discount_amount,
            payable: subtotal - discount_amount,
        }
    }

    fn row(seq: usize, product_id: &str, quantity: i32, unit_price: Decimal) -> InvoiceRow {
        InvoiceRow {
            seq,
            product_id: product_id.to_string(),
            product_name: "Áo thun".to_string(),
            unit: Some("cái".to_string()),
            quantity,
            unit_price,
            line_total: unit_price * Decimal::from(quantity),
        }
    }

    fn cell_at(cells: &[Cell], row: u32, col: u16) -> &Cell {
        cells
            .iter()
            .find(|c| c.row == row && c.col == col)
            .unwrap_or_else(|| panic!("no cell at {}:{}", row, col))
    }

    fn row_of(cells: &[Cell], label: &str) -> u32 {
        cells
            .iter()
            .find(|c| c.value == Value::Text(label.to_string()))
            .map(|c| c.row)
            .unwrap_or_else(|| panic!("no {:?} label", label))
    }

    #[test]
    fn produces_an_xlsx_archive() {
        let view = view(vec![row(1, "HH01", 2, dec!(250000))], dec!(500000), 0);

        let bytes = render(&view, &RenderSettings::default()).unwrap();
        // xlsx is a zip container
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn table_header_is_followed_by_the_lines() {
        let view = view(
            vec![row(1, "HH01", 2, dec!(250000)), row(2, "HH03", 1, dec!(350000))],
            dec!(850000),
            0,
        );
        let cells = layout(&view, &RenderSettings::default());

        let header_row = row_of(&cells, "STT");
        let titles: Vec<&Cell> = cells.iter().filter(|c| c.row == header_row).collect();
        assert_eq!(titles.len(), HEADERS.len());
        for (col, title) in HEADERS.iter().enumerate() {
            let cell = cell_at(&cells, header_row, col as u16);
            assert_eq!(cell.value, Value::Text(title.to_string()));
            assert_eq!(cell.style, Style::Header);
        }

        let first = header_row + 1;
        assert_eq!(cell_at(&cells, first, 0).value, Value::Number(1.0));
        assert_eq!(cell_at(&cells, first, 1).value, Value::Text("HH01".into()));
        assert_eq!(cell_at(&cells, first, 3).value, Value::Text("cái".into()));
        assert_eq!(cell_at(&cells, first, 4).value, Value::Number(2.0));
        assert_eq!(cell_at(&cells, first, 6).value, Value::Money(dec!(500000)));
        assert_eq!(cell_at(&cells, first + 1, 1).value, Value::Text("HH03".into()));
    }

    #[test]
    fn summary_carries_subtotal_discount_and_payable() {
        let view = view(vec![row(1, "HH01", 2, dec!(250000))], dec!(500000), 10);
        let cells = layout(&view, &RenderSettings::default());

        let subtotal = row_of(&cells, "Tổng tiền hàng:");
        assert_eq!(cell_at(&cells, subtotal, 6).value, Value::Money(dec!(500000)));

        let discount = row_of(&cells, "Giảm giá (10%):");
        assert_eq!(discount, subtotal + 1);
        let cell = cell_at(&cells, discount, 6);
        assert_eq!(cell.value, Value::Money(dec!(-50000)));
        assert_eq!(cell.style, Style::DiscountMoney);

        let payable = row_of(&cells, "Thành tiền:");
        let cell = cell_at(&cells, payable, 6);
        assert_eq!(cell.value, Value::Money(dec!(450000)));
        assert_eq!(cell.style, Style::Payable);
        assert_eq!(cell_at(&cells, payable, 4).last_col, 5);

        let info = row_of(&cells, "Mã giảm giá:");
        assert_eq!(cell_at(&cells, info, 2).value, Value::Text("SALE10 (10%)".into()));
    }

    #[test]
    fn undiscounted_invoice_has_no_discount_row() {
        let view = view(vec![row(1, "HH01", 1, dec!(250000))], dec!(250000), 0);
        let cells = layout(&view, &RenderSettings::default());

        assert!(!cells.iter().any(|c| c.style == Style::DiscountMoney));
        assert_eq!(
            row_of(&cells, "Thành tiền:"),
            row_of(&cells, "Tổng tiền hàng:") + 1
        );
    }

    #[test]
    fn fractional_amounts_keep_their_cents() {
        let view = view(vec![row(1, "HH01", 1, dec!(1234.5))], dec!(1234.5), 0);
        let cells = layout(&view, &RenderSettings::default());

        let header_row = row_of(&cells, "STT");
        let price = cell_at(&cells, header_row + 1, 5);
        assert_eq!(price.value, Value::Money(dec!(1234.5)));
        assert_eq!(price.style, Style::Money);
        assert_eq!(currency_format(dec!(1234.5)), "#,##0.00 \"VND\"");
        assert_eq!(currency_format(dec!(1234.50)), "#,##0.00 \"VND\"");
        assert_eq!(currency_format(dec!(250000)), "#,##0 \"VND\"");

        let payable = row_of(&cells, "Thành tiền:");
        assert_eq!(cell_at(&cells, payable, 6).value, Value::Money(dec!(1234.5)));

        assert!(render(&view, &RenderSettings::default()).is_ok());
    }
}
