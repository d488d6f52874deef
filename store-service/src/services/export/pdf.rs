//! A4 portrait invoice PDF.
//!
//! Layout coordinates are kept top-down in millimetres and flipped to PDF
//! space only when drawing. The table paginates with a fixed row height:
//! a row that would cross [`PAGE_BREAK_Y`] moves to a new page, and every
//! continuation page starts with the column header again.

use super::{InvoiceView, RenderSettings};
use crate::error::InvoicingError;
use crate::money::{format_currency, format_date, format_number};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Polygon, Rgb,
};
use rust_decimal::Decimal;
use std::io::BufWriter;

pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;
pub const MARGIN_X: f32 = 15.0;
pub const TABLE_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN_X;

pub const HEADER_HEIGHT: f32 = 9.0;
pub const ROW_HEIGHT: f32 = 8.0;
/// No table row may extend below this line.
pub const PAGE_BREAK_Y: f32 = 270.0;
/// Where the table header sits on continuation pages.
pub const CONTINUATION_TOP: f32 = 20.0;

const INFO_TOP: f32 = 40.0;
const INFO_LINE: f32 = 6.0;
const SUMMARY_WIDTH: f32 = 85.0;
const SUMMARY_LINE: f32 = 8.0;
const FOOTER_HEIGHT: f32 = 16.0;

const BODY_SIZE: f32 = 9.0;
const PT_TO_MM: f32 = 0.3528;
// average Helvetica advance, in em
const AVG_GLYPH_EM: f32 = 0.52;

const INK: (f32, f32, f32) = (0.0, 0.0, 0.0);
const HEADER_FILL: (f32, f32, f32) = (0.80, 0.87, 0.96);
const STRIPE_FILL: (f32, f32, f32) = (0.95, 0.95, 0.95);
const DISCOUNT_INK: (f32, f32, f32) = (0.78, 0.10, 0.10);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Align {
    Left,
    Center,
    Right,
}

struct Column {
    title: &'static str,
    width: f32,
    align: Align,
}

const COLUMNS: [Column; 7] = [
    Column { title: "STT", width: 12.0, align: Align::Center },
    Column { title: "Mã hàng", width: 22.0, align: Align::Left },
    Column { title: "Tên hàng", width: 56.0, align: Align::Left },
    Column { title: "Đơn vị", width: 18.0, align: Align::Center },
    Column { title: "Số lượng", width: 18.0, align: Align::Right },
    Column { title: "Đơn giá", width: 27.0, align: Align::Right },
    Column { title: "Thành tiền", width: 27.0, align: Align::Right },
];

/// Rows placed on one page of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct TablePage {
    pub header_top: f32,
    pub rows: Vec<RowSlot>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowSlot {
    pub index: usize,
    pub top: f32,
}

impl TablePage {
    pub fn bottom(&self) -> f32 {
        self.rows
            .last()
            .map(|slot| slot.top + ROW_HEIGHT)
            .unwrap_or(self.header_top + HEADER_HEIGHT)
    }
}

/// Places `row_count` rows starting with a header at `first_table_top`.
pub fn paginate(first_table_top: f32, row_count: usize) -> Vec<TablePage> {
    let mut pages = vec![TablePage {
        header_top: first_table_top,
        rows: Vec::new(),
    }];
    let mut cursor = first_table_top + HEADER_HEIGHT;

    for index in 0..row_count {
        if cursor + ROW_HEIGHT > PAGE_BREAK_Y {
            pages.push(TablePage {
                header_top: CONTINUATION_TOP,
                rows: Vec::new(),
            });
            cursor = CONTINUATION_TOP + HEADER_HEIGHT;
        }
        if let Some(page) = pages.last_mut() {
            page.rows.push(RowSlot { index, top: cursor });
        }
        cursor += ROW_HEIGHT;
    }

    pages
}

pub fn render(view: &InvoiceView, settings: &RenderSettings) -> Result<Vec<u8>, InvoicingError> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Invoice {}", view.id),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );
    let layer = doc.get_page(page).get_layer(layer);

    let mut canvas = Canvas::new(&doc, layer, settings)?;

    // Title
    canvas.text_center(&settings.store_name, 12.0, PAGE_WIDTH / 2.0, 16.0, true, INK);
    canvas.text_center("HÓA ĐƠN BÁN HÀNG", 18.0, PAGE_WIDTH / 2.0, 28.0, true, INK);

    // Info block
    let info = info_lines(view);
    let mut baseline = INFO_TOP;
    for line in &info {
        canvas.text(line, 10.0, MARGIN_X, baseline, false, INK);
        baseline += INFO_LINE;
    }

    // Table
    let pages = paginate(baseline, view.rows.len());
    for (page_no, page) in pages.iter().enumerate() {
        if page_no > 0 {
            canvas.new_page();
        }
        canvas.table_header(page.header_top);
        for slot in &page.rows {
            let row = &view.rows[slot.index];
            if slot.index % 2 == 1 {
                canvas.fill_rect(MARGIN_X, slot.top, TABLE_WIDTH, ROW_HEIGHT, STRIPE_FILL);
            }
            let cells = [
                row.seq.to_string(),
                row.product_id.clone(),
                row.product_name.clone(),
                row.unit.clone().unwrap_or_default(),
                row.quantity.to_string(),
                format_number(row.unit_price),
                format_number(row.line_total),
            ];
            canvas.table_row(slot.top, ROW_HEIGHT, &cells, false);
        }
    }

    // Summary box, right-aligned under the table
    let mut summary: Vec<(String, String, bool, (f32, f32, f32))> = vec![(
        "Tổng tiền hàng:".to_string(),
        format_currency(view.subtotal),
        false,
        INK,
    )];
    if view.discount_amount > Decimal::ZERO {
        let label = match &view.discount {
            Some(discount) => format!("Giảm giá ({}%):", discount.percent_off),
            None => "Giảm giá:".to_string(),
        };
        summary.push((
            label,
            format!("-{}", format_currency(view.discount_amount)),
            false,
            DISCOUNT_INK,
        ));
    }
    summary.push((
        "Thành tiền:".to_string(),
        format_currency(view.payable),
        true,
        INK,
    ));

    let summary_height = summary.len() as f32 * SUMMARY_LINE + 4.0;
    let table_bottom = pages.last().map(TablePage::bottom).unwrap_or(baseline);
    let mut summary_top = table_bottom + 6.0;
    if summary_top + summary_height + FOOTER_HEIGHT > PAGE_HEIGHT - 10.0 {
        canvas.new_page();
        summary_top = CONTINUATION_TOP;
    }

    let box_x = MARGIN_X + TABLE_WIDTH - SUMMARY_WIDTH;
    canvas.stroke_rect(box_x, summary_top, SUMMARY_WIDTH, summary_height);
    let mut line_baseline = summary_top + SUMMARY_LINE;
    for (label, amount, bold, ink) in &summary {
        let size = if *bold { 11.0 } else { 10.0 };
        canvas.text(label, size, box_x + 3.0, line_baseline, *bold, *ink);
        canvas.text_right(amount, size, box_x + SUMMARY_WIDTH - 3.0, line_baseline, *bold, *ink);
        line_baseline += SUMMARY_LINE;
    }

    // Footer
    let footer_top = summary_top + summary_height + 8.0;
    canvas.text_center(
        "Cảm ơn quý khách đã mua hàng!",
        10.0,
        PAGE_WIDTH / 2.0,
        footer_top,
        true,
        INK,
    );
    canvas.text_center(
        &format!("{} - {}", settings.store_name, settings.store_contact),
        9.0,
        PAGE_WIDTH / 2.0,
        footer_top + 6.0,
        false,
        INK,
    );

    drop(canvas);
    let mut writer = BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer)
        .map_err(|e| InvoicingError::Render(format!("Failed to write PDF: {}", e)))?;
    writer
        .into_inner()
        .map_err(|e| InvoicingError::Render(format!("Failed to flush PDF: {}", e)))
}

fn info_lines(view: &InvoiceView) -> Vec<String> {
    let mut lines = vec![
        format!("Mã hóa đơn: {}", view.id),
        format!("Ngày lập: {}", format_date(view.date)),
        format!("Nhân viên: {}", view.employee_name),
    ];
    if let Some(customer) = &view.customer {
        lines.push(format!("Khách hàng: {}", customer.name));
        if let Some(address) = &customer.address {
            lines.push(format!("Địa chỉ: {}", address));
        }
        if let Some(phone) = &customer.phone {
            lines.push(format!("Điện thoại: {}", phone));
        }
    }
    if let Some(discount) = &view.discount {
        let mut line = format!("Mã giảm giá: {} ({}%)", discount.code, discount.percent_off);
        if let Some(description) = &discount.description {
            line.push_str(" - ");
            line.push_str(description);
        }
        lines.push(line);
    }
    lines
}

struct Canvas<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    // built-in fonts only cover Latin-1
    fold: bool,
}

impl<'a> Canvas<'a> {
    fn new(
        doc: &'a PdfDocumentReference,
        layer: PdfLayerReference,
        settings: &RenderSettings,
    ) -> Result<Self, InvoicingError> {
        let font_error = |e: printpdf::Error| InvoicingError::Render(format!("Font error: {}", e));

        let (regular, bold, fold) = match &settings.fonts.regular {
            Some(regular_bytes) => {
                let regular = doc
                    .add_external_font(regular_bytes.as_slice())
                    .map_err(font_error)?;
                let bold = match &settings.fonts.bold {
                    Some(bold_bytes) => doc
                        .add_external_font(bold_bytes.as_slice())
                        .map_err(font_error)?,
                    None => regular.clone(),
                };
                (regular, bold, false)
            }
            None => (
                doc.add_builtin_font(BuiltinFont::Helvetica)
                    .map_err(font_error)?,
                doc.add_builtin_font(BuiltinFont::HelveticaBold)
                    .map_err(font_error)?,
                true,
            ),
        };

        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            fold,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
    }

    fn prepare(&self, text: &str) -> String {
        if self.fold {
            fold_diacritics(text)
        } else {
            text.to_string()
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, baseline: f32, bold: bool, ink: (f32, f32, f32)) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.set_fill_color(rgb(ink));
        self.layer.use_text(
            self.prepare(text),
            size,
            Mm(x),
            Mm(PAGE_HEIGHT - baseline),
            font,
        );
    }

    fn text_right(
        &self,
        text: &str,
        size: f32,
        right: f32,
        baseline: f32,
        bold: bool,
        ink: (f32, f32, f32),
    ) {
        let x = right - text_width(text, size);
        self.text(text, size, x, baseline, bold, ink);
    }

    fn text_center(
        &self,
        text: &str,
        size: f32,
        center: f32,
        baseline: f32,
        bold: bool,
        ink: (f32, f32, f32),
    ) {
        let x = center - text_width(text, size) / 2.0;
        self.text(text, size, x, baseline, bold, ink);
    }

    fn fill_rect(&self, x: f32, top: f32, width: f32, height: f32, fill: (f32, f32, f32)) {
        self.layer.set_fill_color(rgb(fill));
        self.layer.add_polygon(Polygon {
            rings: vec![rect_points(x, top, width, height)],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
        self.layer.set_fill_color(rgb(INK));
    }

    fn stroke_rect(&self, x: f32, top: f32, width: f32, height: f32) {
        self.layer.set_outline_color(rgb(INK));
        self.layer.set_outline_thickness(0.4);
        self.layer.add_line(Line {
            points: rect_points(x, top, width, height),
            is_closed: true,
        });
    }

    fn vline(&self, x: f32, top: f32, bottom: f32) {
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(x), Mm(PAGE_HEIGHT - top)), false),
                (Point::new(Mm(x), Mm(PAGE_HEIGHT - bottom)), false),
            ],
            is_closed: false,
        });
    }

    fn table_header(&self, top: f32) {
        self.fill_rect(MARGIN_X, top, TABLE_WIDTH, HEADER_HEIGHT, HEADER_FILL);
        let titles = COLUMNS.map(|column| column.title.to_string());
        self.table_row(top, HEADER_HEIGHT, &titles, true);
    }

    fn table_row(&self, top: f32, height: f32, cells: &[String; 7], bold: bool) {
        self.stroke_rect(MARGIN_X, top, TABLE_WIDTH, height);

        let baseline = top + height - 2.6;
        let mut x = MARGIN_X;
        for (column, cell) in COLUMNS.iter().zip(cells.iter()) {
            if x > MARGIN_X {
                self.vline(x, top, top + height);
            }
            let inner = column.width - 3.0;
            let cell = fit(cell, BODY_SIZE, inner);
            match column.align {
                Align::Left => self.text(&cell, BODY_SIZE, x + 1.5, baseline, bold, INK),
                Align::Center => {
                    self.text_center(&cell, BODY_SIZE, x + column.width / 2.0, baseline, bold, INK)
                }
                Align::Right => {
                    self.text_right(&cell, BODY_SIZE, x + column.width - 1.5, baseline, bold, INK)
                }
            }
            x += column.width;
        }
    }
}

fn rgb((r, g, b): (f32, f32, f32)) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

fn rect_points(x: f32, top: f32, width: f32, height: f32) -> Vec<(Point, bool)> {
    let upper = PAGE_HEIGHT - top;
    let lower = PAGE_HEIGHT - top - height;
    vec![
        (Point::new(Mm(x), Mm(lower)), false),
        (Point::new(Mm(x + width), Mm(lower)), false),
        (Point::new(Mm(x + width), Mm(upper)), false),
        (Point::new(Mm(x), Mm(upper)), false),
    ]
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_EM * PT_TO_MM
}

/// Truncates `text` with `..` so it fits in `width` millimetres.
fn fit(text: &str, size: f32, width: f32) -> String {
    if text_width(text, size) <= width {
        return text.to_string();
    }
    let per_char = size * AVG_GLYPH_EM * PT_TO_MM;
    let keep = ((width / per_char) as usize).saturating_sub(2);
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str("..");
    truncated
}

const FOLDS: [(&str, char); 14] = [
    ("àáảãạăằắẳẵặâầấẩẫậ", 'a'),
    ("ÀÁẢÃẠĂẰẮẲẴẶÂẦẤẨẪẬ", 'A'),
    ("đ", 'd'),
    ("Đ", 'D'),
    ("èéẻẽẹêềếểễệ", 'e'),
    ("ÈÉẺẼẸÊỀẾỂỄỆ", 'E'),
    ("ìíỉĩị", 'i'),
    ("ÌÍỈĨỊ", 'I'),
    ("òóỏõọôồốổỗộơờớởỡợ", 'o'),
    ("ÒÓỎÕỌÔỒỐỔỖỘƠỜỚỞỠỢ", 'O'),
    ("ùúủũụưừứửữự", 'u'),
    ("ÙÚỦŨỤƯỪỨỬỮỰ", 'U'),
    ("ỳýỷỹỵ", 'y'),
    ("ỲÝỶỸỴ", 'Y'),
];

/// Replaces Vietnamese letters with their unaccented base letter.
pub fn fold_diacritics(text: &str) -> String {
    text.chars()
        .map(|ch| {
            if ch.is_ascii() {
                return ch;
            }
            FOLDS
                .iter()
                .find(|(variants, _)| variants.contains(ch))
                .map(|(_, base)| *base)
                .unwrap_or(ch)
        })
        .collect()
}
