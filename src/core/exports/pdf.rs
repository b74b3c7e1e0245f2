use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};

use super::ExportError;
use crate::core::orders::OrderRead;

// US Letter, one-inch margins
const PAGE_WIDTH: Mm = Mm(215.9);
const PAGE_HEIGHT: Mm = Mm(279.4);
const MARGIN: f32 = 25.4;
const LINE: f32 = 7.62;
const TITLE_SIZE: f32 = 12.0;
const TEXT_SIZE: f32 = 10.0;

/// Render orders as a PDF report, one block per order with its total
pub fn render_pdf(orders: &[OrderRead]) -> Result<Vec<u8>, ExportError> {
    build_report(orders).map(|(bytes, _)| bytes)
}

fn render_error(reason: impl ToString) -> ExportError {
    ExportError::Render {
        format: "pdf",
        reason: reason.to_string(),
    }
}

/// Returns the document bytes and the number of pages written
fn build_report(orders: &[OrderRead]) -> Result<(Vec<u8>, usize), ExportError> {
    let mut report = Report::new()?;

    report.write(MARGIN, "Orders report", TITLE_SIZE, true);
    report.advance(MARGIN);

    for order in orders {
        report.write(
            MARGIN,
            &format!(
                "Order {} | User {} | Date {} | State {}",
                order.id,
                order.user_id,
                order.created_at.to_rfc3339(),
                order.state
            ),
            TEXT_SIZE,
            false,
        );
        report.advance(LINE);
        report.write(MARGIN * 1.5, "Products:", TEXT_SIZE, false);
        report.advance(LINE);

        for item in &order.items {
            let unit_price = item.product.price;
            let subtotal = unit_price * f64::from(item.quantity);
            report.write(
                MARGIN * 2.0,
                &format!(
                    "- {} (ID {}) x {} @ {:.2} EUR = {:.2} EUR",
                    item.product.title, item.product.id, item.quantity, unit_price, subtotal
                ),
                TEXT_SIZE,
                false,
            );
            report.advance(LINE);
        }

        report.write(
            MARGIN * 1.5,
            &format!("Order total: {:.2} EUR", order.total_amount),
            TEXT_SIZE,
            false,
        );
        report.advance(MARGIN);
    }

    report.finish()
}

struct Report {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    pages: usize,
}

impl Report {
    fn new() -> Result<Self, ExportError> {
        let (doc, page, layer) = PdfDocument::new("Orders report", PAGE_WIDTH, PAGE_HEIGHT, "Page 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(render_error)?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(render_error)?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT.0 - MARGIN,
            pages: 1,
        })
    }

    fn write(&self, x: f32, text: &str, size: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    /// Move down by `by`, starting a new page when the bottom margin is reached
    fn advance(&mut self, by: f32) {
        self.y -= by;
        if self.y < MARGIN {
            self.pages += 1;
            let (page, layer) =
                self.doc
                    .add_page(PAGE_WIDTH, PAGE_HEIGHT, format!("Page {}", self.pages));
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT.0 - MARGIN;
        }
    }

    fn finish(self) -> Result<(Vec<u8>, usize), ExportError> {
        let pages = self.pages;
        let bytes = self.doc.save_to_bytes().map_err(render_error)?;
        Ok((bytes, pages))
    }
}
