use rust_xlsxwriter::{Format, Workbook, XlsxError};

use super::{ExportError, HEADER, export_rows};
use crate::core::orders::OrderRead;

const SHEET_NAME: &str = "Orders";

/// Render orders as an `.xlsx` workbook with a single "Orders" sheet
pub fn render_excel(orders: &[OrderRead]) -> Result<Vec<u8>, ExportError> {
    build_workbook(orders).map_err(|e| ExportError::Render {
        format: "excel",
        reason: e.to_string(),
    })
}

fn build_workbook(orders: &[OrderRead]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let money = Format::new().set_num_format("0.00");

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, title) in HEADER.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &bold)?;
    }

    for (i, row) in export_rows(orders).iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, row.order_id.to_string())?;
        sheet.write_string(r, 1, row.user_id.to_string())?;
        sheet.write_string(r, 2, &row.created_at)?;
        sheet.write_string(r, 3, &row.state)?;
        sheet.write_number(r, 4, row.product_id as f64)?;
        sheet.write_string(r, 5, &row.title)?;
        sheet.write_number(r, 6, f64::from(row.quantity))?;
        sheet.write_number_with_format(r, 7, row.unit_price, &money)?;
        sheet.write_number_with_format(r, 8, row.subtotal, &money)?;
    }

    workbook.save_to_buffer()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::exports::testing::sample_order;

    #[test]
    fn test_render_excel_is_a_zip_package() {
        let order = sample_order(&[(1, "Mascara", 9.99, 2), (2, "Lipstick", 5.0, 1)]);

        let bytes = render_excel(&[order]).unwrap();

        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_render_excel_empty() {
        let bytes = render_excel(&[]).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
