use std::fmt::Write;

use super::{HEADER, export_rows};
use crate::core::orders::OrderRead;

/// Render orders as RFC 4180 CSV
pub fn render_csv(orders: &[OrderRead]) -> String {
    let mut out = String::new();
    write_row(&mut out, HEADER.iter().map(|h| h.to_string()));

    for row in export_rows(orders) {
        write_row(
            &mut out,
            [
                row.order_id.to_string(),
                row.user_id.to_string(),
                row.created_at,
                row.state,
                row.product_id.to_string(),
                row.title,
                row.quantity.to_string(),
                format!("{:.2}", row.unit_price),
                format!("{:.2}", row.subtotal),
            ],
        );
    }

    out
}

fn write_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            let _ = write!(out, "\"{}\"", field.replace('"', "\"\""));
        } else {
            out.push_str(&field);
        }
    }
    out.push_str("\r\n");
}
