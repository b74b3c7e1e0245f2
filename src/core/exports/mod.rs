//! Order exports
//!
//! Renders enriched orders as CSV, an Excel workbook or a PDF report. CSV and
//! Excel share one row per order line; the PDF groups lines under their order
//! with a per-order total.

pub mod api;
mod csv;
mod excel;
mod pdf;

use serde::Deserialize;
use uuid::Uuid;

use crate::core::orders::OrderRead;

pub use api::{ExportsApiState, exports_api_router};
pub use csv::render_csv;
pub use excel::render_excel;
pub use pdf::render_pdf;

const HEADER: [&str; 9] = [
    "Order ID",
    "User ID",
    "Created At",
    "State",
    "Product ID",
    "Title",
    "Quantity",
    "Unit Price",
    "Subtotal",
];

/// Export rendering errors
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to render {format} export: {reason}")]
    Render {
        format: &'static str,
        reason: String,
    },
}

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Excel,
    Pdf,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Pdf => "application/pdf",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xlsx",
            ExportFormat::Pdf => "pdf",
        }
    }

    /// Render `orders` in this format
    pub fn render(&self, orders: &[OrderRead]) -> Result<Vec<u8>, ExportError> {
        match self {
            ExportFormat::Csv => Ok(render_csv(orders).into_bytes()),
            ExportFormat::Excel => render_excel(orders),
            ExportFormat::Pdf => render_pdf(orders),
        }
    }
}

/// Export request. `user_id` is only honoured for administrators.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportRequest {
    pub format: ExportFormat,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

/// One order line, flattened for tabular formats
#[derive(Debug, Clone, PartialEq)]
struct ExportRow {
    order_id: Uuid,
    user_id: Uuid,
    created_at: String,
    state: String,
    product_id: i64,
    title: String,
    quantity: i32,
    unit_price: f64,
    subtotal: f64,
}

fn export_rows(orders: &[OrderRead]) -> Vec<ExportRow> {
    orders
        .iter()
        .flat_map(|order| {
            order.items.iter().map(move |item| ExportRow {
                order_id: order.id,
                user_id: order.user_id,
                created_at: order.created_at.to_rfc3339(),
                state: order.state.to_string(),
                product_id: item.product.id,
                title: item.product.title.clone(),
                quantity: item.quantity,
                unit_price: item.product.price,
                subtotal: item.product.price * f64::from(item.quantity),
            })
        })
        .collect()
}
