use std::collections::BTreeSet;

use crate::column::ColumnDescriptor;
use crate::record::{Record, Value, field, value_text};
use crate::repository::Entity;

/// Two decimals with thousands separators, e.g. `€ 15,240.00`.
pub fn currency(value: &Value, _: &Record) -> String {
    match value.as_f64() {
        Some(amount) => {
            let cents = (amount.abs() * 100.0).round() as u64;
            let units = (cents / 100).to_string();
            let mut grouped = String::new();
            for (i, ch) in units.chars().enumerate() {
                if i > 0 && (units.len() - i) % 3 == 0 {
                    grouped.push(',');
                }
                grouped.push(ch);
            }
            let sign = if amount < 0.0 { "-" } else { "" };
            format!("{sign}€ {grouped}.{:02}", cents % 100)
        }
        None => value_text(value).into_owned(),
    }
}

pub fn yes_no(value: &Value, _: &Record) -> String {
    match value {
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        other => value_text(other).into_owned(),
    }
}

/// Status words as upper-case badges: `in_progress` -> `[IN PROGRESS]`.
pub fn badge(value: &Value, _: &Record) -> String {
    match value {
        Value::Null => String::new(),
        other => format!("[{}]", value_text(other).replace('_', " ").to_uppercase()),
    }
}

pub fn percent(value: &Value, _: &Record) -> String {
    match value.as_f64() {
        Some(ratio) => format!("{:.0}%", ratio * 100.0),
        None => value_text(value).into_owned(),
    }
}

/// Nested `{city, country}` objects as `City, CC`.
pub fn address(value: &Value, _: &Record) -> String {
    match value {
        Value::Object(_) => {
            let parts: Vec<String> = ["city", "country"]
                .iter()
                .filter_map(|k| value.get(k))
                .map(|v| value_text(v).into_owned())
                .filter(|s| !s.is_empty())
                .collect();
            parts.join(", ")
        }
        other => value_text(other).into_owned(),
    }
}

fn stock_level(value: &Value, record: &Record) -> String {
    let on_hand = value_text(value).into_owned();
    match (value.as_f64(), field(record, "reorder_level").as_f64()) {
        (Some(qty), Some(reorder)) if qty < reorder => format!("{on_hand} (low)"),
        _ => on_hand,
    }
}

/// Column layout of the admin page for `entity`.
pub fn columns_for(entity: Entity) -> Vec<ColumnDescriptor> {
    let col = ColumnDescriptor::sorted;
    match entity {
        Entity::Customers => vec![
            col("id", "ID").with_style("numeric".to_string()),
            col("name", "Name"),
            ColumnDescriptor::new("email", "Email"),
            ColumnDescriptor::new("address", "Location").with_render(address),
            col("credit_limit", "Credit Limit")
                .with_render(currency)
                .with_style("currency".to_string()),
            col("active", "Active").with_render(yes_no),
        ],
        Entity::Suppliers => vec![
            col("id", "ID").with_style("numeric".to_string()),
            col("name", "Name"),
            col("contact", "Contact"),
            col("country", "Country"),
            col("lead_time_days", "Lead Time")
                .with_render(|v, _| format!("{} d", value_text(v))),
            col("rating", "Rating"),
        ],
        Entity::Products => vec![
            col("sku", "SKU"),
            col("name", "Name"),
            col("category", "Category"),
            col("unit_price", "Unit Price")
                .with_render(currency)
                .with_style("currency".to_string()),
            col("discontinued", "Discontinued").with_render(yes_no),
        ],
        Entity::Inventory => vec![
            col("sku", "SKU"),
            col("warehouse", "Warehouse"),
            col("on_hand", "On Hand")
                .with_render(stock_level)
                .with_style("numeric".to_string()),
            col("reorder_level", "Reorder Level").with_style("numeric".to_string()),
        ],
        Entity::SalesOrders => vec![
            col("id", "Order #"),
            col("customer", "Customer"),
            col("order_date", "Date"),
            col("status", "Status")
                .with_render(badge)
                .with_style("badge".to_string()),
            col("total", "Total")
                .with_render(currency)
                .with_style("currency".to_string()),
        ],
        Entity::ProductionOrders => vec![
            col("id", "Order #"),
            col("product", "Product"),
            col("quantity", "Qty").with_style("numeric".to_string()),
            col("due_date", "Due"),
            col("status", "Status")
                .with_render(badge)
                .with_style("badge".to_string()),
            col("progress", "Progress").with_render(percent),
        ],
        Entity::Invoices => vec![
            col("id", "Invoice #"),
            col("order_id", "Order #"),
            col("customer", "Customer"),
            col("amount", "Amount")
                .with_render(currency)
                .with_style("currency".to_string()),
            col("due_date", "Due"),
            col("paid", "Paid").with_render(yes_no),
        ],
        Entity::Employees => vec![
            col("id", "ID"),
            col("name", "Name"),
            col("department", "Department"),
            col("position", "Position"),
            col("hired", "Hired"),
            col("salary", "Salary")
                .with_render(currency)
                .with_style("currency".to_string()),
        ],
    }
}

/// Sortable raw columns for every key found in `records`, `id` first.
pub fn infer_columns(records: &[Record]) -> Vec<ColumnDescriptor> {
    let keys: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.keys().map(String::as_str))
        .collect();
    let mut columns: Vec<ColumnDescriptor> = Vec::with_capacity(keys.len());
    if keys.contains("id") {
        columns.push(ColumnDescriptor::sorted("id", "id"));
    }
    columns.extend(
        keys.into_iter()
            .filter(|k| *k != "id")
            .map(|k| ColumnDescriptor::sorted(k, k)),
    );
    columns
}

/// Page columns, or inferred ones when the data shares none of their keys.
pub fn columns_for_data(entity: Entity, records: &[Record]) -> Vec<ColumnDescriptor> {
    let page = columns_for(entity);
    let known = records.is_empty()
        || page
            .iter()
            .any(|c| records.iter().any(|r| r.contains_key(&c.key)));
    if known { page } else { infer_columns(records) }
}
