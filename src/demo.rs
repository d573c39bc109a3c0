use serde_json::json;

use crate::record::{Record, Value};
use crate::repository::{Entity, MemoryRepository};

fn rows(values: Vec<Value>) -> Vec<Record> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

impl MemoryRepository {
    /// Seed data for running without a data directory.
    pub fn demo() -> Self {
        Entity::ALL
            .into_iter()
            .fold(MemoryRepository::new(), |repo, entity| {
                repo.with_records(entity, demo_records(entity))
            })
    }
}

pub fn demo_records(entity: Entity) -> Vec<Record> {
    match entity {
        Entity::Customers => rows(vec![
            json!({"id": 1, "name": "Alpine Tools GmbH", "email": "orders@alpinetools.at", "address": {"city": "Innsbruck", "country": "AT"}, "credit_limit": 25000, "active": true}),
            json!({"id": 2, "name": "Baltic Fasteners", "email": "buy@balticfast.lv", "address": {"city": "Riga", "country": "LV"}, "credit_limit": 12000, "active": true}),
            json!({"id": 3, "name": "Cobalt Machining", "email": "info@cobalt-mach.de", "address": {"city": "Stuttgart", "country": "DE"}, "credit_limit": 40000, "active": false}),
            json!({"id": 4, "name": "Delta Hydraulics", "email": "procure@deltahyd.it", "address": {"city": "Torino", "country": "IT"}, "credit_limit": 18500, "active": true}),
            json!({"id": 5, "name": "Elbe Logistics", "email": null, "address": {"city": "Hamburg", "country": "DE"}, "credit_limit": 9000, "active": true}),
        ]),
        Entity::Suppliers => rows(vec![
            json!({"id": 1, "name": "Nordic Steel AB", "contact": "Karin Lund", "country": "SE", "lead_time_days": 14, "rating": 4.6}),
            json!({"id": 2, "name": "Polymer Works", "contact": "Jan Novak", "country": "CZ", "lead_time_days": 9, "rating": 4.1}),
            json!({"id": 3, "name": "Iberia Castings", "contact": "Lucia Ortiz", "country": "ES", "lead_time_days": 21, "rating": 3.8}),
        ]),
        Entity::Products => rows(vec![
            json!({"id": 1, "sku": "BLT-M8-40", "name": "Hex bolt M8x40", "category": "Fasteners", "unit_price": 0.42, "discontinued": false}),
            json!({"id": 2, "sku": "NUT-M8", "name": "Hex nut M8", "category": "Fasteners", "unit_price": 0.08, "discontinued": false}),
            json!({"id": 3, "sku": "BRG-6204", "name": "Ball bearing 6204", "category": "Bearings", "unit_price": 3.9, "discontinued": false}),
            json!({"id": 4, "sku": "VLV-HYD-12", "name": "Hydraulic valve 12mm", "category": "Hydraulics", "unit_price": 58.0, "discontinued": true}),
            json!({"id": 5, "sku": "SHF-20-300", "name": "Drive shaft 20x300", "category": "Transmission", "unit_price": 24.5, "discontinued": false}),
        ]),
        Entity::Inventory => rows(vec![
            json!({"id": 1, "sku": "BLT-M8-40", "warehouse": "Main", "on_hand": 12400, "reorder_level": 5000}),
            json!({"id": 2, "sku": "NUT-M8", "warehouse": "Main", "on_hand": 3100, "reorder_level": 5000}),
            json!({"id": 3, "sku": "BRG-6204", "warehouse": "East", "on_hand": 640, "reorder_level": 200}),
            json!({"id": 4, "sku": "SHF-20-300", "warehouse": "East", "on_hand": 35, "reorder_level": 50}),
        ]),
        Entity::SalesOrders => rows(vec![
            json!({"id": 1001, "customer": "Alpine Tools GmbH", "order_date": "2026-09-02", "status": "shipped", "total": 4820.5}),
            json!({"id": 1002, "customer": "Delta Hydraulics", "order_date": "2026-09-11", "status": "pending", "total": 1290.0}),
            json!({"id": 1003, "customer": "Baltic Fasteners", "order_date": "2026-09-15", "status": "processing", "total": 760.25}),
            json!({"id": 1004, "customer": "Alpine Tools GmbH", "order_date": "2026-10-01", "status": "cancelled", "total": 310.0}),
            json!({"id": 1005, "customer": "Elbe Logistics", "order_date": "2026-10-06", "status": "delivered", "total": 15240.0}),
        ]),
        Entity::ProductionOrders => rows(vec![
            json!({"id": 501, "product": "Drive shaft 20x300", "quantity": 200, "due_date": "2026-10-28", "status": "in_progress", "progress": 0.45}),
            json!({"id": 502, "product": "Hex bolt M8x40", "quantity": 50000, "due_date": "2026-11-04", "status": "planned", "progress": 0.0}),
            json!({"id": 503, "product": "Ball bearing 6204", "quantity": 1200, "due_date": "2026-10-15", "status": "completed", "progress": 1.0}),
        ]),
        Entity::Invoices => rows(vec![
            json!({"id": 9001, "order_id": 1001, "customer": "Alpine Tools GmbH", "amount": 4820.5, "due_date": "2026-10-02", "paid": true}),
            json!({"id": 9002, "order_id": 1003, "customer": "Baltic Fasteners", "amount": 760.25, "due_date": "2026-10-15", "paid": false}),
            json!({"id": 9003, "order_id": 1005, "customer": "Elbe Logistics", "amount": 15240.0, "due_date": "2026-11-05", "paid": false}),
        ]),
        Entity::Employees => rows(vec![
            json!({"id": 1, "name": "Ada Brenner", "department": "Production", "position": "Shift lead", "hired": "2019-03-01", "salary": 52000}),
            json!({"id": 2, "name": "Tomas Keller", "department": "Sales", "position": "Account manager", "hired": "2021-07-15", "salary": 48500}),
            json!({"id": 3, "name": "Mira Sato", "department": "Finance", "position": "Controller", "hired": "2017-11-20", "salary": 61000}),
            json!({"id": 4, "name": "Olek Wisniewski", "department": "Warehouse", "position": "Forklift operator", "hired": "2023-02-06", "salary": 36000}),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{FetchRequest, Repository};

    #[test]
    fn every_entity_has_ids() {
        let mut repo = MemoryRepository::demo();
        for entity in Entity::ALL {
            let records = repo.fetch(&FetchRequest { entity }).unwrap().records;
            assert!(!records.is_empty(), "{entity:?}");
            assert!(records.iter().all(|r| r["id"].is_i64()), "{entity:?}");
        }
    }
}
