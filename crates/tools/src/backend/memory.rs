//! In-memory backend: seeded demo data for tests and offline runs.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{BackendError, Condition, DataBackend, Record};

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: Vec<Record>,
}

impl Table {
    fn insert(&mut self, mut values: Record) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        values.insert("id".into(), json!(id));
        self.rows.push(values);
        id
    }

    fn get_mut(&mut self, id: i64) -> Option<&mut Record> {
        self.rows.iter_mut().find(|r| record_id(r) == Some(id))
    }
}

/// Record store held in process memory.
pub struct InMemoryBackend {
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

/// Models the built-in tools use.
const MODELS: &[&str] = &[
    "sale.order",
    "sale.order.line",
    "product.product",
    "res.partner",
    "crm.lead",
    "crm.stage",
];

impl InMemoryBackend {
    /// An empty store that knows the standard models.
    pub fn new() -> Self {
        let tables = MODELS
            .iter()
            .map(|m| (m.to_string(), Table::default()))
            .collect();
        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    /// A store pre-filled with a small, consistent demo data set.
    pub fn seeded() -> Self {
        let mut tables: HashMap<String, Table> = MODELS
            .iter()
            .map(|m| (m.to_string(), Table::default()))
            .collect();
        seed(&mut tables);
        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn record_id(record: &Record) -> Option<i64> {
    record.get("id").and_then(Value::as_i64)
}

fn matches(record: &Record, condition: &Condition) -> bool {
    match condition {
        Condition::Eq(field, expected) => match record.get(field) {
            // Relational fields compare on the id half of [id, name].
            Some(Value::Array(pair)) if !expected.is_array() => pair.first() == Some(expected),
            Some(actual) => actual == expected,
            None => expected.is_null() || *expected == Value::Bool(false),
        },
        Condition::ILike(field, pattern) => record
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|s| s.to_lowercase().contains(&pattern.to_lowercase())),
        Condition::Gt(field, bound) => record
            .get(field)
            .and_then(Value::as_f64)
            .is_some_and(|v| v > *bound),
    }
}

fn project(record: &Record, fields: &[&str]) -> Record {
    if fields.is_empty() {
        return record.clone();
    }
    let mut out = Record::new();
    out.insert("id".into(), record.get("id").cloned().unwrap_or(Value::Null));
    for field in fields {
        out.insert(
            field.to_string(),
            record.get(*field).cloned().unwrap_or(Value::Bool(false)),
        );
    }
    out
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Keep line subtotals and order totals consistent after a line changes.
fn recompute_order(tables: &mut HashMap<String, Table>, line_id: i64) {
    let Some(lines) = tables.get_mut("sale.order.line") else {
        return;
    };
    let Some(line) = lines.get_mut(line_id) else {
        return;
    };
    let qty = line.get("product_uom_qty").and_then(Value::as_f64).unwrap_or(0.0);
    let price = line.get("price_unit").and_then(Value::as_f64).unwrap_or(0.0);
    line.insert("price_total".into(), json!(round2(qty * price)));

    let Some(order_id) = line
        .get("order_id")
        .and_then(|v| v.get(0))
        .and_then(Value::as_i64)
    else {
        return;
    };

    let total: f64 = lines
        .rows
        .iter()
        .filter(|l| l.get("order_id").and_then(|v| v.get(0)).and_then(Value::as_i64) == Some(order_id))
        .filter_map(|l| l.get("price_total").and_then(Value::as_f64))
        .sum();

    if let Some(order) = tables.get_mut("sale.order").and_then(|t| t.get_mut(order_id)) {
        order.insert("amount_total".into(), json!(round2(total)));
    }
}

#[async_trait]
impl DataBackend for InMemoryBackend {
    async fn search(
        &self,
        model: &str,
        domain: &[Condition],
        limit: Option<usize>,
    ) -> Result<Vec<i64>, BackendError> {
        let tables = self.tables.read().await;
        let table = tables
            .get(model)
            .ok_or_else(|| BackendError::UnknownModel(model.to_string()))?;

        Ok(table
            .rows
            .iter()
            .filter(|r| domain.iter().all(|c| matches(r, c)))
            .filter_map(record_id)
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn read(&self, model: &str, ids: &[i64], fields: &[&str]) -> Result<Vec<Record>, BackendError> {
        let tables = self.tables.read().await;
        let table = tables
            .get(model)
            .ok_or_else(|| BackendError::UnknownModel(model.to_string()))?;

        Ok(ids
            .iter()
            .filter_map(|id| table.rows.iter().find(|r| record_id(r) == Some(*id)))
            .map(|r| project(r, fields))
            .collect())
    }

    async fn write(&self, model: &str, id: i64, values: Record) -> Result<(), BackendError> {
        let mut tables = self.tables.write().await;
        let record = tables
            .get_mut(model)
            .ok_or_else(|| BackendError::UnknownModel(model.to_string()))?
            .get_mut(id)
            .ok_or_else(|| BackendError::MissingRecord {
                model: model.to_string(),
                id,
            })?;

        for (k, v) in values {
            if k != "id" {
                record.insert(k, v);
            }
        }

        if model == "sale.order.line" {
            recompute_order(&mut tables, id);
        }
        Ok(())
    }

    async fn create(&self, model: &str, values: Record) -> Result<i64, BackendError> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(model)
            .ok_or_else(|| BackendError::UnknownModel(model.to_string()))?;
        Ok(table.insert(values))
    }
}

fn obj(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn seed(tables: &mut HashMap<String, Table>) {
    let mut put = |model: &str, value: Value| {
        if let Some(table) = tables.get_mut(model) {
            table.insert(obj(value));
        }
    };

    // Ids are assigned in insertion order, starting at 1 per model.
    put("crm.stage", json!({"name": "New", "sequence": 1}));
    put("crm.stage", json!({"name": "Qualified", "sequence": 2}));
    put("crm.stage", json!({"name": "Proposition", "sequence": 3}));
    put("crm.stage", json!({"name": "Won", "sequence": 4}));

    put("product.product", json!({"name": "Desk Lamp", "list_price": 49.99, "qty_available": 120.0, "uom_name": "Units"}));
    put("product.product", json!({"name": "Office Chair", "list_price": 189.0, "qty_available": 35.0, "uom_name": "Units"}));
    put("product.product", json!({"name": "Standing Desk", "list_price": 499.0, "qty_available": 12.0, "uom_name": "Units"}));
    put("product.product", json!({"name": "Monitor Arm", "list_price": 79.5, "qty_available": 0.0, "uom_name": "Units"}));

    put("res.partner", json!({"name": "Azure Interior", "email": "info@azure-interior.example", "phone": "+1 555 0100", "city": "Fremont", "country_id": [233, "United States"], "customer_rank": 3}));
    put("res.partner", json!({"name": "Deco Addict", "email": "hello@deco-addict.example", "phone": "+32 2 555 0101", "city": "Brussels", "country_id": [21, "Belgium"], "customer_rank": 1}));
    put("res.partner", json!({"name": "Wood Corner Supplies", "email": "sales@woodcorner.example", "phone": false, "city": "Lyon", "country_id": [75, "France"], "customer_rank": 0}));

    put("sale.order", json!({"name": "SO001", "partner_id": [1, "Azure Interior"], "amount_total": 477.98, "state": "sale", "date_order": "2026-09-01T09:30:00"}));
    put("sale.order", json!({"name": "SO002", "partner_id": [2, "Deco Addict"], "amount_total": 499.0, "state": "draft", "date_order": "2026-09-14T15:05:00"}));

    put("sale.order.line", json!({"order_id": [1, "SO001"], "product_id": [1, "Desk Lamp"], "product_uom_qty": 2.0, "price_unit": 49.99, "price_total": 99.98}));
    put("sale.order.line", json!({"order_id": [1, "SO001"], "product_id": [2, "Office Chair"], "product_uom_qty": 2.0, "price_unit": 189.0, "price_total": 378.0}));
    put("sale.order.line", json!({"order_id": [2, "SO002"], "product_id": [3, "Standing Desk"], "product_uom_qty": 1.0, "price_unit": 499.0, "price_total": 499.0}));

    put("crm.lead", json!({"name": "Office refit for Acme", "contact_name": "Jane Doe", "email_from": "jane@acme.example", "phone": "+1 555 0199", "stage_id": [1, "New"], "user_id": [2, "Mitchell Admin"]}));
    put("crm.lead", json!({"name": "Ergonomic chairs bulk order", "contact_name": "Raj Patel", "email_from": "raj@northwind.example", "phone": false, "stage_id": [2, "Qualified"], "user_id": false}));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_by_exact_name() {
        let backend = InMemoryBackend::seeded();
        let ids = backend
            .search("sale.order", &[Condition::eq("name", "SO002")], Some(1))
            .await
            .unwrap();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn ilike_is_case_insensitive_substring() {
        let backend = InMemoryBackend::seeded();
        let ids = backend
            .search("product.product", &[Condition::ilike("name", "desk")], None)
            .await
            .unwrap();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn eq_on_relational_field_compares_id() {
        let backend = InMemoryBackend::seeded();
        let ids = backend
            .search("sale.order.line", &[Condition::eq("order_id", 1)], None)
            .await
            .unwrap();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn gt_filters_numeric_field() {
        let backend = InMemoryBackend::seeded();
        let ids = backend
            .search("res.partner", &[Condition::gt("customer_rank", 0.0)], None)
            .await
            .unwrap();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn read_projects_fields_and_skips_missing_ids() {
        let backend = InMemoryBackend::seeded();
        let rows = backend
            .read("product.product", &[1, 99], &["name", "list_price"])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], 1);
        assert_eq!(rows[0]["name"], "Desk Lamp");
        assert!(rows[0].get("qty_available").is_none());
    }

    #[tokio::test]
    async fn line_write_recomputes_totals() {
        let backend = InMemoryBackend::seeded();
        backend
            .write("sale.order.line", 1, obj(json!({"product_uom_qty": 5.0})))
            .await
            .unwrap();

        let line = &backend.read("sale.order.line", &[1], &["price_total"]).await.unwrap()[0];
        assert_eq!(line["price_total"], 249.95);
        let order = &backend.read("sale.order", &[1], &["amount_total"]).await.unwrap()[0];
        assert_eq!(order["amount_total"], 627.95);
    }

    #[tokio::test]
    async fn write_unknown_record_fails() {
        let backend = InMemoryBackend::seeded();
        let err = backend
            .write("crm.lead", 42, Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::MissingRecord { id: 42, .. }));
    }

    #[tokio::test]
    async fn create_assigns_next_id() {
        let backend = InMemoryBackend::new();
        let a = backend.create("crm.lead", obj(json!({"name": "A"}))).await.unwrap();
        let b = backend.create("crm.lead", obj(json!({"name": "B"}))).await.unwrap();
        assert_eq!((a, b), (1, 2));
    }

    #[tokio::test]
    async fn unknown_model_is_error() {
        let backend = InMemoryBackend::new();
        assert!(matches!(
            backend.search("stock.move", &[], None).await,
            Err(BackendError::UnknownModel(_))
        ));
    }
}
