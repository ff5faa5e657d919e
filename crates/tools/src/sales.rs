//! Sales order tools: look up, list, change line quantities, move state.

use async_trait::async_trait;
use erpilot_core::error::ToolError;
use erpilot_core::tool::{ParamType, Tool, ToolArgs, ToolParameter};
use serde_json::{Value, json};
use tracing::info;

use crate::backend::{Condition, Record};
use crate::{Backend, args, backend_failure};

const ORDER_FIELDS: &[&str] = &["name", "partner_id", "amount_total", "state", "date_order"];
const LINE_FIELDS: &[&str] = &["product_id", "product_uom_qty", "price_unit", "price_total"];

/// States a sales order may be moved to.
pub const ORDER_STATES: &[&str] = &["draft", "sent", "sale", "done", "cancel"];

/// Find one order by exact reference.
async fn find_order(backend: &Backend, tool: &str, order_name: &str) -> Result<Record, ToolError> {
    backend
        .search_read("sale.order", &[Condition::eq("name", order_name)], ORDER_FIELDS, Some(1))
        .await
        .map_err(backend_failure(tool))?
        .into_iter()
        .next()
        .ok_or_else(|| ToolError::failed(tool, format!("Sales order '{order_name}' not found.")))
}

fn record_id(record: &Record) -> Option<i64> {
    record.get("id").and_then(Value::as_i64)
}

/// Display name half of a `[id, name]` relational value.
fn relation_name(value: Option<&Value>) -> &str {
    value
        .and_then(|v| v.get(1))
        .and_then(Value::as_str)
        .unwrap_or("")
}

pub struct SearchSalesOrderTool {
    backend: Backend,
}

impl SearchSalesOrderTool {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for SearchSalesOrderTool {
    fn name(&self) -> &str {
        "search_sales_order_by_name"
    }

    fn description(&self) -> &str {
        "Searches for a specific sales order by its name (e.g., S00004) and returns its details including order lines."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::required(
            "order_name",
            ParamType::String,
            "The order reference, e.g. S00004",
        )]
    }

    async fn execute(&self, arguments: ToolArgs) -> Result<Value, ToolError> {
        let order_name = args::string(&arguments, "order_name")?;
        let mut order = find_order(&self.backend, self.name(), &order_name).await?;
        let order_id = record_id(&order).unwrap_or_default();

        let lines = self
            .backend
            .search_read(
                "sale.order.line",
                &[Condition::eq("order_id", order_id)],
                LINE_FIELDS,
                None,
            )
            .await
            .map_err(backend_failure(self.name()))?;

        order.insert("order_line_details".into(), json!(lines));
        Ok(Value::Object(order))
    }
}

pub struct FetchAllSalesOrdersTool {
    backend: Backend,
}

impl FetchAllSalesOrdersTool {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for FetchAllSalesOrdersTool {
    fn name(&self) -> &str {
        "fetch_all_sales_orders"
    }

    fn description(&self) -> &str {
        "Fetches all sales orders with basic details (customer, total, state, date)."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![]
    }

    async fn execute(&self, _arguments: ToolArgs) -> Result<Value, ToolError> {
        let orders = self
            .backend
            .search_read("sale.order", &[], ORDER_FIELDS, None)
            .await
            .map_err(backend_failure(self.name()))?;
        Ok(json!(orders))
    }
}

pub struct ChangeOrderLineQuantityTool {
    backend: Backend,
}

impl ChangeOrderLineQuantityTool {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for ChangeOrderLineQuantityTool {
    fn name(&self) -> &str {
        "change_sales_order_line_quantity"
    }

    fn description(&self) -> &str {
        "Changes the quantity of a product in a specific sales order."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("order_name", ParamType::String, "The order reference, e.g. S00004"),
            ToolParameter::required(
                "product_name",
                ParamType::String,
                "Name (or part of the name) of the product on the order",
            ),
            ToolParameter::required("new_qty", ParamType::Number, "The new quantity"),
        ]
    }

    async fn execute(&self, arguments: ToolArgs) -> Result<Value, ToolError> {
        let order_name = args::string(&arguments, "order_name")?;
        let product_name = args::string(&arguments, "product_name")?;
        let new_qty = args::number(&arguments, "new_qty")?;
        if new_qty < 0.0 {
            return Err(ToolError::InvalidArguments("'new_qty' must not be negative".into()));
        }

        let order = find_order(&self.backend, self.name(), &order_name).await?;
        let order_id = record_id(&order).unwrap_or_default();

        let lines = self
            .backend
            .search_read(
                "sale.order.line",
                &[Condition::eq("order_id", order_id)],
                &["product_id"],
                None,
            )
            .await
            .map_err(backend_failure(self.name()))?;

        let needle = product_name.to_lowercase();
        let line_id = lines
            .iter()
            .find(|l| relation_name(l.get("product_id")).to_lowercase().contains(&needle))
            .and_then(record_id)
            .ok_or_else(|| {
                ToolError::failed(
                    self.name(),
                    format!("Product '{product_name}' not found in sales order '{order_name}'."),
                )
            })?;

        let mut values = Record::new();
        values.insert("product_uom_qty".into(), json!(new_qty));
        self.backend
            .write("sale.order.line", line_id, values)
            .await
            .map_err(backend_failure(self.name()))?;

        info!(order = %order_name, line_id, new_qty, "Order line quantity changed");
        Ok(json!({
            "success": true,
            "message": format!("Updated quantity for '{product_name}' in order '{order_name}' to {new_qty}."),
        }))
    }
}

pub struct UpdateSalesOrderStateTool {
    backend: Backend,
}

impl UpdateSalesOrderStateTool {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for UpdateSalesOrderStateTool {
    fn name(&self) -> &str {
        "update_sales_order_state"
    }

    fn description(&self) -> &str {
        "Updates the state of a sales order (e.g., 'draft', 'sent', 'sale', 'done', 'cancel')."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("order_name", ParamType::String, "The order reference, e.g. S00004"),
            ToolParameter::required(
                "new_state",
                ParamType::String,
                "One of: draft, sent, sale, done, cancel",
            ),
        ]
    }

    async fn execute(&self, arguments: ToolArgs) -> Result<Value, ToolError> {
        let order_name = args::string(&arguments, "order_name")?;
        let new_state = args::string(&arguments, "new_state")?.to_lowercase();

        let order = find_order(&self.backend, self.name(), &order_name).await?;

        if !ORDER_STATES.contains(&new_state.as_str()) {
            return Err(ToolError::failed(
                self.name(),
                format!(
                    "Invalid state '{new_state}'. Valid states are: {}",
                    ORDER_STATES.join(", ")
                ),
            ));
        }

        let mut values = Record::new();
        values.insert("state".into(), json!(new_state));
        self.backend
            .write("sale.order", record_id(&order).unwrap_or_default(), values)
            .await
            .map_err(backend_failure(self.name()))?;

        info!(order = %order_name, state = %new_state, "Order state changed");
        Ok(json!({
            "success": true,
            "message": format!("Sales order '{order_name}' state updated to '{new_state}'."),
        }))
    }
}
