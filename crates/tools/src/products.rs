//! Product tools: price and stock lookup, catalog listing, price changes.

use async_trait::async_trait;
use erpilot_core::error::ToolError;
use erpilot_core::tool::{ParamType, Tool, ToolArgs, ToolParameter};
use serde_json::{Value, json};
use tracing::info;

use crate::backend::{Condition, Record};
use crate::{Backend, args, backend_failure};

const PRODUCT_FIELDS: &[&str] = &["name", "list_price", "qty_available", "uom_name"];

/// First product whose name contains `product_name`, case-insensitively.
async fn find_product(backend: &Backend, tool: &str, product_name: &str) -> Result<Record, ToolError> {
    backend
        .search_read(
            "product.product",
            &[Condition::ilike("name", product_name)],
            PRODUCT_FIELDS,
            Some(1),
        )
        .await
        .map_err(backend_failure(tool))?
        .into_iter()
        .next()
        .ok_or_else(|| ToolError::failed(tool, format!("Product '{product_name}' not found.")))
}

pub struct GetProductInfoTool {
    backend: Backend,
}

impl GetProductInfoTool {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for GetProductInfoTool {
    fn name(&self) -> &str {
        "get_product_info"
    }

    fn description(&self) -> &str {
        "Searches for a product by its name and returns its id, price, and quantity on hand."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::required(
            "product_name",
            ParamType::String,
            "Product name or part of it",
        )]
    }

    async fn execute(&self, arguments: ToolArgs) -> Result<Value, ToolError> {
        let product_name = args::string(&arguments, "product_name")?;
        let product = find_product(&self.backend, self.name(), &product_name).await?;
        Ok(Value::Object(product))
    }
}

pub struct FetchAllProductsTool {
    backend: Backend,
}

impl FetchAllProductsTool {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for FetchAllProductsTool {
    fn name(&self) -> &str {
        "fetch_all_products"
    }

    fn description(&self) -> &str {
        "Fetches all products with their name, price, and quantity on hand."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![]
    }

    async fn execute(&self, _arguments: ToolArgs) -> Result<Value, ToolError> {
        let products = self
            .backend
            .search_read("product.product", &[], PRODUCT_FIELDS, None)
            .await
            .map_err(backend_failure(self.name()))?;
        Ok(json!(products))
    }
}

pub struct UpdateProductPriceTool {
    backend: Backend,
}

impl UpdateProductPriceTool {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for UpdateProductPriceTool {
    fn name(&self) -> &str {
        "update_product_price"
    }

    fn description(&self) -> &str {
        "Updates the sales price of a product."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("product_name", ParamType::String, "Product name or part of it"),
            ToolParameter::required("new_price", ParamType::Number, "The new list price"),
        ]
    }

    async fn execute(&self, arguments: ToolArgs) -> Result<Value, ToolError> {
        let product_name = args::string(&arguments, "product_name")?;
        let new_price = args::number(&arguments, "new_price")?;
        if new_price < 0.0 {
            return Err(ToolError::InvalidArguments("'new_price' must not be negative".into()));
        }

        let product = find_product(&self.backend, self.name(), &product_name).await?;
        let id = product.get("id").and_then(Value::as_i64).unwrap_or_default();

        let mut values = Record::new();
        values.insert("list_price".into(), json!(new_price));
        self.backend
            .write("product.product", id, values)
            .await
            .map_err(backend_failure(self.name()))?;

        info!(product = %product_name, product_id = id, new_price, "Product price changed");
        Ok(json!({
            "success": true,
            "message": format!("Updated price for '{product_name}' to {new_price}."),
        }))
    }
}
