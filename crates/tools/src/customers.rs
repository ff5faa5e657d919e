//! Customer listing.

use async_trait::async_trait;
use erpilot_core::error::ToolError;
use erpilot_core::tool::{Tool, ToolArgs, ToolParameter};
use serde_json::{Value, json};

use crate::backend::Condition;
use crate::{Backend, backend_failure};

pub struct FetchAllCustomersTool {
    backend: Backend,
}

impl FetchAllCustomersTool {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for FetchAllCustomersTool {
    fn name(&self) -> &str {
        "fetch_all_customers"
    }

    fn description(&self) -> &str {
        "Fetches all customers with their email, phone, city and country."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![]
    }

    async fn execute(&self, _arguments: ToolArgs) -> Result<Value, ToolError> {
        // Partners that have never bought anything are suppliers or contacts.
        let customers = self
            .backend
            .search_read(
                "res.partner",
                &[Condition::gt("customer_rank", 0.0)],
                &["name", "email", "phone", "city", "country_id"],
                None,
            )
            .await
            .map_err(backend_failure(self.name()))?;
        Ok(json!(customers))
    }
}
