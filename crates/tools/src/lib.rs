//! Built-in business tools for erpilot.
//!
//! Tools give the agent read and write access to the business system:
//! sales orders, products, CRM leads and customers. Every tool talks to a
//! [`DataBackend`], so the same registry runs against the seeded in-memory
//! store (demo, tests) or a live ERP over JSON-RPC.

pub mod backend;
pub mod crm;
pub mod customers;
pub mod products;
pub mod sales;

mod args;

use erpilot_config::{BackendConfig, BackendKind};
use erpilot_core::error::ToolError;
use erpilot_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;

pub use backend::{BackendError, Condition, DataBackend, InMemoryBackend, JsonRpcBackend, Record};
pub use backend::jsonrpc::JsonRpcCredentials;

/// Shared handle to the record store.
pub type Backend = Arc<dyn DataBackend>;

/// Turn a backend failure into the tool's domain error.
pub(crate) fn backend_failure(tool: &str) -> impl Fn(BackendError) -> ToolError + '_ {
    move |e| ToolError::failed(tool, e.to_string())
}

/// Create a registry with every built-in tool, in catalog order.
pub fn default_registry(backend: Backend) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(sales::SearchSalesOrderTool::new(backend.clone())));
    registry.register(Box::new(sales::FetchAllSalesOrdersTool::new(backend.clone())));
    registry.register(Box::new(sales::ChangeOrderLineQuantityTool::new(backend.clone())));
    registry.register(Box::new(sales::UpdateSalesOrderStateTool::new(backend.clone())));
    registry.register(Box::new(products::GetProductInfoTool::new(backend.clone())));
    registry.register(Box::new(products::FetchAllProductsTool::new(backend.clone())));
    registry.register(Box::new(products::UpdateProductPriceTool::new(backend.clone())));
    registry.register(Box::new(crm::CreateLeadTool::new(backend.clone())));
    registry.register(Box::new(crm::FetchAllLeadsTool::new(backend.clone())));
    registry.register(Box::new(crm::UpdateLeadStageTool::new(backend.clone())));
    registry.register(Box::new(customers::FetchAllCustomersTool::new(backend)));
    registry
}

/// Build the backend selected by the `[backend]` config section.
pub fn backend_from_config(config: &BackendConfig) -> Result<Backend, BackendError> {
    match config.kind {
        BackendKind::Memory => Ok(Arc::new(InMemoryBackend::seeded())),
        BackendKind::JsonRpc => {
            let missing = |field: &str| {
                BackendError::Misconfigured(format!("backend.{field} is required for jsonrpc"))
            };
            let credentials = JsonRpcCredentials {
                url: config.url.clone().ok_or_else(|| missing("url"))?,
                database: config.database.clone().ok_or_else(|| missing("database"))?,
                username: config.username.clone().ok_or_else(|| missing("username"))?,
                password: config.password.clone().unwrap_or_default(),
            };
            Ok(Arc::new(JsonRpcBackend::new(credentials, Duration::from_secs(30))?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erpilot_core::executor::ToolExecutor;
    use serde_json::json;

    #[test]
    fn registry_has_every_tool_in_order() {
        let registry = default_registry(Arc::new(InMemoryBackend::seeded()));
        assert_eq!(
            registry.names(),
            vec![
                "search_sales_order_by_name",
                "fetch_all_sales_orders",
                "change_sales_order_line_quantity",
                "update_sales_order_state",
                "get_product_info",
                "fetch_all_products",
                "update_product_price",
                "create_new_lead",
                "fetch_all_leads",
                "update_lead_stage",
                "fetch_all_customers",
            ]
        );
    }

    #[test]
    fn catalog_schemas_are_objects() {
        let registry = default_registry(Arc::new(InMemoryBackend::new()));
        for def in registry.definitions() {
            assert_eq!(def.parameters["type"], "object", "{}", def.name);
            assert!(!def.description.is_empty());
        }
        let change = registry
            .definitions()
            .into_iter()
            .find(|d| d.name == "change_sales_order_line_quantity")
            .unwrap();
        assert_eq!(
            change.parameters["required"],
            json!(["order_name", "product_name", "new_qty"])
        );
    }

    #[tokio::test]
    async fn executor_normalizes_domain_errors() {
        let executor = ToolExecutor::new(Arc::new(default_registry(Arc::new(InMemoryBackend::seeded()))));
        let result = executor
            .execute("search_sales_order_by_name", json!({"order_name": "SO404"}))
            .await;
        assert!(result.is_error());
        assert!(result.to_content().contains("Sales order 'SO404' not found."));
    }

    #[test]
    fn jsonrpc_backend_requires_url() {
        let config = BackendConfig {
            kind: BackendKind::JsonRpc,
            ..BackendConfig::default()
        };
        assert!(backend_from_config(&config).is_err());
    }
}
