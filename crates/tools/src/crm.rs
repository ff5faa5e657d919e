//! CRM lead tools.

use async_trait::async_trait;
use erpilot_core::error::ToolError;
use erpilot_core::tool::{ParamType, Tool, ToolArgs, ToolParameter};
use serde_json::{Value, json};
use tracing::info;

use crate::backend::Record;
use crate::{Backend, args, backend_failure};

const LEAD_FIELDS: &[&str] = &[
    "name",
    "contact_name",
    "email_from",
    "phone",
    "stage_id",
    "user_id",
];

pub struct CreateLeadTool {
    backend: Backend,
}

impl CreateLeadTool {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for CreateLeadTool {
    fn name(&self) -> &str {
        "create_new_lead"
    }

    fn description(&self) -> &str {
        "Creates a new lead/opportunity in the CRM module."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("name", ParamType::String, "Title of the lead"),
            ToolParameter::optional("contact_name", ParamType::String, "Contact person"),
            ToolParameter::optional("email", ParamType::String, "Contact email address"),
            ToolParameter::optional("phone", ParamType::String, "Contact phone number"),
        ]
    }

    async fn execute(&self, arguments: ToolArgs) -> Result<Value, ToolError> {
        let name = args::string(&arguments, "name")?;

        let mut values = Record::new();
        values.insert("name".into(), json!(name));
        for (arg, field) in [
            ("contact_name", "contact_name"),
            ("email", "email_from"),
            ("phone", "phone"),
        ] {
            if let Some(v) = args::optional_string(&arguments, arg) {
                values.insert(field.into(), json!(v));
            }
        }

        let lead_id = self
            .backend
            .create("crm.lead", values)
            .await
            .map_err(backend_failure(self.name()))?;

        info!(lead_id, "Lead created");
        Ok(json!({
            "success": true,
            "lead_id": lead_id,
            "message": format!("Successfully created lead '{name}' with ID {lead_id}."),
        }))
    }
}

pub struct FetchAllLeadsTool {
    backend: Backend,
}

impl FetchAllLeadsTool {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for FetchAllLeadsTool {
    fn name(&self) -> &str {
        "fetch_all_leads"
    }

    fn description(&self) -> &str {
        "Fetches all leads/opportunities with contact details, stage and salesperson."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![]
    }

    async fn execute(&self, _arguments: ToolArgs) -> Result<Value, ToolError> {
        let leads = self
            .backend
            .search_read("crm.lead", &[], LEAD_FIELDS, None)
            .await
            .map_err(backend_failure(self.name()))?;
        Ok(json!(leads))
    }
}

pub struct UpdateLeadStageTool {
    backend: Backend,
}

impl UpdateLeadStageTool {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for UpdateLeadStageTool {
    fn name(&self) -> &str {
        "update_lead_stage"
    }

    fn description(&self) -> &str {
        "Moves a lead/opportunity to another pipeline stage."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("lead_id", ParamType::Integer, "Id of the lead"),
            ToolParameter::required("new_stage_id", ParamType::Integer, "Id of the target stage"),
        ]
    }

    async fn execute(&self, arguments: ToolArgs) -> Result<Value, ToolError> {
        let lead_id = args::integer(&arguments, "lead_id")?;
        let stage_id = args::integer(&arguments, "new_stage_id")?;

        let lead = self
            .backend
            .read("crm.lead", &[lead_id], &["name"])
            .await
            .map_err(backend_failure(self.name()))?;
        if lead.is_empty() {
            return Err(ToolError::failed(
                self.name(),
                format!("Lead with ID {lead_id} not found."),
            ));
        }

        let stage = self
            .backend
            .read("crm.stage", &[stage_id], &["name"])
            .await
            .map_err(backend_failure(self.name()))?;
        let Some(stage_name) = stage
            .first()
            .and_then(|s| s.get("name"))
            .and_then(Value::as_str)
            .map(String::from)
        else {
            return Err(ToolError::failed(
                self.name(),
                format!("Stage with ID {stage_id} not found."),
            ));
        };

        let mut values = Record::new();
        values.insert("stage_id".into(), json!([stage_id, stage_name]));
        self.backend
            .write("crm.lead", lead_id, values)
            .await
            .map_err(backend_failure(self.name()))?;

        info!(lead_id, stage_id, "Lead stage changed");
        Ok(json!({
            "success": true,
            "message": format!("Lead {lead_id} moved to stage {stage_name}."),
        }))
    }
}
