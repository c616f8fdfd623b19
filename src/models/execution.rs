//! Executor request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Parameters for one executor invocation. The same shape is accepted on
/// POST /api/execute-action for alternative actions.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ExecuteActionParams {
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub detection_id: Option<String>,
    #[serde(default)]
    pub scenario_id: Option<String>,
    /// Scenario detail bag; the executor reads recommendedInstanceType and
    /// recommendedTimeout from here
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Map<String, Value>>,
    #[serde(default)]
    pub executed_by: Option<String>,
}

impl ExecuteActionParams {
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.as_ref()?.get(key)?.as_str()
    }

    pub fn detail_i64(&self, key: &str) -> Option<i64> {
        self.details.as_ref()?.get(key)?.as_i64()
    }
}

/// Outcome of one executor invocation. Handler failures surface here with
/// success=false; they are never raised past the executor boundary.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActionResult {
    pub success: bool,
    pub action: String,
    pub resource_id: String,
    pub resource_type: String,
    pub message: String,
    #[schema(value_type = Option<Object>)]
    pub previous_state: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub new_state: Option<Value>,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: i64,
}
