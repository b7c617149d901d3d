use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ApiError;
use crate::models::{
    Achievement, Admin, EventInfo, Notification, RatingEntry, Stats, Task, Team, Transaction,
};

/// Response envelope: `{"success": bool, "error"?: string, ...action fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// JavaScript-style truthiness, as the service's `success` flag is not always a bool.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            fields: Map::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            fields: Map::new(),
        }
    }

    /// Add an action field. Values that fail to serialize are stored as null.
    pub fn with(mut self, name: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Normalize a raw service reply. A non-object body is an invalid response.
    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        let mut fields = match value {
            Value::Object(map) => map,
            other => {
                return Err(ApiError::unparseable("expected a JSON object", &other.to_string()))
            }
        };

        let success = fields.remove("success").map_or(false, |v| is_truthy(&v));
        let error = match fields.remove("error") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        };

        Ok(Self { success, error, fields })
    }

    /// `Ok(self)` when successful, else the server-reported failure.
    pub fn into_result(self) -> Result<Self, ApiError> {
        if self.success {
            Ok(self)
        } else {
            Err(ApiError::from_server_message(self.error.as_deref()))
        }
    }

    /// Server error text, or the generic default.
    pub fn error_message(&self) -> String {
        ApiError::from_server_message(self.error.as_deref()).to_string()
    }

    /// Deserialize an optional field. A present field of the wrong shape is an error.
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ApiError> {
        match self.fields.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                ApiError::InvalidResponse(format!("field `{}` has unexpected shape: {}", name, e))
            }),
        }
    }

    pub fn require<T: DeserializeOwned>(&self, name: &str) -> Result<T, ApiError> {
        self.field(name)?
            .ok_or_else(|| ApiError::InvalidResponse(format!("missing field `{}`", name)))
    }

    /// List field, treating an absent list as empty.
    fn list<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, ApiError> {
        Ok(self.field(name)?.unwrap_or_default())
    }

    pub fn team(&self) -> Result<Option<Team>, ApiError> {
        self.field("team")
    }

    pub fn teams(&self) -> Result<Vec<Team>, ApiError> {
        self.list("teams")
    }

    pub fn rating(&self) -> Result<Vec<RatingEntry>, ApiError> {
        self.list("rating")
    }

    pub fn transactions(&self) -> Result<Vec<Transaction>, ApiError> {
        self.list("transactions")
    }

    pub fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        self.list("notifications")
    }

    pub fn tasks(&self) -> Result<Vec<Task>, ApiError> {
        self.list("tasks")
    }

    pub fn achievements(&self) -> Result<Vec<Achievement>, ApiError> {
        self.list("achievements")
    }

    pub fn stats(&self) -> Result<Option<Stats>, ApiError> {
        self.field("stats")
    }

    pub fn event(&self) -> Result<Option<EventInfo>, ApiError> {
        self.field("event")
    }

    pub fn admin(&self) -> Result<Option<Admin>, ApiError> {
        self.field("admin")
    }

    pub fn token(&self) -> Option<&str> {
        self.fields.get("token").and_then(Value::as_str)
    }
}
