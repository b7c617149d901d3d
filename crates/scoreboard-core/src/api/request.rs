use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use super::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }

    /// POST and PUT carry a JSON body instead of query parameters.
    pub fn has_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        }
    }
}

/// Actions understood by the event service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    LoginTeam,
    LoginAdmin,
    GetTeams,
    GetTeam,
    AddPoints,
    GetTransactions,
    GetRating,
    GetTasks,
    GetAchievements,
    GetNotifications,
    MarkNotificationRead,
    GetStats,
    HealthCheck,
    GetEventInfo,
}

impl Action {
    pub const ALL: [Action; 14] = [
        Action::LoginTeam,
        Action::LoginAdmin,
        Action::GetTeams,
        Action::GetTeam,
        Action::AddPoints,
        Action::GetTransactions,
        Action::GetRating,
        Action::GetTasks,
        Action::GetAchievements,
        Action::GetNotifications,
        Action::MarkNotificationRead,
        Action::GetStats,
        Action::HealthCheck,
        Action::GetEventInfo,
    ];

    /// Wire name sent as the `action` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::LoginTeam => "loginTeam",
            Action::LoginAdmin => "loginAdmin",
            Action::GetTeams => "getTeams",
            Action::GetTeam => "getTeam",
            Action::AddPoints => "addPoints",
            Action::GetTransactions => "getTransactions",
            Action::GetRating => "getRating",
            Action::GetTasks => "getTasks",
            Action::GetAchievements => "getAchievements",
            Action::GetNotifications => "getNotifications",
            Action::MarkNotificationRead => "markNotificationRead",
            Action::GetStats => "getStats",
            Action::HealthCheck => "healthCheck",
            Action::GetEventInfo => "getEventInfo",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ApiError::InvalidRequest(format!("Unknown action: {}", s)))
    }
}

/// Ordered request parameters. Null values are never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(String, Value)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an earlier value. A null value removes the key.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value.into());
        self
    }

    pub fn with_opt<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.retain(|(k, _)| k != key);
        if !value.is_null() {
            self.0.push((key.to_string(), value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Render as query-string pairs. Strings are sent as-is, everything else as JSON text.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), value_to_param(v)))
            .collect()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.iter().cloned().collect::<Map<String, Value>>())
    }
}

fn value_to_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One call to the event service.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub action: String,
    pub params: Params,
    pub method: Method,
    pub body: Option<Value>,
}

impl ApiRequest {
    /// A GET request for `action`. The name is checked by `validate`.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: Params::new(),
            method: Method::Get,
            body: None,
        }
    }

    pub fn for_action(action: Action) -> Self {
        Self::new(action.as_str())
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.action.trim().is_empty() {
            return Err(ApiError::InvalidRequest("action must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn known_action(&self) -> Option<Action> {
        self.action.parse().ok()
    }

    /// JSON body for POST/PUT: the explicit body, else the parameters as an object.
    pub fn payload(&self) -> Option<Value> {
        if !self.method.has_body() {
            return None;
        }
        match self.body {
            Some(ref body) => Some(body.clone()),
            None => Some(self.params.to_json()),
        }
    }

    /// Look up an argument in the body first, then in the parameters.
    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.body
            .as_ref()
            .and_then(|b| b.get(key))
            .filter(|v| !v.is_null())
            .or_else(|| self.params.get(key))
    }

    pub fn arg_str(&self, key: &str) -> Option<String> {
        self.arg(key).map(value_to_param)
    }

    /// Integer argument; numeric strings are accepted.
    pub fn arg_i64(&self, key: &str) -> Option<i64> {
        match self.arg(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean argument; `"true"`/`"false"` strings are accepted.
    pub fn arg_bool(&self, key: &str) -> Option<bool> {
        match self.arg(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_round_trip_names() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
        assert!("dropTables".parse::<Action>().is_err());
    }

    #[test]
    fn test_params_omit_null_and_replace() {
        let params = Params::new()
            .with("teamId", 3)
            .with_opt("limit", None::<u32>)
            .with("reason", Value::Null)
            .with("teamId", 4);
        assert_eq!(params.query_pairs(), vec![("teamId".to_string(), "4".to_string())]);
        assert!(params.get("limit").is_none());
    }

    #[test]
    fn test_params_query_rendering() {
        let params = Params::new()
            .with("code", "TEAM01")
            .with("unreadOnly", true)
            .with("limit", 20);
        assert_eq!(
            params.query_pairs(),
            vec![
                ("code".to_string(), "TEAM01".to_string()),
                ("unreadOnly".to_string(), "true".to_string()),
                ("limit".to_string(), "20".to_string()),
            ]
        );
    }

    #[test]
    fn test_validate_rejects_empty_action() {
        assert!(ApiRequest::new("").validate().is_err());
        assert!(ApiRequest::new("   ").validate().is_err());
        assert!(ApiRequest::new("getTeams").validate().is_ok());
        // Unknown names are still valid requests; the service decides
        assert!(ApiRequest::new("getWeather").validate().is_ok());
    }

    #[test]
    fn test_payload_only_for_body_methods() {
        let get = ApiRequest::for_action(Action::GetTeam).with_params(Params::new().with("id", 3));
        assert_eq!(get.payload(), None);

        let post_params = ApiRequest::for_action(Action::MarkNotificationRead)
            .with_method(Method::Post)
            .with_params(Params::new().with("id", 7));
        assert_eq!(post_params.payload(), Some(json!({"id": 7})));

        let post_body = ApiRequest::for_action(Action::AddPoints)
            .with_method(Method::Post)
            .with_params(Params::new().with("ignored", 1))
            .with_body(json!({"teamId": 3}));
        assert_eq!(post_body.payload(), Some(json!({"teamId": 3})));
    }

    #[test]
    fn test_args_prefer_body_and_coerce() {
        let request = ApiRequest::for_action(Action::AddPoints)
            .with_method(Method::Post)
            .with_params(Params::new().with("teamId", "9").with("limit", "15"))
            .with_body(json!({"teamId": 3, "points": "50", "unreadOnly": "true"}));
        assert_eq!(request.arg_i64("teamId"), Some(3));
        assert_eq!(request.arg_i64("points"), Some(50));
        assert_eq!(request.arg_i64("limit"), Some(15));
        assert_eq!(request.arg_bool("unreadOnly"), Some(true));
        assert_eq!(request.arg_str("missing"), None);
    }
}
