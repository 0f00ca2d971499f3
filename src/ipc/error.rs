use crate::backend::BackendError;
use crate::session::SessionError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<SessionError> for HandlerErr {
    fn from(e: SessionError) -> Self {
        let details = match &e {
            SessionError::Validation(issues) => Some(json!({ "rows": issues })),
            SessionError::Unreachable(detail) => {
                tracing::error!(detail = %detail, "collaborator unreachable");
                None
            }
            _ => None,
        };
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

impl From<BackendError> for HandlerErr {
    fn from(e: BackendError) -> Self {
        SessionError::from(e).into()
    }
}

pub fn reply(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(value) => ok(id, value),
        Err(error) => error.response(id),
    }
}
