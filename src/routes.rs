mod compile;
mod health;

pub use compile::*;
pub use health::*;

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

/// Response body shared by every outcome of `/compile`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompileResponse {
    pub success: bool,
    pub output: String,
    /// Milliseconds since the request was received
    pub execution_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompileResponse {
    /// Body refused before the pipeline started, so no time was spent on it
    fn rejected(message: &str) -> Self {
        Self {
            success: false,
            output: message.to_string(),
            execution_time: 0,
            error: Some("ValidationError".to_string()),
        }
    }
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let message = match &err {
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            "Request body too large"
        }
        JsonPayloadError::ContentType => "Expected a JSON body",
        _ => "Malformed request body",
    };
    log::debug!("Rejected request body: {err}");
    let response = HttpResponse::BadRequest().json(CompileResponse::rejected(message));
    InternalError::from_response(err, response).into()
}
