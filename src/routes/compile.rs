use actix_web::{HttpResponse, Responder, post, web};
use serde::Deserialize;

use super::CompileResponse;
use crate::error::PipelineError;
use crate::pipeline::{CompileRequest, Pipeline};

/// Request body of `POST /compile`. A missing `code` is treated like an empty one.
#[derive(Deserialize, Debug)]
pub struct CompileBody {
    pub code: Option<String>,
    pub language: Option<String>,
    pub version: Option<String>,
}

#[post("/compile")]
pub async fn post_compile_handler(
    pipeline: web::Data<Pipeline>,
    body: web::Json<CompileBody>,
) -> impl Responder {
    let CompileBody {
        code,
        language,
        version,
    } = body.into_inner();

    let request = CompileRequest {
        source: code.unwrap_or_default(),
        language,
        version,
    };
    let report = pipeline.execute(request).await;
    let execution_time = report.elapsed.as_millis() as u64;

    match report.result {
        Ok(output) => HttpResponse::Ok().json(CompileResponse {
            success: true,
            output,
            execution_time,
            error: None,
        }),
        Err(err) => HttpResponse::build(err.status_code()).json(CompileResponse {
            success: false,
            output: err.output(),
            execution_time,
            error: Some(error_kind(&err).to_string()),
        }),
    }
}

fn error_kind(err: &PipelineError) -> &'static str {
    match err {
        PipelineError::Validation(_) => "ValidationError",
        PipelineError::SecurityViolation(_) => "SecurityViolation",
        PipelineError::Compile(_) => "CompileError",
        PipelineError::ExecutionTimeout(_) => "ExecutionTimeout",
        PipelineError::Runtime { .. } => "RuntimeError",
        PipelineError::Internal(_) => "InternalError",
    }
}
