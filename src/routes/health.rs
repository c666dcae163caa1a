use actix_web::{HttpResponse, Responder, get, web};
use serde_json::json;

use crate::create_timestamp;
use crate::pipeline::Pipeline;

#[get("/health")]
pub async fn health_handler() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": create_timestamp(),
    }))
}

/// Service descriptor
#[get("/")]
pub async fn index_handler(pipeline: web::Data<Pipeline>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "language": pipeline.language(),
        "maxSourceChars": pipeline.max_source_chars(),
        "endpoints": {
            "compile": "POST /compile",
            "health": "GET /health",
        },
    }))
}
