use actix_web::{App, HttpServer, dev::Server, middleware, web};

use crate::config::ServerConfig;
use crate::pipeline::Pipeline;
use crate::routes::{health_handler, index_handler, json_error_handler, post_compile_handler};

/// A `\uXXXX` escape spends six bytes on one character
pub fn json_limit(max_source_chars: usize) -> usize {
    max_source_chars * 6 + 4096
}

/// Registers every route on an app; shared with the integration tests
pub fn configure(pipeline: web::Data<Pipeline>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let limit = json_limit(pipeline.max_source_chars());
        cfg.app_data(pipeline)
            .app_data(
                web::JsonConfig::default()
                    .limit(limit)
                    .error_handler(json_error_handler),
            )
            .service(post_compile_handler)
            .service(health_handler)
            .service(index_handler);
    }
}

pub fn build_server(server_config: ServerConfig, pipeline: Pipeline) -> std::io::Result<Server> {
    let pipeline = web::Data::new(pipeline);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .configure(configure(pipeline.clone()))
    })
    .bind((
        server_config
            .bind_address
            .unwrap_or("127.0.0.1".to_string()),
        server_config.bind_port.unwrap_or(3001),
    ))?
    .run();

    Ok(server)
}
