use actix_cors::Cors;
use actix_web::{web, HttpResponse};

use super::error::ApiError;
use super::handlers;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health checks
        .route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(metrics_endpoint))

        // API v1
        .service(
            web::scope("/api/v1")
                .app_data(
                    web::JsonConfig::default()
                        .error_handler(|err, _req| ApiError::from(err).into()),
                )
                .wrap(
                    Cors::default()
                        .allowed_origin_fn(|origin, _req_head| {
                            origin.as_bytes().starts_with(b"http://localhost") ||
                            origin.as_bytes().starts_with(b"https://")
                        })
                        .allowed_methods(vec!["GET", "POST"])
                        .allowed_headers(vec!["Content-Type", "Authorization"])
                        .expose_headers(vec!["Content-Disposition", "X-Page-Count"])
                        .max_age(3600)
                )

                .service(
                    web::scope("/compilations")
                        .route("", web::post().to(handlers::compile))
                        .route("/compress", web::post().to(handlers::compress))
                        .route("/merge", web::post().to(handlers::merge))
                )
        );
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy"
    }))
}

async fn metrics_endpoint() -> HttpResponse {
    use prometheus::{Encoder, TextEncoder};

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
