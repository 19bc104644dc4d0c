use actix_web::{web, HttpResponse};
use serde_json::json;

use super::error::ApiResult;
use super::state::ApiState;
use crate::models::{CompilationRequest, CompressionRequest, MergeRequest};
use crate::pipeline::stream_and_discard;

/// Compile a tender response from its checklist documents
pub async fn compile(
    request: web::Json<CompilationRequest>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let report = state.pipeline.compile(request.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "artifact_path": report.artifact.file_path,
        "file_size_bytes": report.artifact.file_size_bytes,
        "page_count": report.artifact.page_count,
        "created_at": report.artifact.created_at,
        "index_pages": report.index_pages,
        "documents": report.documents,
        "stamp": report.stamp,
    })))
}

/// Compress a compiled artifact with a named profile
pub async fn compress(
    request: web::Json<CompressionRequest>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let CompressionRequest {
        artifact_path,
        profile,
    } = request.into_inner();
    let result = state.pipeline.compress(artifact_path, profile).await?;

    Ok(HttpResponse::Ok().json(result))
}

/// Merge compiled artifacts and stream the bundle back. The bundle is
/// removed once streamed or after the configured grace period.
pub async fn merge(
    request: web::Json<MergeRequest>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let artifact = state.pipeline.merge(request.into_inner()).await?;
    let file_name = artifact
        .file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "bundle.pdf".to_string());

    let body = stream_and_discard(artifact.file_path.clone(), state.pipeline.merge_grace()).await?;

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", file_name),
        ))
        .insert_header(("X-Page-Count", artifact.page_count.to_string()))
        .streaming(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::configure_routes;
    use crate::core::PipelineConfig;
    use crate::metrics::PipelineMetrics;
    use crate::models::{ChecklistDocument, DocumentLocation};
    use crate::pdf::fixtures::write_labelled_pdf;
    use crate::storage::InMemoryRegistry;
    use actix_web::{test, App};
    use std::path::Path;
    use std::sync::Arc;

    fn state(root: &Path) -> ApiState {
        write_labelled_pdf(&root.join("a.pdf"), "A", 1);
        let mut registry = InMemoryRegistry::new();
        registry.insert_checklist_document(ChecklistDocument {
            id: "pan".to_string(),
            checklist_id: 4,
            display_name: "PAN".to_string(),
            location: DocumentLocation::DirectPath("a.pdf".to_string()),
        });
        let config = PipelineConfig {
            storage_root: root.to_path_buf(),
            output_dir: root.join("out"),
            ghostscript_binary: "/nonexistent/gs".to_string(),
            ..PipelineConfig::default()
        };
        ApiState::with_registry(config, Arc::new(registry), Arc::new(PipelineMetrics::new().unwrap()))
    }

    #[actix_web::test]
    async fn test_compile_endpoint_reports_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(dir.path())))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/compilations")
            .set_json(json!({
                "tender_id": 5,
                "response_name": "Bid",
                "response_type": "technical",
                "checklist_id": 4,
                "documents": [
                    { "id": "pan", "order": 1 },
                    { "id": "ghost", "order": 2 }
                ],
                "include_index": true
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["page_count"], 2);
        assert_eq!(body["index_pages"], 1);
        assert_eq!(body["documents"][0]["outcome"]["status"], "included");
        assert_eq!(body["documents"][1]["outcome"]["reason"]["kind"], "not_found");
        assert!(Path::new(body["artifact_path"].as_str().unwrap()).is_file());
    }

    #[actix_web::test]
    async fn test_errors_map_to_status_codes() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(dir.path())))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/compilations")
            .set_json(json!({
                "tender_id": 5,
                "response_name": "Bid",
                "response_type": "emd",
                "checklist_id": 4,
                "documents": [{ "id": "nothing", "order": 1 }]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["kind"], "no_valid_documents");

        let req = test::TestRequest::post()
            .uri("/api/v1/compilations")
            .set_json(json!({
                "tender_id": 5,
                "response_name": "Bid",
                "response_type": "technical",
                "checklist_id": 4,
                "documents": [{ "id": "pan", "order": 1 }],
                "include_index": true,
                "index_start_from": 0
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status().as_u16(), 400);

        let req = test::TestRequest::post()
            .uri("/api/v1/compilations/compress")
            .set_json(json!({
                "artifact_path": dir.path().join("missing.pdf"),
                "profile": "extreme"
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status().as_u16(), 404);

        let req = test::TestRequest::post()
            .uri("/api/v1/compilations/merge")
            .set_json(json!({ "source_paths": [dir.path().join("missing.pdf")] }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status().as_u16(), 404);
    }

    #[actix_web::test]
    async fn test_merge_streams_pdf_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(dir.path())))
                .configure(configure_routes),
        )
        .await;

        let bundle = dir.path().join("bundle.pdf");
        let req = test::TestRequest::post()
            .uri("/api/v1/compilations/merge")
            .set_json(json!({
                "source_paths": [dir.path().join("a.pdf"), dir.path().join("a.pdf")],
                "output_path": bundle
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert_eq!(resp.headers().get("content-type").unwrap(), "application/pdf");
        assert_eq!(resp.headers().get("x-page-count").unwrap(), "2");

        let body = test::read_body(resp).await;
        assert!(body.starts_with(b"%PDF"));
        assert!(!bundle.exists());
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(App::new().configure(configure_routes)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
    }
}
