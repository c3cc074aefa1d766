//! HTTP API tests driven through the real router with a scripted model.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_json, build_test_router, get, sample_image, send, wait_for_job, MultipartBody};
use image::ImageFormat;
use nanozilla_reactor::ai::MockImageTransformClient;

fn mock() -> Arc<MockImageTransformClient> {
    Arc::new(MockImageTransformClient::new())
}

fn png() -> Vec<u8> {
    sample_image(40, 30, ImageFormat::Png)
}

#[tokio::test]
async fn health_reports_components() {
    let app = build_test_router(mock());
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["components"]["reactor_agent"], "operational");
    assert_eq!(json["components"]["image_processor"], "operational");
}

#[tokio::test]
async fn root_returns_banner() {
    let json = body_json(get(build_test_router(mock()), "/").await).await;
    assert_eq!(json["status"], "operational");
    assert_eq!(json["version"], "2.0.0");
}

#[tokio::test]
async fn colorize_returns_hex_image_and_corrected_prompt() {
    let transformer = mock();
    let app = build_test_router(transformer.clone());

    let request = MultipartBody::new()
        .file("image", "photo.png", "image/png", &png())
        .text("style_prompt", "a vintaje sunset")
        .text("quality", "medium")
        .into_request("/api/v1/colorize");
    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["style_prompt_used"], "a vintage sunset");
    assert_eq!(json["data"]["image_info"]["width"], 40);
    assert_eq!(json["data"]["image_info"]["height"], 30);
    assert_eq!(json["data"]["image_info"]["format"], "PNG");
    assert_eq!(json["data"]["image_info"]["color_mode"], "Color");
    assert_eq!(json["data"]["spelling_issues"][0]["type"], "spelling");
    assert!(json["data"]["generation_id"]
        .as_str()
        .unwrap()
        .starts_with("gen_"));
    assert_eq!(json["metadata"]["model"], "imagen-3.0-generate-002");

    let image = hex::decode(json["data"]["image_data"].as_str().unwrap()).unwrap();
    assert_eq!(image::guess_format(&image).unwrap(), ImageFormat::Png);
    assert_eq!(transformer.received_prompts(), vec!["a vintage sunset"]);
}

#[tokio::test]
async fn colorize_converts_output_format() {
    let app = build_test_router(mock());

    let request = MultipartBody::new()
        .file("image", "photo.jpg", "image/jpeg", &sample_image(16, 16, ImageFormat::Jpeg))
        .text("style_prompt", "cool blue hour")
        .text("output_format", "jpeg")
        .into_request("/api/v1/colorize");
    let json = body_json(send(app, request).await).await;

    assert_eq!(json["data"]["image_info"]["format"], "JPEG");
    let image = hex::decode(json["data"]["image_data"].as_str().unwrap()).unwrap();
    assert_eq!(&image[..3], &[0xFF, 0xD8, 0xFF]);
}

#[tokio::test]
async fn colorize_validation_errors_return_400_envelope() {
    let cases = [
        (
            MultipartBody::new().text("style_prompt", "sepia"),
            "VALIDATION_ERROR",
        ),
        (
            MultipartBody::new()
                .file("image", "anim.gif", "image/gif", &png())
                .text("style_prompt", "sepia"),
            "VALIDATION_ERROR",
        ),
        (
            MultipartBody::new().file("image", "photo.png", "image/png", &png()),
            "VALIDATION_ERROR",
        ),
        (
            MultipartBody::new()
                .file("image", "photo.png", "image/png", &png())
                .text("style_prompt", "sepia")
                .text("quality", "ultra"),
            "VALIDATION_ERROR",
        ),
        (
            MultipartBody::new()
                .file("image", "photo.png", "image/png", &png())
                .text("style_prompt", "sepia")
                .text("retry_attempts", "9"),
            "VALIDATION_ERROR",
        ),
        (
            MultipartBody::new()
                .file("image", "photo.png", "image/png", &png())
                .text("style_prompt", "sepia")
                .text("output_format", "tiff"),
            "UNSUPPORTED_FORMAT",
        ),
        (
            MultipartBody::new()
                .file("image", "photo.png", "image/png", b"definitely not a png")
                .text("style_prompt", "sepia"),
            "DECODE_ERROR",
        ),
    ];

    let transformer = mock();
    for (body, code) in cases {
        let app = build_test_router(transformer.clone());
        let response = send(app, body.into_request("/api/v1/colorize")).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], code);
        assert!(json["error"]["message"].is_string());
    }

    assert_eq!(transformer.get_call_count(), 0);
}

#[tokio::test]
async fn colorize_fatal_remote_error_returns_502() {
    let transformer = Arc::new(MockImageTransformClient::new().with_failure("Invalid API key"));
    let app = build_test_router(transformer.clone());

    let request = MultipartBody::new()
        .file("image", "photo.png", "image/png", &png())
        .text("style_prompt", "sepia")
        .text("retry_attempts", "5")
        .into_request("/api/v1/colorize");
    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "AUTHENTICATION_ERROR");
    assert_eq!(
        json["error"]["message"],
        "Authentication error: check the configured API key"
    );
    assert_eq!(transformer.get_call_count(), 1);
}

#[tokio::test]
async fn batch_is_accepted_and_completes() {
    let app = build_test_router(mock());

    let request = MultipartBody::new()
        .file("images", "a.png", "image/png", &png())
        .file("images", "b.png", "image/png", b"corrupt")
        .file("images", "c.png", "image/png", &png())
        .text("style_prompt", "soft watercolour wash")
        .text("concurrent", "2")
        .into_request("/api/v1/colorize/batch");
    let response = send(app.clone(), request).await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "processing");
    assert_eq!(json["data"]["total_images"], 3);
    let job_id = json["data"]["job_id"].as_str().unwrap().to_string();
    assert!(job_id.starts_with("batch_"));

    let job = wait_for_job(&app, &job_id).await;
    let data = &job["data"];
    assert_eq!(data["status"], "completed");
    assert_eq!(data["progress"], 100);
    assert_eq!(data["processed_images"], 3);

    let results = data["results"].as_array().unwrap();
    let filenames: Vec<&str> = results
        .iter()
        .map(|r| r["original_filename"].as_str().unwrap())
        .collect();
    assert_eq!(filenames, vec!["a.png", "b.png", "c.png"]);
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[1]["status"], "failure");
    assert_eq!(results[2]["status"], "success");
}

#[tokio::test]
async fn batch_rejects_too_many_images_and_bad_concurrency() {
    let mut too_many = MultipartBody::new().text("style_prompt", "sepia");
    for i in 0..11 {
        too_many = too_many.file("images", &format!("{i}.png"), "image/png", &png());
    }
    let response = send(
        build_test_router(mock()),
        too_many.into_request("/api/v1/colorize/batch"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bad_concurrency = MultipartBody::new()
        .file("images", "a.png", "image/png", &png())
        .text("style_prompt", "sepia")
        .text("concurrency", "9");
    let response = send(
        build_test_router(mock()),
        bad_concurrency.into_request("/api/v1/colorize/batch"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_job_returns_404() {
    let response = get(build_test_router(mock()), "/api/v1/jobs/batch_000000000000").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn usage_counts_successful_generations() {
    let app = build_test_router(mock());

    let request = MultipartBody::new()
        .file("image", "photo.png", "image/png", &png())
        .text("style_prompt", "sepia")
        .into_request("/api/v1/colorize");
    assert_eq!(send(app.clone(), request).await.status(), StatusCode::OK);

    let json = body_json(get(app, "/api/v1/analytics/usage").await).await;
    let data = &json["data"];
    assert_eq!(data["plan"], "pro");
    assert_eq!(data["monthly_quota"], 1000);
    assert_eq!(data["requests_used"], 1);
    assert_eq!(data["requests_remaining"], 999);
    assert_eq!(data["metrics"]["total_generations"], 1);
    assert_eq!(data["metrics"]["failed_generations"], 0);
    assert_eq!(data["metrics"]["success_rate"], 1.0);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let response = get(build_test_router(mock()), "/this-route-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
