#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use nanozilla_reactor::ai::MockImageTransformClient;
use nanozilla_reactor::app::{App, AppServices};
use nanozilla_reactor::generator::RetryPolicy;
use nanozilla_reactor::image::ImageNormalizer;
use nanozilla_reactor::server::build_router;
use serde_json::Value;
use tower::ServiceExt;

pub const BOUNDARY: &str = "nanozilla-test-boundary";

pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        min_call_interval: Duration::from_millis(1),
        backoff_unit: Duration::from_millis(1),
    }
}

/// App backed by the real normalizer and the given scripted model.
pub fn build_test_app(transformer: Arc<MockImageTransformClient>) -> Arc<App> {
    Arc::new(App::with_services(AppServices {
        policy: fast_policy(),
        ..AppServices::new(transformer, Arc::new(ImageNormalizer::new()))
    }))
}

pub fn build_test_router(transformer: Arc<MockImageTransformClient>) -> Router {
    build_router(build_test_app(transformer))
}

/// A patterned RGB image encoded in `format`.
pub fn sample_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 5 % 256) as u8, (y * 3 % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll a batch job over HTTP until it reaches a terminal status.
pub async fn wait_for_job(app: &Router, job_id: &str) -> Value {
    for _ in 0..500 {
        let json = body_json(get(app.clone(), &format!("/api/v1/jobs/{job_id}")).await).await;
        let status = json["data"]["status"].as_str().unwrap_or_default().to_string();
        if status == "completed" || status == "failed" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not finish");
}
