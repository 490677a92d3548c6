//! Hosted computer-vision client: image in, captions and tags out.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

const ANALYZE_PATH: &str = "vision/v3.2/analyze";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Computer Vision is not configured")]
    NotConfigured,

    #[error("Computer Vision is not reachable at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Computer Vision returned error (status {status}): {message}")]
    Service { status: u16, message: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Computer Vision returned no caption for the image")]
    NoCaption,
}

/// One generated caption.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Caption {
    pub text: String,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImageDescription {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub captions: Vec<Caption>,
}

impl ImageDescription {
    /// The first caption, as the service ranks them.
    pub fn primary_caption(&self) -> Result<&str, VisionError> {
        self.captions
            .first()
            .map(|c| c.text.as_str())
            .ok_or(VisionError::NoCaption)
    }

    /// Tags joined with `;`, the form stored in blob metadata.
    pub fn joined_tags(&self) -> String {
        self.tags.join(";")
    }
}

/// Describes images. Implemented by the hosted service client and test mocks.
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn describe(&self, image: &[u8]) -> Result<ImageDescription, VisionError>;
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    description: Option<ImageDescription>,
}

#[derive(Deserialize)]
struct ServiceErrorBody {
    error: Option<ServiceErrorDetail>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct ServiceErrorDetail {
    message: String,
}

/// Azure Computer Vision `analyze` endpoint with the Description feature.
pub struct AzureVisionClient {
    endpoint: String,
    key: String,
    client: reqwest::Client,
}

impl AzureVisionClient {
    pub fn new(endpoint: &str, key: &str) -> Result<Self, VisionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| VisionError::HttpClient(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key: key.to_string(),
            client,
        })
    }

    fn analyze_url(&self) -> String {
        format!("{}/{}?visualFeatures=Description", self.endpoint, ANALYZE_PATH)
    }
}

#[async_trait]
impl VisionClient for AzureVisionClient {
    async fn describe(&self, image: &[u8]) -> Result<ImageDescription, VisionError> {
        let start = std::time::Instant::now();
        let response = self
            .client
            .post(self.analyze_url())
            .header(SUBSCRIPTION_KEY_HEADER, &self.key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    VisionError::Connection(self.endpoint.clone())
                } else if e.is_timeout() {
                    VisionError::HttpClient(format!(
                        "Request timed out after {REQUEST_TIMEOUT_SECS}s"
                    ))
                } else {
                    VisionError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VisionError::ResponseParsing(e.to_string()))?;
        if !status.is_success() {
            return Err(VisionError::Service {
                status: status.as_u16(),
                message: service_error_message(&body),
            });
        }

        let description = parse_analyze_response(&body)?;
        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            captions = description.captions.len(),
            tags = description.tags.len(),
            "Image described"
        );
        Ok(description)
    }
}

fn parse_analyze_response(body: &str) -> Result<ImageDescription, VisionError> {
    let parsed: AnalyzeResponse =
        serde_json::from_str(body).map_err(|e| VisionError::ResponseParsing(e.to_string()))?;
    parsed
        .description
        .ok_or_else(|| VisionError::ResponseParsing("response has no description".into()))
}

fn service_error_message(body: &str) -> String {
    match serde_json::from_str::<ServiceErrorBody>(body) {
        Ok(ServiceErrorBody {
            error: Some(detail), ..
        }) => detail.message,
        Ok(ServiceErrorBody {
            message: Some(message),
            ..
        }) => message,
        _ => body.to_string(),
    }
}

/// Stand-in when no vision credentials are configured; every call fails.
pub struct DisabledVision;

#[async_trait]
impl VisionClient for DisabledVision {
    async fn describe(&self, _image: &[u8]) -> Result<ImageDescription, VisionError> {
        Err(VisionError::NotConfigured)
    }
}

/// Mock vision client for testing; returns a fixed description.
pub struct MockVisionClient {
    description: ImageDescription,
}

impl MockVisionClient {
    pub fn new(caption: &str, tags: &[&str]) -> Self {
        Self {
            description: ImageDescription {
                tags: tags.iter().map(|t| t.to_string()).collect(),
                captions: vec![Caption {
                    text: caption.to_string(),
                    confidence: 0.9,
                }],
            },
        }
    }

    /// A client whose description carries no captions.
    pub fn without_caption() -> Self {
        Self {
            description: ImageDescription::default(),
        }
    }
}

#[async_trait]
impl VisionClient for MockVisionClient {
    async fn describe(&self, _image: &[u8]) -> Result<ImageDescription, VisionError> {
        Ok(self.description.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_description_feature() {
        let body = r#"{
            "description": {
                "tags": ["dog", "outdoor", "grass"],
                "captions": [{"text": "a dog lying in the grass", "confidence": 0.93}]
            },
            "requestId": "abc",
            "metadata": {"width": 640, "height": 480, "format": "Jpeg"}
        }"#;
        let description = parse_analyze_response(body).unwrap();
        assert_eq!(description.primary_caption().unwrap(), "a dog lying in the grass");
        assert_eq!(description.joined_tags(), "dog;outdoor;grass");
    }

    #[test]
    fn missing_description_is_a_parse_error() {
        assert!(matches!(
            parse_analyze_response(r#"{"requestId":"x"}"#),
            Err(VisionError::ResponseParsing(_))
        ));
    }

    #[test]
    fn empty_captions_yield_no_caption_error() {
        let description = parse_analyze_response(r#"{"description":{"tags":[],"captions":[]}}"#)
            .unwrap();
        assert!(matches!(description.primary_caption(), Err(VisionError::NoCaption)));
        assert_eq!(description.joined_tags(), "");
    }

    #[test]
    fn service_error_message_prefers_structured_message() {
        assert_eq!(
            service_error_message(r#"{"error":{"code":"401","message":"Access denied"}}"#),
            "Access denied"
        );
        assert_eq!(
            service_error_message(r#"{"code":"InvalidImageFormat","message":"Input data is not a valid image."}"#),
            "Input data is not a valid image."
        );
        assert_eq!(service_error_message("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn analyze_url_requests_description() {
        let client = AzureVisionClient::new("https://pix.cognitiveservices.azure.com/", "k").unwrap();
        assert_eq!(
            client.analyze_url(),
            "https://pix.cognitiveservices.azure.com/vision/v3.2/analyze?visualFeatures=Description"
        );
    }

    #[tokio::test]
    async fn disabled_client_reports_not_configured() {
        assert!(matches!(
            DisabledVision.describe(b"img").await,
            Err(VisionError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn mock_returns_configured_description() {
        let mock = MockVisionClient::new("a red square", &["red", "square"]);
        let d = mock.describe(b"img").await.unwrap();
        assert_eq!(d.primary_caption().unwrap(), "a red square");
        assert_eq!(d.joined_tags(), "red;square");
    }

    // ── Against a local analyze endpoint ────────────────────────────────

    use std::sync::{Arc, Mutex};

    use axum::body::Bytes;
    use axum::http::{HeaderMap, StatusCode, Uri};
    use axum::routing::post;

    #[derive(Debug, Clone)]
    struct Seen {
        query: String,
        headers: HeaderMap,
        body: Vec<u8>,
    }

    /// Serve `status` + `reply` on the analyze path and record each request.
    async fn start_fake_vision(
        status: StatusCode,
        reply: &'static str,
    ) -> (AzureVisionClient, Arc<Mutex<Vec<Seen>>>) {
        let seen: Arc<Mutex<Vec<Seen>>> = Arc::default();
        let recorder = seen.clone();
        let app = axum::Router::new().route(
            &format!("/{ANALYZE_PATH}"),
            post(move |uri: Uri, headers: HeaderMap, body: Bytes| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().unwrap().push(Seen {
                        query: uri.query().unwrap_or_default().to_string(),
                        headers,
                        body: body.to_vec(),
                    });
                    (status, reply)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = AzureVisionClient::new(&format!("http://{addr}/"), "vision-secret").unwrap();
        (client, seen)
    }

    #[tokio::test]
    async fn describe_posts_image_with_subscription_key() {
        let (client, seen) = start_fake_vision(
            StatusCode::OK,
            r#"{"description":{"tags":["cat","indoor"],"captions":[{"text":"a cat on a sofa","confidence":0.8}]}}"#,
        )
        .await;

        let description = client.describe(b"\x89PNG").await.unwrap();
        assert_eq!(description.primary_caption().unwrap(), "a cat on a sofa");
        assert_eq!(description.joined_tags(), "cat;indoor");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].query, "visualFeatures=Description");
        assert_eq!(seen[0].headers["ocp-apim-subscription-key"], "vision-secret");
        assert_eq!(seen[0].headers["content-type"], "application/octet-stream");
        assert_eq!(seen[0].body, b"\x89PNG");
    }

    #[tokio::test]
    async fn non_success_maps_to_service_error() {
        let (client, _) = start_fake_vision(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"code":"401","message":"Access denied due to invalid subscription key."}}"#,
        )
        .await;

        match client.describe(b"img").await {
            Err(VisionError::Service { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Access denied due to invalid subscription key.");
            }
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_without_description_is_a_parse_error() {
        let (client, _) = start_fake_vision(StatusCode::OK, r#"{"requestId":"r1"}"#).await;
        assert!(matches!(
            client.describe(b"img").await,
            Err(VisionError::ResponseParsing(_))
        ));
    }

    #[tokio::test]
    async fn closed_port_is_a_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = AzureVisionClient::new(&format!("http://{addr}"), "k").unwrap();
        assert!(matches!(
            client.describe(b"img").await,
            Err(VisionError::Connection(_))
        ));
    }
}
