use crate::error::RelayError;
use crate::invoker::OcrInvoker;
use async_trait::async_trait;
use reqwest::{multipart, Client};
use std::path::Path;
use std::time::Duration;

const PROCESS_PATH: &str = "/process";
const MAX_ERROR_BODY: usize = 512;

/// Posts the staged image to a remote OCR service
#[derive(Debug, Clone)]
pub struct RemoteHttpInvoker {
    client: Client,
    url: String,
}

impl RemoteHttpInvoker {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), PROCESS_PATH),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl OcrInvoker for RemoteHttpInvoker {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn description(&self) -> String {
        format!("POST {}", self.url)
    }

    async fn invoke(&self, path: &Path, filename: &str) -> Result<String, RelayError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RelayError::Storage(format!("Failed to read staged upload: {}", e)))?;

        // The engine sees the name the client uploaded, not the staged one
        let file_name = if filename.trim().is_empty() {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string())
        } else {
            filename.to_string()
        };
        let mime = mime_for(Path::new(&file_name));
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| RelayError::Internal(format!("Invalid MIME type: {}", e)))?;
        let form = multipart::Form::new().part("file", part);

        tracing::debug!("Sending OCR request to {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.without_url().to_string()
                };
                RelayError::invocation(format!("Failed to connect to OCR service: {}", reason))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            RelayError::invocation(format!(
                "Failed to connect to OCR service: {}",
                e.without_url()
            ))
        })?;

        if !status.is_success() {
            let mut snippet = body;
            if snippet.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| snippet.is_char_boundary(*i))
                    .unwrap_or(0);
                snippet.truncate(cut);
            }
            return Err(RelayError::Invocation {
                message: format!("OCR service returned {}", status),
                output: Some(snippet),
            });
        }

        Ok(body)
    }
}

/// Guess the upload's MIME type from its extension
fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn staged(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
        let file = dir.path().join(name);
        std::fs::write(&file, b"fake image bytes").unwrap();
        file
    }

    #[test]
    fn test_url_appends_process_path() {
        let invoker = RemoteHttpInvoker::new("http://ocr:5001/", Duration::from_secs(5)).unwrap();
        assert_eq!(invoker.url(), "http://ocr:5001/process");
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for(Path::new("upload_x_a.PNG")), "image/png");
        assert_eq!(mime_for(Path::new("upload_x_a.jpeg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("upload_x")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_invoke_posts_multipart_file() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/process"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"name":"Jane Doe","id":"12345"}"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = staged(&dir, "upload_abc_test.png");
        let invoker = RemoteHttpInvoker::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();

        let body = invoker.invoke(&file, "test.png").await.unwrap();
        assert_eq!(body, r#"{"name":"Jane Doe","id":"12345"}"#);

        let requests = mock_server.received_requests().await.unwrap();
        let sent = String::from_utf8_lossy(&requests[0].body).to_string();
        assert!(sent.contains(r#"name="file""#));
        assert!(sent.contains(r#"filename="test.png""#));
        assert!(!sent.contains("upload_abc"));
        assert!(sent.contains("image/png"));
        assert!(sent.contains("fake image bytes"));
    }

    #[tokio::test]
    async fn test_blank_filename_falls_back_to_staged_name() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/process"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = staged(&dir, "upload_xyz_scan.jpg");
        let invoker = RemoteHttpInvoker::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();

        invoker.invoke(&file, "").await.unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        let sent = String::from_utf8_lossy(&requests[0].body).to_string();
        assert!(sent.contains(r#"filename="upload_xyz_scan.jpg""#));
        assert!(sent.contains("image/jpeg"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_invocation_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/process"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal failure"))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = staged(&dir, "a.png");
        let invoker = RemoteHttpInvoker::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();

        match invoker.invoke(&file, "a.png").await {
            Err(RelayError::Invocation { message, output }) => {
                assert!(message.contains("500"));
                assert_eq!(output.as_deref(), Some("internal failure"));
            }
            other => panic!("expected invocation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_bounded() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/process"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = staged(&dir, "a.png");
        let invoker =
            RemoteHttpInvoker::new(&mock_server.uri(), Duration::from_millis(300)).unwrap();

        let start = Instant::now();
        let err = invoker.invoke(&file, "a.png").await.unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(err.to_string().starts_with("Failed to connect to OCR service"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_invocation_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = staged(&dir, "a.png");
        // Port 9 (discard) is not expected to be listening locally
        let invoker = RemoteHttpInvoker::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();

        let err = invoker.invoke(&file, "a.png").await.unwrap_err();
        assert!(matches!(err, RelayError::Invocation { .. }));
    }
}
