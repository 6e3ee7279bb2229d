use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use hyper::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::error::JoinerError;
use crate::joiner::{JoinRequest, Joiner};
use crate::types::{InputFile, OutputFormat};

/// Upload form fields
const FILES_FIELD: &str = "files";
const STUB_FIELD: &str = "stub";
const FORMAT_FIELD: &str = "format";

#[derive(Clone)]
struct AppState {
    joiner: Arc<Joiner>,
}

/// Error body returned to the browser
struct ApiError(JoinerError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_user_error() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(self.0.to_presentation())).into_response()
    }
}

/// Multipart upload, collected in memory
struct Upload {
    files: Vec<InputFile>,
    stub: Option<String>,
    format: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, Response> {
    let mut upload = Upload {
        files: Vec::new(),
        stub: None,
        format: None,
    };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()).into_response())?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILES_FIELD => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()).into_response())?;
                // Browsers send an empty part when no file was picked
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                upload.files.push(InputFile::new(file_name, bytes.to_vec()));
            }
            STUB_FIELD | FORMAT_FIELD => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()).into_response())?;
                let value = Some(value).filter(|v| !v.trim().is_empty());
                if name == STUB_FIELD {
                    upload.stub = value;
                } else {
                    upload.format = value;
                }
            }
            other => {
                warn!(field = other, "ignoring unknown form field");
            }
        }
    }
    Ok(upload)
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "file-joiner",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Naming check for the picked files; the form uses it to pre-fill the stub
async fn inspect_handler(State(state): State<AppState>, multipart: Multipart) -> Response {
    let upload = match read_upload(multipart).await {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.joiner.inspect(&upload.files, upload.stub.as_deref()) {
        Ok(report) => Json(report).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn join_handler(State(state): State<AppState>, multipart: Multipart) -> Response {
    let request_id = Uuid::new_v4();
    join(state, multipart)
        .instrument(info_span!("join_request", %request_id))
        .await
}

async fn join(state: AppState, multipart: Multipart) -> Response {
    let upload = match read_upload(multipart).await {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let format = match upload.format.as_deref().map(str::parse::<OutputFormat>).transpose() {
        Ok(f) => f,
        Err(e) => return ApiError(e).into_response(),
    };
    info!(files = upload.files.len(), "join requested");

    let request = JoinRequest {
        files: upload.files,
        stub: upload.stub,
        format,
    };
    // Decoding and workbook generation are CPU bound
    let joiner = Arc::clone(&state.joiner);
    let span = Span::current();
    let task = tokio::task::spawn_blocking(move || span.in_scope(|| joiner.run(request)));
    let result = match task.await {
        Ok(result) => result,
        Err(e) => {
            error!("join task failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "join task failed").into_response();
        }
    };
    match result {
        Ok(outcome) => {
            let artifact = outcome.artifact;
            let disposition = format!(
                "attachment; filename=\"{}\"",
                artifact.file_name.replace('"', "")
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, artifact.content_type().to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                artifact.bytes,
            )
                .into_response()
        }
        Err(e) => ApiError(e).into_response(),
    }
}

/// Create the HTTP router with the upload form and join endpoints
pub fn create_server(joiner: Arc<Joiner>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/inspect", post(inspect_handler))
        .route("/join", post(join_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(AppState { joiner })
}

/// Start the HTTP server on the specified port
pub async fn start_server(
    joiner: Arc<Joiner>,
    port: u16,
    max_upload_bytes: usize,
) -> anyhow::Result<()> {
    let app = create_server(joiner, max_upload_bytes);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("File joiner running on http://localhost:{port}");
    println!("📂 Upload form: http://localhost:{port}/");
    println!("💚 Health check: http://localhost:{port}/health");

    Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>File Joiner</title>
    <style>
      body { font-family: sans-serif; max-width: 40rem; margin: 2rem auto; }
      .warning { color: #8a6d00; background: #fff8e1; padding: 0.5rem; display: none; }
      .success { color: #1b5e20; background: #e8f5e9; padding: 0.5rem; display: none; }
      label { display: block; margin-top: 1rem; }
    </style>
  </head>
  <body>
    <h1>File Joiner</h1>
    <h2>Instructions</h2>
    <ol>
      <li>Upload all the files to join.</li>
      <li>Click the process button.</li>
      <li>Download the joined file.</li>
    </ol>
    <form id="join" action="/join" method="post" enctype="multipart/form-data">
      <label>Upload files <input id="files" type="file" name="files" accept=".csv,.tsv" multiple /></label>
      <p id="warning" class="warning"></p>
      <p id="success" class="success"></p>
      <label>Enter the file names to be joined <input id="stub" type="text" name="stub" /></label>
      <label>Format
        <select name="format">
          <option value="xlsx" selected>xlsx</option>
          <option value="csv">csv</option>
        </select>
      </label>
      <p><button type="submit">&#9881; Process</button></p>
    </form>
    <script>
      const files = document.getElementById('files');
      const warning = document.getElementById('warning');
      const success = document.getElementById('success');
      files.addEventListener('change', async () => {
        warning.style.display = 'none';
        success.style.display = 'none';
        const body = new FormData();
        for (const f of files.files) body.append('files', f);
        const resp = await fetch('/inspect', { method: 'POST', body });
        const data = await resp.json();
        if (resp.ok) {
          document.getElementById('stub').value = data.suggested_stub;
          success.textContent = 'All files have the same prefix. You can proceed. Files uploaded: '
            + data.file_count + ', with the same prefix: ' + data.matching_count;
          success.style.display = 'block';
        } else {
          warning.textContent = data.message;
          warning.style.display = 'block';
        }
      });
    </script>
  </body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joiner::reader::tests::utf16le;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const BOUNDARY: &str = "joinerboundary";

    fn multipart_body(files: &[(&str, Vec<u8>)], fields: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, content) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: text/tab-separated-values\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn post(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn app() -> Router {
        create_server(Arc::new(Joiner::default()), 1024 * 1024)
    }

    #[tokio::test]
    async fn join_returns_attachment() {
        let body = multipart_body(
            &[
                ("A.tsv", utf16le("#\tv\n1\t10\n2\t20\n")),
                ("A.extra.tsv", utf16le("#\tv\n1\t30\n")),
            ],
            &[("format", "csv")],
        );
        let resp = app().oneshot(post("/join", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"A_joined.csv\""
        );
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&bytes[..], b"v\n10\n20\n30\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn join_workbook_is_built_on_blocking_pool() {
        use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};

        let body = multipart_body(
            &[
                ("r1.tsv", utf16le("#\tId\n1\t7\n")),
                ("r2.tsv", utf16le("#\tId\n1\t8.0\n")),
            ],
            &[],
        );
        let resp = app().oneshot(post("/join", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"r_joined.xlsx\""
        );
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        let mut workbook: Xlsx<_> = open_workbook_from_rs(std::io::Cursor::new(bytes.to_vec())).unwrap();
        let range = workbook.worksheet_range("Sheet1").unwrap();
        let ids: Vec<Data> = range.rows().skip(1).map(|r| r[0].clone()).collect();
        assert_eq!(ids, vec![Data::Float(7.0), Data::Float(8.0)]);
    }

    #[tokio::test]
    async fn single_file_gets_warning() {
        let body = multipart_body(&[("A.tsv", utf16le("v\n1\n"))], &[]);
        let resp = app().oneshot(post("/join", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["message"]
            .as_str()
            .unwrap()
            .contains("more than one file"));
    }

    #[tokio::test]
    async fn inspect_suggests_stub() {
        let body = multipart_body(
            &[
                ("A.tsv", utf16le("v\n1\n")),
                ("A.extra.tsv", utf16le("v\n2\n")),
            ],
            &[],
        );
        let resp = app().oneshot(post("/inspect", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["suggested_stub"], "A");
        assert_eq!(json["matching_count"], 2);
    }

    #[tokio::test]
    async fn unknown_format_is_rejected() {
        let body = multipart_body(
            &[("A.tsv", utf16le("v\n1\n")), ("A.b.tsv", utf16le("v\n2\n"))],
            &[("format", "pdf")],
        );
        let resp = app().oneshot(post("/join", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn health_reports_version() {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
