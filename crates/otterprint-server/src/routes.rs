// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP surface of the bridge.
//
// Routes:
//   GET  /printers          -> JSON array of printer descriptors
//   POST /print             -> multipart upload, printer from the form
//   POST /print/{printer}   -> multipart upload, printer from the path
//
// A print request runs Received -> Persisted -> Dispatching -> Resolved.
// The persist/dispatch/release sequence runs in its own task so that a
// client hanging up mid-dispatch cannot leave a staged file behind.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use otterprint_core::error::{BridgeError, Result};
use otterprint_core::types::{JobId, PrintJob, PrintOptions, PrinterDescriptor};
use otterprint_platform::{PrintDispatcher, PrinterDirectory};

use crate::artifacts::TempArtifactStore;
use crate::error::ApiError;

/// Handles shared by every request. Nothing in here is mutated after startup.
#[derive(Clone)]
pub struct BridgeState {
    pub store: Arc<TempArtifactStore>,
    pub dispatcher: Arc<dyn PrintDispatcher>,
    pub directory: Arc<dyn PrinterDirectory>,
}

/// Body of a successful print submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintAccepted {
    pub job_id: JobId,
    pub printer: String,
    pub status: &'static str,
}

/// Build the bridge router.
pub fn router(state: BridgeState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/printers", get(list_printers))
        .route("/print", post(print_default))
        .route("/print/{printer}", post(print_to))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn list_printers(
    State(state): State<BridgeState>,
) -> std::result::Result<Json<Vec<PrinterDescriptor>>, ApiError> {
    let directory = state.directory.clone();
    let printers = tokio::task::spawn_blocking(move || directory.list_printers())
        .await
        .map_err(|e| BridgeError::DiscoveryUnavailable(format!("enumeration task failed: {e}")))??;
    info!(count = printers.len(), "listed printers");
    Ok(Json(printers))
}

async fn print_default(
    State(state): State<BridgeState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<PrintAccepted>, ApiError> {
    accept(state, None, multipart).await
}

async fn print_to(
    State(state): State<BridgeState>,
    Path(printer): Path<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<PrintAccepted>, ApiError> {
    accept(state, Some(printer), multipart).await
}

async fn accept(
    state: BridgeState,
    path_printer: Option<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<PrintAccepted>, ApiError> {
    let multipart = multipart
        .map_err(|e| BridgeError::MalformedRequest(format!("expected multipart form: {e}")))?;
    let upload = read_upload(multipart).await?;

    let printer = path_printer
        .filter(|p| !p.is_empty())
        .or(upload.printer)
        .unwrap_or_default();
    let job = PrintJob::new(printer, upload.options, upload.file_name, &upload.document);
    info!(
        job_id = %job.id,
        printer = %job.printer,
        bytes = job.size_bytes,
        hash = %job.document_hash,
        "print job received"
    );

    let task = tokio::spawn(submit(state, job, upload.document));
    let accepted = task
        .await
        .map_err(|e| BridgeError::DispatchRejected(format!("print task failed: {e}")))??;
    Ok(Json(accepted))
}

/// Fields pulled out of the multipart form.
struct Upload {
    document: Bytes,
    file_name: Option<String>,
    options: PrintOptions,
    printer: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload> {
    let mut document = None;
    let mut file_name = None;
    let mut options = PrintOptions::default();
    let mut printer = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BridgeError::MalformedRequest(e.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                file_name = field.file_name().map(str::to_owned);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| BridgeError::MalformedRequest(e.body_text()))?;
                document = Some(bytes);
            }
            Some("options") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| BridgeError::MalformedRequest(e.body_text()))?;
                options = PrintOptions::parse(&text)?;
            }
            Some("printer") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| BridgeError::MalformedRequest(e.body_text()))?;
                let text = text.trim();
                if !text.is_empty() {
                    printer = Some(text.to_owned());
                }
            }
            _ => {}
        }
    }

    let document = document
        .ok_or_else(|| BridgeError::MalformedRequest("missing `file` part".into()))?;
    if document.is_empty() {
        return Err(BridgeError::MalformedRequest("`file` part is empty".into()));
    }

    Ok(Upload {
        document,
        file_name,
        options,
        printer,
    })
}

/// Persist, dispatch, release. The staged file is gone before this returns,
/// whatever the dispatch outcome.
#[instrument(skip_all, fields(job_id = %job.id, printer = %job.printer))]
async fn submit(state: BridgeState, job: PrintJob, document: Bytes) -> Result<PrintAccepted> {
    let artifact = state
        .store
        .persist(job.id, &document, &job.staging_extension())
        .await?;
    drop(document);

    let outcome = state
        .dispatcher
        .submit(artifact.path(), &job.printer, &job.options)
        .await;
    state.store.release(artifact).await;

    outcome.into_result()?;
    info!(backend = state.dispatcher.backend_name(), "print job submitted");

    Ok(PrintAccepted {
        job_id: job.id,
        printer: job.printer,
        status: "submitted",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path as FsPath, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use otterprint_core::types::DispatchOutcome;
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "otterprint-test-boundary";

    #[derive(Default)]
    struct RecordingDispatcher {
        fail_with: Option<String>,
        calls: Mutex<Vec<(PathBuf, String, bool)>>,
    }

    #[async_trait]
    impl PrintDispatcher for RecordingDispatcher {
        fn backend_name(&self) -> &str {
            "recording"
        }

        async fn submit(
            &self,
            document: &FsPath,
            printer: &str,
            _options: &PrintOptions,
        ) -> DispatchOutcome {
            self.calls
                .lock()
                .unwrap()
                .push((document.to_path_buf(), printer.to_owned(), document.exists()));
            match &self.fail_with {
                Some(reason) => DispatchOutcome::Failed(reason.clone()),
                None => DispatchOutcome::Succeeded,
            }
        }
    }

    struct StaticDirectory(Option<Vec<PrinterDescriptor>>);

    impl PrinterDirectory for StaticDirectory {
        fn list_printers(&self) -> Result<Vec<PrinterDescriptor>> {
            self.0
                .clone()
                .ok_or_else(|| BridgeError::DiscoveryUnavailable("spooler not running".into()))
        }
    }

    struct Harness {
        _tmp: tempfile::TempDir,
        scratch: PathBuf,
        dispatcher: Arc<RecordingDispatcher>,
        app: Router,
    }

    fn harness(dispatcher: RecordingDispatcher, directory: StaticDirectory) -> Harness {
        let tmp = tempfile::tempdir().expect("tempdir");
        let scratch = tmp.path().join("scratch");
        let dispatcher = Arc::new(dispatcher);
        let state = BridgeState {
            store: Arc::new(TempArtifactStore::open(&scratch).expect("open")),
            dispatcher: dispatcher.clone(),
            directory: Arc::new(directory),
        };
        Harness {
            _tmp: tmp,
            scratch,
            dispatcher,
            app: router(state, 1024 * 1024),
        }
    }

    enum Part<'a> {
        File(&'a str, &'a [u8]),
        Text(&'a str, &'a str),
    }

    fn multipart(parts: &[Part<'_>]) -> Body {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::File(name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn print_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart(parts))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn scratch_is_empty(dir: &FsPath) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn print_dispatches_and_cleans_up() {
        let h = harness(RecordingDispatcher::default(), StaticDirectory(Some(vec![])));
        let pdf = vec![b'%'; 10 * 1024];

        let response = h
            .app
            .oneshot(print_request(
                "/print",
                &[
                    Part::File("report.pdf", &pdf),
                    Part::Text("printer", "Office-Printer"),
                    Part::Text("options", "[]"),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["printer"], "Office-Printer");
        assert_eq!(body["status"], "submitted");
        assert!(body["jobId"].is_string());

        let calls = h.dispatcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (path, printer, existed) = &calls[0];
        assert_eq!(printer, "Office-Printer");
        assert!(existed, "document must be on disk during dispatch");
        assert_eq!(path.extension().unwrap(), "pdf");
        assert!(!path.exists());
        assert!(scratch_is_empty(&h.scratch));
    }

    #[tokio::test]
    async fn path_printer_wins_over_field() {
        let h = harness(RecordingDispatcher::default(), StaticDirectory(Some(vec![])));

        let response = h
            .app
            .oneshot(print_request(
                "/print/Label%20Writer",
                &[Part::File("a.png", b"png"), Part::Text("printer", "Office")],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let calls = h.dispatcher.calls.lock().unwrap();
        assert_eq!(calls[0].1, "Label Writer");
        assert_eq!(calls[0].0.extension().unwrap(), "png");
    }

    #[tokio::test]
    async fn missing_printer_is_passed_as_empty() {
        let h = harness(RecordingDispatcher::default(), StaticDirectory(Some(vec![])));

        let response = h
            .app
            .oneshot(print_request("/print", &[Part::File("a.pdf", b"data")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.dispatcher.calls.lock().unwrap()[0].1, "");
    }

    #[tokio::test]
    async fn missing_file_is_rejected_before_persist() {
        let h = harness(RecordingDispatcher::default(), StaticDirectory(Some(vec![])));

        let response = h
            .app
            .oneshot(print_request("/print", &[Part::Text("printer", "Office")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["reason"], "MALFORMED_REQUEST");
        assert!(h.dispatcher.calls.lock().unwrap().is_empty());
        assert!(scratch_is_empty(&h.scratch));
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let h = harness(RecordingDispatcher::default(), StaticDirectory(Some(vec![])));

        let response = h
            .app
            .oneshot(print_request("/print", &[Part::File("a.pdf", b"")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(h.dispatcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_options_are_rejected() {
        let h = harness(RecordingDispatcher::default(), StaticDirectory(Some(vec![])));

        let response = h
            .app
            .oneshot(print_request(
                "/print",
                &[Part::File("a.pdf", b"data"), Part::Text("options", "{not json")],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(h.dispatcher.calls.lock().unwrap().is_empty());
        assert!(scratch_is_empty(&h.scratch));
    }

    #[tokio::test]
    async fn non_multipart_body_is_rejected() {
        let h = harness(RecordingDispatcher::default(), StaticDirectory(Some(vec![])));

        let request = Request::builder()
            .method("POST")
            .uri("/print")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = h.app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["reason"], "MALFORMED_REQUEST");
    }

    #[tokio::test]
    async fn dispatch_failure_still_releases_document() {
        let dispatcher = RecordingDispatcher {
            fail_with: Some("lp: The printer or class does not exist.".into()),
            ..Default::default()
        };
        let h = harness(dispatcher, StaticDirectory(Some(vec![])));

        let response = h
            .app
            .oneshot(print_request(
                "/print/Nope",
                &[Part::File("a.pdf", b"data")],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["reason"], "DISPATCH_REJECTED");
        assert!(body["error"].as_str().unwrap().contains("does not exist"));
        assert!(scratch_is_empty(&h.scratch));
    }

    #[tokio::test]
    async fn lists_printers() {
        let mut office = PrinterDescriptor::named("Office");
        office.is_default = true;
        let h = harness(
            RecordingDispatcher::default(),
            StaticDirectory(Some(vec![office, PrinterDescriptor::named("Label")])),
        );

        let response = h
            .app
            .oneshot(Request::get("/printers").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let names: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, ["Office", "Label"]);
        assert_eq!(body[0]["isDefault"], true);
    }

    #[tokio::test]
    async fn discovery_failure_is_503() {
        let h = harness(RecordingDispatcher::default(), StaticDirectory(None));

        let response = h
            .app
            .oneshot(Request::get("/printers").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["reason"], "DISCOVERY_UNAVAILABLE");
        assert!(body.get("printers").is_none());
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let h = harness(RecordingDispatcher::default(), StaticDirectory(Some(vec![])));

        let request = Request::get("/printers")
            .header(header::ORIGIN, "http://localhost:5173")
            .body(Body::empty())
            .unwrap();
        let response = h.app.oneshot(request).await.unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}
