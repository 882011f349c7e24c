//! In-process fake lambda host for tests.

use crate::manifest::{BareOptions, Manifest};
use crate::remote::EXIT_CODE_HEADER;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

/// Recorded host state. Tests seed it before starting the host and inspect
/// it afterwards.
#[derive(Default)]
pub struct FakeState {
    pub manifests: HashMap<String, Manifest>,
    /// Packed content served by `GET .../content`.
    pub contents: HashMap<String, Vec<u8>>,
    pub actions: HashMap<String, Vec<String>>,
    pub exit_codes: HashMap<String, i32>,
    /// `(name, archive bytes, x-total-size)` per accepted upload.
    pub uploads: Vec<(String, Vec<u8>, Option<String>)>,
    /// `(name, action, args)` per invocation.
    pub invocations: Vec<(String, String, Vec<String>)>,
    /// Authorization headers seen on manifest fetches.
    pub seen_auth: Vec<Option<String>>,
    /// Serve one chunk of content, then stall forever.
    pub stall_content: bool,
    /// Accept the upload body but never answer.
    pub stall_upload: bool,
    pub reject_upload: Option<(StatusCode, String)>,
}

type Shared = Arc<Mutex<FakeState>>;

pub struct FakeHost {
    pub url: String,
    state: Shared,
    server: JoinHandle<()>,
}

impl FakeHost {
    pub async fn start(state: FakeState) -> Self {
        let state = Arc::new(Mutex::new(state));
        let app = Router::new()
            .route("/api/lambdas/{name}/manifest", get(get_manifest))
            .route("/api/lambdas/{name}/content", get(get_content).put(put_content))
            .route("/api/lambdas/{name}/actions", get(list_actions))
            .route("/api/lambdas/{name}/actions/{action}", post(invoke))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { url, state, server }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

impl Drop for FakeHost {
    fn drop(&mut self) {
        self.server.abort();
    }
}

pub fn sample_manifest(name: &str) -> Manifest {
    Manifest::bare(name, &BareOptions::default()).unwrap()
}

/// Build a tar+zstd archive holding `files` as `(relative path, content)`.
pub fn sample_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = zstd::Encoder::new(Vec::new(), 3).unwrap();
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *content).unwrap();
    }
    let mut encoder = builder.into_inner().unwrap();
    encoder.flush().unwrap();
    encoder.finish().unwrap()
}

/// Paths contained in a tar+zstd archive.
pub fn archive_entries(archive: &[u8]) -> Vec<String> {
    let decoder = zstd::Decoder::new(archive).unwrap();
    let mut tar = tar::Archive::new(decoder);
    let mut paths: Vec<String> = tar
        .entries()
        .unwrap()
        .map(|entry| entry.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect();
    paths.sort();
    paths
}

async fn get_manifest(State(state): State<Shared>, Path(name): Path<String>, headers: HeaderMap) -> Response {
    let mut state = state.lock().unwrap();
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.seen_auth.push(auth);

    match state.manifests.get(&name) {
        Some(manifest) => Json(manifest.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "no such lambda").into_response(),
    }
}

async fn get_content(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    let (content, stall) = {
        let state = state.lock().unwrap();
        (state.contents.get(&name).cloned(), state.stall_content)
    };

    let Some(content) = content else {
        return (StatusCode::NOT_FOUND, "no such lambda").into_response();
    };

    if stall {
        let head = Bytes::from(content[..content.len().min(16)].to_vec());
        let stream = futures_util::StreamExt::chain(
            futures_util::stream::once(async move { Ok::<_, std::io::Error>(head) }),
            futures_util::stream::pending(),
        );
        return Body::from_stream(stream).into_response();
    }

    content.into_response()
}

async fn put_content(
    State(state): State<Shared>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (stall, reject) = {
        let state = state.lock().unwrap();
        (state.stall_upload, state.reject_upload.clone())
    };

    if stall {
        std::future::pending::<()>().await;
    }
    if let Some((status, message)) = reject {
        return (status, message).into_response();
    }

    let total = headers
        .get("x-total-size")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.lock().unwrap().uploads.push((name, body.to_vec(), total));
    StatusCode::CREATED.into_response()
}

async fn list_actions(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    match state.lock().unwrap().actions.get(&name) {
        Some(actions) => Json(actions.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "no such lambda").into_response(),
    }
}

#[derive(Deserialize)]
struct InvokeBody {
    #[serde(default)]
    args: Vec<String>,
}

async fn invoke(
    State(state): State<Shared>,
    Path((name, action)): Path<(String, String)>,
    Json(body): Json<InvokeBody>,
) -> Response {
    let mut state = state.lock().unwrap();
    let known = state
        .actions
        .get(&name)
        .is_some_and(|actions| actions.contains(&action));
    if !known {
        return (StatusCode::NOT_FOUND, "no such action").into_response();
    }

    let code = state.exit_codes.get(&action).copied().unwrap_or(0);
    let output = if body.args.is_empty() {
        format!("ran {}\n", action)
    } else {
        format!("ran {} {}\n", action, body.args.join(" "))
    };
    state.invocations.push((name, action, body.args));

    ([(EXIT_CODE_HEADER, code.to_string())], output).into_response()
}
