//! HTTP client for the lambda host API.
//!
//! The host exposes, per function name:
//!
//! | Operation      | Request                                      |
//! |----------------|----------------------------------------------|
//! | fetch manifest | `GET  /api/lambdas/{name}/manifest`          |
//! | fetch content  | `GET  /api/lambdas/{name}/content`           |
//! | put content    | `PUT  /api/lambdas/{name}/content`           |
//! | list actions   | `GET  /api/lambdas/{name}/actions`           |
//! | invoke action  | `POST /api/lambdas/{name}/actions/{action}`  |
//!
//! Every exchange runs under the execution context, so cancellation drops the
//! in-flight request.

use crate::context::ExecContext;
use crate::manifest::Manifest;
use crate::transfer::archive::PackedArchive;
use crate::transfer::progress_stream::{percent, ProgressStream};
use crate::utils::errors::{CtlError, Result};
use bytes::Bytes;
use reqwest::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// Header carrying the exit status of a remote action.
pub const EXIT_CODE_HEADER: &str = "x-exit-code";

/// Header carrying the archive size on upload.
pub const TOTAL_SIZE_HEADER: &str = "x-total-size";

/// Which kind of resource a request addressed; decides how failures map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target<'a> {
    Lambda(&'a str),
    Action(&'a str),
}

#[derive(Serialize)]
struct InvokeRequest<'a> {
    args: &'a [String],
}

/// Client bound to one host.
#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl RemoteClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let base = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| CtlError::Config(format!("invalid remote URL '{}': {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(CtlError::Config(format!("'{}' cannot be used as a base URL", base_url)));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("lambda-ctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CtlError::Config(format!("building HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base,
            token: token.map(str::to_string),
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        self.base.as_str().trim_end_matches('/').to_string()
    }

    fn endpoint(&self, name: &str, tail: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| CtlError::Config(format!("'{}' cannot be used as a base URL", self.base)))?
            .pop_if_empty()
            .extend(["api", "lambdas", name])
            .extend(tail);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.http.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, ctx: &ExecContext, request: RequestBuilder, target: Target<'_>) -> Result<Response> {
        let response = ctx
            .run(async {
                request
                    .send()
                    .await
                    .map_err(|e| CtlError::RemoteUnavailable(e.to_string()))
            })
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = ctx.run(async { Ok(response.text().await.unwrap_or_default()) }).await?;
        Err(status_error(status, body.trim(), target))
    }

    /// Fetch and parse the function's manifest.
    pub async fn fetch_manifest(&self, ctx: &ExecContext, name: &str) -> Result<Manifest> {
        let url = self.endpoint(name, &["manifest"])?;
        debug!("GET {}", url);
        let response = self.send(ctx, self.request(Method::GET, url.clone()), Target::Lambda(name)).await?;
        let body = ctx
            .run(async {
                response
                    .bytes()
                    .await
                    .map_err(|e| CtlError::RemoteUnavailable(e.to_string()))
            })
            .await?;
        Manifest::from_slice(url.as_str(), &body)
    }

    /// Start streaming the packaged content; read it with [`next_chunk`](Self::next_chunk).
    pub async fn fetch_content(&self, ctx: &ExecContext, name: &str) -> Result<Response> {
        let url = self.endpoint(name, &["content"])?;
        debug!("GET {}", url);
        self.send(ctx, self.request(Method::GET, url), Target::Lambda(name)).await
    }

    /// Next body chunk of a streamed response, `None` at the end.
    pub async fn next_chunk(&self, ctx: &ExecContext, response: &mut Response) -> Result<Option<Bytes>> {
        ctx.run(async {
            response
                .chunk()
                .await
                .map_err(|e| CtlError::RemoteUnavailable(format!("reading response body: {}", e)))
        })
        .await
    }

    /// Replace the function's content with a packed archive.
    pub async fn put_content(&self, ctx: &ExecContext, name: &str, archive: &PackedArchive) -> Result<()> {
        let url = self.endpoint(name, &["content"])?;
        let path = archive.file.path();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| CtlError::PackagingError(format!("opening {}: {}", path.display(), e)))?;

        let label = name.to_string();
        let progress = ProgressStream::new(
            ReaderStream::new(file),
            archive.archive_bytes,
            Arc::new(move |sent, total| {
                debug!("Uploading {}: {}/{} bytes ({:.1}%)", label, sent, total, percent(sent, total));
            }),
        );

        debug!("PUT {} ({} bytes)", url, archive.archive_bytes);
        let request = self
            .request(Method::PUT, url)
            .header(CONTENT_TYPE, "application/x-tar")
            .header(CONTENT_ENCODING, "zstd")
            .header(CONTENT_LENGTH, archive.archive_bytes)
            .header(TOTAL_SIZE_HEADER, archive.source_bytes.to_string())
            .body(reqwest::Body::wrap_stream(progress));

        self.send(ctx, request, Target::Lambda(name)).await?;
        info!("Uploaded {} bytes to {}", archive.archive_bytes, name);
        Ok(())
    }

    /// Names of the actions the host defines for the function.
    pub async fn list_actions(&self, ctx: &ExecContext, name: &str) -> Result<Vec<String>> {
        let url = self.endpoint(name, &["actions"])?;
        debug!("GET {}", url);
        let response = self.send(ctx, self.request(Method::GET, url), Target::Lambda(name)).await?;
        ctx.run(async {
            response
                .json::<Vec<String>>()
                .await
                .map_err(|e| CtlError::RemoteExecutionError(format!("unexpected action list: {}", e)))
        })
        .await
    }

    /// Invoke `action` remotely, copying its output to `out` as it arrives.
    /// Returns the remote exit status.
    pub async fn invoke_action<W>(
        &self,
        ctx: &ExecContext,
        name: &str,
        action: &str,
        args: &[String],
        out: &mut W,
    ) -> Result<i32>
    where
        W: AsyncWrite + Unpin,
    {
        let url = self.endpoint(name, &["actions", action])?;
        debug!("POST {}", url);
        let request = self.request(Method::POST, url).json(&InvokeRequest { args });
        let mut response = self.send(ctx, request, Target::Action(action)).await?;

        let exit_code = match response.headers().get(EXIT_CODE_HEADER) {
            None => 0,
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<i32>().ok())
                .ok_or_else(|| {
                    CtlError::RemoteExecutionError(format!("invalid {} header: {:?}", EXIT_CODE_HEADER, value))
                })?,
        };

        while let Some(chunk) = self.next_chunk(ctx, &mut response).await? {
            out.write_all(&chunk)
                .await
                .map_err(CtlError::io("writing action output to", "<stdout>"))?;
        }
        out.flush().await.map_err(CtlError::io("flushing", "<stdout>"))?;

        Ok(exit_code)
    }
}

/// Map a non-success HTTP status to the client error taxonomy.
fn status_error(status: StatusCode, body: &str, target: Target<'_>) -> CtlError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };

    match (status, target) {
        (StatusCode::NOT_FOUND, Target::Lambda(name)) => CtlError::RemoteNotFound(name.to_string()),
        (StatusCode::NOT_FOUND, Target::Action(action)) => CtlError::RemoteActionNotFound(action.to_string()),
        (s, Target::Action(_)) if s.is_server_error() => CtlError::RemoteExecutionError(detail),
        (s, Target::Lambda(_)) if s.is_server_error() => CtlError::RemoteUnavailable(detail),
        _ => CtlError::RemoteRejected(detail),
    }
}
