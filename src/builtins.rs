/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Default built-in scheme handler set.
//!
//! These sit in the dispatch table's fallback layer: construction-supplied
//! handlers for the same scheme shadow them, and they are not interceptable.
//! `about` and `data` are synthesized in-process, `file` reads from disk with
//! path sanitization, `http`/`https` ride a shared blocking client, and
//! `ws`/`wss`/`ftp` claim their schemes while deferring real transport to the
//! embedder.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use log::{debug, warn};
use reqwest::blocking::Client;

use crate::context::NetParams;
use crate::handler::{
    FetchJob, InlineJob, JobOutcome, JobSink, ResourceRequest, ResponsePayload, SchemeHandler,
};

/// Assemble the built-in fallback table for one network context.
pub(crate) fn builtin_table(params: &NetParams) -> HashMap<String, Box<dyn SchemeHandler>> {
    let mut table: HashMap<String, Box<dyn SchemeHandler>> = HashMap::new();
    table.insert("about".to_owned(), Box::new(AboutHandler));
    table.insert("data".to_owned(), Box::new(DataHandler));
    table.insert("file".to_owned(), Box::new(FileHandler));
    table.insert(
        "http".to_owned(),
        Box::new(HttpHandler::new(&params.user_agent)),
    );
    table.insert(
        "https".to_owned(),
        Box::new(HttpHandler::new(&params.user_agent)),
    );
    table.insert("ws".to_owned(), Box::new(WebSocketHandler));
    table.insert("wss".to_owned(), Box::new(WebSocketHandler));
    if params.enable_ftp {
        table.insert("ftp".to_owned(), Box::new(FtpHandler));
    }
    table
}

/// `about:` pages synthesized in-process.
pub struct AboutHandler;

impl SchemeHandler for AboutHandler {
    fn create_job(&self, request: &ResourceRequest) -> Option<Box<dyn FetchJob>> {
        let page = request.url.as_str().trim_start_matches("about:");
        let job = match page {
            "" | "blank" => InlineJob::delivered(Some("text/html"), Vec::new()),
            "version" => InlineJob::delivered(
                Some("text/plain"),
                format!("embednet {}", env!("CARGO_PKG_VERSION")).into_bytes(),
            ),
            other => InlineJob::failed(format!("unknown about page: {other}")),
        };
        Some(job)
    }
}

/// RFC 2397 `data:` URLs. Media type defaults to `text/plain;charset=US-ASCII`
/// and `;base64` payloads are decoded; anything else is served verbatim.
pub struct DataHandler;

const DATA_DEFAULT_MIME: &str = "text/plain;charset=US-ASCII";

impl SchemeHandler for DataHandler {
    fn create_job(&self, request: &ResourceRequest) -> Option<Box<dyn FetchJob>> {
        let Some(remainder) = request.url.as_str().strip_prefix("data:") else {
            return Some(InlineJob::failed("malformed data url"));
        };
        let Some((metadata, payload)) = remainder.split_once(',') else {
            return Some(InlineJob::failed("data url is missing its payload separator"));
        };

        let (media_type, is_base64) = match metadata.strip_suffix(";base64") {
            Some(media_type) => (media_type, true),
            None => (metadata, false),
        };
        let mime = if media_type.is_empty() {
            DATA_DEFAULT_MIME.to_owned()
        } else {
            media_type.to_ascii_lowercase()
        };

        let body = if is_base64 {
            match BASE64_STANDARD.decode(payload) {
                Ok(bytes) => bytes,
                Err(_) => return Some(InlineJob::failed("invalid base64 payload in data url")),
            }
        } else {
            payload.as_bytes().to_vec()
        };

        Some(InlineJob::delivered(Some(&mime), body))
    }
}

/// `file:` loads with path sanitization: no `..` traversal, absolute paths
/// only, and no loads referred by web content.
pub struct FileHandler;

impl SchemeHandler for FileHandler {
    fn create_job(&self, request: &ResourceRequest) -> Option<Box<dyn FetchJob>> {
        let referrer_allowed = request
            .referrer
            .as_ref()
            .is_none_or(|referrer| matches!(referrer.scheme(), "file" | "about"));
        if !referrer_allowed {
            warn!(
                "blocked file load referred by non-local content: {}",
                request.url
            );
            return Some(InlineJob::failed("disallowed referrer for file scheme"));
        }

        let raw_path = request.url.path();
        if raw_path.contains("..") || !raw_path.starts_with('/') {
            return Some(InlineJob::failed("invalid file path"));
        }
        let Ok(path) = request.url.to_file_path() else {
            return Some(InlineJob::failed("invalid file path"));
        };
        if !path.exists() || path.is_dir() {
            return Some(InlineJob::failed("no such file"));
        }

        let mime = mime_guess::from_path(&path)
            .first_raw()
            .map(|m| m.to_ascii_lowercase());
        let job = match std::fs::read(&path) {
            Ok(body) => InlineJob::boxed(JobOutcome::Delivered(ResponsePayload {
                mime,
                body,
            })),
            Err(_) => InlineJob::failed("opening file failed"),
        };
        Some(job)
    }
}

/// `http`/`https` loads over a process-wide blocking client.
pub struct HttpHandler {
    user_agent: String,
}

impl HttpHandler {
    pub fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_owned(),
        }
    }
}

impl SchemeHandler for HttpHandler {
    fn create_job(&self, request: &ResourceRequest) -> Option<Box<dyn FetchJob>> {
        Some(Box::new(HttpJob {
            url: request.url.to_string(),
            user_agent: self.user_agent.clone(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct HttpJob {
    url: String,
    user_agent: String,
    cancelled: Arc<AtomicBool>,
}

impl FetchJob for HttpJob {
    fn start(&mut self, sink: JobSink) {
        let url = self.url.clone();
        let user_agent = self.user_agent.clone();
        let cancelled = Arc::clone(&self.cancelled);
        // Blocking fetch on its own thread, so the worker loop stays free to
        // process registry mutations while the transfer runs.
        std::thread::spawn(move || {
            let outcome = fetch_over_http(&url, &user_agent);
            if cancelled.load(Ordering::SeqCst) {
                debug!("dropping completed fetch for cancelled job: {url}");
                return;
            }
            sink(outcome);
        });
    }

    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

fn outbound_client() -> &'static Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest blocking client should build")
    })
}

fn fetch_over_http(url: &str, user_agent: &str) -> JobOutcome {
    let response = match outbound_client()
        .get(url)
        .header(reqwest::header::USER_AGENT, user_agent)
        .send()
    {
        Ok(response) => response,
        Err(_) => return JobOutcome::Failed(format!("network error fetching {url}")),
    };
    let status = response.status();
    if !status.is_success() {
        return JobOutcome::Failed(format!("http status {}", status.as_u16()));
    }
    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    match response.bytes() {
        Ok(body) => JobOutcome::Delivered(ResponsePayload {
            mime,
            body: body.to_vec(),
        }),
        Err(_) => JobOutcome::Failed("failed reading response body".to_owned()),
    }
}

/// Claims `ws`/`wss` so the schemes report as handled; the actual socket
/// upgrade belongs to the embedder's transport layer.
pub struct WebSocketHandler;

impl SchemeHandler for WebSocketHandler {
    fn create_job(&self, _request: &ResourceRequest) -> Option<Box<dyn FetchJob>> {
        Some(InlineJob::failed(
            "websocket upgrade is negotiated by the embedder's transport layer",
        ))
    }
}

/// Present only when `NetParams::enable_ftp` is set.
pub struct FtpHandler;

impl SchemeHandler for FtpHandler {
    fn create_job(&self, _request: &ResourceRequest) -> Option<Box<dyn FetchJob>> {
        Some(InlineJob::failed(
            "ftp is enabled but no ftp backend is installed",
        ))
    }
}
