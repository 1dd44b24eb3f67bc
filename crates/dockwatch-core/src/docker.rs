//! Docker Engine API client over the local Unix socket.

use crate::event_lines::EventLines;
use crate::runtime::{
    ContainerSummary, EventFeed, LogReader, LogsOptions, RuntimeApi, RuntimeError, RuntimeEvent,
    StatsSnapshot,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{future, stream, StreamExt, TryStreamExt};
use http_body_util::{BodyExt, BodyStream, Empty};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::net::UnixStream;
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

pub const DEFAULT_SOCKET_PATH: &str = "/var/run/docker.sock";

/// `{"type":["container"]}`, percent-encoded.
const CONTAINER_EVENT_FILTER: &str = "%7B%22type%22%3A%5B%22container%22%5D%7D";

#[derive(Debug, Clone)]
pub struct DockerClient {
    socket_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionBody {
    version: String,
}

impl DockerClient {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub async fn ping(&self) -> Result<(), RuntimeError> {
        self.request_bytes(Method::GET, "/_ping").await.map(|_| ())
    }

    async fn send(&self, method: Method, path: &str) -> Result<Response<Incoming>, RuntimeError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|err| RuntimeError::Connect {
                path: self.socket_path.display().to_string(),
                message: err.to_string(),
            })?;
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|err| RuntimeError::Transport(format!("handshake failed: {err}")))?;
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                debug!(event = "runtime_conn_closed", error = %err);
            }
        });

        let request = Request::builder()
            .method(method.clone())
            .uri(format!("http://localhost{path}"))
            .header("Host", "localhost")
            .body(Empty::<Bytes>::new())
            .map_err(|err| RuntimeError::Transport(format!("bad request: {err}")))?;
        let response = sender
            .send_request(request)
            .await
            .map_err(|err| RuntimeError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .into_body()
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .unwrap_or_default();
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .map(|err| err.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());
        debug!(event = "runtime_error_status", %method, path, status = status.as_u16(), message = %message);
        if status == StatusCode::NOT_FOUND {
            return Err(RuntimeError::NotFound(message));
        }
        Err(RuntimeError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn request_bytes(&self, method: Method, path: &str) -> Result<Bytes, RuntimeError> {
        let response = self.send(method, path).await?;
        response
            .into_body()
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .map_err(|err| RuntimeError::Transport(format!("failed to read body: {err}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RuntimeError> {
        let body = self.request_bytes(Method::GET, path).await?;
        serde_json::from_slice(&body).map_err(|err| RuntimeError::Decode(err.to_string()))
    }

    async fn post_empty(&self, path: &str) -> Result<(), RuntimeError> {
        self.request_bytes(Method::POST, path).await.map(|_| ())
    }
}

fn logs_path(id: &str, options: &LogsOptions) -> String {
    let mut path = format!(
        "/containers/{id}/logs?stdout=1&stderr=1&follow={}",
        u8::from(options.follow)
    );
    if let Some(since) = options.since {
        path.push_str(&format!("&since={since}"));
    }
    if let Some(tail) = options.tail.as_deref() {
        path.push_str(&format!("&tail={tail}"));
    }
    path
}

fn body_reader(response: Response<Incoming>) -> LogReader {
    let data = BodyStream::new(response.into_body())
        .try_filter_map(|frame| future::ready(Ok(frame.into_data().ok())))
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err));
    Box::new(StreamReader::new(Box::pin(data)))
}

struct EventBody {
    body: Pin<Box<BodyStream<Incoming>>>,
    lines: EventLines,
    done: bool,
}

fn event_feed(response: Response<Incoming>) -> EventFeed {
    let state = EventBody {
        body: Box::pin(BodyStream::new(response.into_body())),
        lines: EventLines::default(),
        done: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            match state.lines.next_event() {
                Some(Ok(event)) => return Some((Ok(event), state)),
                Some(Err(err)) => {
                    warn!(event = "runtime_event_decode_failed", error = %err);
                    continue;
                }
                None if state.done => return None,
                None => {}
            }
            match state.body.next().await {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        state.lines.feed(&data);
                    }
                }
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(RuntimeError::Transport(err.to_string())), state));
                }
                None => {
                    state.lines.finish();
                    state.done = true;
                }
            }
        }
    })
    .boxed()
}

#[async_trait]
impl RuntimeApi for DockerClient {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, RuntimeError> {
        self.get_json(&format!("/containers/json?all={all}")).await
    }

    async fn inspect_container_raw(&self, id: &str) -> Result<Value, RuntimeError> {
        self.get_json(&format!("/containers/{id}/json")).await
    }

    async fn stats_once(&self, id: &str) -> Result<StatsSnapshot, RuntimeError> {
        self.get_json(&format!("/containers/{id}/stats?stream=false&one-shot=true"))
            .await
    }

    async fn logs(&self, id: &str, options: LogsOptions) -> Result<LogReader, RuntimeError> {
        let response = self.send(Method::GET, &logs_path(id, &options)).await?;
        Ok(body_reader(response))
    }

    async fn events(&self) -> Result<EventFeed, RuntimeError> {
        let response = self
            .send(
                Method::GET,
                &format!("/events?filters={CONTAINER_EVENT_FILTER}"),
            )
            .await?;
        Ok(event_feed(response))
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.post_empty(&format!("/containers/{id}/start")).await
    }

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.post_empty(&format!("/containers/{id}/stop")).await
    }

    async fn pause_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.post_empty(&format!("/containers/{id}/pause")).await
    }

    async fn unpause_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.post_empty(&format!("/containers/{id}/unpause")).await
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.request_bytes(Method::DELETE, &format!("/containers/{id}"))
            .await
            .map(|_| ())
    }

    async fn server_version(&self) -> Result<String, RuntimeError> {
        let version: VersionBody = self.get_json("/version").await?;
        Ok(version.version)
    }

    async fn image_count(&self) -> Result<usize, RuntimeError> {
        let images: Vec<Value> = self.get_json("/images/json").await?;
        Ok(images.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_path_carries_options() {
        assert_eq!(
            logs_path("abc", &LogsOptions::backlog("1000")),
            "/containers/abc/logs?stdout=1&stderr=1&follow=0&tail=1000"
        );
        assert_eq!(
            logs_path("abc", &LogsOptions::follow_since(1_700_000_000)),
            "/containers/abc/logs?stdout=1&stderr=1&follow=1&since=1700000000"
        );
    }

    #[tokio::test]
    async fn unreachable_socket_is_a_connect_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = DockerClient::new(dir.path().join("missing.sock"));
        match client.ping().await {
            Err(RuntimeError::Connect { path, .. }) => assert!(path.ends_with("missing.sock")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
