use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Empty};
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;

use super::models::{EventMessage, StatsResponse};
use super::{ContainerEvent, Error, EventAction, EventStream, Result, Runtime, StatsSnapshot};
use crate::container::ContainerID;

/// `filters={"type":["container"]}`, url-encoded.
const EVENTS_PATH: &str = "/events?filters=%7B%22type%22%3A%5B%22container%22%5D%7D";

/// Event stream path, replaying from `since` when resuming a subscription.
fn events_path(since: Option<DateTime<Utc>>) -> String {
    match since {
        Some(ts) => format!(
            "{EVENTS_PATH}&since={}.{:09}",
            ts.timestamp(),
            ts.timestamp_subsec_nanos()
        ),
        None => EVENTS_PATH.to_owned(),
    }
}

/// Client for the Docker Engine API served on a unix socket.
///
/// Every request opens its own connection, so the long-lived event stream
/// never blocks stats requests.
#[derive(Debug, Clone)]
pub struct DockerClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DockerClient {
    /// `timeout` bounds every request except the body of the event stream.
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    async fn get(&self, path: &str) -> Result<Response<Incoming>> {
        log::trace!("Connecting to {}...", self.socket_path.display());
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| Error::SocketConnect {
                path: self.socket_path.clone(),
                source,
            })?;
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(Error::Handshake)?;
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                log::debug!("runtime connection closed with error: {}", err);
            }
        });

        let request = Request::get(path)
            .header(hyper::header::HOST, "docker")
            .body(Empty::<Bytes>::new())
            .map_err(|err| Error::BuildRequest {
                path: path.to_owned(),
                reason: err.to_string(),
            })?;
        sender
            .send_request(request)
            .await
            .map_err(|source| Error::Request {
                path: path.to_owned(),
                source,
            })
    }

    async fn get_with_timeout(&self, path: &str) -> Result<Response<Incoming>> {
        tokio::time::timeout(self.timeout, self.get(path))
            .await
            .map_err(|_| Error::Timeout {
                path: path.to_owned(),
                timeout: self.timeout,
            })?
    }
}

async fn read_body(response: Response<Incoming>) -> Result<Bytes> {
    Ok(response
        .into_body()
        .collect()
        .await
        .map_err(Error::Body)?
        .to_bytes())
}

async fn status_error(path: &str, response: Response<Incoming>) -> Error {
    let status = response.status().as_u16();
    let body = match read_body(response).await {
        Ok(body) => String::from_utf8_lossy(&body).trim().to_owned(),
        Err(err) => format!("<unreadable body: {err}>"),
    };
    Error::Status {
        path: path.to_owned(),
        status,
        body,
    }
}

impl Runtime for DockerClient {
    type Events = DockerEvents;

    async fn subscribe(&self, since: Option<DateTime<Utc>>) -> Result<DockerEvents> {
        let path = events_path(since);
        let response = self.get_with_timeout(&path).await?;
        if !response.status().is_success() {
            return Err(status_error(&path, response).await);
        }
        log::debug!("Subscribed to runtime events: path={}", path);

        Ok(DockerEvents {
            body: response.into_body(),
            buf: Vec::with_capacity(1024),
        })
    }

    async fn stats(&self, container_id: &ContainerID) -> Result<StatsSnapshot> {
        let path = format!("/containers/{container_id}/stats?stream=false");
        let timeout = self.timeout;
        let request = async {
            let response = self.get(&path).await?;
            match response.status() {
                StatusCode::NOT_FOUND => return Err(Error::NotFound(container_id.clone())),
                status if !status.is_success() => return Err(status_error(&path, response).await),
                _ => {}
            }
            let body = read_body(response).await?;
            let stats = serde_json::from_slice::<StatsResponse>(&body).map_err(|source| {
                Error::Decode {
                    path: path.clone(),
                    source,
                }
            })?;
            if !stats.is_running() {
                return Err(Error::NotRunning(container_id.clone()));
            }
            Ok(StatsSnapshot::from(stats))
        };

        tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| Error::Timeout {
                path: path.clone(),
                timeout,
            })?
    }
}

/// The newline-delimited JSON event stream of `GET /events`.
#[derive(Debug)]
pub struct DockerEvents {
    body: Incoming,
    buf: Vec<u8>,
}

impl DockerEvents {
    fn next_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buf.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        Some(line)
    }
}

/// Decodes one line of the event stream.
///
/// Returns `Ok(None)` for lines that carry no usable container event.
fn decode_event(line: &[u8]) -> std::result::Result<Option<ContainerEvent>, String> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }
    let msg: EventMessage =
        serde_json::from_slice(line).map_err(|err| format!("failed to decode event: {err}"))?;
    if !msg.kind.is_empty() && msg.kind != "container" {
        return Ok(None);
    }
    let container_id = ContainerID::new(msg.container_id())
        .map_err(|err| format!("event without usable container id: {err}"))?;
    let action = msg.action();
    let exit_code = match action {
        EventAction::Die => msg.attribute("exitCode"),
        _ => String::new(),
    };

    Ok(Some(ContainerEvent {
        container_name: msg.attribute("name"),
        timestamp: msg.timestamp(),
        action,
        container_id,
        exit_code,
    }))
}

impl EventStream for DockerEvents {
    async fn next_event(&mut self) -> Result<Option<ContainerEvent>> {
        loop {
            while let Some(line) = self.next_line() {
                match decode_event(&line) {
                    Ok(Some(event)) => return Ok(Some(event)),
                    Ok(None) => {}
                    Err(err) => log::error!("{}", err),
                }
            }

            match self.body.frame().await {
                None => {
                    let rest = std::mem::take(&mut self.buf);
                    return match decode_event(&rest) {
                        Ok(event) => Ok(event),
                        Err(err) => {
                            log::error!("{}", err);
                            Ok(None)
                        }
                    };
                }
                Some(Err(err)) => return Err(Error::Body(err)),
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        self.buf.extend_from_slice(&data);
                    }
                }
            }
        }
    }
}
