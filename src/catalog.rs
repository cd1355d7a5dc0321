use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::model::{ImageData, Schedule};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rating {
    #[serde(default)]
    pub average: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShowRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub image: Option<ImageData>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default)]
    pub rating: Rating,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonRecord {
    pub id: i64,
    pub number: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeRecord {
    pub id: i64,
    pub name: String,
    pub season: i64,
    // Specials come back with a null number.
    #[serde(default)]
    pub number: Option<i64>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub image: Option<ImageData>,
    #[serde(default)]
    pub rating: Rating,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request to {url} failed: HTTP status {status}{detail}")]
    Status {
        url: String,
        status: u16,
        detail: String,
    },
    #[error("request to {url} failed: transport error: {message}")]
    Transport { url: String, message: String },
    #[error("request to {url} failed: response read failed: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("request to {url} failed: unexpected payload: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read-only access to the remote show catalog.
pub trait CatalogClient: Send + Sync {
    fn shows(&self) -> Result<Vec<ShowRecord>, CatalogError>;
    fn seasons(&self, show_id: i64) -> Result<Vec<SeasonRecord>, CatalogError>;
    fn season_episodes(&self, season_id: i64) -> Result<Vec<EpisodeRecord>, CatalogError>;
}

pub struct HttpCatalog {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpCatalog {
    pub fn new(base_url: &str, connect_timeout: Duration, read_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .timeout_write(read_timeout)
            .build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CatalogError> {
        let url = format!("{}{path}", self.base_url);
        debug!("GET {url}");

        let body = match self.agent.get(&url).call() {
            Ok(response) => response
                .into_string()
                .map_err(|source| CatalogError::Body {
                    url: url.clone(),
                    source,
                })?,
            Err(ureq::Error::Status(status, response)) => {
                let response_body = response.into_string().ok().unwrap_or_default();
                let body = response_body.trim();
                let detail = if body.is_empty() {
                    String::new()
                } else {
                    let truncated = body.chars().take(240).collect::<String>();
                    format!(" ({truncated})")
                };
                return Err(CatalogError::Status {
                    url,
                    status,
                    detail,
                });
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(CatalogError::Transport {
                    url,
                    message: err.to_string(),
                });
            }
        };

        serde_json::from_str(&body).map_err(|source| CatalogError::Decode { url, source })
    }
}

impl CatalogClient for HttpCatalog {
    fn shows(&self) -> Result<Vec<ShowRecord>, CatalogError> {
        self.get_json("/shows")
    }

    fn seasons(&self, show_id: i64) -> Result<Vec<SeasonRecord>, CatalogError> {
        self.get_json(&format!("/shows/{show_id}/seasons"))
    }

    fn season_episodes(&self, season_id: i64) -> Result<Vec<EpisodeRecord>, CatalogError> {
        self.get_json(&format!("/shows/{season_id}/episodes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    enum Behavior {
        Respond(u16, String),
        DelayRespond(Duration, u16, String),
    }

    #[derive(Debug)]
    struct TestServer {
        base_url: String,
        paths: Arc<Mutex<Vec<String>>>,
        shutdown_tx: mpsc::Sender<()>,
        join_handle: Option<std::thread::JoinHandle<()>>,
    }

    impl TestServer {
        fn spawn(behaviors: Vec<Behavior>) -> Self {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind test server");
            listener.set_nonblocking(true).expect("set nonblocking");
            let addr = listener.local_addr().expect("local addr");

            let paths = Arc::new(Mutex::new(Vec::new()));
            let paths_clone = Arc::clone(&paths);
            let shared_behaviors = Arc::new(Mutex::new(VecDeque::from(behaviors)));
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

            let join_handle = std::thread::spawn(move || {
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }

                    match listener.accept() {
                        Ok((mut stream, _)) => {
                            let behavior = {
                                let mut queue = shared_behaviors.lock().expect("lock behaviors");
                                queue
                                    .pop_front()
                                    .unwrap_or_else(|| Behavior::Respond(200, "[]".to_string()))
                            };
                            let paths = Arc::clone(&paths_clone);
                            std::thread::spawn(move || {
                                if let Ok(path) = consume_request(&mut stream) {
                                    paths.lock().expect("lock paths").push(path);
                                }
                                serve_behavior(&mut stream, behavior);
                            });
                        }
                        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                            std::thread::sleep(Duration::from_millis(5));
                        }
                        Err(_) => break,
                    }
                }
            });

            Self {
                base_url: format!("http://{addr}"),
                paths,
                shutdown_tx,
                join_handle: Some(join_handle),
            }
        }

        fn requested_paths(&self) -> Vec<String> {
            self.paths.lock().expect("lock paths").clone()
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            let _ = self.shutdown_tx.send(());
            if let Some(handle) = self.join_handle.take() {
                let _ = handle.join();
            }
        }
    }

    fn consume_request(stream: &mut TcpStream) -> std::io::Result<String> {
        stream.set_read_timeout(Some(Duration::from_millis(200)))?;
        let mut buf = [0_u8; 1024];
        let mut data = Vec::new();
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(read) => {
                    data.extend_from_slice(&buf[..read]);
                    if data.windows(4).any(|window| window == b"\r\n\r\n") {
                        break;
                    }
                }
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        let head = String::from_utf8_lossy(&data);
        let path = head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .unwrap_or_default()
            .to_string();
        Ok(path)
    }

    fn reason_phrase(status: u16) -> &'static str {
        match status {
            200 => "OK",
            404 => "Not Found",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            _ => "Status",
        }
    }

    fn serve_behavior(stream: &mut TcpStream, behavior: Behavior) {
        match behavior {
            Behavior::Respond(status, body) => {
                let _ = write_response(stream, status, &body);
            }
            Behavior::DelayRespond(delay, status, body) => {
                std::thread::sleep(delay);
                let _ = write_response(stream, status, &body);
            }
        }
    }

    fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
        let reason = reason_phrase(status);
        let payload = body.as_bytes();
        write!(
            stream,
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            payload.len()
        )?;
        stream.write_all(payload)?;
        stream.flush()
    }

    fn client(server: &TestServer) -> HttpCatalog {
        HttpCatalog::new(
            &format!("{}/", server.base_url),
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
    }

    #[test]
    fn parses_show_list_and_tolerates_missing_optionals() {
        let body = r#"[
            {"id": 1, "name": "Under the Dome", "summary": "<p>Dome</p>",
             "image": {"medium": "m.jpg", "original": "o.jpg"},
             "genres": ["Drama", "Science-Fiction"],
             "schedule": {"time": "22:00", "days": ["Thursday"]},
             "rating": {"average": 6.5}, "language": "English"},
            {"id": 2, "name": "No Frills", "summary": null, "image": null,
             "genres": [], "schedule": {"time": "", "days": []},
             "rating": {"average": null}}
        ]"#;
        let server = TestServer::spawn(vec![Behavior::Respond(200, body.to_string())]);

        let shows = client(&server).shows().expect("shows should parse");

        assert_eq!(shows.len(), 2);
        assert_eq!(shows[0].genres, vec!["Drama", "Science-Fiction"]);
        assert_eq!(shows[0].schedule.days, vec!["Thursday"]);
        assert_eq!(shows[0].rating.average, Some(6.5));
        assert!(shows[1].image.is_none());
        assert!(shows[1].rating.average.is_none());
        assert_eq!(server.requested_paths(), vec!["/shows"]);
    }

    #[test]
    fn seasons_and_episodes_hit_show_scoped_paths() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(200, r#"[{"id": 11, "number": 1}]"#.to_string()),
            Behavior::Respond(
                200,
                r#"[{"id": 5, "name": "Pilot", "season": 1, "number": null,
                     "rating": {"average": 7.0}}]"#
                    .to_string(),
            ),
        ]);
        let catalog = client(&server);

        let seasons = catalog.seasons(3).expect("seasons");
        let episodes = catalog.season_episodes(seasons[0].id).expect("episodes");

        assert_eq!(seasons[0].number, 1);
        assert_eq!(episodes[0].number, None);
        assert_eq!(
            server.requested_paths(),
            vec!["/shows/3/seasons", "/shows/11/episodes"]
        );
    }

    #[test]
    fn http_failure_carries_status_and_truncated_body() {
        let server = TestServer::spawn(vec![Behavior::Respond(404, "not-found".to_string())]);

        let err = client(&server).shows().expect_err("404 should fail");

        match &err {
            CatalogError::Status { status, detail, .. } => {
                assert_eq!(*status, 404);
                assert_eq!(detail, " (not-found)");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("HTTP status 404"));
    }

    #[test]
    fn malformed_payload_is_a_decode_error() {
        let server = TestServer::spawn(vec![Behavior::Respond(200, "{\"oops\":".to_string())]);

        let err = client(&server).shows().expect_err("bad json should fail");
        assert!(matches!(err, CatalogError::Decode { .. }), "{err:?}");
    }

    #[test]
    fn slow_response_surfaces_as_transport_error() {
        let server = TestServer::spawn(vec![Behavior::DelayRespond(
            Duration::from_millis(400),
            200,
            "[]".to_string(),
        )]);
        let catalog = HttpCatalog::new(
            &server.base_url,
            Duration::from_millis(200),
            Duration::from_millis(50),
        );

        let err = catalog.shows().expect_err("read timeout should fail");
        assert!(
            matches!(err, CatalogError::Transport { .. } | CatalogError::Body { .. }),
            "{err:?}"
        );
    }
}
