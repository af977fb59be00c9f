use std::collections::VecDeque;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value;

/// Scripted answer to one message POST. Once the script runs out every request succeeds.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Ok,
    RateLimited { retry_after_secs: f64 },
    Status(u16),
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub authorization: Option<String>,
    pub content: String,
}

pub struct DiscordStub {
    pub api_base: String,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl DiscordStub {
    pub fn spawn(script: Vec<Reply>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start discord stub server");
        let addr = server.server_addr();
        let api_base = format!("http://{addr}/api/v10");

        let recorded = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&recorded);
        let mut script: VecDeque<Reply> = script.into();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                let is_message_post = request.method() == &tiny_http::Method::Post
                    && path.starts_with("/api/v10/channels/")
                    && path.ends_with("/messages");
                if !is_message_post {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let authorization = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.as_str().to_owned());

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }
                let Some(content) = serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|v| v.get("content").and_then(Value::as_str).map(str::to_owned))
                else {
                    let _ = request.respond(
                        tiny_http::Response::from_string(r#"{"message":"Cannot send an empty message","code":50006}"#)
                            .with_status_code(400),
                    );
                    continue;
                };

                let (status, response_body) = match script.pop_front().unwrap_or(Reply::Ok) {
                    Reply::Ok => {
                        log.lock().expect("lock recorded requests").push(Recorded {
                            path,
                            authorization,
                            content: content.clone(),
                        });
                        (200, serde_json::json!({ "id": "1", "content": content }))
                    }
                    Reply::RateLimited { retry_after_secs } => (
                        429,
                        serde_json::json!({
                            "message": "You are being rate limited.",
                            "retry_after": retry_after_secs,
                            "global": false
                        }),
                    ),
                    Reply::Status(code) => (code, serde_json::json!({ "message": "stub failure" })),
                };

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                let response = tiny_http::Response::from_string(response_body.to_string())
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            api_base,
            recorded,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Successfully delivered messages, in arrival order.
    pub fn delivered(&self) -> Vec<Recorded> {
        self.recorded.lock().expect("lock recorded requests").clone()
    }
}

impl Drop for DiscordStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
