//! Router assembly and serving.

use std::io;
use std::net::SocketAddr;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::auth::require_token;
use super::handlers::{
    api_respond, api_send, incoming, list_scripts, remote_list, remote_register, remote_remove,
    remote_update, slash_command,
};
use crate::relay::websocket_handler;
use crate::state::AppState;

/// Builds the full HTTP surface.
pub fn router(state: AppState) -> Router {
    let auth = from_fn_with_state(state.clone(), require_token);

    let protected = Router::new()
        .route("/api/send", post(api_send))
        .route("/api/respond", post(api_respond))
        .route(
            "/api/remote/scripts",
            get(remote_list)
                .post(remote_register)
                .put(remote_update)
                .delete(remote_remove),
        )
        .route_layer(auth.clone());

    Router::new()
        .route("/", get(list_scripts).merge(post(incoming).route_layer(auth)))
        .route("/slash-command", get(slash_command).post(slash_command))
        .route("/api/websocket", get(websocket_handler))
        .merge(protected)
        .with_state(state)
}

/// The HTTP server, not yet listening.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: router(state),
        }
    }

    /// Binds `addr` and serves in the background until the returned handle
    /// is shut down or dropped.
    pub async fn bind(self, addr: &str) -> io::Result<ServerHandle> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "HTTP server listening");

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let router = self.router;

        let task = tokio::spawn(async move {
            let server = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            );

            tokio::select! {
                result = server => {
                    if let Err(e) = result {
                        error!(error = %e, "HTTP server error");
                    }
                }
                _ = &mut shutdown_rx => {
                    info!("HTTP server shutting down");
                }
            }
        });

        Ok(ServerHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// Handle to a running [`HttpServer`].
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for the server task.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            error!(error = %e, "HTTP server task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use courier_core::{Script, ScriptKind, SlashCommand};
    use courier_framework::Robot;
    use serde_json::{Value, json};

    use super::*;
    use crate::http::error::HttpError;
    use crate::relay::RelaySettings;

    async fn serve(robot: Robot) -> (Arc<Robot>, ServerHandle, String) {
        serve_as_is(robot.with_tokens(["s3cret"])).await
    }

    async fn serve_as_is(robot: Robot) -> (Arc<Robot>, ServerHandle, String) {
        let robot = Arc::new(robot);
        let state = AppState::new(robot.clone(), RelaySettings::default(), reqwest::Client::new());
        let handle = HttpServer::new(state).bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", handle.local_addr());
        (robot, handle, base)
    }

    #[tokio::test]
    async fn test_list_scripts_is_public() {
        let robot = Robot::new("courier");
        robot
            .register_script(
                Script::new("badger", "(?i)badger", ScriptKind::Send)
                    .description("badgers")
                    .handler(|_, _| async { Ok(vec!["BADGERS!".to_string()]) }),
            )
            .unwrap();
        let (_robot, handle, base) = serve(robot).await;

        let scripts: Value = reqwest::get(format!("{base}/")).await.unwrap().json().await.unwrap();
        assert_eq!(scripts[0]["name"], "badger");
        assert_eq!(scripts[0]["type"], "send");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let (_robot, handle, base) = serve(Robot::new("courier")).await;
        let client = reqwest::Client::new();

        let response = client.post(format!("{base}/?message=hi")).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
        let body: HttpError = response.json().await.unwrap();
        assert_eq!(body.code, 401);

        let response = client
            .post(format!("{base}/?message=hi"))
            .header("X-Auth-Token", "s3cret")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let response = client
            .post(format!("{base}/?token=s3cret"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_form_body_token() {
        let (_robot, handle, base) = serve(Robot::new("courier")).await;
        let client = reqwest::Client::new();
        let form = |body: &'static str| {
            client
                .post(format!("{base}/"))
                .header("content-type", "application/x-www-form-urlencoded")
                .body(body)
        };

        let response = form("token=s3cret&message=hi").send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let response = form("token=s3cret").send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let response = form("token=wrong&message=hi").send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

        let response = client
            .post(format!("{base}/api/send"))
            .header("content-type", "application/x-www-form-urlencoded")
            .body("token=s3cret")
            .send()
            .await
            .unwrap();
        assert_ne!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_bearer_token_is_rejected() {
        let (_robot, handle, base) = serve(Robot::new("courier")).await;
        let client = reqwest::Client::new();

        for token in ["wrong", "s3cre", "s3cret2"] {
            let response = client
                .post(format!("{base}/api/send"))
                .bearer_auth(token)
                .json(&json!({"envelope": {}, "messages": ["hi"]}))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
        }

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_allow_list_rejects_empty_token() {
        let (robot, handle, base) = serve_as_is(Robot::new("courier").with_tokens([""])).await;
        assert!(!robot.has_tokens());
        let client = reqwest::Client::new();

        let requests = [
            client.post(format!("{base}/?message=hi&token=")),
            client.post(format!("{base}/?message=hi")).header("X-Auth-Token", ""),
            client.post(format!("{base}/?message=hi")).header("Authorization", "Bearer "),
            client
                .post(format!("{base}/"))
                .header("content-type", "application/x-www-form-urlencoded")
                .body("token=&message=hi"),
        ];
        for request in requests {
            let response = request.send().await.unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
        }

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_api_send_and_respond_validation() {
        let (_robot, handle, base) = serve(Robot::new("courier")).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/api/send"))
            .bearer_auth("s3cret")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let response = client
            .post(format!("{base}/api/respond"))
            .bearer_auth("s3cret")
            .json(&json!({"envelope": {"message": "x"}, "messages": ["hi"]}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let response = client
            .post(format!("{base}/api/send"))
            .bearer_auth("s3cret")
            .json(&json!({"envelope": {"channel_name": "general"}, "messages": ["hi"]}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_slash_command_unknown_token() {
        let robot = Robot::new("courier");
        robot
            .register_command(
                SlashCommand::new("ping", "ping").handler(|_| async { Ok("pong".to_string()) }),
            )
            .unwrap();
        let (_robot, handle, base) = serve(robot).await;

        let response = reqwest::get(format!("{base}/slash-command?token=missing"))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_remote_scripts_lifecycle() {
        let (robot, handle, base) = serve(Robot::new("courier")).await;
        let client = reqwest::Client::new();
        let url = format!("{base}/api/remote/scripts");
        let script = json!({
            "name": "weather",
            "type": "send",
            "matcher": "weather",
            "url": "http://127.0.0.1:1/hook"
        });

        let response = client.post(&url).bearer_auth("s3cret").json(&script).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        assert_eq!(robot.scripts().len(), 1);

        let response = client.post(&url).bearer_auth("s3cret").json(&script).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["scripts"][0]["name"], "weather");

        let listed: Value = client
            .get(&url)
            .bearer_auth("s3cret")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let response = client
            .delete(&url)
            .bearer_auth("s3cret")
            .json(&json!([{"name": "other"}]))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        let response = client
            .delete(&url)
            .bearer_auth("s3cret")
            .json(&json!({"name": "weather"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
        assert!(robot.scripts().is_empty());

        handle.shutdown().await;
    }
}
