//! HTTP surface: message intake, slash commands, outbound API, remote
//! scripts and the relay endpoint.

pub mod auth;
pub mod error;
pub mod form;
pub mod handlers;
pub mod remote;
pub mod server;

pub use auth::{extract_token, require_token};
pub use error::{HttpError, HttpResult};
pub use remote::{RemoteError, RemoteScript, RemoteScripts, build_client};
pub use server::{HttpServer, ServerHandle, router};
