//! The operator control surface: list connections, start, stop, restart and report status.
//!
//! Transport is left to the embedding application. [`ControlRequest::route`] maps a method and
//! path to a request and [`ServerController::handle`] answers it with a serializable
//! [`ControlResponse`].
//!
//! ```no_run
//! # async fn serve(controller: &ftpgate::ServerController) {
//! use ftpgate::control::ControlRequest;
//!
//! if let Some(request) = ControlRequest::route("GET", "/status") {
//!     let body = serde_json::to_string(&controller.handle(request).await).unwrap();
//!     println!("{body}");
//! }
//! # }
//! ```

use crate::server::{ConnectionInfo, ServerController, StatusReport};
use serde::Serialize;

/// An operator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// `GET connections`
    Connections,
    /// `POST start`
    Start,
    /// `POST stop`
    Stop,
    /// `POST restart`
    Restart,
    /// `GET status`
    Status,
}

impl ControlRequest {
    /// The request for `method` on `path`, if there is one. Leading and trailing slashes in the
    /// path are ignored.
    pub fn route(method: &str, path: &str) -> Option<ControlRequest> {
        let path = path.trim_matches('/');
        match (method.to_ascii_uppercase().as_str(), path) {
            ("GET", "connections") => Some(ControlRequest::Connections),
            ("GET", "status") => Some(ControlRequest::Status),
            ("POST", "start") => Some(ControlRequest::Start),
            ("POST", "stop") => Some(ControlRequest::Stop),
            ("POST", "restart") => Some(ControlRequest::Restart),
            _ => None,
        }
    }
}

/// The answer to a [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ControlResponse {
    /// The live sessions
    Connections(Vec<ConnectionInfo>),
    /// The server status, also returned after start, stop and restart
    Status(StatusReport),
    /// The request failed
    Error {
        /// What went wrong
        error: String,
    },
}

impl ServerController {
    /// Carries out `request`.
    pub async fn handle(&self, request: ControlRequest) -> ControlResponse {
        let outcome = match request {
            ControlRequest::Connections => return ControlResponse::Connections(self.list_connections()),
            ControlRequest::Status => Ok(()),
            ControlRequest::Start => self.start().await,
            ControlRequest::Stop => {
                self.stop().await;
                Ok(())
            }
            ControlRequest::Restart => self.restart().await,
        };
        match outcome {
            Ok(()) => ControlResponse::Status(self.status().await),
            Err(e) => ControlResponse::Error { error: e.to_string() },
        }
    }
}
