use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::{InvalidQuery, MethodNotAllowed, PayloadTooLarge};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use super::routes::{api_routes, error_response, ApiContext, Route};
use crate::error_handling::types::WebError;
use crate::session_management::facilitator::Authenticator;
use crate::session_management::session_manager::SessionManager;

/// HTTP front of the session manager.
pub struct WebServer {
    ctx: ApiContext,
}

impl WebServer {
    pub fn new(manager: Arc<SessionManager>, auth: Arc<Authenticator>) -> Self {
        Self {
            ctx: ApiContext { manager, auth },
        }
    }

    /// All routes with rejections turned into JSON errors.
    pub fn routes(&self) -> Route {
        api_routes(&self.ctx)
            .recover(handle_rejection)
            .unify()
            .with(warp::log("cluehunt::http"))
            .map(Reply::into_response)
            .boxed()
    }

    /// Serves until `shutdown` is cancelled.
    pub async fn serve(
        &self,
        addr: SocketAddr,
        shutdown: CancellationToken,
    ) -> Result<(), WebError> {
        // Surface bind errors before handing the address to warp.
        let probe = TcpListener::bind(addr)
            .await
            .map_err(|e| WebError::BindFailed(format!("{}: {}", addr, e)))?;
        drop(probe);

        info!("HTTP API listening on http://{}", addr);
        let server = warp::serve(self.routes()).run(addr);
        tokio::select! {
            _ = server => Err(WebError::ServerFailed("server exited unexpectedly".into())),
            _ = shutdown.cancelled() => {
                info!("HTTP API on {} shutting down", addr);
                Ok(())
            }
        }
    }
}

pub(crate) async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "No such route".to_string())
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Malformed request body: {}", e))
    } else if err.find::<InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Malformed query string".to_string())
    } else if err.find::<PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if err.find::<MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        debug!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
    };
    Ok(error_response(status, message))
}
