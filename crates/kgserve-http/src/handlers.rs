//! Request handlers and wire types.
//!
//! Request-time errors are answered synchronously; worker-time errors are
//! recorded into task state and surface only through `pull_status`.

use crate::dispatch::Dispatcher;
use kgserve_core::{ApiKey, CoreError, GraphTarget, Operation, SourceError, SourceRef, Token};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::Reply;

/// Body of `POST /detect_schema` and `POST /populate_kg`.
#[derive(Debug, Deserialize)]
pub(crate) struct SubmitRequest {
    host: String,
    port: u16,
    name: String,
    srcs: Vec<String>,
    openaikey: String,
}

/// Query of `GET /pull_status`.
#[derive(Debug, Deserialize)]
pub(crate) struct StatusQuery {
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct TokenReply {
    token: Token,
}

#[derive(Debug, Serialize)]
struct ProgressReply {
    progress: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<SourceError>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorReply {
    pub(crate) error: String,
}

pub(crate) fn error_reply(status: StatusCode, message: &str) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&ErrorReply {
            error: message.to_string(),
        }),
        status,
    )
}

pub(crate) async fn detect_schema(
    request: SubmitRequest,
    dispatcher: Arc<Dispatcher>,
) -> Result<impl Reply, Infallible> {
    Ok(submit(Operation::SchemaDetection, request, &dispatcher))
}

pub(crate) async fn populate_kg(
    request: SubmitRequest,
    dispatcher: Arc<Dispatcher>,
) -> Result<impl Reply, Infallible> {
    Ok(submit(Operation::KgPopulate, request, &dispatcher))
}

fn submit(
    operation: Operation,
    request: SubmitRequest,
    dispatcher: &Dispatcher,
) -> warp::reply::WithStatus<warp::reply::Json> {
    let sources = request.srcs.into_iter().map(SourceRef::from).collect();
    let target = GraphTarget::new(request.host, request.port, request.name);

    match dispatcher.submit(operation, sources, ApiKey::new(request.openaikey), target) {
        Ok(token) => warp::reply::with_status(
            warp::reply::json(&TokenReply { token }),
            StatusCode::OK,
        ),
        Err(err) if err.is_client_error() => {
            error_reply(StatusCode::BAD_REQUEST, &err.to_string())
        }
        Err(err) => {
            tracing::error!(error = %err, "submission failed");
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

pub(crate) async fn pull_status(
    query: StatusQuery,
    dispatcher: Arc<Dispatcher>,
) -> Result<impl Reply, Infallible> {
    let Some(raw) = query.token else {
        return Ok(error_reply(StatusCode::BAD_REQUEST, "No token provided"));
    };

    // A token that does not even parse can never be live.
    let Ok(token) = raw.parse::<Token>() else {
        return Ok(error_reply(StatusCode::BAD_REQUEST, "Unknown token"));
    };

    match dispatcher.registry().poll(&token) {
        Ok(snapshot) => {
            if snapshot.progress >= 1.0 {
                // The task was just evicted; its supervisor is done too.
                dispatcher.discard_handle(&token);
            }
            Ok(warp::reply::with_status(
                warp::reply::json(&ProgressReply {
                    progress: snapshot.progress,
                    errors: snapshot.errors,
                }),
                StatusCode::OK,
            ))
        }
        Err(CoreError::UnknownToken(_)) => {
            Ok(error_reply(StatusCode::BAD_REQUEST, "Unknown token"))
        }
        Err(err) => {
            tracing::error!(error = %err, "status poll failed");
            Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                &err.to_string(),
            ))
        }
    }
}
