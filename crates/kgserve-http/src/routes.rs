//! Route composition.

use crate::dispatch::Dispatcher;
use crate::handlers;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Build the full kgserve route tree.
pub fn routes(
    dispatcher: Arc<Dispatcher>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let detect_schema = warp::path!("detect_schema")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_dispatcher(Arc::clone(&dispatcher)))
        .and_then(handlers::detect_schema);

    let populate_kg = warp::path!("populate_kg")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_dispatcher(Arc::clone(&dispatcher)))
        .and_then(handlers::populate_kg);

    let pull_status = warp::path!("pull_status")
        .and(warp::get())
        .and(warp::query::<handlers::StatusQuery>())
        .and(with_dispatcher(dispatcher))
        .and_then(handlers::pull_status);

    detect_schema
        .or(populate_kg)
        .or(pull_status)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn with_dispatcher(
    dispatcher: Arc<Dispatcher>,
) -> impl Filter<Extract = (Arc<Dispatcher>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&dispatcher))
}

/// Map framework rejections onto the JSON error bodies clients expect.
async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Rejection> {
    let reply = if rejection
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        // Missing or malformed JSON body.
        handlers::error_reply(StatusCode::BAD_REQUEST, "No data provided")
    } else if rejection.find::<warp::reject::InvalidQuery>().is_some() {
        handlers::error_reply(StatusCode::BAD_REQUEST, "Invalid query string")
    } else if rejection.is_not_found() {
        handlers::error_reply(StatusCode::NOT_FOUND, "Not found")
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        handlers::error_reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        tracing::error!(?rejection, "unhandled rejection");
        handlers::error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    };

    Ok(reply)
}
