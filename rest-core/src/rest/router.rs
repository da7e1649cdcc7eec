//! axum glue mounting a [`RestHandler`] under a resource path.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, header},
    routing::get,
    Router,
};

use crate::error::RestError;
use crate::identity::RequestContext;
use crate::rest::handler::{RestHandler, RestResponse};
use crate::rest::negotiation::ContentType;
use crate::rest::options::parse_query;
use crate::rest::resource::Manager;

type Handler<M> = State<Arc<RestHandler<M>>>;

/// Routes for one resource collection, meant to be nested at `/{resource}`:
///
/// - `GET /` list (JSON page or CSV export), `POST /` create
/// - `GET|PUT|PATCH|DELETE /:id`
/// - `GET /__property/:property` distinct property values
pub fn resource_routes<M, S>(handler: Arc<RestHandler<M>>) -> Router<S>
where
    M: Manager,
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(list::<M>).post(create::<M>))
        .route("/__property/:property", get(property_values::<M>))
        .route(
            "/:id",
            get(fetch::<M>)
                .put(replace::<M>)
                .patch(patch::<M>)
                .delete(remove::<M>),
        )
        .with_state(handler)
}

fn accept(headers: &HeaderMap) -> ContentType {
    ContentType::negotiate(headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()))
}

async fn list<M: Manager>(
    State(handler): Handler<M>,
    ctx: RequestContext,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<RestResponse, RestError> {
    let query = parse_query(query.as_deref())?;
    handler.handle_list(&ctx, &query, accept(&headers)).await
}

async fn property_values<M: Manager>(
    State(handler): Handler<M>,
    ctx: RequestContext,
    Path(property): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<RestResponse, RestError> {
    let query = parse_query(query.as_deref())?;
    handler.handle_property_values(&ctx, &property, &query).await
}

async fn fetch<M: Manager>(
    State(handler): Handler<M>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<RestResponse, RestError> {
    handler.handle_get(&ctx, &id).await
}

async fn create<M: Manager>(
    State(handler): Handler<M>,
    ctx: RequestContext,
    body: Bytes,
) -> Result<RestResponse, RestError> {
    handler.handle_post(&ctx, &body).await
}

async fn replace<M: Manager>(
    State(handler): Handler<M>,
    ctx: RequestContext,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<RestResponse, RestError> {
    handler.handle_put(&ctx, &id, &body).await
}

async fn patch<M: Manager>(
    State(handler): Handler<M>,
    ctx: RequestContext,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<RestResponse, RestError> {
    handler.handle_patch(&ctx, &id, &body).await
}

async fn remove<M: Manager>(
    State(handler): Handler<M>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<RestResponse, RestError> {
    handler.handle_delete(&ctx, &id).await
}
