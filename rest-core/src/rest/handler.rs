//! Verb dispatch from HTTP-shaped inputs to a [`Manager`].

use std::sync::Arc;

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::RestError;
use crate::identity::RequestContext;
use crate::rest::negotiation::{ContentType, JSON_MEDIA_TYPE, render_csv};
use crate::rest::options::{ListOptions, Paging};
use crate::rest::resource::{Manager, PatchManager, RepresentationType, Resource};

pub const DEFAULT_EXPORT_PAGE_SIZE: u32 = 500;

/// Envelope of a paged JSON listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

/// Rendered outcome of a successful dispatch.
#[derive(Debug)]
pub struct RestResponse {
    pub status: StatusCode,
    pub content_type: Option<&'static str>,
    pub body: Vec<u8>,
    pub attachment: Option<String>,
}

impl RestResponse {
    pub fn json_bytes(status: StatusCode, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: Some(JSON_MEDIA_TYPE),
            body,
            attachment: None,
        }
    }

    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Self, RestError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| RestError::Internal(anyhow::anyhow!("failed to encode response: {}", e)))?;
        Ok(Self::json_bytes(status, body))
    }

    pub fn csv(body: String, filename: String) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some(ContentType::Csv.media_type()),
            body: body.into_bytes(),
            attachment: Some(filename),
        }
    }

    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
            attachment: None,
        }
    }
}

impl IntoResponse for RestResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        let headers = response.headers_mut();
        match self.content_type {
            Some(content_type) => {
                headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
            }
            None => {
                headers.remove(header::CONTENT_TYPE);
            }
        }
        if let Some(filename) = self.attachment {
            let disposition = format!("attachment; filename=\"{}\"", filename);
            if let Ok(value) = header::HeaderValue::from_str(&disposition) {
                headers.insert(header::CONTENT_DISPOSITION, value);
            }
        }
        response
    }
}

/// Splits an over-fetched result into the requested page and a "more
/// pages" flag.
pub fn paginate<T>(mut results: Vec<T>, size: u32) -> (Vec<T>, bool) {
    let size = size as usize;
    let has_more = results.len() > size;
    results.truncate(size);
    (results, has_more)
}

fn to_json_value<R: Resource>(resource: &R) -> Result<Value, RestError> {
    let bytes = resource.to_representation(RepresentationType::Json)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| RestError::Internal(anyhow::anyhow!("resource produced invalid json: {}", e)))
}

fn require_body(body: &[u8]) -> Result<&[u8], RestError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(RestError::field("body", "missing request body"));
    }
    Ok(body)
}

/// REST controller for one resource type.
pub struct RestHandler<M: Manager> {
    manager: Arc<M>,
    patcher: Option<Arc<dyn PatchManager<M::Resource>>>,
    paging: Paging,
    export_page_size: u32,
    name: String,
}

impl<M: Manager> RestHandler<M> {
    /// Handler for a manager without partial-update support; PATCH answers
    /// Unsupported.
    pub fn new(name: impl Into<String>, manager: Arc<M>) -> Self {
        Self {
            manager,
            patcher: None,
            paging: Paging::default(),
            export_page_size: DEFAULT_EXPORT_PAGE_SIZE,
            name: name.into(),
        }
    }

    /// Handler for a manager that also implements [`PatchManager`].
    pub fn with_patch(name: impl Into<String>, manager: Arc<M>) -> Self
    where
        M: PatchManager<M::Resource>,
    {
        let patcher: Arc<dyn PatchManager<M::Resource>> = manager.clone();
        Self {
            patcher: Some(patcher),
            ..Self::new(name, manager)
        }
    }

    #[must_use]
    pub fn paging(mut self, paging: Paging, export_page_size: u32) -> Self {
        self.paging = paging;
        self.export_page_size = export_page_size.max(1);
        self
    }

    pub fn supports_patch(&self) -> bool {
        self.patcher.is_some()
    }

    fn render(&self, status: StatusCode, resource: &M::Resource) -> Result<RestResponse, RestError> {
        let body = resource.to_representation(RepresentationType::Json)?;
        Ok(RestResponse::json_bytes(status, body))
    }

    pub async fn handle_get(&self, ctx: &RequestContext, key: &str) -> Result<RestResponse, RestError> {
        let resource = self.manager.from_id(ctx, key).await?;
        self.render(StatusCode::OK, &resource)
    }

    /// Paged listing; a CSV negotiation exports every match instead.
    pub async fn handle_list(
        &self,
        ctx: &RequestContext,
        query: &[(String, String)],
        accept: ContentType,
    ) -> Result<RestResponse, RestError> {
        let opts = self.paging.parse(query)?;

        if accept == ContentType::Csv {
            let resources = self.export_all(ctx, opts).await?;
            let csv = render_csv(
                <M::Resource as Resource>::csv_header(),
                resources.iter().map(|r| r.csv_record()),
            );
            return Ok(RestResponse::csv(csv, format!("{}.csv", self.name)));
        }

        let size = opts.size;
        let results = self.manager.list_of(ctx, &opts).await?;
        let (page, has_more) = paginate(results, size);
        let items = page.iter().map(to_json_value).collect::<Result<Vec<_>, _>>()?;
        RestResponse::json(StatusCode::OK, &ListResponse { items, has_more })
    }

    async fn export_all(
        &self,
        ctx: &RequestContext,
        mut opts: ListOptions,
    ) -> Result<Vec<M::Resource>, RestError> {
        opts.page = 0;
        opts.size = self.export_page_size;

        let mut all = Vec::new();
        loop {
            let batch = self.manager.list_of(ctx, &opts).await?;
            let (batch, has_more) = paginate(batch, opts.size);
            all.extend(batch);
            if !has_more {
                break;
            }
            opts.page += 1;
        }

        tracing::debug!(resource = %self.name, count = all.len(), "Exported resources as csv");
        Ok(all)
    }

    pub async fn handle_property_values(
        &self,
        ctx: &RequestContext,
        property: &str,
        query: &[(String, String)],
    ) -> Result<RestResponse, RestError> {
        let mut opts = self.paging.parse(query)?;
        opts.property = Some(property.to_string());

        let size = opts.size;
        let results = self.manager.list_of_properties(ctx, &opts).await?;
        let (items, has_more) = paginate(results, size);
        RestResponse::json(StatusCode::OK, &ListResponse { items, has_more })
    }

    pub async fn handle_post(&self, ctx: &RequestContext, body: &[u8]) -> Result<RestResponse, RestError> {
        let body = require_body(body)?;
        let mut resource = self.manager.new_resource(ctx)?;
        resource.from_representation(RepresentationType::Json, body)?;

        self.manager.create(ctx, &mut resource, body).await?;

        tracing::info!(resource = %self.name, id = %resource.id(), "Resource created");
        self.render(StatusCode::CREATED, &resource)
    }

    pub async fn handle_put(
        &self,
        ctx: &RequestContext,
        key: &str,
        body: &[u8],
    ) -> Result<RestResponse, RestError> {
        let body = require_body(body)?;
        let mut resource = self.manager.from_id(ctx, key).await?;

        self.manager.update(ctx, &mut resource, body).await?;

        tracing::info!(resource = %self.name, id = %key, "Resource updated");
        self.render(StatusCode::OK, &resource)
    }

    pub async fn handle_patch(
        &self,
        ctx: &RequestContext,
        key: &str,
        body: &[u8],
    ) -> Result<RestResponse, RestError> {
        let Some(patcher) = self.patcher.as_ref() else {
            tracing::debug!(resource = %self.name, "Manager does not support patch");
            return Err(RestError::Unsupported);
        };

        let body = require_body(body)?;
        let mut resource = self.manager.from_id(ctx, key).await?;

        let fields: Map<String, Value> = serde_json::from_slice(body)
            .map_err(|e| RestError::field("json", format!("invalid json: {}", e)))?;

        patcher.patch(ctx, &mut resource, &fields).await?;

        tracing::info!(resource = %self.name, id = %key, "Resource patched");
        self.render(StatusCode::OK, &resource)
    }

    pub async fn handle_delete(&self, ctx: &RequestContext, key: &str) -> Result<RestResponse, RestError> {
        let resource = self.manager.from_id(ctx, key).await?;

        self.manager.delete(ctx, &resource).await?;

        tracing::info!(resource = %self.name, id = %key, "Resource deleted");
        Ok(RestResponse::empty(StatusCode::OK))
    }
}
