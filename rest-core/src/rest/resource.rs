//! Contracts implemented once per resource type.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::RestError;
use crate::identity::RequestContext;
use crate::rest::options::ListOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepresentationType {
    Json,
    Csv,
}

/// A resource that can be exchanged with clients.
pub trait Resource: Send + Sync + 'static {
    /// External identifier used in `/{resource}/{id}` paths.
    fn id(&self) -> String;

    fn from_representation(
        &mut self,
        rtype: RepresentationType,
        data: &[u8],
    ) -> Result<(), RestError>;

    fn to_representation(&self, rtype: RepresentationType) -> Result<Vec<u8>, RestError>;

    /// Column names of the CSV export, in record order.
    fn csv_header() -> &'static [&'static str]
    where
        Self: Sized;

    fn csv_record(&self) -> Vec<String>;
}

/// Permission-checked CRUD for one resource type.
///
/// Every operation receives the request context and is solely responsible
/// for its own authorization.
#[async_trait]
pub trait Manager: Send + Sync + 'static {
    type Resource: Resource;

    fn new_resource(&self, ctx: &RequestContext) -> Result<Self::Resource, RestError>;

    async fn from_id(&self, ctx: &RequestContext, id: &str) -> Result<Self::Resource, RestError>;

    /// Returns at most `opts.size + 1` resources starting at `opts.offset()`.
    async fn list_of(
        &self,
        ctx: &RequestContext,
        opts: &ListOptions,
    ) -> Result<Vec<Self::Resource>, RestError>;

    /// Values that `opts.property` takes across the collection.
    async fn list_of_properties(
        &self,
        _ctx: &RequestContext,
        _opts: &ListOptions,
    ) -> Result<Vec<String>, RestError> {
        Err(RestError::Unsupported)
    }

    async fn create(
        &self,
        ctx: &RequestContext,
        resource: &mut Self::Resource,
        bundle: &[u8],
    ) -> Result<(), RestError>;

    async fn update(
        &self,
        ctx: &RequestContext,
        resource: &mut Self::Resource,
        bundle: &[u8],
    ) -> Result<(), RestError>;

    async fn delete(&self, ctx: &RequestContext, resource: &Self::Resource)
    -> Result<(), RestError>;
}

/// Optional partial-update capability.
#[async_trait]
pub trait PatchManager<R: Resource>: Send + Sync {
    async fn patch(
        &self,
        ctx: &RequestContext,
        resource: &mut R,
        fields: &Map<String, Value>,
    ) -> Result<(), RestError>;
}
