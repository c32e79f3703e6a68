//! OpenAPI document for the REST endpoints.

use utoipa::OpenApi;

use crate::api::dto::{CollectionsResponse, ObjectListResponse};
use crate::api::handlers::{objects, system};
use crate::domain::{ObjectMeta, ResourceObject};
use crate::error::{ErrorBody, ErrorResponse};

/// Generated OpenAPI description, served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "resview-gateway",
        description = "REST access to stored resources. Live updates are served over the `/ws` stream."
    ),
    paths(
        objects::list_collections,
        objects::list_objects,
        objects::create_object,
        objects::get_object,
        objects::update_object,
        objects::delete_object,
        system::health_handler,
    ),
    components(schemas(
        CollectionsResponse,
        ObjectListResponse,
        ResourceObject,
        ObjectMeta,
        ErrorResponse,
        ErrorBody,
        system::HealthResponse,
    )),
    tags(
        (name = "Objects", description = "Resource object CRUD"),
        (name = "System", description = "Health and metadata"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_rest_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        assert!(paths.contains(&"/api/v1/collections"));
        assert!(paths.contains(&"/api/v1/collections/{collection}/objects"));
        assert!(paths.contains(&"/api/v1/collections/{collection}/objects/{name}"));
        assert!(paths.contains(&"/health"));
    }
}
