//! Object CRUD handlers: collections, list, get, create, update, delete.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{CollectionsResponse, ListQuery, ObjectListResponse, ScopeQuery};
use crate::app_state::AppState;
use crate::domain::ResourceObject;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /collections`: List known collections.
///
/// # Errors
///
/// Returns [`GatewayError`] on internal failures.
#[utoipa::path(
    get,
    path = "/api/v1/collections",
    tag = "Objects",
    summary = "List collections",
    description = "Returns the names of all collections holding at least one object.",
    responses(
        (status = 200, description = "Collection names", body = CollectionsResponse),
    )
)]
pub async fn list_collections(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let collections = state.resources.collections().await?;
    Ok(Json(CollectionsResponse { collections }))
}

/// `GET /collections/{collection}/objects`: List objects with optional
/// namespace and selector filters.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] on a malformed selector.
#[utoipa::path(
    get,
    path = "/api/v1/collections/{collection}/objects",
    tag = "Objects",
    summary = "List objects",
    description = "Lists the objects of a collection, filtered by namespace, field selector and label selector.",
    params(
        ("collection" = String, Path, description = "Collection name"),
        ListQuery,
    ),
    responses(
        (status = 200, description = "Matching objects", body = ObjectListResponse),
        (status = 400, description = "Malformed selector", body = ErrorResponse),
    )
)]
pub async fn list_objects(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let items = state
        .resources
        .list(
            &collection,
            query.namespace.as_deref(),
            query.field_selector.as_deref(),
            query.label_selector.as_deref(),
        )
        .await?;
    Ok(Json(ObjectListResponse { collection, items }))
}

/// `POST /collections/{collection}/objects`: Create an object.
///
/// # Errors
///
/// Returns [`GatewayError::AlreadyExists`] if the name is taken.
#[utoipa::path(
    post,
    path = "/api/v1/collections/{collection}/objects",
    tag = "Objects",
    summary = "Create an object",
    description = "Stores a new object. The `namespace` query parameter scopes the object when its metadata carries none.",
    params(
        ("collection" = String, Path, description = "Collection name"),
        ScopeQuery,
    ),
    request_body = ResourceObject,
    responses(
        (status = 201, description = "Object created", body = ResourceObject),
        (status = 400, description = "Invalid object", body = ErrorResponse),
        (status = 409, description = "Object already exists", body = ErrorResponse),
    )
)]
pub async fn create_object(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(scope): Query<ScopeQuery>,
    Json(obj): Json<ResourceObject>,
) -> Result<impl IntoResponse, GatewayError> {
    let created = state
        .resources
        .create(&collection, scope.namespace(), obj)
        .await?;
    tracing::debug!(%collection, name = created.name(), "object created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /collections/{collection}/objects/{name}`: Fetch one object.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the object does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/collections/{collection}/objects/{name}",
    tag = "Objects",
    summary = "Get an object",
    params(
        ("collection" = String, Path, description = "Collection name"),
        ("name" = String, Path, description = "Object name"),
        ScopeQuery,
    ),
    responses(
        (status = 200, description = "The object", body = ResourceObject),
        (status = 404, description = "Object not found", body = ErrorResponse),
    )
)]
pub async fn get_object(
    State(state): State<AppState>,
    Path((collection, name)): Path<(String, String)>,
    Query(scope): Query<ScopeQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let obj = state
        .resources
        .get(&collection, scope.namespace(), &name)
        .await?;
    Ok(Json(obj))
}

/// `PUT /collections/{collection}/objects/{name}`: Replace an object.
///
/// A non-zero `metadata.resourceVersion` must match the stored version.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the object does not exist,
/// [`GatewayError::Conflict`] on a version mismatch and
/// [`GatewayError::InvalidRequest`] if the body names another object.
#[utoipa::path(
    put,
    path = "/api/v1/collections/{collection}/objects/{name}",
    tag = "Objects",
    summary = "Replace an object",
    params(
        ("collection" = String, Path, description = "Collection name"),
        ("name" = String, Path, description = "Object name"),
        ScopeQuery,
    ),
    request_body = ResourceObject,
    responses(
        (status = 200, description = "Object replaced", body = ResourceObject),
        (status = 400, description = "Body does not match path", body = ErrorResponse),
        (status = 404, description = "Object not found", body = ErrorResponse),
        (status = 409, description = "Resource version conflict", body = ErrorResponse),
    )
)]
pub async fn update_object(
    State(state): State<AppState>,
    Path((collection, name)): Path<(String, String)>,
    Query(scope): Query<ScopeQuery>,
    Json(obj): Json<ResourceObject>,
) -> Result<impl IntoResponse, GatewayError> {
    if obj.name() != name {
        return Err(GatewayError::InvalidRequest(format!(
            "object name {:?} does not match path name {name:?}",
            obj.name()
        )));
    }
    let updated = state
        .resources
        .update(&collection, scope.namespace(), obj)
        .await?;
    Ok(Json(updated))
}

/// `DELETE /collections/{collection}/objects/{name}`: Delete an object.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the object does not exist.
#[utoipa::path(
    delete,
    path = "/api/v1/collections/{collection}/objects/{name}",
    tag = "Objects",
    summary = "Delete an object",
    params(
        ("collection" = String, Path, description = "Collection name"),
        ("name" = String, Path, description = "Object name"),
        ScopeQuery,
    ),
    responses(
        (status = 204, description = "Object deleted"),
        (status = 404, description = "Object not found", body = ErrorResponse),
    )
)]
pub async fn delete_object(
    State(state): State<AppState>,
    Path((collection, name)): Path<(String, String)>,
    Query(scope): Query<ScopeQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    state
        .resources
        .delete(&collection, scope.namespace(), &name)
        .await?;
    tracing::debug!(%collection, %name, "object deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Object routes, mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/collections", get(list_collections))
        .route(
            "/collections/{collection}/objects",
            get(list_objects).post(create_object),
        )
        .route(
            "/collections/{collection}/objects/{name}",
            get(get_object).put(update_object).delete(delete_object),
        )
}
