use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use axum_extra::headers::Range;
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use axum_responses::{Created, DirProvider, FileResponse, FileResponseError, Problem};

#[derive(Clone)]
struct AppState {
    files: Arc<DirProvider>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let state = AppState {
        files: Arc::new(DirProvider::new("test")),
    };

    let router = Router::new()
        .route("/", get(|| async { "axum-responses demo" }))
        .route("/files/{*path}", get(serve_file))
        .route("/fixture.txt", get(serve_fixture))
        .route("/contacts", post(create_contact))
        .route("/contacts/{id}", get(get_contact))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    tracing::info!("listening on http://0.0.0.0:3000");
    axum::serve(listener, router).await.unwrap();
}

/// Serves any file below the provider root, with range and conditional
/// request support. `curl -H 'Range: bytes=0-4' .../files/fixture.txt`
async fn serve_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, FileResponseError> {
    FileResponse::from_provider(state.files.as_ref(), path)
        .with_range_support()
        .respond(&method, &headers)
        .await
}

/// Same file served by physical path, as a named download. The typed
/// `Range` extractor is only used to log what the client asked for.
async fn serve_fixture(
    method: Method,
    range: Option<TypedHeader<Range>>,
    headers: HeaderMap,
) -> Response {
    if let Some(TypedHeader(range)) = range {
        tracing::debug!(?range, "range requested");
    }
    let result = FileResponse::from_path("test/fixture.txt")
        .attachment("fixture.txt")
        .with_range_support()
        .respond(&method, &headers)
        .await;
    match result {
        Ok(response) => response,
        Err(error) => error.into_response(),
    }
}

#[derive(Deserialize)]
struct NewContact {
    name: String,
}

#[derive(Serialize)]
struct Contact {
    id: u32,
    name: String,
}

async fn create_contact(axum::extract::Json(new_contact): axum::extract::Json<NewContact>) -> Response {
    let contact = Contact { id: 7, name: new_contact.name };
    Created::at("/contacts/7").value(contact).into_response()
}

async fn get_contact(Path(id): Path<u32>) -> Response {
    if id == 7 {
        return axum::Json(Contact { id, name: "Kenny".to_owned() }).into_response();
    }
    Problem::from_status(axum::http::StatusCode::NOT_FOUND)
        .detail(format!("contact {id} does not exist"))
        .instance(format!("/contacts/{id}"))
        .into_response()
}
