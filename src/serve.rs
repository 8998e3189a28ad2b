use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::http::{HeaderValue, header};
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{Datelike, Local};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower::ServiceExt;
use tower::service_fn;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::*;

/// Arguments for running the kintree web server
#[derive(Debug, Clone, Parser)]
#[command(name = "kintree serve", about = "Start the kintree family tree API server.")]
pub struct ServeArgs {
    /// Directory holding the tree store. Defaults to the platform data
    /// directory, or $KINTREE_DATA_DIR when set.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 3001)]
    pub port: u16,

    /// Directory with a built web UI to serve next to the API.
    #[arg(long = "ui")]
    pub ui: Option<PathBuf>,

    /// Background color for rendered SVG previews.
    #[arg(long = "background-color", default_value = "#fafafa")]
    pub background_color: String,
}

struct ServeState {
    store: TreeStore,
    background: String,
    write_lock: Mutex<()>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthPayload {
    status: &'static str,
    timestamp: String,
    service: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct TreePayload {
    success: bool,
    tree_id: String,
    persons: FamilyTree,
    count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct TreeWritePayload {
    success: bool,
    message: &'static str,
    tree: FamilyTree,
    file_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct TreeListPayload {
    success: bool,
    count: usize,
    data: Vec<TreeSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SavedPayload {
    success: bool,
    message: &'static str,
    tree_id: String,
    count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PersonPayload {
    success: bool,
    person: Person,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LayoutPayload {
    success: bool,
    tree_id: String,
    center_id: String,
    layout: TreeLayout,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelationsPayload {
    success: bool,
    person: Person,
    #[serde(skip_serializing_if = "Option::is_none")]
    age: Option<i32>,
    parents: Vec<Person>,
    children: Vec<Person>,
    siblings: Vec<Person>,
    spouses: Vec<Person>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventsPayload {
    success: bool,
    tree_id: String,
    month: u32,
    birthdays: Vec<BirthdayEntry>,
    anniversaries: Vec<AnniversaryEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiError {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tree_id: Option<String>,
}

type ApiFailure = (StatusCode, Json<ApiError>);

#[derive(Debug, Deserialize)]
struct SaveFamilyDataRequest {
    #[serde(default)]
    persons: Vec<Person>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LayoutParams {
    center: Option<String>,
    width: Option<f32>,
    height: Option<f32>,
    ancestors: Option<usize>,
    descendants: Option<usize>,
    background: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EventsParams {
    month: Option<u32>,
}

pub async fn run_serve(args: ServeArgs, ui_root: Option<PathBuf>) -> Result<()> {
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(TreeStore::default_data_dir);
    let store = TreeStore::open(&data_dir)
        .with_context(|| format!("failed to open tree store at '{}'", data_dir.display()))?;
    let trees_dir = store.trees_dir().to_path_buf();

    let state = Arc::new(ServeState {
        store,
        background: args.background_color.clone(),
        write_lock: Mutex::new(()),
    });

    let mut app = api_router(state);

    let ui_root = ui_root.or_else(|| args.ui.clone());
    if let Some(root) = ui_root {
        let static_dir = ServeDir::new(root.clone())
            .append_index_html_on_directories(true)
            .fallback(ServeFile::new(root.join("index.html")));
        let dir_for_service = static_dir.clone();

        let static_service = service_fn(move |req| {
            let svc = dir_for_service.clone();
            async move {
                match svc.oneshot(req).await {
                    Ok(response) => Ok(response.map(axum::body::Body::new)),
                    Err(error) => {
                        let message = format!("Static file error: {error}");
                        Ok((StatusCode::INTERNAL_SERVER_ERROR, message).into_response())
                    }
                }
            }
        });

        app = app.fallback_service(static_service);
    }

    let app = app.layer(CorsLayer::permissive());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP server to {addr}"))?;

    println!("kintree server listening on http://{addr}");
    println!("Serving trees from {}", trees_dir.display());
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}

fn api_router(state: Arc<ServeState>) -> Router {
    Router::new()
        .route("/api/health", get(get_health))
        .route("/api/tree", get(get_default_tree).post(post_tree))
        .route("/api/tree/:id", get(get_tree).put(put_tree))
        .route("/api/trees", get(list_trees))
        .route("/api/saveFamilyData", post(post_save_family_data))
        .route("/api/tree/:id/persons", post(post_person))
        .route(
            "/api/tree/:id/persons/:pid",
            put(put_person).delete(delete_person),
        )
        .route("/api/tree/:id/persons/:pid/spouses", post(post_spouse))
        .route(
            "/api/tree/:id/persons/:pid/spouses/:sid",
            put(put_spouse).delete(delete_spouse),
        )
        .route("/api/tree/:id/layout", get(get_layout))
        .route("/api/tree/:id/svg", get(get_tree_svg))
        .route("/api/tree/:id/relations/:pid", get(get_relations))
        .route("/api/tree/:id/events", get(get_events))
        .with_state(state)
}

async fn get_health() -> Json<HealthPayload> {
    Json(HealthPayload {
        status: "OK",
        timestamp: now_iso(),
        service: "Family Tree API",
    })
}

async fn get_default_tree(
    State(state): State<Arc<ServeState>>,
) -> Result<Json<TreePayload>, ApiFailure> {
    tree_payload(&state, DEFAULT_TREE_ID)
}

async fn get_tree(
    State(state): State<Arc<ServeState>>,
    AxumPath(tree_id): AxumPath<String>,
) -> Result<Json<TreePayload>, ApiFailure> {
    tree_payload(&state, &tree_id)
}

fn tree_payload(state: &ServeState, tree_id: &str) -> Result<Json<TreePayload>, ApiFailure> {
    let tree = state.store.load(tree_id).map_err(store_error)?;
    let count = tree.tree_data.len();
    Ok(Json(TreePayload {
        success: true,
        tree_id: tree.tree_id.clone(),
        persons: tree,
        count,
    }))
}

async fn post_tree(
    State(state): State<Arc<ServeState>>,
    Json(payload): Json<NewTree>,
) -> Result<(StatusCode, Json<TreeWritePayload>), ApiFailure> {
    let _guard = state.write_lock.lock().await;
    let tree = state.store.create(payload).map_err(store_error)?;
    let file_size_bytes = state.store.file_size(&tree.tree_id).map_err(store_error)?;
    Ok((
        StatusCode::CREATED,
        Json(TreeWritePayload {
            success: true,
            message: "Tree created successfully",
            tree,
            file_size_bytes,
        }),
    ))
}

async fn put_tree(
    State(state): State<Arc<ServeState>>,
    AxumPath(tree_id): AxumPath<String>,
    Json(payload): Json<TreePatch>,
) -> Result<Json<TreeWritePayload>, ApiFailure> {
    let _guard = state.write_lock.lock().await;
    let tree = state.store.update(&tree_id, payload).map_err(store_error)?;
    let file_size_bytes = state.store.file_size(&tree.tree_id).map_err(store_error)?;
    Ok(Json(TreeWritePayload {
        success: true,
        message: "Tree updated successfully",
        tree,
        file_size_bytes,
    }))
}

async fn list_trees(
    State(state): State<Arc<ServeState>>,
) -> Result<Json<TreeListPayload>, ApiFailure> {
    let data = state.store.list().map_err(store_error)?;
    Ok(Json(TreeListPayload {
        success: true,
        count: data.len(),
        data,
    }))
}

/// Whole-collection save against the default tree, creating it on
/// first use.
async fn post_save_family_data(
    State(state): State<Arc<ServeState>>,
    Json(payload): Json<SaveFamilyDataRequest>,
) -> Result<Json<SavedPayload>, ApiFailure> {
    let _guard = state.write_lock.lock().await;
    let mut tree = match state.store.load(DEFAULT_TREE_ID) {
        Ok(tree) => tree,
        Err(StoreError::NotFound(_)) => FamilyTree {
            tree_id: DEFAULT_TREE_ID.to_string(),
            create_date: Some(now_iso()),
            ..FamilyTree::default()
        },
        Err(err) => return Err(store_error(err)),
    };
    tree.tree_data = payload.persons;
    tree.modify_date = Some(now_iso());
    state.store.save(&tree).map_err(store_error)?;
    Ok(Json(SavedPayload {
        success: true,
        message: "Family data saved successfully",
        tree_id: tree.tree_id.clone(),
        count: tree.tree_data.len(),
    }))
}

async fn post_person(
    State(state): State<Arc<ServeState>>,
    AxumPath(tree_id): AxumPath<String>,
    Json(mut person): Json<Person>,
) -> Result<(StatusCode, Json<PersonPayload>), ApiFailure> {
    let _guard = state.write_lock.lock().await;
    let mut tree = state.store.load(&tree_id).map_err(store_error)?;
    if person.person_id.trim().is_empty() {
        person.person_id = FamilyTree::new_person_id();
    }
    tree.add_person(person.clone())
        .map_err(|err| conflict(err.to_string()))?;
    tree.modify_date = Some(now_iso());
    state.store.save(&tree).map_err(store_error)?;
    Ok((
        StatusCode::CREATED,
        Json(PersonPayload {
            success: true,
            person,
        }),
    ))
}

async fn put_person(
    State(state): State<Arc<ServeState>>,
    AxumPath((tree_id, person_id)): AxumPath<(String, String)>,
    Json(update): Json<PersonUpdate>,
) -> Result<Json<PersonPayload>, ApiFailure> {
    let _guard = state.write_lock.lock().await;
    let mut tree = state.store.load(&tree_id).map_err(store_error)?;
    if !tree.update_person(&person_id, update) {
        return Err(not_found(format!("Person '{person_id}' not found")));
    }
    tree.modify_date = Some(now_iso());
    state.store.save(&tree).map_err(store_error)?;
    let person = tree
        .person(&person_id)
        .cloned()
        .ok_or_else(|| internal_error(anyhow!("person '{person_id}' missing after update")))?;
    Ok(Json(PersonPayload {
        success: true,
        person,
    }))
}

async fn delete_person(
    State(state): State<Arc<ServeState>>,
    AxumPath((tree_id, person_id)): AxumPath<(String, String)>,
) -> Result<StatusCode, ApiFailure> {
    let _guard = state.write_lock.lock().await;
    let mut tree = state.store.load(&tree_id).map_err(store_error)?;
    if !tree.remove_person(&person_id) {
        return Err(not_found(format!("Person '{person_id}' not found")));
    }
    tree.modify_date = Some(now_iso());
    state.store.save(&tree).map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn post_spouse(
    State(state): State<Arc<ServeState>>,
    AxumPath((tree_id, person_id)): AxumPath<(String, String)>,
    Json(link): Json<SpouseLink>,
) -> Result<(StatusCode, Json<PersonPayload>), ApiFailure> {
    if link.spouse_id.trim().is_empty() {
        return Err(bad_request("spouseId is required".to_string()));
    }
    let _guard = state.write_lock.lock().await;
    let mut tree = state.store.load(&tree_id).map_err(store_error)?;
    if !tree.add_spouse(&person_id, link) {
        return Err(not_found(format!("Person '{person_id}' not found")));
    }
    tree.modify_date = Some(now_iso());
    state.store.save(&tree).map_err(store_error)?;
    let person = tree
        .person(&person_id)
        .cloned()
        .ok_or_else(|| internal_error(anyhow!("person '{person_id}' missing after update")))?;
    Ok((
        StatusCode::CREATED,
        Json(PersonPayload {
            success: true,
            person,
        }),
    ))
}

async fn put_spouse(
    State(state): State<Arc<ServeState>>,
    AxumPath((tree_id, person_id, spouse_id)): AxumPath<(String, String, String)>,
    Json(dates): Json<SpouseDates>,
) -> Result<Json<PersonPayload>, ApiFailure> {
    let _guard = state.write_lock.lock().await;
    let mut tree = state.store.load(&tree_id).map_err(store_error)?;
    if !tree.update_spouse(&person_id, &spouse_id, dates) {
        return Err(not_found(format!(
            "No spouse link between '{person_id}' and '{spouse_id}'"
        )));
    }
    tree.modify_date = Some(now_iso());
    state.store.save(&tree).map_err(store_error)?;
    let person = tree
        .person(&person_id)
        .cloned()
        .ok_or_else(|| internal_error(anyhow!("person '{person_id}' missing after update")))?;
    Ok(Json(PersonPayload {
        success: true,
        person,
    }))
}

async fn delete_spouse(
    State(state): State<Arc<ServeState>>,
    AxumPath((tree_id, person_id, spouse_id)): AxumPath<(String, String, String)>,
) -> Result<StatusCode, ApiFailure> {
    let _guard = state.write_lock.lock().await;
    let mut tree = state.store.load(&tree_id).map_err(store_error)?;
    if !tree.remove_spouse(&person_id, &spouse_id) {
        return Err(not_found(format!(
            "No spouse link between '{person_id}' and '{spouse_id}'"
        )));
    }
    tree.modify_date = Some(now_iso());
    state.store.save(&tree).map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_layout(
    State(state): State<Arc<ServeState>>,
    AxumPath(tree_id): AxumPath<String>,
    Query(params): Query<LayoutParams>,
) -> Result<Json<LayoutPayload>, ApiFailure> {
    let tree = state.store.load(&tree_id).map_err(store_error)?;
    let config = layout_config(&params);
    let center_id = resolve_center(&params, &tree);
    let layout = TreeLayout::compute(&center_id, &tree.tree_data, &config);
    Ok(Json(LayoutPayload {
        success: true,
        tree_id: tree.tree_id.clone(),
        center_id,
        layout,
    }))
}

async fn get_tree_svg(
    State(state): State<Arc<ServeState>>,
    AxumPath(tree_id): AxumPath<String>,
    Query(params): Query<LayoutParams>,
) -> Result<Response, ApiFailure> {
    let tree = state.store.load(&tree_id).map_err(store_error)?;
    let config = layout_config(&params);
    let center_id = resolve_center(&params, &tree);
    let layout = TreeLayout::compute(&center_id, &tree.tree_data, &config);
    let background = params.background.as_deref().unwrap_or(&state.background);
    let svg = render_svg(&layout, &center_id, background).map_err(internal_error)?;

    let mut response = Response::new(svg.into());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("image/svg+xml"),
    );
    Ok(response)
}

async fn get_relations(
    State(state): State<Arc<ServeState>>,
    AxumPath((tree_id, person_id)): AxumPath<(String, String)>,
) -> Result<Json<RelationsPayload>, ApiFailure> {
    let tree = state.store.load(&tree_id).map_err(store_error)?;
    let people = &tree.tree_data;
    let Some(person) = person_by_id(&person_id, people) else {
        return Err(not_found(format!("Person '{person_id}' not found")));
    };
    Ok(Json(RelationsPayload {
        success: true,
        person: person.clone(),
        age: calculate_age(person.dob.as_deref(), person.dod.as_deref()),
        parents: cloned(parents(person, people)),
        children: cloned(children(&person.person_id, people)),
        siblings: cloned(siblings(person, people)),
        spouses: cloned(spouses(person, people)),
    }))
}

async fn get_events(
    State(state): State<Arc<ServeState>>,
    AxumPath(tree_id): AxumPath<String>,
    Query(params): Query<EventsParams>,
) -> Result<Json<EventsPayload>, ApiFailure> {
    let tree = state.store.load(&tree_id).map_err(store_error)?;
    let month = params
        .month
        .unwrap_or_else(|| Local::now().date_naive().month0());
    if month > 11 {
        return Err(bad_request("month must be between 0 and 11".to_string()));
    }
    Ok(Json(EventsPayload {
        success: true,
        tree_id: tree.tree_id.clone(),
        month,
        birthdays: upcoming_birthdays_in(&tree.tree_data, month),
        anniversaries: upcoming_anniversaries_in(&tree.tree_data, month),
    }))
}

fn layout_config(params: &LayoutParams) -> LayoutConfig {
    let mut config = LayoutConfig::default();
    if let Some(width) = params.width {
        config.width = width;
    }
    if let Some(height) = params.height {
        config.height = Some(height);
    }
    if let Some(ancestors) = params.ancestors {
        config.max_ancestor_levels = ancestors;
    }
    if let Some(descendants) = params.descendants {
        config.max_descendant_levels = descendants;
    }
    config
}

/// The requested center, or the first person in the collection.
fn resolve_center(params: &LayoutParams, tree: &FamilyTree) -> String {
    params
        .center
        .clone()
        .or_else(|| tree.tree_data.first().map(|p| p.person_id.clone()))
        .unwrap_or_default()
}

fn cloned(people: Vec<&Person>) -> Vec<Person> {
    people.into_iter().cloned().collect()
}

fn store_error(err: StoreError) -> ApiFailure {
    match err {
        StoreError::NotFound(tree_id) => (
            StatusCode::NOT_FOUND,
            Json(ApiError {
                success: false,
                error: "Tree not found".to_string(),
                details: None,
                tree_id: Some(tree_id),
            }),
        ),
        StoreError::Conflict(tree_id) => (
            StatusCode::CONFLICT,
            Json(ApiError {
                success: false,
                error: "Tree ID already exists".to_string(),
                details: None,
                tree_id: Some(tree_id),
            }),
        ),
        StoreError::Validation(details) => (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                success: false,
                error: "Validation failed".to_string(),
                details: Some(details),
                tree_id: None,
            }),
        ),
        other => internal_error(other.into()),
    }
}

fn internal_error(err: anyhow::Error) -> ApiFailure {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError {
            success: false,
            error: err.to_string(),
            details: None,
            tree_id: None,
        }),
    )
}

fn not_found(message: String) -> ApiFailure {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError {
            success: false,
            error: message,
            details: None,
            tree_id: None,
        }),
    )
}

fn conflict(message: String) -> ApiFailure {
    (
        StatusCode::CONFLICT,
        Json(ApiError {
            success: false,
            error: message,
            details: None,
            tree_id: None,
        }),
    )
}

fn bad_request(message: String) -> ApiFailure {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            success: false,
            error: message,
            details: None,
            tree_id: None,
        }),
    )
}
