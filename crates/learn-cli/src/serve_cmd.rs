use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use learn_core::GenerationError;
use learn_core::chapter::{generate_chapter_content, mark_chapter_completed};
use learn_core::export::plan_to_markdown;
use learn_core::llm::{CompletionProvider, ImageGenerator};
use learn_core::plan::{
    OutlineOutcome, PlanRequest, create_plan, generate_plan_content, get_plan_with_chapters,
};
use learn_core::visual::{Visual, render_visual};
use learn_db::models::{Chapter, Plan, PlanMode};
use learn_db::queries::{chapters as chapter_db, plans as plan_db};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        let status = match &err {
            GenerationError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GenerationError::PlanNotFound(_) | GenerationError::ChapterNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            e if e.is_model_failure() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, status = status.as_u16(), "request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub llm: Arc<dyn CompletionProvider>,
    /// `None` when no image-capable key is configured.
    pub images: Option<Arc<dyn ImageGenerator>>,
}

// ---------------------------------------------------------------------------
// Request and response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreatePlanBody {
    pub topic: String,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub mode: Option<PlanMode>,
    /// Base64 PDF, bare or as a `data:` URI.
    #[serde(default)]
    pub document: Option<String>,
}

impl From<CreatePlanBody> for PlanRequest {
    fn from(body: CreatePlanBody) -> Self {
        let defaults = PlanRequest::default();
        Self {
            topic: body.topic,
            urgency: body.urgency.unwrap_or(defaults.urgency),
            level: body.level.unwrap_or(defaults.level),
            language: body.language.unwrap_or(defaults.language),
            mode: body.mode.unwrap_or(defaults.mode),
            document: body.document,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CompleteBody {
    #[serde(default = "default_true")]
    pub completed: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ImageBody {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct PlanSummaryResponse {
    #[serde(flatten)]
    pub plan: Plan,
    pub chapters_total: i64,
    pub chapters_ready: i64,
}

#[derive(Debug, Serialize)]
pub struct PlanDetailResponse {
    #[serde(flatten)]
    pub plan: Plan,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Serialize)]
pub struct ChapterResponse {
    #[serde(flatten)]
    pub chapter: Chapter,
    pub visual: Visual,
}

impl From<Chapter> for ChapterResponse {
    fn from(chapter: Chapter) -> Self {
        let visual = render_visual(chapter.visual_type, &chapter.visual_content);
        Self { chapter, visual }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Request body cap. Plan submissions carry the PDF as base64 inside JSON,
/// which inflates it by a third.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/manifest.webmanifest", get(manifest))
        .route("/api/plans", get(list_plans).post(create_plan_handler))
        .route("/api/plans/{id}", get(get_plan_detail))
        .route("/api/plans/{id}/generate", post(generate_plan_handler))
        .route("/api/plans/{id}/export", get(export_plan))
        .route("/api/chapters/{id}", get(get_chapter_detail))
        .route("/api/chapters/{id}/generate", post(generate_chapter_handler))
        .route("/api/chapters/{id}/complete", post(complete_chapter_handler))
        .route("/api/images", post(generate_image_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("expresslearn serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("expresslearn serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

async fn index(State(state): State<AppState>) -> Result<Response, AppError> {
    let plans = plan_db::list_plans(&state.pool)
        .await
        .map_err(AppError::internal)?;

    let rows = if plans.is_empty() {
        "<tr><td colspan=\"3\">No plans yet.</td></tr>".to_owned()
    } else {
        plans
            .iter()
            .map(|p| {
                format!(
                    "<tr><td><a href=\"/api/plans/{id}\">{topic}</a></td><td>{status}</td><td>{id}</td></tr>",
                    id = p.id,
                    topic = escape_html(&p.topic),
                    status = p.status,
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let html = format!(
        "<!DOCTYPE html>\
<html><head><title>Express Learning</title>\
<link rel=\"manifest\" href=\"/manifest.webmanifest\"></head><body>\
<h1>Express Learning</h1>\
<p><a href=\"/api/plans\">/api/plans</a></p>\
<table><tr><th>Topic</th><th>Status</th><th>ID</th></tr>{rows}</table>\
</body></html>"
    );

    Ok(Html(html).into_response())
}

async fn manifest() -> Response {
    let body = serde_json::json!({
        "name": "Express Learning",
        "short_name": "ExpressLearn",
        "start_url": "/",
        "display": "standalone",
        "background_color": "#ffffff",
        "theme_color": "#4f46e5",
    });
    (
        [(header::CONTENT_TYPE, "application/manifest+json")],
        body.to_string(),
    )
        .into_response()
}

async fn list_plans(State(state): State<AppState>) -> Result<Response, AppError> {
    let plans = plan_db::list_plans(&state.pool)
        .await
        .map_err(AppError::internal)?;

    let mut results = Vec::with_capacity(plans.len());
    for plan in plans {
        let total = chapter_db::count_chapters_for_plan(&state.pool, plan.id)
            .await
            .map_err(AppError::internal)?;
        let pending = chapter_db::count_pending_chapters(&state.pool, plan.id)
            .await
            .map_err(AppError::internal)?;
        results.push(PlanSummaryResponse {
            plan,
            chapters_total: total,
            chapters_ready: total - pending,
        });
    }

    Ok(Json(results).into_response())
}

async fn create_plan_handler(
    State(state): State<AppState>,
    Json(body): Json<CreatePlanBody>,
) -> Result<Response, AppError> {
    let plan = create_plan(&state.pool, &body.into()).await?;
    let body = serde_json::json!({ "plan_id": plan.id });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

async fn get_plan_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (plan, chapters) = get_plan_with_chapters(&state.pool, id).await?;
    Ok(Json(PlanDetailResponse { plan, chapters }).into_response())
}

async fn generate_plan_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let body = match generate_plan_content(&state.pool, state.llm.as_ref(), id).await? {
        OutlineOutcome::AlreadyGenerated => {
            let (plan, chapters) = get_plan_with_chapters(&state.pool, id).await?;
            serde_json::json!({
                "generated": false,
                "plan": PlanDetailResponse { plan, chapters },
            })
        }
        OutlineOutcome::Generated { plan, chapters } => serde_json::json!({
            "generated": true,
            "plan": PlanDetailResponse { plan, chapters },
        }),
    };
    Ok(Json(body).into_response())
}

async fn export_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (plan, chapters) = get_plan_with_chapters(&state.pool, id).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        plan_to_markdown(&plan, &chapters),
    )
        .into_response())
}

async fn get_chapter_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let chapter = chapter_db::get_chapter(&state.pool, id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(format!("chapter {id} not found")))?;
    Ok(Json(ChapterResponse::from(chapter)).into_response())
}

async fn generate_chapter_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let chapter = generate_chapter_content(&state.pool, state.llm.as_ref(), id).await?;
    Ok(Json(ChapterResponse::from(chapter)).into_response())
}

async fn complete_chapter_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CompleteBody>,
) -> Result<Response, AppError> {
    let chapter = mark_chapter_completed(&state.pool, id, body.completed).await?;
    Ok(Json(ChapterResponse::from(chapter)).into_response())
}

async fn generate_image_handler(
    State(state): State<AppState>,
    Json(body): Json<ImageBody>,
) -> Result<Response, AppError> {
    if body.prompt.trim().is_empty() {
        return Err(GenerationError::InvalidRequest("prompt is required".to_owned()).into());
    }
    let Some(images) = state.images.as_ref() else {
        return Err(AppError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "image generation is not configured".to_owned(),
        });
    };
    let url = images
        .generate_image(body.prompt.trim())
        .await
        .map_err(GenerationError::from)?;
    Ok(Json(serde_json::json!({ "url": url })).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sqlx::PgPool;
    use tower::ServiceExt;

    use learn_core::llm::{
        CompletionProvider, ImageGenerator, ScriptedProvider, StaticImageGenerator,
    };
    use learn_test_utils::{create_test_db, drop_test_db, seed_outline, seed_plan};

    use super::{AppState, build_router};

    const OUTLINE: &str = r#"{"intent": "learning", "chapters": [
        {"title": "Leaves", "mental_model": "Solar panels", "key_takeaway": "Light in"},
        {"title": "Sugar", "mental_model": "A battery", "key_takeaway": "Energy stored"}
    ]}"#;

    fn state(
        pool: PgPool,
        llm: Arc<ScriptedProvider>,
        images: Option<Arc<dyn ImageGenerator>>,
    ) -> AppState {
        let llm: Arc<dyn CompletionProvider> = llm;
        AppState { pool, llm, images }
    }

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    async fn send(
        state: AppState,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> axum::response::Response {
        let app = build_router(state);
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        app.oneshot(request).await.unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_index_and_manifest() {
        let (pool, db_name) = create_test_db().await;
        let llm = Arc::new(ScriptedProvider::new());

        let resp = send(state(pool.clone(), llm.clone(), None), "GET", "/", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers()["content-type"].to_str().unwrap().to_owned();
        assert!(content_type.contains("text/html"), "got: {content_type}");

        let resp = send(state(pool.clone(), llm, None), "GET", "/manifest.webmanifest", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["start_url"], "/");

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_create_generate_and_fetch_plan() {
        let (pool, db_name) = create_test_db().await;
        let llm = Arc::new(ScriptedProvider::with_replies([OUTLINE]));

        let resp = send(
            state(pool.clone(), llm.clone(), None),
            "POST",
            "/api/plans",
            Some(serde_json::json!({"topic": "Photosynthesis", "mode": "standard"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let plan_id = body_json(resp).await["plan_id"].as_str().unwrap().to_owned();

        let uri = format!("/api/plans/{plan_id}/generate");
        let resp = send(state(pool.clone(), llm.clone(), None), "POST", &uri, None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["generated"], true);
        assert_eq!(json["plan"]["status"], "structure_ready");

        // Second call is a no-op and never reaches the model.
        let resp = send(state(pool.clone(), llm.clone(), None), "POST", &uri, None).await;
        let json = body_json(resp).await;
        assert_eq!(json["generated"], false);
        assert_eq!(json["plan"]["chapters"].as_array().unwrap().len(), 2);
        assert_eq!(llm.call_count(), 1);

        let resp = send(state(pool.clone(), llm.clone(), None), "GET", "/api/plans", None).await;
        let json = body_json(resp).await;
        assert_eq!(json[0]["topic"], "Photosynthesis");
        assert_eq!(json[0]["chapters_total"], 2);
        assert_eq!(json[0]["chapters_ready"], 0);
        assert!(json[0].get("document_context").is_none());

        let resp = send(
            state(pool.clone(), llm, None),
            "GET",
            &format!("/api/plans/{plan_id}/export"),
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let md = body_text(resp).await;
        assert!(md.starts_with("# Photosynthesis"));

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_large_document_upload_is_accepted() {
        use base64::Engine;
        use base64::engine::general_purpose::STANDARD;

        let (pool, db_name) = create_test_db().await;
        let llm = Arc::new(ScriptedProvider::new());

        let mut pdf = b"%PDF-1.4\n".to_vec();
        pdf.resize(3 * 1024 * 1024, b'x');
        let document = STANDARD.encode(&pdf);
        assert!(document.len() > 2 * 1024 * 1024);

        let resp = send(
            state(pool.clone(), llm, None),
            "POST",
            "/api/plans",
            Some(serde_json::json!({"topic": "Lecture notes", "document": document})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let plan_id: uuid::Uuid = body_json(resp).await["plan_id"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();

        let plan = learn_db::queries::plans::get_plan(&pool, plan_id)
            .await
            .unwrap()
            .unwrap();
        assert!(plan.has_document());
        assert_eq!(plan.document_context.as_deref().map(str::len), Some(document.len()));

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (pool, db_name) = create_test_db().await;
        let llm = Arc::new(ScriptedProvider::with_replies(["not json at all"]));

        let resp = send(
            state(pool.clone(), llm.clone(), None),
            "POST",
            "/api/plans",
            Some(serde_json::json!({"topic": "  "})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_json(resp).await["error"].is_string());

        let missing = uuid::Uuid::new_v4();
        let resp = send(
            state(pool.clone(), llm.clone(), None),
            "GET",
            &format!("/api/plans/{missing}"),
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let plan = seed_plan(&pool, "Tides").await;
        let resp = send(
            state(pool.clone(), llm, None),
            "POST",
            &format!("/api/plans/{}/generate", plan.id),
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_chapter_generate_and_complete() {
        let (pool, db_name) = create_test_db().await;
        let plan = seed_plan(&pool, "Photosynthesis").await;
        let chapters = seed_outline(&pool, plan.id, &["Leaves"]).await;
        let detail = serde_json::json!({
            "explanation": "Leaves catch sunlight and turn it into sugar for the plant.",
            "visual_type": "mermaid",
            "visual_content": "graph LR\nA[Light] --> B[Sugar]",
            "quiz_question": "What do leaves make?",
            "quiz_answer": "Sugar."
        });
        let llm = Arc::new(ScriptedProvider::with_replies([detail.to_string()]));
        let id = chapters[0].id;

        let resp = send(state(pool.clone(), llm.clone(), None), "GET", &format!("/api/chapters/{id}"), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["visual"]["kind"], "none");

        let resp = send(
            state(pool.clone(), llm.clone(), None),
            "POST",
            &format!("/api/chapters/{id}/generate"),
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["visual_type"], "mermaid");
        assert_eq!(json["visual"]["kind"], "diagram");
        assert!(json["visual"]["source"].as_str().unwrap().starts_with("graph LR"));

        let resp = send(
            state(pool.clone(), llm, None),
            "POST",
            &format!("/api/chapters/{id}/complete"),
            Some(serde_json::json!({})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["is_completed"], true);

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn test_images_endpoint() {
        let (pool, db_name) = create_test_db().await;
        let llm = Arc::new(ScriptedProvider::new());
        let body = Some(serde_json::json!({"prompt": "a leaf in sunlight"}));

        let resp = send(state(pool.clone(), llm.clone(), None), "POST", "/api/images", body.clone()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let images: Arc<dyn ImageGenerator> =
            Arc::new(StaticImageGenerator::returning("data:image/png;base64,AAAA"));
        let resp = send(state(pool.clone(), llm.clone(), Some(images)), "POST", "/api/images", body.clone()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["url"], "data:image/png;base64,AAAA");

        let failing: Arc<dyn ImageGenerator> = Arc::new(StaticImageGenerator::failing());
        let resp = send(state(pool.clone(), llm, Some(failing)), "POST", "/api/images", body).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        pool.close().await;
        drop_test_db(&db_name).await;
    }
}
