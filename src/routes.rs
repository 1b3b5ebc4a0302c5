use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Form, Query, State},
    response::{Html, Redirect},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    AppState,
    agent::AgentReply,
    error::{ApiResult, AppError, AppResult},
    models::{ChatForm, ChatRequest, ChatTurn, EntityContext, GraphStats, Recommendation, ToolQuery},
    semantic::{self, NO_RECOMMENDATION, NOT_FOUND},
    session::{SESSION_COOKIE, SESSION_IDLE_HOURS},
    templates,
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/chat", post(chat))
        .route("/reset", post(reset))
        .route("/api/search", get(api_search))
        .route("/api/recommend", get(api_recommend))
        .route("/api/chat", post(api_chat))
        .route("/api/stats", get(api_stats))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

fn session(state: &AppState, jar: CookieJar) -> (CookieJar, String) {
    if let Some(id) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
        return (jar, id);
    }
    let id = state.sessions.new_id();
    let cookie = Cookie::build((SESSION_COOKIE, id.clone()))
        .path("/")
        .http_only(true)
        .same_site(cookie::SameSite::Lax)
        .max_age(time::Duration::hours(SESSION_IDLE_HOURS));
    (jar.add(cookie), id)
}

pub async fn index(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Html<String>) {
    let (jar, id) = session(&state, jar);
    let history = state.sessions.history(&id).await;
    (jar, Html(templates::index_page(&history, &[])))
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<ChatForm>,
) -> AppResult<(CookieJar, Html<String>)> {
    let message = form.message.trim().to_string();
    if message.is_empty() {
        return Err(AppError::bad_request("message is required"));
    }

    let (jar, id) = session(&state, jar);
    let history = state.sessions.history(&id).await;

    let reply = state.agent.run(&history, &message).await?;
    state.sessions.push(&id, ChatTurn { question: message, answer: reply.answer }).await;

    let history = state.sessions.history(&id).await;
    Ok((jar, Html(templates::index_page(&history, &reply.steps))))
}

pub async fn reset(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let (jar, id) = session(&state, jar);
    state.sessions.clear(&id).await;
    (jar, Redirect::to("/"))
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    query: String,
    result: String,
    context: Option<EntityContext>,
}

pub async fn api_search(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ToolQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let context = state.layer.entity_context(&q.q).await?;
    let result = context.as_ref().map_or_else(|| NOT_FOUND.to_string(), semantic::render_context);
    Ok(Json(SearchResponse { query: q.q, result, context }))
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    query: String,
    result: String,
    recommendations: Vec<Recommendation>,
}

pub async fn api_recommend(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ToolQuery>,
) -> ApiResult<Json<RecommendResponse>> {
    let recommendations = state.layer.recommendations(&q.q).await?;
    let result = if recommendations.is_empty() {
        NO_RECOMMENDATION.to_string()
    } else {
        recommendations.iter().map(|r| r.title.as_str()).collect::<Vec<_>>().join("\n")
    };
    Ok(Json(RecommendResponse { query: q.q, result, recommendations }))
}

pub async fn api_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<AgentReply>> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::bad_request("message is required").into());
    }
    let reply = state.agent.run(&req.history, message).await?;
    Ok(Json(reply))
}

pub async fn api_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<GraphStats>> {
    Ok(Json(state.graph.stats().await?))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::fixtures;

    async fn app() -> Router {
        let graph = fixtures::seeded_store().await;
        let llm = crate::llm::LlmClient::new(wreq::Client::new(), String::new(), String::new(), String::new(), 1);
        router(Arc::new(AppState::new(graph, llm, 5)))
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn search_endpoint_returns_summary_and_context() {
        let resp = app()
            .await
            .oneshot(Request::get("/api/search?q=casino").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = json_body(resp).await;
        assert_eq!(body["context"]["title"], "Casino");
        assert_eq!(body["context"]["label"], "Movie");
        assert!(body["result"].as_str().unwrap().starts_with("type:Movie\ntitle: Casino"));
    }

    #[tokio::test]
    async fn search_endpoint_reports_not_found() {
        let resp = app()
            .await
            .oneshot(Request::get("/api/search?q=qwertyuiop").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["result"], NOT_FOUND);
        assert!(body["context"].is_null());
    }

    #[tokio::test]
    async fn recommend_endpoint_lists_titles() {
        let resp = app()
            .await
            .oneshot(Request::get("/api/recommend?q=Casino").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["result"], "Heat\nBraveheart\nUntitled Project");
        assert_eq!(body["recommendations"][0], json!({"title": "Heat", "co_ratings": 3}));
    }

    #[tokio::test]
    async fn chat_endpoint_runs_the_agent() {
        let req = Request::post("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"message": "Recommend something similar to \"Casino\""}).to_string()))
            .unwrap();
        let resp = app().await.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = json_body(resp).await;
        assert_eq!(body["steps"][0]["tool"], "Recommender");
        assert_eq!(body["answer"], "Heat\nBraveheart\nUntitled Project");
    }

    #[tokio::test]
    async fn empty_chat_message_is_rejected() {
        let req = Request::post("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"message": "  "}).to_string()))
            .unwrap();
        let resp = app().await.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"], "message is required");
    }

    #[tokio::test]
    async fn empty_chat_form_is_rejected() {
        let req = Request::post("/chat")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("message=+++"))
            .unwrap();
        let resp = app().await.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn index_sets_a_session_cookie() {
        let resp = app().await.oneshot(Request::get("/").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with(SESSION_COOKIE));
    }

    #[tokio::test]
    async fn stats_endpoint_counts_nodes() {
        let resp = app().await.oneshot(Request::get("/api/stats").body(Body::empty()).unwrap()).await.unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["movies"], 6);
        assert_eq!(body["rated"], 16);
    }
}
