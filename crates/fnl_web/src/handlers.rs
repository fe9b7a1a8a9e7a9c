use std::sync::Arc;

use axum::{
    extract::{Form, State},
    http::{header::SET_COOKIE, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use fnl_core::stats::{fake_share, top_sources};
use fnl_core::{normalize_email, Account, ArticleRecord, ClassificationResult, DashboardStats, SourceCount};
use fnl_scrappers::parse_input_type;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{expired_session_cookie, session_cookie, CurrentUser};
use crate::error::{ApiError, Submission};
use crate::AppState;

pub const LANDING_RECORDS: usize = 6;
pub const TOP_SOURCES: usize = 6;
pub const FAKE_URL_WINDOW: usize = 200;
pub const HISTORY_LIMIT: usize = 50;
pub const MIN_PASSWORD_CHARS: usize = 6;

pub const ALREADY_REGISTERED: &str = "Email already registered. Please log in.";

#[derive(Debug, Default, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClassifyForm {
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub article_text: Option<String>,
    #[serde(default)]
    pub article_url: Option<String>,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub token: String,
    pub user: Account,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct LandingResponse {
    pub articles: Vec<ArticleRecord>,
    pub top_sources: Vec<SourceCount>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub records: Vec<ArticleRecord>,
}

#[derive(Serialize)]
pub struct ClassifyResponse {
    pub message: &'static str,
    pub result: ClassificationResult,
    pub record: ArticleRecord,
}

pub async fn health() -> &'static str {
    "ok"
}

async fn start_session(state: &AppState, account: &Account) -> Result<String, ApiError> {
    state
        .sessions
        .create(&account.id)
        .await
        .ok_or_else(|| ApiError::Internal("could not sign session token".to_string()))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CredentialsForm>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(form.email.as_deref().unwrap_or_default());
    let password = form.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required.".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::BadRequest("Password must be at least 6 characters.".to_string()));
    }
    if state.accounts.find_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict(ALREADY_REGISTERED.to_string()));
    }

    // Hashing blocks for a while; run it off the async workers.
    let hasher = state.hasher;
    let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let account = Account {
        id: Uuid::new_v4().to_string(),
        email,
        password_hash,
        created_at: Utc::now(),
    };
    state.accounts.insert_account(&account).await.map_err(|e| match e {
        fnl_core::Error::Conflict(_) => ApiError::Conflict(ALREADY_REGISTERED.to_string()),
        other => other.into(),
    })?;
    tracing::info!("👤 Registered {}", account.email);

    let token = start_session(&state, &account).await?;
    Ok((
        StatusCode::CREATED,
        [(SET_COOKIE, session_cookie(&token, state.sessions.ttl()))],
        Json(AuthResponse {
            message: "Registration successful. Welcome!",
            token,
            user: account,
        }),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CredentialsForm>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(form.email.as_deref().unwrap_or_default());
    let password = form.password.unwrap_or_default();

    let account = state
        .accounts
        .find_by_email(&email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let hasher = state.hasher;
    let stored = account.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !verified {
        tracing::warn!("🔒 Failed login for {}", email);
        return Err(ApiError::InvalidCredentials);
    }

    let token = start_session(&state, &account).await?;
    Ok((
        [(SET_COOKIE, session_cookie(&token, state.sessions.ttl()))],
        Json(AuthResponse {
            message: "Logged in successfully.",
            token,
            user: account,
        }),
    ))
}

pub async fn logout(State(state): State<Arc<AppState>>, user: CurrentUser) -> impl IntoResponse {
    state.sessions.revoke(&user.token).await;
    (
        [(SET_COOKIE, expired_session_cookie())],
        Json(MessageResponse { message: "Logged out." }),
    )
}

pub async fn landing(State(state): State<Arc<AppState>>) -> Result<Json<LandingResponse>, ApiError> {
    let articles = state.articles.recent(LANDING_RECORDS).await?;
    let fake_urls = state.articles.recent_fake_urls(FAKE_URL_WINDOW).await?;
    Ok(Json(LandingResponse {
        articles,
        top_sources: top_sources(&fake_urls, TOP_SOURCES),
    }))
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<DashboardStats>, ApiError> {
    let user_id = &user.account.id;
    let label_counts = state.articles.label_counts(user_id).await?;
    Ok(Json(DashboardStats {
        count_user: state.articles.count_for_user(user_id).await?,
        count_all: state.articles.count_all().await?,
        last_record: state.articles.recent_for_user(user_id, 1).await?.into_iter().next(),
        fake_share: fake_share(&label_counts),
        label_counts,
    }))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<HistoryResponse>, ApiError> {
    let records = state
        .articles
        .recent_for_user(&user.account.id, HISTORY_LIMIT)
        .await?;
    Ok(Json(HistoryResponse { records }))
}

pub async fn classify(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Form(form): Form<ClassifyForm>,
) -> Result<Json<ClassifyResponse>, ApiError> {
    let submission = Submission {
        article_url: form.article_url.clone(),
        article_text: form.article_text.clone(),
    };
    let input_type = match parse_input_type(form.input_type.as_deref()) {
        Ok(input_type) => input_type,
        Err(e) => return Err(ApiError::ingest(e, submission)),
    };

    let record = match state
        .ingest
        .ingest(
            &user.account.id,
            input_type,
            form.article_text.as_deref(),
            form.article_url.as_deref(),
        )
        .await
    {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!("📰 Analysis for {} failed ({}): {}", user.account.email, e.kind(), e);
            return Err(ApiError::ingest(e, submission));
        }
    };

    let result = ClassificationResult {
        label: record.model_label.clone(),
        score: record.model_score,
        error: None,
    };
    Ok(Json(ClassifyResponse {
        message: "Analysis complete.",
        result,
        record,
    }))
}
