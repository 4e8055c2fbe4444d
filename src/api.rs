//! HTTP routes over [`PromptService`].

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::error::PromptError;
use crate::models::{PromptCategory, PromptType};
use crate::service::PromptService;

impl ResponseError for PromptError {
    fn status_code(&self) -> StatusCode {
        match self {
            PromptError::NotFound(_) => StatusCode::NOT_FOUND,
            PromptError::NotRegenerable(_) => StatusCode::BAD_REQUEST,
            PromptError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {:#}", self);
        }
        HttpResponse::build(status).json(json!({
            "error": true,
            "message": self.to_string(),
            "status": status.as_u16(),
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftBody {
    pub prompt_type: PromptType,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelBody {
    pub open: bool,
    #[serde(default)]
    pub prompt_type: Option<PromptType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateBody {
    pub prompt_type: PromptType,
    pub category: PromptCategory,
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

async fn list_prompts(service: web::Data<PromptService>, user_id: web::Path<Uuid>) -> Result<HttpResponse, PromptError> {
    let grid = service.list_active_prompts(&user_id).await?;
    Ok(HttpResponse::Ok().json(grid))
}

async fn list_prompts_by_type(
    service: web::Data<PromptService>,
    path: web::Path<(Uuid, PromptType)>,
) -> Result<HttpResponse, PromptError> {
    let (user_id, prompt_type) = path.into_inner();
    let prompts = service.list_active_prompts_by_type(&user_id, prompt_type).await?;
    Ok(HttpResponse::Ok().json(prompts))
}

async fn onboarding_complete(service: web::Data<PromptService>, user_id: web::Path<Uuid>) -> HttpResponse {
    service.on_onboarding_complete(user_id.into_inner());
    HttpResponse::Accepted().finish()
}

async fn entry_saved(service: web::Data<PromptService>, user_id: web::Path<Uuid>) -> Result<HttpResponse, PromptError> {
    let queued = service.on_entry_saved(user_id.into_inner()).await?;
    Ok(HttpResponse::Accepted().json(json!({ "historyQueued": queued })))
}

async fn draft_changed(
    service: web::Data<PromptService>,
    user_id: web::Path<Uuid>,
    body: web::Json<DraftBody>,
) -> HttpResponse {
    let DraftBody { prompt_type, content } = body.into_inner();
    service.on_draft_content_changed(user_id.into_inner(), prompt_type, content);
    HttpResponse::Accepted().finish()
}

async fn panel_changed(
    service: web::Data<PromptService>,
    user_id: web::Path<Uuid>,
    body: web::Json<PanelBody>,
) -> HttpResponse {
    service.on_panel_changed(user_id.into_inner(), body.open, body.prompt_type);
    HttpResponse::NoContent().finish()
}

async fn regenerate(
    service: web::Data<PromptService>,
    user_id: web::Path<Uuid>,
    body: web::Json<RegenerateBody>,
) -> Result<HttpResponse, PromptError> {
    service.regenerate(user_id.into_inner(), body.prompt_type, body.category)?;
    Ok(HttpResponse::Accepted().finish())
}

async fn prompt_shown(service: web::Data<PromptService>, prompt_id: web::Path<Uuid>) -> Result<HttpResponse, PromptError> {
    service.record_shown(&prompt_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn prompt_used(service: web::Data<PromptService>, prompt_id: web::Path<Uuid>) -> Result<HttpResponse, PromptError> {
    service.record_used(&prompt_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/users/{id}/prompts", web::get().to(list_prompts))
        .route("/users/{id}/onboarding/complete", web::post().to(onboarding_complete))
        .route("/users/{id}/entries/saved", web::post().to(entry_saved))
        .route("/users/{id}/draft", web::post().to(draft_changed))
        .route("/users/{id}/panel", web::post().to(panel_changed))
        .route("/users/{id}/prompts/regenerate", web::post().to(regenerate))
        .route("/users/{id}/prompts/{type}", web::get().to(list_prompts_by_type))
        .route("/prompts/{id}/shown", web::post().to(prompt_shown))
        .route("/prompts/{id}/used", web::post().to(prompt_used));
}
