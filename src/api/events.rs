//! Ingestion endpoints: `POST /events/view` and `POST /events/click`.

use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};

use crate::api::types::{api_result, error_response};
use crate::ingest::{ClickInput, IngestService, ViewInput};
use crate::utils::ip::extract_client_ip;

#[derive(Debug, Deserialize)]
pub struct ViewEventRequest {
    pub link_id: String,
    pub session_token: Option<String>,
    pub referrer: Option<String>,
    pub client_descriptor: Option<String>,
    pub screen_resolution: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ViewEventResponse {
    pub success: bool,
    pub counted: bool,
    pub views: i64,
    pub clicks: i64,
}

#[derive(Debug, Deserialize)]
pub struct ClickEventRequest {
    pub destination_id: String,
    pub session_token: Option<String>,
    pub client_descriptor: Option<String>,
    pub screen_resolution: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClickEventResponse {
    pub success: bool,
    pub counted: bool,
    pub is_duplicate: bool,
}

/// A missing descriptor falls back to the caller's own User-Agent header;
/// script-embedded trackers usually omit it.
fn descriptor_or_user_agent(req: &HttpRequest, descriptor: Option<String>) -> Option<String> {
    descriptor.filter(|d| !d.is_empty()).or_else(|| {
        req.headers()
            .get("user-agent")
            .and_then(|h| h.to_str().ok())
            .map(String::from)
    })
}

pub async fn record_view(
    req: HttpRequest,
    body: web::Json<ViewEventRequest>,
    ingest: web::Data<IngestService>,
) -> HttpResponse {
    let body = body.into_inner();
    let input = ViewInput {
        link_id: body.link_id,
        session_token: body.session_token,
        referrer: body.referrer,
        client_descriptor: descriptor_or_user_agent(&req, body.client_descriptor),
        screen_resolution: body.screen_resolution,
        locale: body.locale,
        timezone: body.timezone,
        source_addr: extract_client_ip(&req),
    };

    match ingest.record_view(input).await {
        Ok(outcome) => api_result(Ok(ViewEventResponse {
            success: true,
            counted: outcome.counted,
            views: outcome.views,
            clicks: outcome.clicks,
        })),
        Err(err) => error_response(&err),
    }
}

pub async fn record_click(
    req: HttpRequest,
    body: web::Json<ClickEventRequest>,
    ingest: web::Data<IngestService>,
) -> HttpResponse {
    let body = body.into_inner();
    let input = ClickInput {
        destination_id: body.destination_id,
        session_token: body.session_token,
        client_descriptor: descriptor_or_user_agent(&req, body.client_descriptor),
        screen_resolution: body.screen_resolution,
        locale: body.locale,
        timezone: body.timezone,
        source_addr: extract_client_ip(&req),
    };

    match ingest.record_click(input).await {
        Ok(outcome) => api_result(Ok(ClickEventResponse {
            success: true,
            counted: outcome.counted,
            is_duplicate: outcome.is_duplicate,
        })),
        Err(err) => error_response(&err),
    }
}
