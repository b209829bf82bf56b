//! Dashboard endpoints: `GET /aggregate` and `GET /visitors`.

use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::api::types::{api_result, error_response};
use crate::errors::LinkpulseError;
use crate::reader::{AggregateScope, ReconciliationReader};

#[derive(Debug, Deserialize)]
pub struct AggregateQuery {
    pub link_id: Option<String>,
    pub user_id: Option<String>,
    pub days: Option<u32>,
}

pub async fn get_aggregate(
    query: web::Query<AggregateQuery>,
    reader: web::Data<ReconciliationReader>,
) -> HttpResponse {
    let query = query.into_inner();
    if query.link_id.is_none() && query.user_id.is_none() {
        return error_response(&LinkpulseError::validation(
            "Provide link_id and/or user_id",
        ));
    }

    let scope = AggregateScope {
        link_id: query.link_id,
        user_id: query.user_id,
        days: query.days,
    };
    api_result(reader.get_aggregate(scope).await)
}

#[derive(Debug, Deserialize)]
pub struct VisitorsQuery {
    pub link_id: String,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub device: Option<String>,
}

pub async fn get_visitors(
    query: web::Query<VisitorsQuery>,
    reader: web::Data<ReconciliationReader>,
) -> HttpResponse {
    let query = query.into_inner();
    api_result(
        reader
            .get_visitors(
                &query.link_id,
                query.page.unwrap_or(1),
                query.limit.unwrap_or(20),
                query.device.as_deref().filter(|d| !d.is_empty()),
            )
            .await,
    )
}
