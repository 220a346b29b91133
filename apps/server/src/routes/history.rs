use actix_web::{HttpResponse, get, web};
use linkwatch_service::MonitorHandle;

use crate::error::ApiError;

/// Samples returned by `/speedtests`
const SAMPLE_HISTORY: usize = 100;
/// Intervals returned by `/outages`
const OUTAGE_HISTORY: usize = 50;
/// Entries returned by `/logs`
const LOG_HISTORY: usize = 100;

macros_utils::routes! {
    route speedtests,
    route outages,
    route logs,
}

/// Most recent samples, newest first
#[get("/speedtests")]
pub async fn speedtests(monitor: web::Data<MonitorHandle>) -> Result<HttpResponse, ApiError> {
    let samples = monitor.store.recent_samples(SAMPLE_HISTORY).await?;
    Ok(HttpResponse::Ok().json(samples))
}

/// Most recent closed outages, newest first
#[get("/outages")]
pub async fn outages(monitor: web::Data<MonitorHandle>) -> Result<HttpResponse, ApiError> {
    let outages = monitor.store.recent_outages(OUTAGE_HISTORY).await?;
    Ok(HttpResponse::Ok().json(outages))
}

#[get("/logs")]
pub async fn logs(monitor: web::Data<MonitorHandle>) -> Result<HttpResponse, ApiError> {
    let entries = monitor.store.recent_logs(LOG_HISTORY).await?;
    Ok(HttpResponse::Ok().json(entries))
}
