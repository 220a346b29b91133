use actix_web::{HttpResponse, get, post, web};
use linkwatch_service::MonitorHandle;
use linkwatch_service::error::FieldRejection;
use linkwatch_service::monitoring::{ConfigUpdate, RuntimeConfig};
use serde::Serialize;

macros_utils::routes! {
    route manual_test,
    route get_config,
    route update_config,
}

#[derive(Debug, Serialize)]
struct ManualTestResponse {
    success: bool,
}

#[derive(Debug, Serialize)]
struct ConfigResponse {
    status: &'static str,
    config: RuntimeConfig,
    rejected: Vec<FieldRejection>,
}

/// Run one measurement now, outside the schedule
#[post("/manual_test")]
pub async fn manual_test(monitor: web::Data<MonitorHandle>) -> HttpResponse {
    let outcome = monitor.scheduler.trigger_once().await;
    HttpResponse::Ok().json(ManualTestResponse { success: outcome.is_success() })
}

#[get("/config")]
pub async fn get_config(monitor: web::Data<MonitorHandle>) -> HttpResponse {
    HttpResponse::Ok().json(monitor.settings.get().await)
}

/// Apply a partial update. Valid fields are applied even when others in the
/// same body are rejected.
#[post("/config")]
pub async fn update_config(
    monitor: web::Data<MonitorHandle>,
    update: web::Json<ConfigUpdate>,
) -> HttpResponse {
    let report = monitor.settings.update(update.into_inner()).await;
    let status = if report.is_clean() {
        "Configuration updated"
    } else {
        "Configuration updated with rejected fields"
    };

    HttpResponse::Ok().json(ConfigResponse { status, config: report.config, rejected: report.rejected })
}
