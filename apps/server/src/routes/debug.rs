use actix_web::{HttpResponse, get, web};
use linkwatch_service::MonitorHandle;
use linkwatch_service::monitoring::{LinkStatus, RuntimeConfig, Sample};
use serde::Serialize;

macros_utils::routes! {
    route debug_status,
}

#[derive(Debug, Serialize)]
struct DebugStatus {
    app_running: bool,
    scheduler_running: bool,
    test_mode: bool,
    link_status: LinkStatus,
    outage_since: Option<i64>,
    last_speed_test: Option<Sample>,
    database_status: String,
    config: RuntimeConfig,
}

/// Snapshot of the monitor's internals. Store failures are reported in the
/// body instead of failing the request.
#[get("/debug")]
pub async fn debug_status(monitor: web::Data<MonitorHandle>) -> HttpResponse {
    let config = monitor.settings.get().await;
    let outage = monitor.scheduler.open_outage().await;

    let database_status = match monitor.store.status().await {
        Ok(()) => "Connected".to_string(),
        Err(e) => format!("Error: {e}"),
    };
    let last_speed_test = monitor.store.latest_sample().await.ok().flatten();

    HttpResponse::Ok().json(DebugStatus {
        app_running: true,
        scheduler_running: monitor.scheduler.is_running(),
        test_mode: config.test_mode,
        link_status: if outage.is_some() { LinkStatus::Down } else { LinkStatus::Up },
        outage_since: outage.map(|o| o.start_time),
        last_speed_test,
        database_status,
        config,
    })
}
