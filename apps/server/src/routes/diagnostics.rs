use actix_web::{HttpResponse, post, web};
use linkwatch_service::MonitorHandle;
use linkwatch_service::diagnostics::DiagnosticReport;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

macros_utils::routes! {
    route ping,
    route traceroute,
}

/// Optional body; the host defaults to the configured diagnostic target.
/// An empty body is accepted, a malformed one is not.
#[derive(Debug, Default, Deserialize)]
pub struct DiagnosticRequest {
    host: Option<String>,
}

#[derive(Debug, Serialize)]
struct DiagnosticResponse {
    host: String,
    success: bool,
    result: String,
}

impl From<DiagnosticReport> for DiagnosticResponse {
    fn from(report: DiagnosticReport) -> Self {
        Self { host: report.host, success: report.success, result: report.output }
    }
}

async fn resolve_host(monitor: &MonitorHandle, body: &[u8]) -> Result<String, ApiError> {
    let request = if body.trim_ascii().is_empty() {
        DiagnosticRequest::default()
    } else {
        serde_json::from_slice::<DiagnosticRequest>(body)?
    };

    Ok(match request.host {
        Some(host) if !host.trim().is_empty() => host.trim().to_string(),
        _ => monitor.settings.get().await.diagnostic_target,
    })
}

#[post("/ping")]
pub async fn ping(monitor: web::Data<MonitorHandle>, body: web::Bytes) -> Result<HttpResponse, ApiError> {
    let host = resolve_host(&monitor, &body).await?;
    let report = monitor.diagnostics.ping(&host).await;
    Ok(HttpResponse::Ok().json(DiagnosticResponse::from(report)))
}

#[post("/traceroute")]
pub async fn traceroute(monitor: web::Data<MonitorHandle>, body: web::Bytes) -> Result<HttpResponse, ApiError> {
    let host = resolve_host(&monitor, &body).await?;
    let report = monitor.diagnostics.traceroute(&host).await;
    Ok(HttpResponse::Ok().json(DiagnosticResponse::from(report)))
}
