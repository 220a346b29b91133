use actix_web::{HttpResponse, Responder, get, web};
use linkwatch_service::MonitorHandle;

macros_utils::routes! {
    route health_route,
}

/// Health check route
/// No body; `503` once the scheduler loop has stopped.
#[get("/")]
pub async fn health_route(monitor: web::Data<MonitorHandle>) -> impl Responder {
    if monitor.scheduler.is_running() {
        HttpResponse::Ok()
    } else {
        HttpResponse::ServiceUnavailable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support;
    use actix_web::{App, http::StatusCode, test};
    use linkwatch_service::testing::{MemoryStore, ScriptedProbe};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_health_reports_stopped_scheduler() {
        let handle = test_support::handle(ScriptedProbe::always_succeeding(), Arc::new(MemoryStore::new()));
        let app = test::init_service(App::new().app_data(web::Data::new(handle)).configure(routes)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
