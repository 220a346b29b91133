use actix_web::{HttpResponse, error::InternalError, web};
use serde_json::json;

mod control;
mod debug;
mod diagnostics;
mod health;
mod history;

macros_utils::routes! {
    module health,
    module history,
    module control,
    module diagnostics,
    module debug,
}

/// Malformed JSON bodies are answered with `400 {"error": ...}`
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        InternalError::from_response(err, HttpResponse::BadRequest().json(json!({ "error": message })))
            .into()
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;
    use linkwatch_service::diagnostics::{DiagnosticReport, Diagnostics};
    use linkwatch_service::monitoring::RuntimeSettings;
    use linkwatch_service::testing::ScriptedProbe;
    use linkwatch_service::{EventStore, ManualClock, MonitorHandle, Scheduler};

    pub const NOW: i64 = 1_700_000_000;

    /// Echoes the requested host instead of running anything
    pub struct EchoDiagnostics;

    #[async_trait]
    impl Diagnostics for EchoDiagnostics {
        async fn ping(&self, host: &str) -> DiagnosticReport {
            DiagnosticReport { host: host.to_string(), success: true, output: format!("PING {host}") }
        }

        async fn traceroute(&self, host: &str) -> DiagnosticReport {
            DiagnosticReport { host: host.to_string(), success: false, output: "Traceroute failed".to_string() }
        }
    }

    pub fn handle(probe: ScriptedProbe, store: Arc<dyn EventStore>) -> MonitorHandle {
        let settings = RuntimeSettings::default();
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(probe),
            store.clone(),
            settings.clone(),
            Arc::new(ManualClock::new(NOW)),
        ));

        MonitorHandle { scheduler, store, settings, diagnostics: Arc::new(EchoDiagnostics) }
    }
}
