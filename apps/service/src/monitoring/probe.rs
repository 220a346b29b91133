use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::runtime::RuntimeSettings;
use super::types::ProbeReading;
use crate::config::ProbeSection;
use crate::error::ProbeError;

/// One throughput/latency measurement attempt
#[async_trait]
pub trait Probe: Send + Sync {
    async fn measure(&self) -> Result<ProbeReading, ProbeError>;
}

/// Measures the link against plain HTTP endpoints: small GETs for latency,
/// a sized GET for download and a sized POST for upload.
pub struct HttpSpeedProbe {
    client: reqwest::Client,
    latency_url: String,
    download_url: String,
    upload_url: String,
    download_bytes: u64,
    upload_bytes: u64,
    latency_samples: u32,
    timeout_seconds: u64,
}

impl HttpSpeedProbe {
    pub fn new(settings: &ProbeSection) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            latency_url: settings.latency_url.clone(),
            download_url: settings.download_url.clone(),
            upload_url: settings.upload_url.clone(),
            download_bytes: settings.download_bytes,
            upload_bytes: settings.upload_bytes,
            latency_samples: settings.latency_samples.max(1),
            timeout_seconds: settings.timeout_seconds,
        })
    }

    fn transport_error(&self, error: reqwest::Error) -> ProbeError {
        if error.is_timeout() { ProbeError::Timeout(self.timeout_seconds) } else { ProbeError::Http(error) }
    }

    fn check_status(stage: &'static str, response: &reqwest::Response) -> Result<(), ProbeError> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status { stage, status: response.status().as_u16() })
        }
    }

    async fn measure_latency(&self) -> Result<f64, ProbeError> {
        let mut total = Duration::ZERO;

        for _ in 0..self.latency_samples {
            let start = Instant::now();
            let response = self
                .client
                .get(&self.latency_url)
                .query(&[("bytes", 0)])
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;
            Self::check_status("latency", &response)?;
            response.bytes().await.map_err(|e| self.transport_error(e))?;
            total += start.elapsed();
        }

        Ok(total.as_secs_f64() * 1000.0 / f64::from(self.latency_samples))
    }

    async fn measure_download(&self) -> Result<f64, ProbeError> {
        let start = Instant::now();
        let response = self
            .client
            .get(&self.download_url)
            .query(&[("bytes", self.download_bytes)])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        Self::check_status("download", &response)?;
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;

        throughput_mbps(body.len() as u64, start.elapsed())
    }

    async fn measure_upload(&self) -> Result<f64, ProbeError> {
        let payload = vec![0u8; self.upload_bytes as usize];
        let start = Instant::now();
        let response = self
            .client
            .post(&self.upload_url)
            .body(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        Self::check_status("upload", &response)?;

        throughput_mbps(self.upload_bytes, start.elapsed())
    }
}

#[async_trait]
impl Probe for HttpSpeedProbe {
    async fn measure(&self) -> Result<ProbeReading, ProbeError> {
        debug!("Starting speed test");

        let latency_ms = self.measure_latency().await?;
        let download_mbps = self.measure_download().await?;
        let upload_mbps = self.measure_upload().await?;

        validate_reading(ProbeReading { download_mbps, upload_mbps, latency_ms })
    }
}

/// Megabits per second for `bytes` transferred in `elapsed`
fn throughput_mbps(bytes: u64, elapsed: Duration) -> Result<f64, ProbeError> {
    let seconds = elapsed.as_secs_f64();
    if bytes == 0 {
        return Err(ProbeError::InvalidReading("no data transferred".to_string()));
    }
    if seconds <= 0.0 {
        return Err(ProbeError::InvalidReading("transfer took no measurable time".to_string()));
    }
    Ok(bytes as f64 * 8.0 / seconds / 1_000_000.0)
}

fn validate_reading(reading: ProbeReading) -> Result<ProbeReading, ProbeError> {
    let values = [reading.download_mbps, reading.upload_mbps, reading.latency_ms];
    if values.iter().all(|v| v.is_finite() && *v >= 0.0) {
        Ok(reading)
    } else {
        Err(ProbeError::InvalidReading(format!("{reading:?}")))
    }
}

/// Produces plausible readings without touching the network. A non-zero
/// `failure_rate` makes a share of attempts fail, which is handy to exercise
/// outage handling on a healthy link.
#[derive(Debug, Clone, Default)]
pub struct SimulatedProbe {
    failure_rate: f64,
}

impl SimulatedProbe {
    pub fn new(failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_finite() { failure_rate.clamp(0.0, 1.0) } else { 0.0 };
        Self { failure_rate }
    }
}

#[async_trait]
impl Probe for SimulatedProbe {
    async fn measure(&self) -> Result<ProbeReading, ProbeError> {
        let reading = {
            let mut rng = rand::thread_rng();
            if rng.gen_bool(self.failure_rate) {
                None
            } else {
                Some(ProbeReading {
                    download_mbps: rng.gen_range(80.0..120.0),
                    upload_mbps: rng.gen_range(15.0..25.0),
                    latency_ms: rng.gen_range(8.0..30.0),
                })
            }
        };

        reading.ok_or_else(|| ProbeError::Unavailable("simulated failure".to_string()))
    }
}

/// Dispatches each attempt to the simulated probe while `test_mode` is set
/// and to the live probe otherwise. The flag is read on every attempt.
pub struct ModeProbe {
    live: Arc<dyn Probe>,
    simulated: Arc<dyn Probe>,
    settings: RuntimeSettings,
}

impl ModeProbe {
    pub fn new(live: Arc<dyn Probe>, simulated: Arc<dyn Probe>, settings: RuntimeSettings) -> Self {
        Self { live, simulated, settings }
    }
}

#[async_trait]
impl Probe for ModeProbe {
    async fn measure(&self) -> Result<ProbeReading, ProbeError> {
        if self.settings.get().await.test_mode {
            self.simulated.measure().await
        } else {
            self.live.measure().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::runtime::ConfigUpdate;
    use crate::testing::ScriptedProbe;

    #[test]
    fn test_throughput_mbps() {
        let mbps = throughput_mbps(12_500_000, Duration::from_secs(1)).unwrap();
        assert!((mbps - 100.0).abs() < f64::EPSILON);

        assert!(throughput_mbps(0, Duration::from_secs(1)).is_err());
        assert!(throughput_mbps(1000, Duration::ZERO).is_err());
    }

    #[test]
    fn test_validate_reading_rejects_nonsense() {
        let good = ProbeReading { download_mbps: 10.0, upload_mbps: 1.0, latency_ms: 20.0 };
        assert!(validate_reading(good).is_ok());
        assert!(validate_reading(ProbeReading { latency_ms: f64::NAN, ..good }).is_err());
        assert!(validate_reading(ProbeReading { upload_mbps: -1.0, ..good }).is_err());
    }

    #[tokio::test]
    async fn test_simulated_probe() {
        let reading = SimulatedProbe::new(0.0).measure().await.unwrap();
        assert!((80.0..120.0).contains(&reading.download_mbps));

        assert!(SimulatedProbe::new(1.0).measure().await.is_err());
    }

    #[tokio::test]
    async fn test_mode_probe_follows_test_mode() {
        let settings = RuntimeSettings::default();
        let live = Arc::new(ScriptedProbe::always_failing());
        let probe = ModeProbe::new(live.clone(), Arc::new(SimulatedProbe::new(0.0)), settings.clone());

        assert!(probe.measure().await.is_err());
        assert_eq!(live.calls(), 1);

        settings.update(ConfigUpdate { test_mode: Some(true), ..Default::default() }).await;
        assert!(probe.measure().await.is_ok());
        assert_eq!(live.calls(), 1);
    }
}
