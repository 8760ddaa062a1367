use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{MetricExporter, SpanExporter};
use opentelemetry_sdk::{Resource, metrics::SdkMeterProvider, trace::SdkTracerProvider};
use tracing_opentelemetry::MetricsLayer;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::Layer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// Export is switched on by the standard OTLP endpoint variable
const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

fn get_resource() -> Resource {
    static RESOURCE: OnceLock<Resource> = OnceLock::new();
    RESOURCE
        .get_or_init(|| Resource::builder().with_service_name("sitechat").build())
        .clone()
}

fn init_traces() -> anyhow::Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder().with_http().build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

fn init_metrics() -> anyhow::Result<SdkMeterProvider> {
    let exporter = MetricExporter::builder().with_http().build()?;

    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

/// `RUST_LOG` when set, otherwise `info` (or `debug` with `--debug`)
pub fn env_filter(debug: bool) -> EnvFilter {
    let default_level = if debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

// Initialize tracing-subscriber and return OtelGuard for opentelemetry-related termination processing
pub fn init_tracing_subscriber(debug: bool) -> anyhow::Result<OtelGuard> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter(debug));

    if std::env::var_os(OTLP_ENDPOINT_VAR).is_none() {
        tracing_subscriber::registry().with(console_layer).init();
        return Ok(OtelGuard::default());
    }

    let tracer_provider = init_traces()?;
    let meter_provider = init_metrics()?;
    let tracer = tracer_provider.tracer("sitechat");

    // Keep the exporter's own HTTP client out of the exported telemetry
    let otel_filter = || EnvFilter::new("info,hyper=off,opentelemetry=off,h2=off,reqwest=off");

    tracing_subscriber::registry()
        .with(console_layer)
        .with(MetricsLayer::new(meter_provider.clone()).with_filter(otel_filter()))
        .with(OpenTelemetryLayer::new(tracer).with_filter(otel_filter()))
        .init();

    Ok(OtelGuard {
        tracer_provider: Some(tracer_provider),
        meter_provider: Some(meter_provider),
    })
}

/// Flushes and shuts down the OTLP providers when dropped
#[derive(Default)]
pub struct OtelGuard {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Some(tracer) = self.tracer_provider.take() {
            if let Err(err) = tracer.shutdown() {
                eprintln!("{err:?}");
            }
        }
        if let Some(meter) = self.meter_provider.take() {
            if let Err(err) = meter.shutdown() {
                eprintln!("{err:?}");
            }
        }
    }
}
