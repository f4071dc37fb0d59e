//! Telemetry for keywarden
//!
//! Logging via the `tracing` ecosystem, with optional OTLP span export

use anyhow::Context;
use keywarden_config::TelemetryConfig;
use keywarden_config::telemetry::{ExportProtocol, ExporterConfig};
use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;

/// Guard that flushes and shuts down trace export on drop
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let Some(provider) = self.tracer_provider.take() else {
            return;
        };

        if let Err(e) = provider.shutdown() {
            eprintln!("keywarden: trace export shutdown failed: {e}");
        }
    }
}

/// Initialize logging and optional trace export
///
/// `RUST_LOG` takes precedence over the configured filter. Log lines go to
/// stderr so command output on stdout stays machine-readable. Returns a
/// guard that must be held for the lifetime of the application.
///
/// # Errors
///
/// Returns an error if the OTLP exporter cannot be built
pub fn init(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let mut guard = TelemetryGuard { tracer_provider: None };

    match &config.exporter {
        Some(exporter) => {
            let provider = init_tracer(&config.service_name, exporter)?;
            let tracer = provider.tracer("keywarden");
            let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            global::set_tracer_provider(provider.clone());
            guard.tracer_provider = Some(provider);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .with(otel_layer)
                .init();
        }
        None => {
            tracing_subscriber::registry().with(filter).with(fmt_layer).init();
        }
    }

    Ok(guard)
}

/// Tracer provider batching spans to the configured collector
fn init_tracer(service_name: &str, config: &ExporterConfig) -> anyhow::Result<SdkTracerProvider> {
    let exporter = build_span_exporter(config)?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_owned())
        .build();

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

/// Span exporter for the configured transport
fn build_span_exporter(config: &ExporterConfig) -> anyhow::Result<SpanExporter> {
    let endpoint = config.endpoint.as_str();

    let built = match config.protocol {
        ExportProtocol::Grpc => SpanExporter::builder().with_tonic().with_endpoint(endpoint).build(),
        ExportProtocol::HttpProto => SpanExporter::builder().with_http().with_endpoint(endpoint).build(),
    };

    built.with_context(|| format!("failed to build {:?} span exporter for {endpoint}", config.protocol))
}
