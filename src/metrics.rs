//! Query and schema-cache instrumentation.
//!
//! With the `metrics` feature, [`METRICS`] records OpenTelemetry instruments into a
//! Prometheus registry that [`RowbindMetrics::render`] exposes in text format. With the
//! `tracing` feature, [`tracing_helpers`] provides the spans wrapped around query execution
//! and schema discovery.

#[cfg(feature = "metrics")]
pub use otel::{RowbindMetrics, METRICS};

#[cfg(feature = "metrics")]
mod otel {
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider as _};
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Encoder, Registry, TextEncoder};
    use std::time::Duration;

    pub static METRICS: Lazy<RowbindMetrics> = Lazy::new(RowbindMetrics::init);

    pub struct RowbindMetrics {
        registry: Registry,
        _provider: Option<SdkMeterProvider>,
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub schema_cache_hits: Counter<u64>,
        pub schema_cache_misses: Counter<u64>,
    }

    impl RowbindMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let exporter = opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build();

            let (provider, meter): (Option<SdkMeterProvider>, Meter) = match exporter {
                Ok(exporter) => {
                    let provider = SdkMeterProvider::builder().with_reader(exporter).build();
                    let meter = provider.meter("rowbind");
                    (Some(provider), meter)
                }
                Err(err) => {
                    log::warn!("prometheus exporter unavailable, metrics are not exported: {err}");
                    (None, opentelemetry::global::meter("rowbind"))
                }
            };

            Self {
                registry,
                _provider: provider,
                queries_total: meter
                    .u64_counter("rowbind_queries_total")
                    .with_description("Total statements executed")
                    .build(),
                query_errors_total: meter
                    .u64_counter("rowbind_query_errors_total")
                    .with_description("Statements that failed in the driver")
                    .build(),
                query_duration: meter
                    .f64_histogram("rowbind_query_duration_seconds")
                    .with_description("Duration of statements")
                    .build(),
                schema_cache_hits: meter
                    .u64_counter("rowbind_schema_cache_hits_total")
                    .with_description("Field lists served from the schema cache")
                    .build(),
                schema_cache_misses: meter
                    .u64_counter("rowbind_schema_cache_misses_total")
                    .with_description("Field lists discovered from the connection")
                    .build(),
            }
        }

        pub fn record_query(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_cache_hit(&self) {
            self.schema_cache_hits.add(1, &[]);
        }

        pub fn record_cache_miss(&self) {
            self.schema_cache_misses.add(1, &[]);
        }

        /// Prometheus text exposition of everything recorded so far
        pub fn render(&self) -> String {
            let mut buf = Vec::new();
            if let Err(err) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
                log::warn!("failed to encode metrics: {err}");
            }
            String::from_utf8_lossy(&buf).into_owned()
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{debug_span, info_span, Span};

    pub fn execute_query_span(sql: &str) -> Span {
        info_span!("rowbind.execute_query", db.statement = %sql)
    }

    pub fn table_fields_span(table: &str) -> Span {
        debug_span!("rowbind.table_fields", db.table = %table)
    }
}

#[cfg(all(test, feature = "metrics"))]
mod metrics_tests {
    use super::METRICS;
    use std::time::Duration;

    #[test]
    fn test_recorded_queries_are_rendered() {
        METRICS.record_query(Duration::from_millis(3));
        METRICS.record_cache_miss();
        assert!(METRICS.render().contains("rowbind_queries"));
    }
}

#[cfg(all(test, feature = "tracing"))]
mod tests {
    use super::tracing_helpers;

    #[test]
    fn test_spans_enter_under_a_subscriber() {
        let subscriber = tracing_subscriber::registry();
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing_helpers::execute_query_span("SELECT 1");
            let _guard = span.enter();
            let inner = tracing_helpers::table_fields_span("users");
            assert!(!inner.is_disabled());
        });
    }
}
