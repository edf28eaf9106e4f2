//! Query and connection instrumentation.
//!
//! With the `metrics` feature, instruments are registered on the global
//! OpenTelemetry meter under the `stockroom` scope; wiring an exporter is the
//! application's job. With the `tracing` feature, [`tracing_helpers`] builds
//! the spans entered by the connection, executor and repository modules.

#[cfg(feature = "metrics")]
pub use self::otel::{StockroomMetrics, METRICS};

#[cfg(feature = "metrics")]
mod otel {
    use once_cell::sync::Lazy;
    use opentelemetry::{
        global,
        metrics::{Counter, Histogram},
    };
    use std::time::Duration;

    pub static METRICS: Lazy<StockroomMetrics> = Lazy::new(StockroomMetrics::init);

    pub struct StockroomMetrics {
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub connection_acquire_duration: Histogram<f64>,
    }

    impl StockroomMetrics {
        pub fn init() -> Self {
            let meter = global::meter("stockroom");

            let queries_total = meter
                .u64_counter("stockroom_queries_total")
                .with_description("Total statements executed")
                .build();

            let query_errors_total = meter
                .u64_counter("stockroom_query_errors_total")
                .with_description("Statements that returned an error")
                .build();

            let query_duration = meter
                .f64_histogram("stockroom_query_duration_seconds")
                .with_description("Duration of statements")
                .build();

            let connection_acquire_duration = meter
                .f64_histogram("stockroom_connection_acquire_seconds")
                .with_description("Time spent opening a database connection")
                .build();

            Self {
                queries_total,
                query_errors_total,
                query_duration,
                connection_acquire_duration,
            }
        }

        pub fn record_query(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_connection_acquire(&self, elapsed: Duration) {
            self.connection_acquire_duration
                .record(elapsed.as_secs_f64(), &[]);
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    /// Statements longer than this are cut in span fields
    const MAX_STATEMENT_LEN: usize = 200;

    pub fn acquire_connection_span() -> Span {
        info_span!("stockroom.acquire_connection")
    }

    pub fn execute_query_span(sql: &str) -> Span {
        info_span!("stockroom.execute_query", db.statement = %truncate(sql))
    }

    pub fn repository_operation_span(operation: &'static str) -> Span {
        info_span!("stockroom.item_repository", operation)
    }

    fn truncate(sql: &str) -> &str {
        match sql.char_indices().nth(MAX_STATEMENT_LEN) {
            Some((idx, _)) => &sql[..idx],
            None => sql,
        }
    }

}
