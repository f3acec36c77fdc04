use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    turns_total: AtomicU64,
    searches_total: AtomicU64,
    bookings_confirmed_total: AtomicU64,
    bookings_failed_total: AtomicU64,
    backend_errors_total: AtomicU64,
    oracle_fallbacks_total: AtomicU64,
    tool_calls_total: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub turns_total: u64,
    pub searches_total: u64,
    pub bookings_confirmed_total: u64,
    pub bookings_failed_total: u64,
    pub backend_errors_total: u64,
    pub oracle_fallbacks_total: u64,
    pub tool_calls_total: u64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_turn(&self) {
        self.turns_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_search(&self) {
        self.searches_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_booking(&self, confirmed: bool) {
        if confirmed {
            self.bookings_confirmed_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.bookings_failed_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_backend_error(&self) {
        self.backend_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_oracle_fallback(&self) {
        self.oracle_fallbacks_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tool_call(&self) {
        self.tool_calls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            turns_total: self.turns_total.load(Ordering::Relaxed),
            searches_total: self.searches_total.load(Ordering::Relaxed),
            bookings_confirmed_total: self.bookings_confirmed_total.load(Ordering::Relaxed),
            bookings_failed_total: self.bookings_failed_total.load(Ordering::Relaxed),
            backend_errors_total: self.backend_errors_total.load(Ordering::Relaxed),
            oracle_fallbacks_total: self.oracle_fallbacks_total.load(Ordering::Relaxed),
            tool_calls_total: self.tool_calls_total.load(Ordering::Relaxed),
        }
    }
}

/// JSON logs on stderr, so interactive output on stdout stays readable.
/// `RUST_LOG` overrides `default_level`.
pub fn init_tracing(service_name: &str, default_level: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{service_name}={default_level},flightdesk_agents={default_level},flightdesk_gateway={default_level}"
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .init();
    });
}
