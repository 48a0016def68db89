//! Prometheus Metrics Registry - Command Observability
//!
//! All metrics follow the naming convention `tvl_bot_*`. They are
//! scraped from the health server's /metrics route.

use prometheus::{Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::domain::TvlReport;
use crate::usecases::tvl_command::CommandOutcome;

/// Centralized Prometheus metrics for the bot.
pub struct MetricsRegistry {
    registry: Registry,
    /// Commands handled, by outcome (`ok` or the error kind).
    pub commands_total: IntCounterVec,
    /// End-to-end TVL pipeline latency in seconds.
    pub pipeline_seconds: Histogram,
    /// Last reported TVL per portfolio.
    pub last_tvl_usd: GaugeVec,
    /// Last reported grand total.
    pub last_total_usd: Gauge,
    /// Gateway session status (1 = connected, 0 = disconnected).
    pub gateway_connected: IntGauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let commands_total = IntCounterVec::new(
            Opts::new("tvl_bot_commands_total", "TVL commands handled"),
            &["outcome"],
        )?;

        let pipeline_seconds = Histogram::with_opts(
            HistogramOpts::new("tvl_bot_pipeline_seconds", "TVL command latency in seconds")
                .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;

        let last_tvl_usd = GaugeVec::new(
            Opts::new("tvl_bot_last_tvl_usd", "Last computed TVL in USD"),
            &["portfolio"],
        )?;

        let last_total_usd = Gauge::new("tvl_bot_last_total_usd", "Last computed grand total TVL in USD")?;

        let gateway_connected = IntGauge::new(
            "tvl_bot_gateway_connected",
            "Discord gateway status (1=connected, 0=disconnected)",
        )?;

        registry.register(Box::new(commands_total.clone()))?;
        registry.register(Box::new(pipeline_seconds.clone()))?;
        registry.register(Box::new(last_tvl_usd.clone()))?;
        registry.register(Box::new(last_total_usd.clone()))?;
        registry.register(Box::new(gateway_connected.clone()))?;

        Ok(Self {
            registry,
            commands_total,
            pipeline_seconds,
            last_tvl_usd,
            last_total_usd,
            gateway_connected,
        })
    }

    /// Record one handled command and its latency.
    pub fn observe(&self, outcome: &CommandOutcome, elapsed_secs: f64) {
        self.pipeline_seconds.observe(elapsed_secs);
        match outcome {
            CommandOutcome::Reported(report) => {
                self.commands_total.with_label_values(&["ok"]).inc();
                self.record_report(report);
            }
            CommandOutcome::Failed(err) => {
                self.commands_total.with_label_values(&[err.kind()]).inc();
            }
        }
    }

    fn record_report(&self, report: &TvlReport) {
        for subtotal in &report.subtotals {
            self.last_tvl_usd
                .with_label_values(&[subtotal.name.as_str()])
                .set(subtotal.usd);
        }
        self.last_total_usd.set(report.total);
    }

    /// Text exposition format for the scrape endpoint.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
