use std::sync::Arc;
use std::thread;

use prometheus::{Encoder, GaugeVec, IntGauge, Opts, Registry, TextEncoder};
use tiny_http::{Response, Server};

use crate::flow::LearningTable;
use crate::stats::{ControllerStats, FlowStatsCollector, TrafficLog};

#[derive(Clone)]
pub struct MetricsState {
    pub learning: Arc<LearningTable>,
    pub traffic: Arc<TrafficLog>,
    pub collector: Arc<FlowStatsCollector>,
    pub stats: Arc<ControllerStats>,
}

/// Start the metrics HTTP server on the given port.
pub fn start_server(port: u16, state: MetricsState) {
    let addr = format!("0.0.0.0:{}", port);

    let registry = Registry::new();

    let packets_in = IntGauge::new("videoflowd_packets_in_total", "Packet-in events received")
        .expect("valid metric");
    let floods = IntGauge::new("videoflowd_floods_total", "Packets flooded on learning miss")
        .expect("valid metric");
    let forwarded = IntGauge::new(
        "videoflowd_forwarded_total",
        "Packets forwarded to a learned port",
    )
    .expect("valid metric");
    let rules_installed = IntGauge::new(
        "videoflowd_rules_installed_total",
        "Flow rules installed on switches",
    )
    .expect("valid metric");
    let install_failures = IntGauge::new(
        "videoflowd_install_failures_total",
        "Flow rule installations that failed",
    )
    .expect("valid metric");
    let table_miss_failures = IntGauge::new(
        "videoflowd_table_miss_failures_total",
        "Table-miss installations that failed, making the switch unusable",
    )
    .expect("valid metric");
    let redirects = IntGauge::new(
        "videoflowd_redirects_total",
        "Redirection rules installed",
    )
    .expect("valid metric");
    let traffic_flows = IntGauge::new(
        "videoflowd_video_flows",
        "Distinct video traffic flows observed",
    )
    .expect("valid metric");
    let reported_flows = GaugeVec::new(
        Opts::new(
            "videoflowd_switch_reported_flows",
            "Flow table entries reported by each switch",
        ),
        &["switch"],
    )
    .expect("valid metric");
    let learned_hosts = GaugeVec::new(
        Opts::new(
            "videoflowd_learned_hosts",
            "MAC addresses learned per switch",
        ),
        &["switch"],
    )
    .expect("valid metric");

    registry.register(Box::new(packets_in.clone())).unwrap();
    registry.register(Box::new(floods.clone())).unwrap();
    registry.register(Box::new(forwarded.clone())).unwrap();
    registry.register(Box::new(rules_installed.clone())).unwrap();
    registry.register(Box::new(install_failures.clone())).unwrap();
    registry
        .register(Box::new(table_miss_failures.clone()))
        .unwrap();
    registry.register(Box::new(redirects.clone())).unwrap();
    registry.register(Box::new(traffic_flows.clone())).unwrap();
    registry.register(Box::new(reported_flows.clone())).unwrap();
    registry.register(Box::new(learned_hosts.clone())).unwrap();

    thread::spawn(move || {
        let server = match Server::http(&addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on {}", addr);

        for request in server.incoming_requests() {
            let snapshot = state.stats.snapshot();
            packets_in.set(snapshot.packets_in as i64);
            floods.set(snapshot.floods as i64);
            forwarded.set(snapshot.forwarded as i64);
            rules_installed.set(snapshot.rules_installed as i64);
            install_failures.set(snapshot.install_failures as i64);
            table_miss_failures.set(snapshot.table_miss_failures as i64);
            redirects.set(snapshot.redirects as i64);
            traffic_flows.set(state.traffic.flow_count() as i64);

            reported_flows.reset();
            for (switch, stats) in state.collector.snapshot() {
                reported_flows
                    .with_label_values(&[switch.as_str()])
                    .set(stats.entries.len() as f64);
            }

            learned_hosts.reset();
            for (switch, hosts) in state.learning.snapshot() {
                learned_hosts
                    .with_label_values(&[switch.to_string().as_str()])
                    .set(hosts.len() as f64);
            }

            let metric_families = registry.gather();
            let mut buffer = Vec::new();
            let encoder = TextEncoder::new();
            if encoder.encode(&metric_families, &mut buffer).is_err() {
                continue;
            }

            let response = Response::from_data(buffer);
            if let Err(e) = request.respond(response) {
                tracing::warn!("Failed to send metrics response: {}", e);
            }
        }
    });
}
