// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::Priority;
use crate::queue::priority_broker::QueueDepths;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

pub const TASKS_PROCESSED: &str = "pipeline_tasks_processed_total";
pub const RETRIES_SCHEDULED: &str = "pipeline_retries_scheduled_total";
pub const STORE_ERRORS: &str = "pipeline_store_errors_total";
pub const FETCH_DURATION: &str = "pipeline_fetch_duration_seconds";
pub const QUEUE_DEPTH: &str = "pipeline_queue_depth";

/// 安装 Prometheus 导出器并注册指标说明
///
/// 端口被占用时只记录告警，不影响流水线运行
pub fn init_metrics(listen_addr: &str) {
    match listen_addr.parse::<SocketAddr>() {
        Ok(addr) => {
            if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
                warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
            } else {
                info!("Metrics exporter listening on {}", addr);
            }
        }
        Err(e) => warn!("Invalid metrics listen address '{}': {}", listen_addr, e),
    }

    describe_counter!(TASKS_PROCESSED, "Tasks that reached a disposition, labelled by outcome");
    describe_counter!(RETRIES_SCHEDULED, "Delayed re-enqueues scheduled after transient fetch errors");
    describe_counter!(STORE_ERRORS, "Result store writes that failed");
    describe_histogram!(FETCH_DURATION, "Duration of a single fetch attempt in seconds");
    describe_gauge!(QUEUE_DEPTH, "Tasks waiting in each priority queue");
}

pub fn record_outcome(outcome: &'static str) {
    counter!(TASKS_PROCESSED, "outcome" => outcome).increment(1);
}

pub fn record_retry_scheduled() {
    counter!(RETRIES_SCHEDULED).increment(1);
}

pub fn record_store_error() {
    counter!(STORE_ERRORS).increment(1);
}

pub fn record_fetch_duration(elapsed: Duration) {
    histogram!(FETCH_DURATION).record(elapsed.as_secs_f64());
}

pub fn record_queue_depths(depths: &QueueDepths) {
    for priority in Priority::ALL {
        gauge!(QUEUE_DEPTH, "priority" => priority.as_str()).set(depths.get(priority) as f64);
    }
}
