use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::store::EntityStore;

static POLL_TICKS: AtomicU64 = AtomicU64::new(0);
static FETCH_FAILURES: AtomicU64 = AtomicU64::new(0);
static TASK_FAILURES: AtomicU64 = AtomicU64::new(0);

pub fn increment_poll_ticks() {
    POLL_TICKS.fetch_add(1, Ordering::Relaxed);
}

pub fn increment_fetch_failures() {
    FETCH_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub fn increment_task_failures(count: u64) {
    TASK_FAILURES.fetch_add(count, Ordering::Relaxed);
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct MetricsResponse {
    pub poll_ticks_total: u64,
    pub poll_fetch_failures_total: u64,
    pub poll_task_failures_total: u64,
    pub feeds: usize,
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Health",
    responses(
        (status = 200, description = "Poller and store metrics (Prometheus text format)", body = String)
    )
)]
pub async fn get_metrics(store: web::Data<EntityStore>) -> HttpResponse {
    let counts = store.counts().await;
    let metrics = MetricsResponse {
        poll_ticks_total: POLL_TICKS.load(Ordering::Relaxed),
        poll_fetch_failures_total: FETCH_FAILURES.load(Ordering::Relaxed),
        poll_task_failures_total: TASK_FAILURES.load(Ordering::Relaxed),
        feeds: counts.feeds,
    };

    let body = format!(
        "# HELP poll_ticks_total Total number of poller ticks\n\
         # TYPE poll_ticks_total counter\n\
         poll_ticks_total {}\n\
         \n\
         # HELP poll_fetch_failures_total Ticks whose events fetch or sync failed\n\
         # TYPE poll_fetch_failures_total counter\n\
         poll_fetch_failures_total {}\n\
         \n\
         # HELP poll_task_failures_total Interval tasks that failed or panicked\n\
         # TYPE poll_task_failures_total counter\n\
         poll_task_failures_total {}\n\
         \n\
         # HELP store_feeds Feeds currently in the entity store\n\
         # TYPE store_feeds gauge\n\
         store_feeds {}\n",
        metrics.poll_ticks_total,
        metrics.poll_fetch_failures_total,
        metrics.poll_task_failures_total,
        metrics.feeds
    );

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body)
}
