use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use remedi_db::DbPool;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Ready,
    Degraded,
}

impl ProbeStatus {
    fn is_ready(self) -> bool {
        matches!(self, ProbeStatus::Ready)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Probe {
    pub status: ProbeStatus,
    pub detail: String,
}

impl Probe {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: ProbeStatus::Ready, detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: ProbeStatus::Degraded, detail: detail.into() }
    }
}

/// Aggregate readiness report. The overall status is degraded as soon as any
/// probe is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: ProbeStatus,
    pub service: Probe,
    pub database: Probe,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    fn assemble(service: Probe, database: Probe) -> Self {
        let status = if service.status.is_ready() && database.status.is_ready() {
            ProbeStatus::Ready
        } else {
            ProbeStatus::Degraded
        };
        Self { status, service, database, checked_at: Utc::now() }
    }
}

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

/// Serves `/health` on its own port so load balancers can probe readiness
/// without touching the chat surface.
pub async fn spawn(bind_address: &str, port: u16, db_pool: DbPool) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(db_pool)).await {
            error!(
                event_name = "system.health.error",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthReport>) {
    let report = HealthReport::assemble(
        Probe::ready("remedi-server runtime initialized"),
        database_probe(&state.db_pool).await,
    );

    let status_code = if report.status.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(report))
}

async fn database_probe(pool: &DbPool) -> Probe {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => Probe::ready("database query succeeded"),
        Err(error) => Probe::degraded(format!("database query failed: {error}")),
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use remedi_db::connect_with_settings;

    use crate::health::{health, HealthState, ProbeStatus};

    #[tokio::test]
    async fn health_returns_ready_when_database_is_reachable() {
        let pool =
            connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");

        let (status, Json(report)) = health(State(HealthState { db_pool: pool.clone() })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(report.status, ProbeStatus::Ready);
        assert_eq!(report.database.status, ProbeStatus::Ready);

        pool.close().await;
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let pool =
            connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        pool.close().await;

        let (status, Json(report)) = health(State(HealthState { db_pool: pool })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(report.status, ProbeStatus::Degraded);
        assert_eq!(report.database.status, ProbeStatus::Degraded);
        assert_eq!(report.service.status, ProbeStatus::Ready);
    }
}
