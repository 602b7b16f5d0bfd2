use axum::extract::{Extension, Query};
use axum::http::StatusCode;
use axum::response::Response;
use std::sync::Arc;

use super::response;
use super::types::{DistParams, GetParams, IncrParams, StatusParams};
use crate::error::GatewayError;
use crate::gateway::service::GatewayService;

pub async fn handle_ping() -> &'static str {
    "OK"
}

pub async fn handle_get(
    Extension(service): Extension<Arc<GatewayService>>,
    Query(params): Query<GetParams>,
) -> Response {
    let jsonp = params.jsonp.as_deref();

    let Some(distribution) = params.distribution.filter(|name| !name.is_empty()) else {
        return response::failure(&GatewayError::MissingArgument("distribution"), jsonp);
    };
    let Some(field) = params.field.filter(|field| !field.is_empty()) else {
        return response::failure(&GatewayError::MissingArgument("field"), jsonp);
    };
    let rate = match parse_rate(params.rate.as_deref(), service.settings().default_rate) {
        Ok(rate) => rate,
        Err(e) => return response::failure(&e, jsonp),
    };

    match service.field(&distribution, vec![field], rate).await {
        Ok(dist) => response::reply(StatusCode::OK, "OK", Some(dist), jsonp),
        Err(e) => {
            log_failure("get", &distribution, &e);
            response::failure(&e, jsonp)
        }
    }
}

pub async fn handle_incr(
    Extension(service): Extension<Arc<GatewayService>>,
    Query(params): Query<IncrParams>,
) -> Response {
    let jsonp = params.jsonp.as_deref();

    let Some(distribution) = params.distribution.filter(|name| !name.is_empty()) else {
        return response::failure(&GatewayError::MissingArgument("distribution"), jsonp);
    };
    let Some(field) = params.field.filter(|field| !field.is_empty()) else {
        return response::failure(&GatewayError::MissingArgument("field"), jsonp);
    };
    let amount = match params.n.as_deref() {
        None => 1,
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) => n,
            Err(_) => return response::failure(&GatewayError::BadArgument("n"), jsonp),
        },
    };

    match service.increment(&distribution, vec![field], amount).await {
        Ok(()) => response::reply::<serde_json::Value>(StatusCode::OK, "OK", None, jsonp),
        Err(e) => {
            log_failure("incr", &distribution, &e);
            response::failure(&e, jsonp)
        }
    }
}

pub async fn handle_dist(
    Extension(service): Extension<Arc<GatewayService>>,
    Query(params): Query<DistParams>,
) -> Response {
    let jsonp = params.jsonp.as_deref();

    let Some(distribution) = params.distribution.filter(|name| !name.is_empty()) else {
        return response::failure(&GatewayError::MissingArgument("distribution"), jsonp);
    };
    let rate = match parse_rate(params.rate.as_deref(), service.settings().default_rate) {
        Ok(rate) => rate,
        Err(e) => return response::failure(&e, jsonp),
    };
    let top = match params.n.as_deref() {
        None => None,
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) if n > 0 => Some(n),
            _ => return response::failure(&GatewayError::BadArgument("n"), jsonp),
        },
    };
    let prune = match params.prune.as_deref() {
        None => service.settings().prune,
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        Some(_) => return response::failure(&GatewayError::BadArgument("prune"), jsonp),
    };

    match service.distribution(&distribution, rate, top, prune).await {
        Ok(dist) => response::reply(StatusCode::OK, "OK", Some(dist), jsonp),
        Err(e) => {
            log_failure("dist", &distribution, &e);
            response::failure(&e, jsonp)
        }
    }
}

pub async fn handle_status(
    Extension(service): Extension<Arc<GatewayService>>,
    Query(params): Query<StatusParams>,
) -> Response {
    let jsonp = params.jsonp.as_deref();

    match service.status().await {
        Ok(status) => response::reply(StatusCode::OK, "OK", Some(status), jsonp),
        Err(e) => {
            log_failure("status", "*", &e);
            response::failure(&e, jsonp)
        }
    }
}

fn parse_rate(raw: Option<&str>, default_rate: f64) -> Result<f64, GatewayError> {
    match raw {
        None => Ok(default_rate),
        Some(raw) => match raw.parse::<f64>() {
            Ok(rate) if rate.is_finite() && rate >= 0.0 => Ok(rate),
            _ => Err(GatewayError::BadArgument("rate")),
        },
    }
}

fn log_failure(operation: &str, distribution: &str, error: &GatewayError) {
    match error {
        GatewayError::Internal(detail) => {
            tracing::error!("{} {}: invariant violated: {}", operation, distribution, detail);
        }
        GatewayError::NotFound | GatewayError::MissingArgument(_) | GatewayError::BadArgument(_) => {
            tracing::debug!("{} {}: {}", operation, distribution, error);
        }
        _ => {
            tracing::warn!("{} {}: {}", operation, distribution, error);
        }
    }
}
