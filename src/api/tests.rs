//! API Module Tests
//!
//! Drives the Axum handlers directly and checks the envelope, the status
//! codes, and the JSONP wrapping.

#[cfg(test)]
mod tests {
    use crate::api::handlers::{handle_dist, handle_get, handle_incr, handle_ping, handle_status};
    use crate::api::response::http_outcome;
    use crate::api::types::{DistParams, GetParams, IncrParams, StatusParams};
    use crate::backend::mock::{MockConnector, MockReply};
    use crate::cluster::registry::ShardRegistry;
    use crate::cluster::types::{ConnectionState, ShardEndpoint, ShardId};
    use crate::dispatch::command::{CommandSpec, ReplyValue};
    use crate::dispatch::dispatcher::Dispatcher;
    use crate::error::GatewayError;
    use crate::gateway::service::{GatewayService, GatewaySettings};
    use crate::gateway::writeback::WritebackQueue;
    use axum::extract::{Extension, Query};
    use axum::http::{StatusCode, header};
    use axum::response::Response;
    use std::sync::Arc;
    use std::time::Duration;

    fn endpoints(count: usize) -> Vec<ShardEndpoint> {
        (0..count)
            .map(|i| ShardEndpoint {
                id: ShardId(i),
                address: "127.0.0.1".to_string(),
                port: 7000 + i as u16,
            })
            .collect()
    }

    fn service_with(
        shard_count: usize,
        connector: Arc<MockConnector>,
    ) -> (Arc<GatewayService>, Arc<ShardRegistry>) {
        let registry = ShardRegistry::start(endpoints(shard_count), connector);
        let dispatcher = Dispatcher::new(registry.clone());
        let (writeback, _refresh_queue) = WritebackQueue::new();
        let service = Arc::new(GatewayService::new(
            registry.clone(),
            dispatcher,
            writeback,
            GatewaySettings::default(),
        ));
        (service, registry)
    }

    async fn wait_connected(registry: &Arc<ShardRegistry>) {
        for slot in registry.slots() {
            for _ in 0..400 {
                if slot.state() == ConnectionState::Connected {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            assert_eq!(slot.state(), ConnectionState::Connected);
        }
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn content_type(response: &Response) -> &str {
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
    }

    fn scripted_field_counts() -> Arc<MockConnector> {
        let connector = MockConnector::new();
        connector.script(|_, spec| match spec {
            CommandSpec::FieldCounts { .. } => MockReply::Reply(ReplyValue::Sequence(vec![
                ReplyValue::Text("4".to_string()),
                ReplyValue::Integer(2),
                ReplyValue::Text("10".to_string()),
                ReplyValue::Text("9999999999".to_string()),
            ])),
            CommandSpec::Increment { .. } => {
                MockReply::Reply(ReplyValue::Sequence(vec![ReplyValue::Integer(1)]))
            }
            CommandSpec::KeyspaceSize => MockReply::Reply(ReplyValue::Integer(7)),
            _ => MockReply::Reply(ReplyValue::Nil),
        });
        connector
    }

    // ============================================================
    // VALIDATION FAILURES
    // ============================================================

    #[tokio::test]
    async fn test_get_without_distribution_is_400() {
        let connector = scripted_field_counts();
        let (service, _registry) = service_with(1, connector.clone());

        let response = handle_get(Extension(service), Query(GetParams::default())).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_string(response).await;
        assert!(body.contains("MISSING_ARG_DISTRIBUTION"), "body: {}", body);
        assert_eq!(connector.executed_count(), 0, "no backend command issued");
    }

    #[tokio::test]
    async fn test_get_with_empty_distribution_is_400() {
        let connector = scripted_field_counts();
        let (service, _registry) = service_with(1, connector.clone());

        let params = GetParams {
            distribution: Some(String::new()),
            field: Some("x".to_string()),
            ..GetParams::default()
        };
        let response = handle_get(Extension(service), Query(params)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("MISSING_ARG_DISTRIBUTION"));
        assert_eq!(connector.executed_count(), 0);
    }

    #[tokio::test]
    async fn test_get_without_field_is_400() {
        let connector = scripted_field_counts();
        let (service, _registry) = service_with(1, connector);

        let params = GetParams {
            distribution: Some("colors".to_string()),
            ..GetParams::default()
        };
        let response = handle_get(Extension(service), Query(params)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("MISSING_ARG_FIELD"));
    }

    #[tokio::test]
    async fn test_get_with_bad_rate_is_400() {
        let connector = scripted_field_counts();
        let (service, _registry) = service_with(1, connector);

        let params = GetParams {
            distribution: Some("colors".to_string()),
            field: Some("red".to_string()),
            rate: Some("fast".to_string()),
            ..GetParams::default()
        };
        let response = handle_get(Extension(service), Query(params)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("BAD_ARG_RATE"));
    }

    #[tokio::test]
    async fn test_incr_with_bad_n_is_400() {
        let connector = scripted_field_counts();
        let (service, _registry) = service_with(1, connector);

        let params = IncrParams {
            distribution: Some("colors".to_string()),
            field: Some("red".to_string()),
            n: Some("many".to_string()),
            ..IncrParams::default()
        };
        let response = handle_incr(Extension(service), Query(params)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("BAD_ARG_N"));
    }

    // ============================================================
    // SUCCESS PATHS
    // ============================================================

    #[tokio::test]
    async fn test_get_serves_envelope() {
        let connector = scripted_field_counts();
        let (service, registry) = service_with(3, connector);
        wait_connected(&registry).await;

        let params = GetParams {
            distribution: Some("user:42".to_string()),
            field: Some("clicks".to_string()),
            rate: Some("0".to_string()),
            ..GetParams::default()
        };
        let response = handle_get(Extension(service), Query(params)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(content_type(&response), "application/json");

        let body = body_string(response).await;
        assert!(body.contains(r#""status_code":200"#), "body: {}", body);
        assert!(body.contains(r#""status_txt":"OK""#));
        assert!(body.contains(r#""distribution":"user:42""#));
        assert!(body.contains(r#""bin":"clicks""#));
        assert!(body.contains(r#""count":4"#));
        assert!(body.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_jsonp_wraps_the_envelope() {
        let connector = scripted_field_counts();
        let (service, registry) = service_with(1, connector);
        wait_connected(&registry).await;

        let params = GetParams {
            distribution: Some("colors".to_string()),
            field: Some("red".to_string()),
            rate: Some("0".to_string()),
            jsonp: Some("render".to_string()),
        };
        let response = handle_get(Extension(service), Query(params)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(content_type(&response), "application/javascript");

        let body = body_string(response).await;
        assert!(body.starts_with("render({"), "body: {}", body);
        assert!(body.ends_with("})\n"), "body: {}", body);
    }

    #[tokio::test]
    async fn test_incr_defaults_to_one() {
        let connector = scripted_field_counts();
        let (service, registry) = service_with(1, connector.clone());
        wait_connected(&registry).await;

        let params = IncrParams {
            distribution: Some("colors".to_string()),
            field: Some("red".to_string()),
            ..IncrParams::default()
        };
        let response = handle_incr(Extension(service), Query(params)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let executed = connector.executed();
        assert_eq!(executed.len(), 1);
        match &executed[0].1 {
            CommandSpec::Increment { amount, .. } => assert_eq!(*amount, 1),
            other => panic!("expected an increment, saw {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_serves_shard_report() {
        let connector = scripted_field_counts();
        let (service, registry) = service_with(2, connector);
        wait_connected(&registry).await;

        let response = handle_status(Extension(service), Query(StatusParams::default())).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains(r#""shard_count":2"#), "body: {}", body);
        assert!(body.contains(r#""keys":7"#));
        assert!(body.contains(r#""state":"connected""#));
    }

    #[tokio::test]
    async fn test_ping() {
        assert_eq!(handle_ping().await, "OK");
    }

    // ============================================================
    // FAILURE MAPPING
    // ============================================================

    #[tokio::test]
    async fn test_get_against_down_shard_is_503() {
        let connector = MockConnector::new();
        connector.refuse_connects(ShardId(0));
        let (service, _registry) = service_with(1, connector.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;

        let params = GetParams {
            distribution: Some("colors".to_string()),
            field: Some("red".to_string()),
            ..GetParams::default()
        };
        let response = handle_get(Extension(service), Query(params)).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_string(response).await.contains("SHARD_UNAVAILABLE"));
        assert_eq!(connector.executed_count(), 0, "no backend command issued");
    }

    #[tokio::test]
    async fn test_dist_of_absent_distribution_is_404() {
        let connector = MockConnector::new();
        connector.script(|_, spec| match spec {
            CommandSpec::RangeWithScores { .. } => MockReply::Reply(ReplyValue::Sequence(vec![
                ReplyValue::Nil,
                ReplyValue::Sequence(vec![]),
            ])),
            _ => MockReply::Reply(ReplyValue::Nil),
        });
        let (service, registry) = service_with(1, connector);
        wait_connected(&registry).await;

        let params = DistParams {
            distribution: Some("ghost".to_string()),
            ..DistParams::default()
        };
        let response = handle_dist(Extension(service), Query(params)).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("DISTRIBUTION_NOT_FOUND"));
    }

    #[test]
    fn test_http_outcome_mapping() {
        let cases = [
            (
                GatewayError::MissingArgument("distribution"),
                StatusCode::BAD_REQUEST,
                "MISSING_ARG_DISTRIBUTION",
            ),
            (
                GatewayError::BadArgument("rate"),
                StatusCode::BAD_REQUEST,
                "BAD_ARG_RATE",
            ),
            (
                GatewayError::ShardUnavailable,
                StatusCode::SERVICE_UNAVAILABLE,
                "SHARD_UNAVAILABLE",
            ),
            (
                GatewayError::NotFound,
                StatusCode::NOT_FOUND,
                "DISTRIBUTION_NOT_FOUND",
            ),
            (
                GatewayError::Backend("WRONGTYPE".to_string()),
                StatusCode::BAD_GATEWAY,
                "WRONGTYPE",
            ),
            (GatewayError::Timeout, StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            (
                GatewayError::Internal("bug".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];

        for (error, status, txt) in cases {
            assert_eq!(http_outcome(&error), (status, txt.to_string()));
        }
    }
}
