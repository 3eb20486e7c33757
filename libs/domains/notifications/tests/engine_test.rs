//! Integration tests for the dispatch engine against the simulated provider

use domain_notifications::{
    BatchMode, ConfigureOptions, EmailPriority, EmailRequest, EngineConfig, JobStatus,
    NotificationEngine, NotificationError, RetryPolicy, SimulatedProvider, SuppressionReason,
    TemplateDefinition,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> EngineConfig {
    EngineConfig {
        retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
        ..Default::default()
    }
}

fn engine_with(provider: Arc<SimulatedProvider>, config: EngineConfig) -> NotificationEngine {
    NotificationEngine::builder()
        .provider(provider)
        .config(config)
        .build()
        .expect("Failed to build engine")
}

fn literal(to: &str, subject: &str) -> EmailRequest {
    EmailRequest::literal(to, subject, "Hello from the test suite")
}

mod send_tests {
    use super::*;

    #[tokio::test]
    async fn test_daily_limit_admits_exactly_limit() {
        let provider = Arc::new(SimulatedProvider::reliable());
        let engine = engine_with(
            provider.clone(),
            EngineConfig {
                daily_limit: 5,
                ..fast_config()
            },
        );

        let mut sent = 0;
        let mut limited = 0;
        for i in 0..10 {
            match engine.send(literal(&format!("user{i}@example.com"), "Hi")).await {
                Ok(_) => sent += 1,
                Err(NotificationError::RateLimitExceeded { scope }) => {
                    assert_eq!(scope, "global:daily");
                    limited += 1;
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!((sent, limited), (5, 5));
        assert_eq!(provider.call_count(), 5);
        let stats = engine.stats();
        assert_eq!(stats.emails_sent, 5);
        assert_eq!(stats.rate_limited, 5);
        assert_eq!(stats.emails_failed, 5);
    }

    #[tokio::test]
    async fn test_rate_limit_can_be_disabled() {
        let provider = Arc::new(SimulatedProvider::reliable());
        let engine = engine_with(
            provider.clone(),
            EngineConfig {
                daily_limit: 1,
                ..fast_config()
            },
        );

        engine
            .configure(ConfigureOptions::new().enable_rate_limit(false))
            .await
            .expect("Failed to configure");
        for i in 0..3 {
            engine
                .send(literal(&format!("user{i}@example.com"), "Hi"))
                .await
                .expect("Send should not be rate limited");
        }
        assert_eq!(provider.sent_count().await, 3);
    }

    #[tokio::test]
    async fn test_per_recipient_limit() {
        let provider = Arc::new(SimulatedProvider::reliable());
        let engine = engine_with(provider.clone(), fast_config());
        engine
            .configure(ConfigureOptions::new().per_recipient_daily_limit(Some(2)))
            .await
            .unwrap();

        assert!(engine.send(literal("ada@example.com", "1")).await.is_ok());
        assert!(engine.send(literal("ADA@example.com", "2")).await.is_ok());
        let err = engine.send(literal("ada@example.com", "3")).await.unwrap_err();
        assert!(matches!(err, NotificationError::RateLimitExceeded { .. }));

        assert!(engine.send(literal("grace@example.com", "4")).await.is_ok());
        assert_eq!(provider.sent_count().await, 3);
    }

    #[tokio::test]
    async fn test_flaky_provider_recovers_within_budget() {
        let provider = Arc::new(SimulatedProvider::flaky(2));
        let engine = engine_with(provider.clone(), fast_config());

        let report = engine
            .send(literal("ada@example.com", "Retry me"))
            .await
            .expect("Send should succeed on the third attempt");

        assert_eq!(report.attempts, 3);
        assert_eq!(report.provider, "simulated");
        assert!(report.provider_message_id.unwrap().starts_with("sim-"));
        assert_eq!(provider.call_count(), 3);
        assert_eq!(engine.stats().retries, 2);
    }

    #[tokio::test]
    async fn test_configured_failures_exhaust_retries() {
        let provider = Arc::new(SimulatedProvider::reliable());
        let engine = engine_with(provider.clone(), fast_config());

        engine
            .configure(ConfigureOptions::new().should_fail_send(true))
            .await
            .unwrap();
        let err = engine.send(literal("ada@example.com", "Doomed")).await.unwrap_err();

        assert!(matches!(err, NotificationError::RetryExhausted { attempts: 3, .. }));
        assert_eq!(provider.call_count(), 3);
        assert!(!engine.health_check().await.unwrap());

        engine
            .configure(ConfigureOptions::new().should_fail_send(false))
            .await
            .unwrap();
        assert!(engine.send(literal("ada@example.com", "Fine")).await.is_ok());
    }

    #[tokio::test]
    async fn test_template_send_renders_builtin() {
        let provider = Arc::new(SimulatedProvider::reliable());
        let engine = engine_with(provider.clone(), fast_config());

        let request = EmailRequest::template(
            "ada@example.com",
            "welcome",
            json!({
                "user_name": "Ada",
                "dashboard_url": "https://app.example.com/dashboard",
                "company_name": "Acme",
            }),
        )
        .with_name("Ada Lovelace");
        engine.send(request).await.expect("Failed to send template");

        let sent = provider.sent_emails().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Welcome to Acme, Ada!");
        assert_eq!(sent[0].template_name.as_deref(), Some("welcome"));
        assert!(sent[0].body.contains("https://app.example.com/dashboard"));
        assert!(sent[0].html_body.is_some());
    }

    #[tokio::test]
    async fn test_custom_template_from_builder() {
        let provider = Arc::new(SimulatedProvider::reliable());
        let engine = NotificationEngine::builder()
            .provider(provider.clone())
            .config(fast_config())
            .template(
                TemplateDefinition::new("digest", "Your {{period}} digest", "{{count}} new items")
                    .require(&["period", "count"]),
            )
            .build()
            .unwrap();

        assert_eq!(engine.stats().templates_loaded, 7);
        engine
            .send(EmailRequest::template(
                "ada@example.com",
                "digest",
                json!({"period": "weekly", "count": 4}),
            ))
            .await
            .unwrap();

        let sent = provider.sent_emails().await;
        assert_eq!(sent[0].subject, "Your weekly digest");
        assert_eq!(sent[0].body, "4 new items");
    }

    #[tokio::test]
    async fn test_invalid_address_never_reaches_provider() {
        let provider = Arc::new(SimulatedProvider::reliable());
        let engine = engine_with(provider.clone(), fast_config());

        for address in ["", "plainaddress", "@example.com", "ada@", "ada @example.com"] {
            let err = engine.send(literal(address, "Hi")).await.unwrap_err();
            assert!(matches!(err, NotificationError::InvalidEmail(_)), "{address}: {err:?}");
        }

        assert_eq!(provider.call_count(), 0);
        assert_eq!(engine.stats().emails_sent, 0);
        assert_eq!(engine.stats().emails_failed, 5);
    }

    #[tokio::test]
    async fn test_suppression_blocks_queueing() {
        let provider = Arc::new(SimulatedProvider::reliable());
        let engine = engine_with(provider, fast_config());

        engine.suppress("bounced@example.com", SuppressionReason::Bounce);
        let err = engine
            .queue_email(literal("Bounced@Example.com", "Hi"))
            .unwrap_err();

        assert!(matches!(err, NotificationError::EmailSuppressed(_)));
        assert_eq!(engine.stats().queue_size, 0);
        assert!(engine.suppression("bounced@example.com").is_some());
    }
}

mod batch_tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let provider = Arc::new(SimulatedProvider::reliable());
        let engine = engine_with(provider.clone(), fast_config());

        let requests = vec![
            literal("a@example.com", "1"),
            literal("not-an-email", "2"),
            literal("b@example.com", "3"),
            EmailRequest::template("c@example.com", "missing-template", json!({})),
            literal("d@example.com", "5"),
        ];
        let result = engine.send_batch(requests).await;

        assert_eq!(result.successful, 3);
        assert_eq!(result.failed, 2);
        let indices: Vec<usize> = result.failures.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(result.failures[0].recipient, "not-an-email");
        assert!(matches!(
            result.failures[1].error,
            NotificationError::TemplateNotFound(_)
        ));
        assert_eq!(provider.sent_count().await, 3);
    }

    #[tokio::test]
    async fn test_batch_in_queue_mode() {
        let provider = Arc::new(SimulatedProvider::reliable());
        let engine = engine_with(
            provider.clone(),
            EngineConfig {
                batch_mode: BatchMode::Queue,
                ..fast_config()
            },
        );

        let result = engine
            .send_batch(vec![literal("a@example.com", "1"), literal("b@example.com", "2")])
            .await;

        assert_eq!(result.successful, 2);
        assert_eq!(provider.call_count(), 0);
        assert_eq!(engine.stats().queue_size, 2);

        let summary = engine.process_queue().await.unwrap();
        assert_eq!(summary.sent, 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let engine = engine_with(Arc::new(SimulatedProvider::reliable()), fast_config());
        let result = engine.send_batch(Vec::new()).await;
        assert_eq!((result.successful, result.failed), (0, 0));
    }
}

mod queue_tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_order_follows_priority() {
        let provider = Arc::new(SimulatedProvider::reliable());
        let engine = engine_with(provider.clone(), fast_config());

        let order = [
            ("low-1", EmailPriority::Low),
            ("normal-1", EmailPriority::Normal),
            ("high-1", EmailPriority::High),
            ("normal-2", EmailPriority::Normal),
            ("high-2", EmailPriority::High),
        ];
        for (subject, priority) in order {
            engine
                .queue_email(literal("ada@example.com", subject).with_priority(priority))
                .unwrap();
        }

        let summary = engine.process_queue().await.unwrap();
        assert_eq!(summary.processed, 5);

        let subjects: Vec<String> = provider
            .sent_emails()
            .await
            .into_iter()
            .map(|email| email.subject)
            .collect();
        assert_eq!(subjects, vec!["high-1", "high-2", "normal-1", "normal-2", "low-1"]);
        assert_eq!(engine.stats().queue_size, 0);
    }

    #[tokio::test]
    async fn test_queued_failure_does_not_stop_drain() {
        let provider = Arc::new(SimulatedProvider::quota_limited(1));
        let engine = engine_with(provider.clone(), fast_config());

        let first = engine.queue_email(literal("a@example.com", "1")).unwrap();
        let second = engine.queue_email(literal("b@example.com", "2")).unwrap();
        let third = engine.queue_email(literal("c@example.com", "3")).unwrap();

        let summary = engine.process_queue().await.unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.rate_limited, 2);

        assert_eq!(engine.job_status(first).unwrap().status, JobStatus::Sent);
        assert_eq!(engine.job_status(second).unwrap().status, JobStatus::RateLimited);
        assert_eq!(engine.job_status(third).unwrap().status, JobStatus::RateLimited);
        // Quota exhaustion is not retried.
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_cancel_before_drain() {
        let provider = Arc::new(SimulatedProvider::reliable());
        let engine = engine_with(provider.clone(), fast_config());

        let keep = engine.queue_email(literal("a@example.com", "keep")).unwrap();
        let cancelled = engine.queue_email(literal("b@example.com", "drop")).unwrap();
        assert!(engine.cancel(cancelled));
        assert_eq!(engine.pending_jobs(), vec![keep]);

        engine.process_queue().await;
        assert!(provider.was_sent_to("a@example.com").await);
        assert!(!provider.was_sent_to("b@example.com").await);
        assert_eq!(engine.job_status(cancelled).unwrap().status, JobStatus::Cancelled);
        assert!(!engine.cancel(keep));
        assert_eq!(engine.stats().emails_failed, 0);
    }

    #[tokio::test]
    async fn test_concurrent_drain_is_refused() {
        let provider = Arc::new(SimulatedProvider::latent(Duration::from_millis(150)));
        let engine = Arc::new(engine_with(provider.clone(), fast_config()));
        engine.queue_email(literal("a@example.com", "slow")).unwrap();

        let background = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.process_queue().await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(engine.stats().is_processing_queue);
        assert!(engine.process_queue().await.is_none());

        let summary = background.await.unwrap().expect("First drain should run");
        assert_eq!(summary.sent, 1);
        assert!(!engine.stats().is_processing_queue);
        assert!(engine.process_queue().await.is_some());
    }

    #[tokio::test]
    async fn test_worker_drains_and_shuts_down() {
        let provider = Arc::new(SimulatedProvider::reliable());
        let engine = Arc::new(engine_with(provider.clone(), fast_config()));
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let worker = engine.spawn_worker(shutdown_rx);

        engine.send_welcome_email("ada@example.com", "Ada", Some("token")).unwrap();
        engine.send_verification_email("grace@example.com", "Grace", "token").unwrap();
        engine.send_password_reset_email("alan@example.com", "Alan", "token").unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while provider.sent_count().await < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Worker did not drain the queue");

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("Worker did not stop")
            .unwrap();

        let sent = provider.sent_emails().await;
        let reset = sent
            .iter()
            .find(|email| email.recipient == "alan@example.com")
            .unwrap();
        assert!(reset.body.contains("/auth/reset-password?token=token"));
        assert_eq!(engine.stats().emails_sent, 3);
        assert_eq!(engine.delivery_log().len(), 3);
    }

    #[tokio::test]
    async fn test_worker_stops_when_sender_dropped() {
        let engine = Arc::new(engine_with(
            Arc::new(SimulatedProvider::reliable()),
            fast_config(),
        ));
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let worker = engine.spawn_worker(shutdown_rx);

        drop(shutdown_tx);
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("Worker did not stop")
            .unwrap();
    }
}
