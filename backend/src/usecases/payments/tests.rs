use super::*;
use crate::usecases::test_support::{InMemoryBilling, InMemoryIncidents};
use chrono::Duration as ChronoDuration;
use serde_json::json;
use skillforge_core::payments::webhook_signature::compute_mac;

const SALT: &str = "webhook-test-salt";
const PR1: &str = "PR1";

fn checkout_config() -> Checkout {
    Checkout {
        redirect_url: "https://app.skillforge.test/premium/return".to_string(),
        webhook_url: "https://api.skillforge.test/api/v1/payments/webhook".to_string(),
    }
}

fn remote(status: &str) -> RemotePaymentRequest {
    RemotePaymentRequest {
        payment_request_id: PR1.to_string(),
        status: status.to_string(),
        payment_id: (status == "Completed").then(|| "MOJO0001".to_string()),
        raw: json!({ "success": true, "payment_request": { "id": PR1, "status": status } }),
    }
}

fn gateway_reporting(status: &'static str) -> MockPaymentGateway {
    let mut gateway = MockPaymentGateway::new();
    gateway
        .expect_get_payment_request()
        .returning(move |_| Ok(remote(status)));
    gateway
}

fn usecase(
    billing: &Arc<InMemoryBilling>,
    incidents: &Arc<InMemoryIncidents>,
    gateway: MockPaymentGateway,
) -> PaymentUseCase<InMemoryBilling, InMemoryIncidents, MockPaymentGateway> {
    PaymentUseCase::new(
        Arc::clone(billing),
        Arc::clone(incidents),
        Arc::new(gateway),
        checkout_config(),
        Some(SALT.to_string()),
    )
    .with_retry(CompletionRetry {
        max_attempts: 3,
        base_delay: Duration::ZERO,
    })
}

fn verify_request(payment_request_id: &str) -> VerifyPaymentRequest {
    VerifyPaymentRequest {
        payment_request_id: Some(payment_request_id.to_string()),
        payment_id: None,
    }
}

fn signed_webhook(payment_request_id: &str, status: &str) -> HashMap<String, String> {
    let mut fields = HashMap::from([
        ("payment_id".to_string(), "MOJO0001".to_string()),
        ("payment_request_id".to_string(), payment_request_id.to_string()),
        ("status".to_string(), status.to_string()),
        ("amount".to_string(), "299.00".to_string()),
        ("buyer".to_string(), "learner@example.com".to_string()),
    ]);
    let mac = compute_mac(&fields, SALT).unwrap();
    fields.insert(MAC_FIELD.to_string(), mac);
    fields
}

#[tokio::test]
async fn checkout_rejects_unknown_plan_before_calling_gateway() {
    let billing = Arc::new(InMemoryBilling::default());
    let incidents = Arc::new(InMemoryIncidents::default());
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_create_payment_request().times(0);

    let err = usecase(&billing, &incidents, gateway)
        .create_checkout(
            Uuid::new_v4(),
            Some("learner@example.com".to_string()),
            CreateCheckoutRequest {
                plan_type: Some("lifetime".to_string()),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::Validation(_)));
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn checkout_requires_an_email() {
    let billing = Arc::new(InMemoryBilling::default());
    let incidents = Arc::new(InMemoryIncidents::default());
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_create_payment_request().times(0);

    let err = usecase(&billing, &incidents, gateway)
        .create_checkout(
            Uuid::new_v4(),
            None,
            CreateCheckoutRequest {
                plan_type: Some("monthly".to_string()),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::Validation(_)));
}

#[tokio::test]
async fn checkout_charges_catalog_amount_and_stores_pending_record() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::default());
    let incidents = Arc::new(InMemoryIncidents::default());
    let mut gateway = MockPaymentGateway::new();
    gateway
        .expect_create_payment_request()
        .withf(|input| {
            input.amount == "2999.00"
                && input.purpose == "SkillForge Premium - Yearly"
                && input.email == "learner@example.com"
                && input.buyer_name == "learner"
                && !input.allow_repeated_payments
                && input.webhook_url.ends_with("/api/v1/payments/webhook")
        })
        .times(1)
        .returning(|_| {
            Ok(CreatedPaymentRequest {
                payment_request_id: "PR9".to_string(),
                checkout_url: "https://www.instamojo.com/@skillforge/PR9".to_string(),
                raw: json!({ "success": true }),
            })
        });

    let response = usecase(&billing, &incidents, gateway)
        .create_checkout(
            user_id,
            Some("learner@example.com".to_string()),
            CreateCheckoutRequest {
                plan_type: Some(" Yearly ".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(response.payment_request_id, "PR9");
    assert_eq!(response.checkout_url, "https://www.instamojo.com/@skillforge/PR9");

    let record = billing.record("PR9").unwrap();
    assert_eq!(record.user_id, user_id);
    assert_eq!(record.amount_minor, 299_900);
    assert_eq!(record.plan_type, "yearly");
    assert!(record.is_pending());
}

#[tokio::test]
async fn verify_completes_pending_payment_and_grants_thirty_days() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Monthly));
    let incidents = Arc::new(InMemoryIncidents::default());

    let response = usecase(&billing, &incidents, gateway_reporting("Completed"))
        .verify_payment(user_id, verify_request(PR1))
        .await
        .unwrap();

    assert_eq!(response, VerifyPaymentResponse::verified());

    let record = billing.record(PR1).unwrap();
    assert!(record.is_completed());
    assert_eq!(record.payment_id.as_deref(), Some("MOJO0001"));
    let completed_at = record.completed_at.unwrap();
    assert_eq!(record.subscription_start, Some(completed_at));
    assert_eq!(
        record.subscription_end.unwrap() - completed_at,
        ChronoDuration::days(30)
    );

    let entitlement = billing.entitlement(user_id).unwrap();
    assert!(entitlement.is_active);
    assert_eq!(entitlement.plan_type.as_deref(), Some("monthly"));
    assert_eq!(entitlement.source, "payment");
    assert_eq!(entitlement.subscription_end, record.subscription_end);
    assert_eq!(billing.entitlement_writes(), 1);
}

#[tokio::test]
async fn yearly_plan_grants_three_hundred_sixty_five_days() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Yearly));
    let incidents = Arc::new(InMemoryIncidents::default());

    usecase(&billing, &incidents, gateway_reporting("Completed"))
        .verify_payment(user_id, verify_request(PR1))
        .await
        .unwrap();

    let record = billing.record(PR1).unwrap();
    assert_eq!(
        record.subscription_end.unwrap() - record.completed_at.unwrap(),
        ChronoDuration::days(365)
    );
}

#[tokio::test]
async fn processor_payment_id_wins_over_client_supplied_one() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Monthly));
    let incidents = Arc::new(InMemoryIncidents::default());

    usecase(&billing, &incidents, gateway_reporting("Completed"))
        .verify_payment(
            user_id,
            VerifyPaymentRequest {
                payment_request_id: Some(PR1.to_string()),
                payment_id: Some("MOJO_FROM_CLIENT".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(
        billing.record(PR1).unwrap().payment_id.as_deref(),
        Some("MOJO0001")
    );
}

#[tokio::test]
async fn client_payment_id_is_kept_when_processor_lists_none() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Monthly));
    let incidents = Arc::new(InMemoryIncidents::default());
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_get_payment_request().returning(|_| {
        Ok(RemotePaymentRequest {
            payment_id: None,
            ..remote("Completed")
        })
    });

    usecase(&billing, &incidents, gateway)
        .verify_payment(
            user_id,
            VerifyPaymentRequest {
                payment_request_id: Some(PR1.to_string()),
                payment_id: Some("MOJO_FROM_CLIENT".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(
        billing.record(PR1).unwrap().payment_id.as_deref(),
        Some("MOJO_FROM_CLIENT")
    );
}

#[tokio::test]
async fn second_verify_is_a_no_op() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Monthly));
    let incidents = Arc::new(InMemoryIncidents::default());
    let usecase = usecase(&billing, &incidents, gateway_reporting("Completed"));

    usecase
        .verify_payment(user_id, verify_request(PR1))
        .await
        .unwrap();
    let first = billing.record(PR1).unwrap();

    let response = usecase
        .verify_payment(user_id, verify_request(PR1))
        .await
        .unwrap();

    assert_eq!(response, VerifyPaymentResponse::already_verified());
    assert_eq!(billing.record(PR1).unwrap(), first);
    assert_eq!(billing.entitlement_writes(), 1);
}

#[tokio::test]
async fn verify_then_webhook_completes_once() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Monthly));
    let incidents = Arc::new(InMemoryIncidents::default());
    let usecase = usecase(&billing, &incidents, gateway_reporting("Completed"));

    usecase
        .verify_payment(user_id, verify_request(PR1))
        .await
        .unwrap();
    let after_verify = billing.record(PR1).unwrap();

    let outcome = usecase
        .handle_webhook(signed_webhook(PR1, "Credit"))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::AlreadyCompleted);
    assert_eq!(billing.record(PR1).unwrap(), after_verify);
    assert_eq!(billing.entitlement_writes(), 1);
}

#[tokio::test]
async fn webhook_then_verify_completes_once() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Monthly));
    let incidents = Arc::new(InMemoryIncidents::default());
    let usecase = usecase(&billing, &incidents, gateway_reporting("Completed"));

    let outcome = usecase
        .handle_webhook(signed_webhook(PR1, "Credit"))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Completed);

    let record = billing.record(PR1).unwrap();
    assert_eq!(record.payment_id.as_deref(), Some("MOJO0001"));
    let snapshot = record.raw_webhook_payload.clone().unwrap();
    assert_eq!(snapshot["status"], "Credit");
    assert!(snapshot.get(MAC_FIELD).is_none());

    let response = usecase
        .verify_payment(user_id, verify_request(PR1))
        .await
        .unwrap();

    assert_eq!(response, VerifyPaymentResponse::already_verified());
    assert_eq!(billing.record(PR1).unwrap(), record);
    assert_eq!(billing.entitlement_writes(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_verify_and_webhook_grant_exactly_once() {
    for _ in 0..20 {
        let user_id = Uuid::new_v4();
        let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Monthly));
        let incidents = Arc::new(InMemoryIncidents::default());
        let usecase = Arc::new(usecase(&billing, &incidents, gateway_reporting("Completed")));

        let verify = {
            let usecase = Arc::clone(&usecase);
            tokio::spawn(async move { usecase.verify_payment(user_id, verify_request(PR1)).await })
        };
        let webhook = {
            let usecase = Arc::clone(&usecase);
            tokio::spawn(async move { usecase.handle_webhook(signed_webhook(PR1, "Credit")).await })
        };

        let verify = verify.await.unwrap().unwrap();
        let webhook = webhook.await.unwrap().unwrap();

        assert!(verify.success);
        assert!(matches!(
            webhook,
            WebhookOutcome::Completed | WebhookOutcome::AlreadyCompleted
        ));
        assert_eq!(billing.entitlement_writes(), 1);
        assert!(billing.record(PR1).unwrap().is_completed());
        assert!(incidents.recorded().is_empty());
    }
}

#[tokio::test]
async fn verify_of_someone_elses_payment_is_not_found() {
    let owner = Uuid::new_v4();
    let intruder = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(owner, PR1, PlanType::Monthly));
    let incidents = Arc::new(InMemoryIncidents::default());

    let err = usecase(&billing, &incidents, gateway_reporting("Completed"))
        .verify_payment(intruder, verify_request(PR1))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::NotFound));
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    assert!(billing.record(PR1).unwrap().is_pending());
    assert!(billing.entitlement(owner).is_none());
    assert!(billing.entitlement(intruder).is_none());
}

#[tokio::test]
async fn verify_requires_a_payment_request_id() {
    let billing = Arc::new(InMemoryBilling::default());
    let incidents = Arc::new(InMemoryIncidents::default());
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_get_payment_request().times(0);

    let err = usecase(&billing, &incidents, gateway)
        .verify_payment(Uuid::new_v4(), verify_request("   "))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::Validation(_)));
}

#[tokio::test]
async fn verify_rejects_path_like_ids_before_calling_gateway() {
    let billing = Arc::new(InMemoryBilling::default());
    let incidents = Arc::new(InMemoryIncidents::default());
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_get_payment_request().times(0);
    let usecase = usecase(&billing, &incidents, gateway);

    for id in ["../refunds", "PR1/payments", "PR1?x=1"] {
        let err = usecase
            .verify_payment(Uuid::new_v4(), verify_request(id))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Validation(_)), "{id} must be rejected");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn remote_pending_is_reported_without_state_change() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Monthly));
    let incidents = Arc::new(InMemoryIncidents::default());

    let response = usecase(&billing, &incidents, gateway_reporting("Pending"))
        .verify_payment(user_id, verify_request(PR1))
        .await
        .unwrap();

    assert_eq!(response, VerifyPaymentResponse::not_completed_yet());
    assert!(billing.record(PR1).unwrap().is_pending());
    assert_eq!(billing.entitlement_writes(), 0);
}

#[tokio::test]
async fn remote_failure_is_terminal_and_later_credit_is_escalated() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Monthly));
    let incidents = Arc::new(InMemoryIncidents::default());
    let usecase = usecase(&billing, &incidents, gateway_reporting("Failed"));

    let response = usecase
        .verify_payment(user_id, verify_request(PR1))
        .await
        .unwrap();

    assert_eq!(response, VerifyPaymentResponse::failed());
    assert_eq!(
        billing.record(PR1).unwrap().payment_status(),
        Some(PaymentStatus::Failed)
    );

    let outcome = usecase
        .handle_webhook(signed_webhook(PR1, "Credit"))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::NotPending);
    assert_eq!(
        billing.record(PR1).unwrap().payment_status(),
        Some(PaymentStatus::Failed)
    );
    assert!(billing.entitlement(user_id).is_none());

    let recorded = incidents.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].triggered_by, "webhook");
}

#[tokio::test]
async fn tampered_webhook_is_rejected_without_state_change() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Monthly));
    let incidents = Arc::new(InMemoryIncidents::default());
    let usecase = usecase(&billing, &incidents, MockPaymentGateway::new());

    let mut fields = signed_webhook(PR1, "Credit");
    fields.insert("amount".to_string(), "1.00".to_string());
    let err = usecase.handle_webhook(fields).await.unwrap_err();
    assert!(matches!(err, PaymentError::Signature));
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

    let mut fields = signed_webhook(PR1, "Credit");
    fields.remove(MAC_FIELD);
    assert!(matches!(
        usecase.handle_webhook(fields).await,
        Err(PaymentError::Signature)
    ));

    assert!(billing.record(PR1).unwrap().is_pending());
    assert_eq!(billing.entitlement_writes(), 0);
}

#[tokio::test]
async fn webhook_is_rejected_when_salt_is_not_configured() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Monthly));
    let incidents = Arc::new(InMemoryIncidents::default());
    let usecase = PaymentUseCase::new(
        Arc::clone(&billing),
        Arc::clone(&incidents),
        Arc::new(MockPaymentGateway::new()),
        checkout_config(),
        None,
    );

    let result = usecase.handle_webhook(signed_webhook(PR1, "Credit")).await;

    assert!(matches!(result, Err(PaymentError::Signature)));
    assert!(billing.record(PR1).unwrap().is_pending());
}

#[tokio::test]
async fn non_success_webhook_is_acknowledged_without_changes() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Monthly));
    let incidents = Arc::new(InMemoryIncidents::default());

    let outcome = usecase(&billing, &incidents, MockPaymentGateway::new())
        .handle_webhook(signed_webhook(PR1, "Failed"))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::Ignored);
    assert!(billing.record(PR1).unwrap().is_pending());
    assert_eq!(billing.entitlement_writes(), 0);
}

#[tokio::test]
async fn webhook_for_unknown_payment_is_not_found() {
    let billing = Arc::new(InMemoryBilling::default());
    let incidents = Arc::new(InMemoryIncidents::default());

    let err = usecase(&billing, &incidents, MockPaymentGateway::new())
        .handle_webhook(signed_webhook("PR404", "Credit"))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::NotFound));
}

#[tokio::test]
async fn transient_write_failures_are_retried() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Monthly));
    let incidents = Arc::new(InMemoryIncidents::default());
    billing.fail_next_completions(2);

    let response = usecase(&billing, &incidents, gateway_reporting("Completed"))
        .verify_payment(user_id, verify_request(PR1))
        .await
        .unwrap();

    assert_eq!(response, VerifyPaymentResponse::verified());
    assert_eq!(billing.entitlement_writes(), 1);
    assert!(incidents.recorded().is_empty());
}

#[tokio::test]
async fn exhausted_retries_surface_persistence_error_and_record_incident() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Monthly));
    let incidents = Arc::new(InMemoryIncidents::default());
    billing.fail_next_completions(3);

    let err = usecase(&billing, &incidents, gateway_reporting("Completed"))
        .verify_payment(user_id, verify_request(PR1))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::Persistence(_)));
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(billing.record(PR1).unwrap().is_pending());
    assert_eq!(billing.entitlement_writes(), 0);

    let recorded = incidents.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].payment_request_id, PR1);
    assert_eq!(recorded[0].user_id, Some(user_id));
    assert_eq!(recorded[0].triggered_by, "verify");
}

#[tokio::test]
async fn gateway_failure_on_verify_is_a_server_error() {
    let user_id = Uuid::new_v4();
    let billing = Arc::new(InMemoryBilling::with_pending(user_id, PR1, PlanType::Monthly));
    let incidents = Arc::new(InMemoryIncidents::default());
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_get_payment_request().returning(|_| {
        Err(GatewayError::Api {
            context: "get payment request",
            status: 502,
            body: "bad gateway".to_string(),
        })
    });

    let err = usecase(&billing, &incidents, gateway)
        .verify_payment(user_id, verify_request(PR1))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::Gateway(_)));
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!err.public_message().contains("bad gateway"));
    assert!(billing.record(PR1).unwrap().is_pending());
}
