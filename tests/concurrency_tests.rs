mod common;

use common::{CUSTOMER, MERCHANT, balance_of, customer, in_memory_service, merchant, request, total};
use money_movement::application::service::AuthorizeRequest;
use money_movement::domain::account::AccountRole;
use money_movement::domain::event::LEDGER_TOPIC;
use money_movement::domain::ports::{EventPublisherRef, LedgerStoreRef};
use money_movement::error::PaymentError;
use money_movement::infrastructure::broker::InMemoryBroker;
use money_movement::infrastructure::in_memory::InMemoryLedgerStore;
use std::sync::Arc;

#[tokio::test]
async fn test_ports_as_shared_trait_objects() {
    let store: LedgerStoreRef = Arc::new(InMemoryLedgerStore::new());
    let publisher: EventPublisherRef = Arc::new(InMemoryBroker::new());

    // Verify Send + Sync by spawning tasks
    let store_handle = tokio::spawn({
        let store = store.clone();
        async move { store.balances().await.unwrap().len() }
    });
    let publisher_handle = tokio::spawn({
        let publisher = publisher.clone();
        async move { publisher.publish("ledger", b"{}".to_vec()).await.unwrap() }
    });

    assert_eq!(store_handle.await.unwrap(), 0);
    assert_eq!(publisher_handle.await.unwrap().offset, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_authorizes_never_overdraw() {
    let (service, _) = in_memory_service();
    service.provision_wallet(&customer(CUSTOMER, 1_000)).await.unwrap();
    service.provision_wallet(&merchant(MERCHANT)).await.unwrap();

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.authorize(&request(100, "USD")).await })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(e) => assert!(matches!(e, PaymentError::FailedPrecondition(_)), "{e}"),
        }
    }

    assert_eq!(accepted, 10);
    assert_eq!(balance_of(&service, CUSTOMER, AccountRole::Default).await, 0);
    assert_eq!(balance_of(&service, CUSTOMER, AccountRole::Payment).await, 1_000);
    assert_eq!(total(&service).await, 1_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_captures_settle_each_payment_once() {
    let (service, broker) = in_memory_service();
    service.provision_wallet(&merchant(MERCHANT)).await.unwrap();

    let mut pids = Vec::new();
    for i in 0..8 {
        let user = format!("customer-{i}");
        service.provision_wallet(&customer(&user, 500)).await.unwrap();
        let req = AuthorizeRequest {
            customer_wallet_user_id: user,
            ..request(500, "USD")
        };
        pids.push(service.authorize(&req).await.unwrap());
    }

    // Two racing captures per payment: exactly one of each pair wins.
    let handles: Vec<_> = pids
        .iter()
        .chain(pids.iter())
        .cloned()
        .map(|pid| {
            let service = service.clone();
            tokio::spawn(async move { service.capture(&pid).await })
        })
        .collect();

    let mut captured = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => captured += 1,
            Err(e) => assert!(matches!(e, PaymentError::FailedPrecondition(_)), "{e}"),
        }
    }

    assert_eq!(captured, pids.len());
    assert_eq!(balance_of(&service, MERCHANT, AccountRole::Incoming).await, 4_000);
    assert_eq!(total(&service).await, 4_000);
    assert_eq!(broker.messages(LEDGER_TOPIC).await.len(), pids.len());
}
