use crate::domain::account::Amount;
use crate::domain::event::{DomainEvent, Event};
use crate::domain::ports::{Delivery, EventPublisherRef};
use crate::domain::transaction::Pid;
use crate::error::{PaymentError, Result};
use chrono::{NaiveDate, Utc};
use tracing::{error, info};

/// Outcome of publishing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    pub topic: String,
    pub result: Result<Delivery>,
}

/// Which capture events reached the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub ledger: EventOutcome,
    pub email: EventOutcome,
}

impl PublishReport {
    pub fn all_delivered(&self) -> bool {
        self.ledger.result.is_ok() && self.email.result.is_ok()
    }

    /// Topics whose send failed.
    pub fn failed_topics(&self) -> Vec<&str> {
        [&self.ledger, &self.email]
            .into_iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.topic.as_str())
            .collect()
    }
}

/// Fans a committed capture out to the ledger and email topics.
///
/// Both sends run concurrently and the call returns once both have been
/// acknowledged or have failed. Failures are logged and reported, never
/// retried.
#[derive(Clone)]
pub struct CaptureNotifier {
    publisher: EventPublisherRef,
}

impl CaptureNotifier {
    pub fn new(publisher: EventPublisherRef) -> Self {
        Self { publisher }
    }

    pub async fn notify_capture(&self, pid: &Pid, user_id: &str, amount: Amount) -> PublishReport {
        self.notify_capture_on(pid, user_id, amount, Utc::now().date_naive())
            .await
    }

    pub async fn notify_capture_on(
        &self,
        pid: &Pid,
        user_id: &str,
        amount: Amount,
        date: NaiveDate,
    ) -> PublishReport {
        info!(%pid, user_id, amount = amount.cents(), "sending capture message");
        let [ledger, email] = DomainEvent::for_capture(pid, user_id, amount, date);
        let (ledger, email) = tokio::join!(self.send(&ledger), self.send(&email));
        PublishReport { ledger, email }
    }

    async fn send(&self, event: &DomainEvent) -> EventOutcome {
        let topic = event.topic().to_string();
        let result = match event.serialize() {
            Ok(payload) => self.publisher.publish(&topic, payload).await,
            Err(e) => Err(PaymentError::internal("failed to marshal message", e)),
        };
        match &result {
            Ok(delivery) => info!(
                topic = %delivery.topic,
                partition = delivery.partition,
                offset = delivery.offset,
                "message sent"
            ),
            Err(e) => error!(%topic, error = %e, "failed to send message"),
        }
        EventOutcome { topic, result }
    }
}
