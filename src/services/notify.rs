use serde::Serialize;
use uuid::Uuid;

/// Payload handed to the notification collaborator when a cash order is
/// created and staff should go collect payment.
#[derive(Debug, Clone, Serialize)]
pub struct NewCashOrderNotice {
    pub order_id: Uuid,
    pub event_id: Uuid,
    pub order_number: String,
    pub buyer_name: String,
    pub total_cents: i64,
}

/// Outbound staff notification. Strictly best-effort: implementations must
/// not block and must swallow their own delivery failures, because order
/// creation never fails on a notification problem.
pub trait Notifier: Send + Sync {
    fn notify_new_cash_order(&self, notice: NewCashOrderNotice);
}

/// Default collaborator: emits a structured log line. A real deployment
/// swaps in a push/SMS integration behind the same trait.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_new_cash_order(&self, notice: NewCashOrderNotice) {
        tracing::info!(
            order_id = %notice.order_id,
            event_id = %notice.event_id,
            order_number = %notice.order_number,
            buyer = %notice.buyer_name,
            total_cents = notice.total_cents,
            "new cash order awaiting in-person payment"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<NewCashOrderNotice>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify_new_cash_order(&self, notice: NewCashOrderNotice) {
            self.seen.lock().unwrap().push(notice);
        }
    }

    fn notice() -> NewCashOrderNotice {
        NewCashOrderNotice {
            order_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            order_number: "CSH-20260826-AB12".to_string(),
            buyer_name: "Ada".to_string(),
            total_cents: 5000,
        }
    }

    #[test]
    fn notices_pass_through_trait_object() {
        let recorder = RecordingNotifier::default();
        let notifier: &dyn Notifier = &recorder;

        notifier.notify_new_cash_order(notice());

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].total_cents, 5000);
    }

    // Order creation hands the notice to a spawned task, the shape used in
    // create_cash_order: the request path moves on while delivery happens
    // off to the side.
    #[tokio::test]
    async fn spawned_dispatch_reaches_the_notifier() {
        let recorder: Arc<RecordingNotifier> = Arc::new(RecordingNotifier::default());
        let notifier: Arc<dyn Notifier> = recorder.clone();

        let notice = notice();
        let handle = tokio::spawn(async move {
            notifier.notify_new_cash_order(notice);
        });
        handle.await.unwrap();

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].buyer_name, "Ada");
    }
}
