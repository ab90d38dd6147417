use std::{fmt::Debug, time::Duration};

use log::*;

use crate::{
    api::{
        errors::FulfillmentError,
        fulfillment_objects::{CompletionStatus, FulfillmentReport, OrderDiagnostics, SideEffectOutcome},
    },
    db_types::{NewEntitlement, Order, OrderId, OrderStatusType},
    events::{AnomalousVerdictEvent, EventProducers, OrderCompletedEvent, OrderFailedEvent},
    traits::{ArtifactCatalog, FulfillmentDatabase, GrantResult, NotificationError, Notifier, PurchaseConfirmation},
    verdict::{PaymentVerdict, VerdictOutcome},
};

pub const DEFAULT_EMAIL_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_EMAIL_LEASE_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy)]
pub struct FulfillmentOptions {
    /// Upper bound on a single confirmation email send. A send that takes longer counts as a failure.
    pub email_timeout: Duration,
    /// How long an unreleased email claim blocks other senders.
    pub email_lease: chrono::Duration,
}

impl Default for FulfillmentOptions {
    fn default() -> Self {
        Self {
            email_timeout: DEFAULT_EMAIL_TIMEOUT,
            email_lease: chrono::Duration::minutes(DEFAULT_EMAIL_LEASE_MINUTES),
        }
    }
}

/// `FulfillmentApi` applies payment verdicts to orders.
///
/// Every entry point (provider webhooks, the PayPal return URL, manual completion and admin retries) funnels through
/// [`Self::complete`] or [`Self::retry_side_effects`]. The status transition is committed first, through a
/// compare-and-set, and the side effects follow:
///
/// 1. The entitlement grant, skipped if `ea_delivered` is already set.
/// 2. The confirmation email, skipped if `email_sent` is already set, and guarded by a lease so that concurrent
///    completions cannot both send.
///
/// A side effect that fails is recorded on the order and reported, but never rolls back the status. Admins heal it
/// later with [`Self::retry_side_effects`].
pub struct FulfillmentApi<B, C, N> {
    db: B,
    catalog: C,
    notifier: N,
    producers: EventProducers,
    options: FulfillmentOptions,
}

impl<B, C, N> Debug for FulfillmentApi<B, C, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FulfillmentApi ({:?})", self.options)
    }
}

impl<B, C, N> FulfillmentApi<B, C, N> {
    pub fn new(db: B, catalog: C, notifier: N, producers: EventProducers) -> Self {
        Self { db, catalog, notifier, producers, options: FulfillmentOptions::default() }
    }

    pub fn with_options(mut self, options: FulfillmentOptions) -> Self {
        self.options = options;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }
}

impl<B, C, N> FulfillmentApi<B, C, N>
where
    B: FulfillmentDatabase,
    C: ArtifactCatalog,
    N: Notifier,
{
    /// Applies `verdict` to the order identified by `order_id`.
    ///
    /// | Order status \ Verdict | Success                                   | Failure                    |
    /// |------------------------|-------------------------------------------|----------------------------|
    /// | pending                | `Completed`, side effects run             | `Failed`                   |
    /// | completed              | `AlreadyCompleted`, missing effects run   | `StaleFailureIgnored`      |
    /// | failed                 | `SuccessOnFailedOrder`                    | `AlreadyFailed`            |
    ///
    /// The two rejected combinations leave the order untouched and emit an [`AnomalousVerdictEvent`].
    ///
    /// Errors are reserved for a missing order and for the store itself misbehaving. Side-effect failures are
    /// reported in the returned [`FulfillmentReport`].
    pub async fn complete(
        &self,
        order_id: &OrderId,
        verdict: &PaymentVerdict,
    ) -> Result<FulfillmentReport, FulfillmentError> {
        let order = self.load_order(order_id).await?;
        debug!(
            "🧾️ Applying {} verdict from {} to order [{order_id}] ({})",
            outcome_label(verdict),
            verdict.provider,
            order.status
        );
        match &verdict.outcome {
            VerdictOutcome::Failure { reason } => self.apply_failure(order, verdict, reason).await,
            VerdictOutcome::Success => self.apply_success(order, verdict).await,
        }
    }

    /// Re-runs the entitlement and email steps for a completed order. Steps that already succeeded are skipped.
    pub async fn retry_side_effects(&self, order_id: &OrderId) -> Result<FulfillmentReport, FulfillmentError> {
        let order = self.load_order(order_id).await?;
        if order.status != OrderStatusType::Completed {
            return Err(FulfillmentError::OrderNotCompleted(order.order_id, order.status));
        }
        let order =
            self.db.stamp_retry(order_id).await?.ok_or_else(|| FulfillmentError::OrderNotFound(order_id.clone()))?;
        info!("🧾️ Retrying side effects for order [{order_id}]");
        let (order, entitlement, email) = self.run_side_effects(order).await;
        Ok(FulfillmentReport { order, status: CompletionStatus::AlreadyCompleted, entitlement, email })
    }

    /// Fetches the order and its entitlement (if any) without changing anything.
    pub async fn diagnostics(&self, order_id: &OrderId) -> Result<OrderDiagnostics, FulfillmentError> {
        let order = self.load_order(order_id).await?;
        let entitlement = self.db.fetch_entitlement_for_order(order_id).await.map_err(FulfillmentError::unavailable)?;
        Ok(OrderDiagnostics { order, entitlement })
    }

    /// Grants the entitlement for `artifact_name` to the customer with `email`.
    ///
    /// The artifact must be in the catalog under exactly that name. Granting twice for the same order is harmless and
    /// returns [`GrantResult::AlreadyGranted`].
    pub async fn grant(
        &self,
        email: &str,
        artifact_name: &str,
        order_id: &OrderId,
    ) -> Result<GrantResult, FulfillmentError> {
        let artifact = self
            .catalog
            .find_by_name(artifact_name)
            .ok_or_else(|| FulfillmentError::ArtifactNotFound(artifact_name.to_string()))?;
        let entitlement = NewEntitlement::new(&artifact.name, &artifact.version, order_id.clone());
        let result = self.db.grant_entitlement(email, entitlement).await?;
        Ok(result)
    }

    async fn load_order(&self, order_id: &OrderId) -> Result<Order, FulfillmentError> {
        self.db
            .fetch_order_by_order_id(order_id)
            .await
            .map_err(FulfillmentError::unavailable)?
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.clone()))
    }

    async fn apply_failure(
        &self,
        order: Order,
        verdict: &PaymentVerdict,
        reason: &str,
    ) -> Result<FulfillmentReport, FulfillmentError> {
        if order.status.is_terminal() {
            return Ok(self.failure_on_terminal_order(order, verdict).await);
        }
        let tx_id = verdict.transaction_id.as_deref();
        match self.db.mark_order_failed(&order.order_id, reason, tx_id).await? {
            Some(failed) => {
                info!("🧾️ Order [{}] failed: {reason}", failed.order_id);
                self.call_order_failed_hook(&failed, reason).await;
                Ok(FulfillmentReport::without_side_effects(failed, CompletionStatus::Failed))
            },
            None => {
                // Someone else moved the order out of pending between our read and our write.
                let current = self.load_order(&order.order_id).await?;
                Ok(self.failure_on_terminal_order(current, verdict).await)
            },
        }
    }

    async fn failure_on_terminal_order(&self, order: Order, verdict: &PaymentVerdict) -> FulfillmentReport {
        if order.status == OrderStatusType::Completed {
            let note = format!(
                "{} reported a failure ({}) for order [{}], which is already completed. The verdict was ignored.",
                verdict.provider,
                verdict.failure_reason().unwrap_or("no reason given"),
                order.order_id
            );
            warn!("🧾️ {note}");
            self.call_anomalous_verdict_hook(&order, verdict, note).await;
            FulfillmentReport::without_side_effects(order, CompletionStatus::StaleFailureIgnored)
        } else {
            debug!("🧾️ Order [{}] has already failed. Nothing to do.", order.order_id);
            FulfillmentReport::without_side_effects(order, CompletionStatus::AlreadyFailed)
        }
    }

    async fn apply_success(
        &self,
        order: Order,
        verdict: &PaymentVerdict,
    ) -> Result<FulfillmentReport, FulfillmentError> {
        let (order, status) = match order.status {
            OrderStatusType::Failed => return Ok(self.success_on_failed_order(order, verdict).await),
            OrderStatusType::Completed => (order, CompletionStatus::AlreadyCompleted),
            OrderStatusType::Pending => {
                let tx_id = verdict.transaction_id.as_deref();
                match self.db.mark_order_completed(&order.order_id, tx_id).await? {
                    Some(completed) => {
                        info!("🧾️ Order [{}] is paid ({})", completed.order_id, verdict.provider);
                        self.call_order_completed_hook(&completed).await;
                        (completed, CompletionStatus::Completed)
                    },
                    None => {
                        let current = self.load_order(&order.order_id).await?;
                        match current.status {
                            OrderStatusType::Completed => (current, CompletionStatus::AlreadyCompleted),
                            OrderStatusType::Failed => return Ok(self.success_on_failed_order(current, verdict).await),
                            OrderStatusType::Pending => {
                                error!("🧾️ Order [{}] is still pending after a rejected completion", current.order_id);
                                return Err(FulfillmentError::DatabaseError(format!(
                                    "Could not mark order {} as completed",
                                    current.order_id
                                )));
                            },
                        }
                    },
                }
            },
        };
        let (order, entitlement, email) = self.run_side_effects(order).await;
        Ok(FulfillmentReport { order, status, entitlement, email })
    }

    async fn success_on_failed_order(&self, order: Order, verdict: &PaymentVerdict) -> FulfillmentReport {
        let note = format!(
            "{} reported a successful payment (tx {}) for order [{}], which has already failed. The payment needs \
             manual review.",
            verdict.provider,
            verdict.transaction_id.as_deref().unwrap_or("unknown"),
            order.order_id
        );
        error!("🧾️ {note}");
        self.call_anomalous_verdict_hook(&order, verdict, note).await;
        FulfillmentReport::without_side_effects(order, CompletionStatus::SuccessOnFailedOrder)
    }

    /// Runs the entitlement and email steps for a completed order and returns the refreshed order record.
    async fn run_side_effects(&self, order: Order) -> (Order, SideEffectOutcome, SideEffectOutcome) {
        let entitlement = if order.ea_delivered {
            SideEffectOutcome::AlreadyDone
        } else {
            self.deliver_entitlement(&order).await
        };
        let email =
            if order.email_sent { SideEffectOutcome::AlreadyDone } else { self.send_confirmation(&order).await };
        let order = match self.db.fetch_order_by_order_id(&order.order_id).await {
            Ok(Some(refreshed)) => refreshed,
            Ok(None) => order,
            Err(e) => {
                warn!("🧾️ Could not refresh order [{}] after side effects: {e}", order.order_id);
                order
            },
        };
        (order, entitlement, email)
    }

    async fn deliver_entitlement(&self, order: &Order) -> SideEffectOutcome {
        let result = self.grant(&order.customer_email, &order.artifact_name, &order.order_id).await;
        let (outcome, error) = match result {
            Ok(GrantResult::Granted(e)) => {
                info!("🎟️ {} can now download {} ({})", order.customer_email, e.artifact_name, e.id);
                (SideEffectOutcome::Performed, None)
            },
            Ok(GrantResult::AlreadyGranted(e)) => {
                debug!("🎟️ Entitlement {} was already in place", e.id);
                (SideEffectOutcome::AlreadyDone, None)
            },
            Err(e) => {
                error!("🎟️ Could not grant entitlement for order [{}]: {e}", order.order_id);
                (SideEffectOutcome::Failed(e.to_string()), Some(e.to_string()))
            },
        };
        if let Err(e) = self.db.record_entitlement_outcome(&order.order_id, error.as_deref()).await {
            error!("🎟️ Could not record entitlement outcome for order [{}]: {e}", order.order_id);
        }
        outcome
    }

    async fn send_confirmation(&self, order: &Order) -> SideEffectOutcome {
        match self.db.claim_email_lease(&order.order_id, self.options.email_lease).await {
            Ok(true) => {},
            Ok(false) => {
                debug!("✉️ Confirmation email for order [{}] is sent or being sent elsewhere", order.order_id);
                return SideEffectOutcome::NotAttempted;
            },
            Err(e) => {
                error!("✉️ Could not claim the email lease for order [{}]: {e}", order.order_id);
                return SideEffectOutcome::Failed(e.to_string());
            },
        }
        let confirmation = PurchaseConfirmation {
            order_id: order.order_id.clone(),
            email: order.customer_email.clone(),
            artifact_name: order.artifact_name.clone(),
            version: self.catalog.find_by_name(&order.artifact_name).map(|a| a.version),
            amount: order.amount,
            currency: order.currency.clone(),
            transaction_id: order.transaction_id.clone(),
        };
        let timeout = self.options.email_timeout;
        let result =
            match tokio::time::timeout(timeout, self.notifier.send_purchase_confirmation(&confirmation)).await {
                Ok(result) => result,
                Err(_) => Err(NotificationError::Timeout(timeout.as_secs())),
            };
        let error = result.as_ref().err().map(|e| FulfillmentError::NotificationFailed(e.to_string()).to_string());
        if let Err(e) = self.db.record_email_outcome(&order.order_id, error.as_deref()).await {
            error!("✉️ Could not record email outcome for order [{}]: {e}", order.order_id);
        }
        match error {
            None => {
                info!("✉️ Purchase confirmation sent to {} for order [{}]", order.customer_email, order.order_id);
                SideEffectOutcome::Performed
            },
            Some(msg) => {
                warn!("✉️ Purchase confirmation for order [{}] was not sent: {msg}", order.order_id);
                SideEffectOutcome::Failed(msg)
            },
        }
    }

    async fn call_order_completed_hook(&self, order: &Order) {
        for emitter in &self.producers.order_completed_producer {
            debug!("🧾️ Notifying order completed hook subscribers");
            emitter.publish_event(OrderCompletedEvent::new(order.clone())).await;
        }
    }

    async fn call_order_failed_hook(&self, order: &Order, reason: &str) {
        for emitter in &self.producers.order_failed_producer {
            debug!("🧾️ Notifying order failed hook subscribers");
            emitter.publish_event(OrderFailedEvent::new(order.clone(), reason)).await;
        }
    }

    async fn call_anomalous_verdict_hook(&self, order: &Order, verdict: &PaymentVerdict, note: String) {
        for emitter in &self.producers.anomalous_verdict_producer {
            debug!("🧾️ Notifying anomalous verdict hook subscribers");
            emitter.publish_event(AnomalousVerdictEvent::new(order.clone(), verdict.clone(), note.clone())).await;
        }
    }
}

fn outcome_label(verdict: &PaymentVerdict) -> &'static str {
    if verdict.is_success() {
        "success"
    } else {
        "failure"
    }
}
