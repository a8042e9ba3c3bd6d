use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;

use super::capital_calls_model::{
    CallReminder, CapitalCall, CapitalCallDatesUpdate, CapitalCallPayment, CapitalCallStatus,
    CapitalCallStatusUpdate, CreatedCapitalCall, NewCapitalCall, NewCapitalCallPayment,
    RecordedPayment, ScheduledCalls, UpdatedCapitalCall,
};
use super::capital_calls_traits::{CapitalCallRepositoryTrait, CapitalCallServiceTrait};
use super::scheduler::{CapitalCallScheduler, ScheduleExpansion, ScheduleSpec};
use crate::allocations::{Allocation, AllocationRepositoryTrait};
use crate::dates::DateNormalizer;
use crate::errors::{Error, Result, ValidationError};
use crate::events::{DomainEvent, DomainEventSink};
use crate::settings::FundingSettings;
use crate::timeline::{
    NewTimelineEntry, TimelineEntry, TimelineRepositoryTrait, ACTION_CAPITAL_CALLS_SCHEDULED,
    ACTION_CAPITAL_CALL_DATES_CHANGED, ACTION_CAPITAL_CALL_DELETED,
    ACTION_CAPITAL_CALL_STATUS_CHANGED, ACTION_PAYMENT_RECORDED, ENTITY_ALLOCATION,
    ENTITY_CAPITAL_CALL,
};

/// Orchestrates scheduling, status edits and payments for capital calls.
pub struct CapitalCallService {
    repository: Arc<dyn CapitalCallRepositoryTrait>,
    allocation_repository: Arc<dyn AllocationRepositoryTrait>,
    timeline: Arc<dyn TimelineRepositoryTrait>,
    event_sink: Arc<dyn DomainEventSink>,
    scheduler: CapitalCallScheduler,
}

impl CapitalCallService {
    /// Fails with `InvalidConfigValue` when `settings` do not validate.
    pub fn new(
        repository: Arc<dyn CapitalCallRepositoryTrait>,
        allocation_repository: Arc<dyn AllocationRepositoryTrait>,
        timeline: Arc<dyn TimelineRepositoryTrait>,
        event_sink: Arc<dyn DomainEventSink>,
        settings: &FundingSettings,
    ) -> Result<Self> {
        Ok(Self {
            repository,
            allocation_repository,
            timeline,
            event_sink,
            scheduler: CapitalCallScheduler::new(settings)?,
        })
    }

    fn normalizer(&self) -> &DateNormalizer {
        self.scheduler.normalizer()
    }

    /// Total of the non-deleted calls already created for an allocation.
    fn called_to_date(&self, allocation_id: &str) -> Result<Decimal> {
        Ok(self
            .repository
            .list_by_allocation(allocation_id, false)?
            .iter()
            .map(|call| call.call_amount)
            .sum())
    }

    fn expand_for(&self, allocation: &Allocation, spec: &ScheduleSpec) -> Result<ScheduleExpansion> {
        let existing = self.called_to_date(&allocation.id)?;
        self.scheduler
            .expand(allocation.committed_amount, existing, spec)
    }

    async fn append_timeline(
        &self,
        allocation_id: &str,
        entry: impl FnOnce(String) -> NewTimelineEntry + Send,
    ) -> Result<TimelineEntry> {
        let allocation = self.allocation_repository.get_by_id(allocation_id)?;
        self.timeline.append(entry(allocation.deal_id)).await
    }

    /// Appends a timeline entry on a best-effort basis.
    ///
    /// Returns a warning when the entry could not be written.
    async fn record_call_activity(
        &self,
        call: &CapitalCall,
        action: &str,
        description: String,
        user_id: Option<String>,
        metadata: Value,
    ) -> Option<String> {
        let call_id = call.id.clone();
        let result = self
            .append_timeline(&call.allocation_id, |deal_id| {
                NewTimelineEntry::new(deal_id, ENTITY_CAPITAL_CALL, call_id, action, description)
                    .with_user(user_id)
                    .with_metadata(metadata)
            })
            .await;

        match result {
            Ok(_) => None,
            Err(e) => {
                let message = format!(
                    "Timeline entry '{}' for capital call {} was not recorded: {}",
                    action, call.id, e
                );
                warn!("{}", message);
                Some(message)
            }
        }
    }

    fn emit_call_changed(&self, call: &CapitalCall) {
        self.event_sink.emit(DomainEvent::capital_call_changed(
            call.id.clone(),
            call.allocation_id.clone(),
            call.status,
        ));
    }

    async fn change_status(
        &self,
        call_id: &str,
        target: CapitalCallStatus,
        expected_paid: Option<Decimal>,
    ) -> Result<UpdatedCapitalCall> {
        let transition = self
            .repository
            .apply_transition(call_id, target, expected_paid)
            .await
            .map_err(|e| log_failure("update_status", call_id, e))?;
        let call = transition.capital_call;
        debug!(
            "Capital call {} moved from '{}' to '{}'",
            call.id, transition.previous_status, call.status
        );

        let warnings = self
            .record_call_activity(
                &call,
                ACTION_CAPITAL_CALL_STATUS_CHANGED,
                format!("Capital call status changed to {}", call.status),
                None,
                json!({ "from": transition.previous_status, "to": call.status }),
            )
            .await
            .into_iter()
            .collect();
        self.emit_call_changed(&call);
        Ok(UpdatedCapitalCall {
            capital_call: call,
            warnings,
        })
    }
}

fn log_failure(operation: &str, call_id: &str, err: Error) -> Error {
    if err.is_internal() {
        error!("{} failed for capital call {}: {}", operation, call_id, err);
    } else {
        debug!("{} rejected for capital call {}: {}", operation, call_id, err);
    }
    err
}

#[async_trait]
impl CapitalCallServiceTrait for CapitalCallService {
    async fn create_capital_call(&self, new_call: NewCapitalCall) -> Result<CreatedCapitalCall> {
        new_call.validate()?;
        let allocation = self.allocation_repository.get_by_id(&new_call.allocation_id)?;
        let existing = self.called_to_date(&allocation.id)?;
        let expansion =
            self.scheduler
                .expand_single_call(allocation.committed_amount, existing, &new_call)?;

        let status = new_call.status.unwrap_or_default();
        let mut created = self
            .repository
            .create_calls(&allocation.id, expansion.calls, status)
            .await
            .map_err(|e| log_failure("create_capital_call", &allocation.id, e))?;
        let capital_call = created
            .pop()
            .ok_or_else(|| Error::Unexpected("No capital call was created".to_string()))?;
        debug!(
            "Created capital call {} for {} on allocation {}",
            capital_call.id, capital_call.call_amount, allocation.id
        );

        let mut warnings = expansion.warnings;
        if let Some(warning) = self
            .record_call_activity(
                &capital_call,
                ACTION_CAPITAL_CALLS_SCHEDULED,
                format!(
                    "Capital call of {} due {}",
                    capital_call.call_amount,
                    capital_call.due_date.date_naive()
                ),
                None,
                json!({ "callAmount": capital_call.call_amount.to_string() }),
            )
            .await
        {
            warnings.push(warning);
        }

        self.event_sink.emit(DomainEvent::capital_calls_scheduled(
            allocation.id.clone(),
            vec![capital_call.id.clone()],
        ));
        Ok(CreatedCapitalCall {
            capital_call,
            warnings,
        })
    }

    fn preview_schedule(&self, allocation_id: &str, spec: &ScheduleSpec) -> Result<ScheduleExpansion> {
        let allocation = self.allocation_repository.get_by_id(allocation_id)?;
        self.expand_for(&allocation, spec)
    }

    async fn create_schedule(&self, allocation_id: &str, spec: ScheduleSpec) -> Result<ScheduledCalls> {
        let allocation = self.allocation_repository.get_by_id(allocation_id)?;
        let expansion = self.expand_for(&allocation, &spec)?;
        let call_count = expansion.calls.len();
        let total = expansion.scheduled_amount;

        let capital_calls = self
            .repository
            .create_calls(&allocation.id, expansion.calls, CapitalCallStatus::Scheduled)
            .await
            .map_err(|e| log_failure("create_schedule", allocation_id, e))?;
        debug!(
            "Scheduled {} capital calls totalling {} on allocation {}",
            call_count, total, allocation.id
        );

        let mut warnings = expansion.warnings;
        let allocation_ref = allocation.id.clone();
        let call_ids: Vec<String> = capital_calls.iter().map(|c| c.id.clone()).collect();
        let metadata = json!({
            "kind": spec.kind,
            "capitalCallIds": call_ids,
            "totalAmount": total.to_string(),
        });
        let timeline_result = self
            .append_timeline(&allocation.id, |deal_id| {
                NewTimelineEntry::new(
                    deal_id,
                    ENTITY_ALLOCATION,
                    allocation_ref,
                    ACTION_CAPITAL_CALLS_SCHEDULED,
                    format!("{} capital calls scheduled totalling {}", call_count, total),
                )
                .with_metadata(metadata)
            })
            .await;
        if let Err(e) = timeline_result {
            let message = format!(
                "Timeline entry for the schedule on allocation {} was not recorded: {}",
                allocation.id, e
            );
            warn!("{}", message);
            warnings.push(message);
        }

        self.event_sink.emit(DomainEvent::capital_calls_scheduled(
            allocation.id.clone(),
            call_ids,
        ));
        Ok(ScheduledCalls {
            capital_calls,
            warnings,
        })
    }

    async fn update_status(&self, update: CapitalCallStatusUpdate) -> Result<UpdatedCapitalCall> {
        self.change_status(&update.id, update.status, update.paid_amount)
            .await
    }

    async fn issue_capital_call(&self, call_id: &str) -> Result<UpdatedCapitalCall> {
        self.change_status(call_id, CapitalCallStatus::Called, None)
            .await
    }

    async fn mark_defaulted(&self, call_id: &str) -> Result<UpdatedCapitalCall> {
        self.change_status(call_id, CapitalCallStatus::Defaulted, None)
            .await
    }

    async fn update_dates(&self, update: CapitalCallDatesUpdate) -> Result<UpdatedCapitalCall> {
        let call_date = self.normalizer().normalize(update.call_date);
        let due_date = match update.due_date {
            Some(due) => self.normalizer().normalize(due),
            None => self.normalizer().due_date_from(call_date),
        };

        let call = self
            .repository
            .update_dates(&update.id, call_date, due_date)
            .await
            .map_err(|e| log_failure("update_dates", &update.id, e))?;

        let warnings = self
            .record_call_activity(
                &call,
                ACTION_CAPITAL_CALL_DATES_CHANGED,
                format!(
                    "Capital call moved to {}, due {}",
                    call.call_date.date_naive(),
                    call.due_date.date_naive()
                ),
                None,
                json!({ "callDate": call.call_date, "dueDate": call.due_date }),
            )
            .await
            .into_iter()
            .collect();
        self.emit_call_changed(&call);
        Ok(UpdatedCapitalCall {
            capital_call: call,
            warnings,
        })
    }

    async fn delete_capital_call(&self, call_id: &str) -> Result<UpdatedCapitalCall> {
        let call = self
            .repository
            .soft_delete(call_id)
            .await
            .map_err(|e| log_failure("delete_capital_call", call_id, e))?;

        let warnings = self
            .record_call_activity(
                &call,
                ACTION_CAPITAL_CALL_DELETED,
                format!("Capital call of {} removed", call.call_amount),
                None,
                json!({ "status": call.status }),
            )
            .await
            .into_iter()
            .collect();
        self.emit_call_changed(&call);
        Ok(UpdatedCapitalCall {
            capital_call: call,
            warnings,
        })
    }

    async fn add_payment(&self, mut payment: NewCapitalCallPayment) -> Result<RecordedPayment> {
        payment.validate()?;
        payment.payment_date = self.normalizer().normalize(payment.payment_date);
        let call_id = payment.capital_call_id.clone();
        let recorded_by = payment.recorded_by.clone();

        let application = self
            .repository
            .record_payment(payment)
            .await
            .map_err(|e| log_failure("add_payment", &call_id, e))?;

        let mut warnings = Vec::new();
        if application.replayed {
            debug!(
                "Payment {} on capital call {} replayed from idempotency key",
                application.payment.id, call_id
            );
        } else {
            let call = &application.capital_call;
            debug!(
                "Applied payment {} of {} to capital call {}: paid {}, status '{}'",
                application.payment.id,
                application.payment.payment_amount,
                call.id,
                call.paid_amount,
                call.status
            );

            if let Some(warning) = self
                .record_call_activity(
                    call,
                    ACTION_PAYMENT_RECORDED,
                    format!(
                        "Payment of {} received by {}",
                        application.payment.payment_amount,
                        application.payment.payment_method.as_str()
                    ),
                    recorded_by,
                    json!({
                        "paymentId": application.payment.id,
                        "paymentAmount": application.payment.payment_amount.to_string(),
                        "paidAmount": call.paid_amount.to_string(),
                        "remainingAmount": call.remaining_amount().to_string(),
                        "status": call.status,
                    }),
                )
                .await
            {
                warnings.push(warning);
            }

            self.event_sink.emit(DomainEvent::payment_recorded(
                call.id.clone(),
                call.allocation_id.clone(),
                application.payment.id.clone(),
                application.payment.payment_amount,
                call.status,
            ));
        }

        Ok(RecordedPayment {
            capital_call: application.capital_call,
            payment: application.payment,
            payments: application.payments,
            replayed: application.replayed,
            warnings,
        })
    }

    fn get_capital_call(&self, call_id: &str) -> Result<CapitalCall> {
        self.repository.get_by_id(call_id)
    }

    fn get_payments(&self, call_id: &str) -> Result<Vec<CapitalCallPayment>> {
        // existence check so unknown ids are NotFound rather than empty
        self.repository.get_by_id(call_id)?;
        self.repository.list_payments(call_id)
    }

    fn list_by_allocation(&self, allocation_id: &str) -> Result<Vec<CapitalCall>> {
        self.repository.list_by_allocation(allocation_id, false)
    }

    fn list_by_deal(&self, deal_id: &str) -> Result<Vec<CapitalCall>> {
        self.repository.list_by_deal(deal_id)
    }

    fn list_calendar(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CapitalCall>> {
        ensure_range(start, end)?;
        let mut calls = self.repository.list_in_range(start, end)?;
        calls.sort_by(|a, b| a.call_date.cmp(&b.call_date).then_with(|| a.id.cmp(&b.id)));
        Ok(calls)
    }

    fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<CapitalCall>> {
        let mut calls: Vec<CapitalCall> = self
            .repository
            .list_open()?
            .into_iter()
            .filter(|call| self.normalizer().is_overdue(call.due_date, now))
            .collect();
        calls.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));
        Ok(calls)
    }

    fn reminders_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CallReminder>> {
        ensure_range(start, end)?;
        let mut reminders: Vec<CallReminder> = self
            .repository
            .list_open()?
            .into_iter()
            .flat_map(|call| {
                self.normalizer()
                    .reminder_dates(call.due_date)
                    .into_iter()
                    .filter(|remind_on| *remind_on >= start && *remind_on <= end)
                    .map(|remind_on| CallReminder {
                        capital_call_id: call.id.clone(),
                        allocation_id: call.allocation_id.clone(),
                        remind_on,
                        due_date: call.due_date,
                        outstanding_amount: call.remaining_amount(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        reminders.sort_by(|a, b| {
            a.remind_on
                .cmp(&b.remind_on)
                .then_with(|| a.capital_call_id.cmp(&b.capital_call_id))
        });
        Ok(reminders)
    }
}

fn ensure_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start > end {
        return Err(ValidationError::field(
            "end",
            format!("range end {} is before its start {}", end, start),
        )
        .into());
    }
    Ok(())
}
