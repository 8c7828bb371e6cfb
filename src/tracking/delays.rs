use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::info;

use crate::db::models::{NewDelay, NotificationDraft};
use crate::db::TrackingStore;
use crate::error::AppError;
use crate::tracking::DelaySeverity;

pub const DELAY_ALERT_TITLE: &str = "Bus Delay Alert";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DelayReport {
    pub delay_reason: Option<String>,
    pub delay_minutes: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportedDelay {
    pub delay_id: i64,
    pub severity: DelaySeverity,
    pub notified: usize,
}

pub fn delay_message(reason: &str, minutes: i32) -> String {
    let mut message = format!("Your bus is delayed. Reason: {}", reason);
    if minutes > 0 {
        message.push_str(&format!(" (Approx. {} minutes)", minutes));
    }
    message
}

/// Students riding `bus_id` followed by their parents, each user once.
pub async fn delay_recipients(store: &dyn TrackingStore, bus_id: i64) -> Result<Vec<i64>, AppError> {
    let mut seen = HashSet::new();
    let mut recipients = Vec::new();

    let students = store.students_on_bus(bus_id).await?;
    for &student_id in &students {
        if seen.insert(student_id) {
            recipients.push(student_id);
        }
    }
    for &student_id in &students {
        for parent_id in store.parents_of_student(student_id).await? {
            if seen.insert(parent_id) {
                recipients.push(parent_id);
            }
        }
    }

    Ok(recipients)
}

/// Validates a driver's report, classifies it and stores it together with
/// one notification per affected student and parent.
pub async fn report_delay(
    store: &dyn TrackingStore,
    driver_id: i64,
    bus_id: i64,
    report: &DelayReport,
    now: DateTime<Utc>,
) -> Result<ReportedDelay, AppError> {
    let reason = report
        .delay_reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::validation("Delay reason is required"))?;

    let minutes = report.delay_minutes.unwrap_or(0);
    if minutes < 0 {
        return Err(AppError::validation("Delay minutes cannot be negative"));
    }

    let severity = DelaySeverity::from_minutes(minutes);
    let trip_id = store.active_trip(driver_id, bus_id).await?;

    let message = delay_message(reason, minutes);
    let drafts: Vec<NotificationDraft> = delay_recipients(store, bus_id)
        .await?
        .into_iter()
        .map(|user_id| NotificationDraft {
            user_id,
            title: DELAY_ALERT_TITLE.to_string(),
            message: message.clone(),
        })
        .collect();

    let delay = NewDelay {
        trip_id,
        bus_id,
        driver_id,
        delay_reason: reason.to_string(),
        delay_minutes: minutes,
        severity: severity.as_str().to_string(),
        reported_at: now,
    };

    let delay_id = store.record_delay(&delay, &drafts).await?;
    info!(
        "Delay {} recorded for bus {} ({} min, {}), {} users notified",
        delay_id,
        bus_id,
        minutes,
        severity,
        drafts.len()
    );

    Ok(ReportedDelay {
        delay_id,
        severity,
        notified: drafts.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockTrackingStore;

    fn report(reason: &str, minutes: Option<i32>) -> DelayReport {
        DelayReport {
            delay_reason: Some(reason.to_string()),
            delay_minutes: minutes,
        }
    }

    #[test]
    fn message_mentions_minutes_only_when_positive() {
        assert_eq!(
            delay_message("Traffic jam", 12),
            "Your bus is delayed. Reason: Traffic jam (Approx. 12 minutes)"
        );
        assert_eq!(delay_message("Flat tyre", 0), "Your bus is delayed. Reason: Flat tyre");
    }

    #[tokio::test]
    async fn recipients_are_students_then_parents_without_duplicates() {
        let mut store = MockTrackingStore::new();
        store.expect_students_on_bus().returning(|_| Ok(vec![10, 11]));
        store.expect_parents_of_student().returning(|student_id| match student_id {
            10 => Ok(vec![20]),
            // siblings share a parent
            11 => Ok(vec![20, 21]),
            _ => Ok(vec![]),
        });

        let recipients = delay_recipients(&store, 3).await.unwrap();
        assert_eq!(recipients, vec![10, 11, 20, 21]);
    }

    #[tokio::test]
    async fn report_writes_delay_and_fan_out_together() {
        let mut store = MockTrackingStore::new();
        store.expect_active_trip().returning(|_, _| Ok(Some(77)));
        store.expect_students_on_bus().returning(|_| Ok(vec![10]));
        store.expect_parents_of_student().returning(|_| Ok(vec![20]));
        store
            .expect_record_delay()
            .times(1)
            .returning(|delay: &NewDelay, drafts: &[NotificationDraft]| {
                assert_eq!(delay.trip_id, Some(77));
                assert_eq!(delay.bus_id, 3);
                assert_eq!(delay.driver_id, 5);
                assert_eq!(delay.delay_reason, "Road works");
                assert_eq!(delay.severity, "High");
                let users: Vec<i64> = drafts.iter().map(|d| d.user_id).collect();
                assert_eq!(users, vec![10, 20]);
                assert!(drafts.iter().all(|d| d.title == DELAY_ALERT_TITLE));
                Ok(900)
            });

        let reported = report_delay(&store, 5, 3, &report("  Road works ", Some(20)), Utc::now())
            .await
            .unwrap();

        assert_eq!(reported.delay_id, 900);
        assert_eq!(reported.severity, DelaySeverity::High);
        assert_eq!(reported.notified, 2);
    }

    #[tokio::test]
    async fn missing_minutes_default_to_zero() {
        let mut store = MockTrackingStore::new();
        store.expect_active_trip().returning(|_, _| Ok(None));
        store.expect_students_on_bus().returning(|_| Ok(vec![]));
        store
            .expect_record_delay()
            .returning(|delay: &NewDelay, drafts: &[NotificationDraft]| {
                assert_eq!(delay.delay_minutes, 0);
                assert_eq!(delay.severity, "None");
                assert_eq!(delay.trip_id, None);
                assert!(drafts.is_empty());
                Ok(1)
            });

        let reported = report_delay(&store, 5, 3, &report("Waiting for students", None), Utc::now())
            .await
            .unwrap();
        assert_eq!(reported.notified, 0);
    }

    #[tokio::test]
    async fn blank_reason_is_rejected_before_any_query() {
        let store = MockTrackingStore::new();

        let err = report_delay(&store, 5, 3, &report("   ", Some(10)), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Delay reason is required");

        let err = report_delay(&store, 5, 3, &DelayReport::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn negative_minutes_are_rejected() {
        let store = MockTrackingStore::new();
        let err = report_delay(&store, 5, 3, &report("Traffic", Some(-3)), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Delay minutes cannot be negative");
    }
}
