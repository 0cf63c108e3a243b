use std::collections::HashSet;

use chrono::FixedOffset;

use super::buckets::{count_by_band, count_by_day, count_by_label, round_cents, sum_by_day};
use super::views::{ConceptSummary, EnrollmentDashboard, ObservationDashboard, PaymentDashboard};
use crate::config::ReportingConfig;
use crate::records::{EnrollmentView, Payment, PaymentView};

pub const UNSPECIFIED: &str = "unspecified";
pub const UNKNOWN_EDITOR: &str = "unknown";
pub const NO_COURSE: &str = "no course";

pub fn summarize_enrollments(rows: &[EnrollmentView], offset: FixedOffset) -> EnrollmentDashboard {
    let created = || rows.iter().map(|row| row.enrollment.created_at);
    EnrollmentDashboard {
        total: rows.len(),
        by_grade: count_by_label(rows.iter().map(|row| row.person.grade.as_deref()), UNSPECIFIED),
        by_subsystem: count_by_label(
            rows.iter().map(|row| row.person.subsystem.as_deref()),
            UNSPECIFIED,
        ),
        by_day: count_by_day(created(), offset),
        by_hour_band: count_by_band(created(), offset),
    }
}

/// Rows are expected to be pre-filtered to those carrying an observation.
pub fn summarize_observations(
    rows: &[EnrollmentView],
    offset: FixedOffset,
) -> ObservationDashboard {
    let updated = || rows.iter().map(|row| row.enrollment.updated_at);
    ObservationDashboard {
        total: rows.len(),
        by_day: count_by_day(updated(), offset),
        by_hour_band: count_by_band(updated(), offset),
        by_editor: count_by_label(
            rows.iter().map(|row| row.enrollment.edited_by.as_deref()),
            UNKNOWN_EDITOR,
        ),
    }
}

pub fn summarize_payments(rows: &[PaymentView], reporting: &ReportingConfig) -> PaymentDashboard {
    let offset = reporting.offset();
    let payments = || rows.iter().map(|row| &row.payment);

    let concept = |selected: fn(&Payment) -> bool, price: f64| {
        let count = payments().filter(|payment| selected(payment)).count();
        ConceptSummary {
            count,
            total: round_cents(count as f64 * price),
            delivered: payments()
                .filter(|payment| selected(payment) && payment.delivered)
                .count(),
        }
    };
    let coin = concept(|payment| payment.coin, reporting.coin_price);
    let badge = concept(|payment| payment.badge, reporting.badge_price);

    let distinct: HashSet<_> = payments()
        .map(|payment| (payment.enrollment_id, payment.course_label.clone()))
        .collect();

    PaymentDashboard {
        amount_total: round_cents(payments().map(|payment| payment.amount_deposited).sum()),
        payment_count: rows.len(),
        distinct_payments: distinct.len(),
        verified_count: payments().filter(|payment| payment.verified).count(),
        concepts_total: round_cents(coin.total + badge.total),
        coin,
        badge,
        amount_by_day: sum_by_day(
            payments().map(|payment| (payment.created_at, payment.amount_deposited)),
            offset,
        ),
        by_course: count_by_label(payments().map(|payment| payment.course_label.as_deref()), NO_COURSE),
        by_grade: count_by_label(rows.iter().map(|row| row.person.grade.as_deref()), UNSPECIFIED),
    }
}
