use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::records::{EnrollmentView, PaymentView};

/// Half-open `[from, until)` range over UTC instants. Unset bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Converts inclusive calendar days in `offset` into a UTC window. The
    /// upper bound becomes midnight of the following day.
    pub fn from_local_days(
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            from: from.map(|day| local_midnight(day, offset)),
            until: to
                .and_then(|day| day.succ_opt())
                .map(|day| local_midnight(day, offset)),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.until.map_or(true, |until| at < until)
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.until.is_none()
    }
}

fn local_midnight(day: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = day.and_time(NaiveTime::MIN);
    let utc = local - chrono::Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&utc)
}

/// Case-insensitive substring test used by listing searches.
pub fn contains_folded(haystack: Option<&str>, needle_lower: &str) -> bool {
    haystack.is_some_and(|value| value.to_lowercase().contains(needle_lower))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentFilter {
    pub course_label: Option<String>,
    pub confirmed: Option<bool>,
    pub verified: Option<bool>,
    pub coin: Option<bool>,
    pub badge: Option<bool>,
    pub delivered: Option<bool>,
    /// Matches grade, first name, last name or national id.
    pub search: Option<String>,
    pub created: TimeWindow,
}

impl PaymentFilter {
    pub fn matches(&self, view: &PaymentView) -> bool {
        let payment = &view.payment;
        if let Some(label) = &self.course_label {
            if payment.course_label.as_deref() != Some(label.as_str()) {
                return false;
            }
        }
        let flags = [
            (self.confirmed, payment.confirmed),
            (self.verified, payment.verified),
            (self.coin, payment.coin),
            (self.badge, payment.badge),
            (self.delivered, payment.delivered),
        ];
        if flags
            .iter()
            .any(|(wanted, actual)| wanted.is_some_and(|wanted| wanted != *actual))
        {
            return false;
        }
        self.created.contains(payment.created_at) && self.matches_search(view)
    }

    pub fn matches_search(&self, view: &PaymentView) -> bool {
        let Some(needle) = self.search_needle() else {
            return true;
        };
        let person = &view.person;
        [
            person.grade.as_deref(),
            person.first_name.as_deref(),
            person.last_name.as_deref(),
            person.national_id.as_deref(),
        ]
        .into_iter()
        .any(|field| contains_folded(field, &needle))
    }

    fn search_needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrollmentFilter {
    pub created: TimeWindow,
    pub updated: TimeWindow,
    pub course_label: Option<String>,
    pub edited_by: Option<String>,
    /// Keep only rows carrying a non-blank observation.
    pub with_observation: bool,
}

impl EnrollmentFilter {
    pub fn matches(&self, view: &EnrollmentView) -> bool {
        let enrollment = &view.enrollment;
        if let Some(label) = &self.course_label {
            if enrollment.course_label.as_deref() != Some(label.as_str()) {
                return false;
            }
        }
        if let Some(editor) = &self.edited_by {
            if enrollment.edited_by.as_deref() != Some(editor.as_str()) {
                return false;
            }
        }
        if self.with_observation && !enrollment.has_observation() {
            return false;
        }
        self.created.contains(enrollment.created_at) && self.updated.contains(enrollment.updated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).expect("valid offset")
    }

    #[test]
    fn local_days_are_inclusive_on_both_ends() {
        let window = TimeWindow::from_local_days(
            NaiveDate::from_ymd_opt(2025, 3, 1),
            NaiveDate::from_ymd_opt(2025, 3, 1),
            offset(),
        );

        let start = Utc.with_ymd_and_hms(2025, 3, 1, 5, 0, 0).unwrap();
        let last_local_minute = Utc.with_ymd_and_hms(2025, 3, 2, 4, 59, 0).unwrap();
        let next_local_day = Utc.with_ymd_and_hms(2025, 3, 2, 5, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2025, 3, 1, 4, 59, 59).unwrap();

        assert!(window.contains(start));
        assert!(window.contains(last_local_minute));
        assert!(!window.contains(next_local_day));
        assert!(!window.contains(before));
    }

    #[test]
    fn open_bounds_accept_everything() {
        let window = TimeWindow::unbounded();
        assert!(window.is_unbounded());
        assert!(window.contains(Utc::now()));

        let window = TimeWindow::from_local_days(NaiveDate::from_ymd_opt(2025, 1, 10), None, offset());
        assert!(window.until.is_none());
        assert!(window.contains(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn folded_search_ignores_case_of_accented_letters() {
        assert!(contains_folded(Some("Teniente PÉREZ"), "pérez"));
        assert!(!contains_folded(Some("Teniente"), "capitán"));
        assert!(!contains_folded(None, "x"));
    }
}
