use std::sync::Arc;

use serde::Deserialize;

use super::summary::{summarize_enrollments, summarize_observations, summarize_payments};
use super::views::{EnrollmentDashboard, ObservationDashboard, PaymentDashboard};
use crate::config::ReportingConfig;
use crate::store::{EnrollmentFilter, PaymentFilter, RecordStore, StoreError, TimeWindow};
use crate::workflows::enrollment::domain::non_blank;
use crate::workflows::payments::domain::parse_day;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrollmentDashboardQuery {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObservationDashboardQuery {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub edited_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentDashboardQuery {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub verified: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerifiedSelector {
    Verified,
    Unverified,
    #[default]
    All,
}

impl VerifiedSelector {
    pub fn parse(raw: Option<&str>) -> Result<Self, String> {
        match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
            None => Ok(Self::All),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "verified" => Ok(Self::Verified),
                "unverified" => Ok(Self::Unverified),
                "all" => Ok(Self::All),
                _ => Err("verified must be one of verified, unverified or all".to_string()),
            },
        }
    }

    fn as_flag(self) -> Option<bool> {
        match self {
            Self::Verified => Some(true),
            Self::Unverified => Some(false),
            Self::All => None,
        }
    }
}

/// `todos` and `all` select every value.
fn selector(raw: Option<String>) -> Option<String> {
    non_blank(raw).filter(|value| {
        !value.eq_ignore_ascii_case("todos") && !value.eq_ignore_ascii_case("all")
    })
}

pub struct DashboardService<S> {
    store: Arc<S>,
    reporting: ReportingConfig,
}

impl<S> DashboardService<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>, reporting: ReportingConfig) -> Self {
        Self { store, reporting }
    }

    fn window(&self, from: Option<&str>, to: Option<&str>) -> Result<TimeWindow, DashboardError> {
        let from = parse_day("from", from).map_err(DashboardError::Validation)?;
        let to = parse_day("to", to).map_err(DashboardError::Validation)?;
        Ok(TimeWindow::from_local_days(from, to, self.reporting.offset()))
    }

    pub fn enrollments(
        &self,
        query: EnrollmentDashboardQuery,
    ) -> Result<EnrollmentDashboard, DashboardError> {
        let filter = EnrollmentFilter {
            created: self.window(query.from.as_deref(), query.to.as_deref())?,
            ..EnrollmentFilter::default()
        };
        let rows = self.store.enrollments(&filter)?;
        Ok(summarize_enrollments(&rows, self.reporting.offset()))
    }

    pub fn observations(
        &self,
        query: ObservationDashboardQuery,
    ) -> Result<ObservationDashboard, DashboardError> {
        let filter = EnrollmentFilter {
            updated: self.window(query.from.as_deref(), query.to.as_deref())?,
            course_label: selector(query.course),
            edited_by: selector(query.edited_by),
            with_observation: true,
            ..EnrollmentFilter::default()
        };
        let rows = self.store.enrollments(&filter)?;
        Ok(summarize_observations(&rows, self.reporting.offset()))
    }

    /// Only confirmed payments are counted.
    pub fn payments(&self, query: PaymentDashboardQuery) -> Result<PaymentDashboard, DashboardError> {
        let verified = VerifiedSelector::parse(query.verified.as_deref())
            .map_err(DashboardError::Validation)?;
        let filter = PaymentFilter {
            course_label: selector(query.course),
            confirmed: Some(true),
            verified: verified.as_flag(),
            created: self.window(query.from.as_deref(), query.to.as_deref())?,
            ..PaymentFilter::default()
        };
        let rows = self.store.payments(&filter)?;
        Ok(summarize_payments(&rows, &self.reporting))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
