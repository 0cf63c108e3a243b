use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::records::{EnrollmentId, NewPayment, PaymentView};
use crate::store::{PaymentFilter, TimeWindow};
use crate::workflows::enrollment::domain::non_blank;

/// Text fields of the multipart payment submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentForm {
    pub enrollment_id: Option<EnrollmentId>,
    pub course_label: Option<String>,
    pub amount_deposited: f64,
    pub confirmed: bool,
    pub verified: bool,
    pub badge: bool,
    pub coin: bool,
    pub delivered: bool,
    pub observation: Option<String>,
    pub edited_by: Option<String>,
}

impl PaymentForm {
    /// Applies one named text field. Unknown names are ignored.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        match name {
            "enrollment_id" => {
                let id = value
                    .parse::<i64>()
                    .map_err(|_| "enrollment_id must be an integer".to_string())?;
                self.enrollment_id = Some(EnrollmentId(id));
            }
            "course_label" => self.course_label = non_blank(Some(value.to_string())),
            "amount_deposited" => {
                self.amount_deposited = match value {
                    "" => 0.0,
                    raw => raw
                        .parse::<f64>()
                        .ok()
                        .filter(|amount| amount.is_finite() && *amount >= 0.0)
                        .ok_or_else(|| "amount_deposited must be a non-negative number".to_string())?,
                };
            }
            "confirmed" => self.confirmed = parse_flag(name, value)?,
            "verified" => self.verified = parse_flag(name, value)?,
            "badge" => self.badge = parse_flag(name, value)?,
            "coin" => self.coin = parse_flag(name, value)?,
            "delivered" => self.delivered = parse_flag(name, value)?,
            "observation" => self.observation = non_blank(Some(value.to_string())),
            "edited_by" => self.edited_by = non_blank(Some(value.to_string())),
            _ => {}
        }
        Ok(())
    }

    pub fn require_enrollment(&self) -> Result<EnrollmentId, String> {
        self.enrollment_id
            .ok_or_else(|| "enrollment_id is required".to_string())
    }

    pub(crate) fn into_new_payment(
        self,
        enrollment_id: EnrollmentId,
        receipt_url: String,
    ) -> NewPayment {
        NewPayment {
            enrollment_id,
            course_label: self.course_label,
            amount_deposited: self.amount_deposited,
            confirmed: self.confirmed,
            verified: self.verified,
            badge: self.badge,
            coin: self.coin,
            delivered: self.delivered,
            observation: self.observation,
            edited_by: self.edited_by,
            receipt_url: Some(receipt_url),
        }
    }
}

/// Accepts `true`, `false`, `1` and `0`, ignoring ASCII case.
pub fn parse_flag(name: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        _ => Err(format!("{name} must be one of true, false, 1 or 0")),
    }
}

fn optional_flag(name: &str, value: Option<&str>) -> Result<Option<bool>, String> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_flag(name, value).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn parse_day(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| format!("{name} must be a YYYY-MM-DD date")),
        None => Ok(None),
    }
}

/// Query string accepted by the payment listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentQuery {
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub verified: Option<String>,
    #[serde(default)]
    pub coin: Option<String>,
    #[serde(default)]
    pub badge: Option<String>,
    #[serde(default)]
    pub delivered: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub certificate: Option<String>,
}

/// Parsed listing criteria. The certificate flag is applied after the
/// store query because certificates live in their own table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentCriteria {
    pub filter: PaymentFilter,
    pub certificate: Option<bool>,
}

impl PaymentQuery {
    pub fn into_criteria(self, offset: FixedOffset) -> Result<PaymentCriteria, String> {
        let from = parse_day("from", self.from.as_deref())?;
        let to = parse_day("to", self.to.as_deref())?;
        let filter = PaymentFilter {
            course_label: non_blank(self.course),
            confirmed: None,
            verified: optional_flag("verified", self.verified.as_deref())?,
            coin: optional_flag("coin", self.coin.as_deref())?,
            badge: optional_flag("badge", self.badge.as_deref())?,
            delivered: optional_flag("delivered", self.delivered.as_deref())?,
            search: non_blank(self.search),
            created: TimeWindow::from_local_days(from, to, offset),
        };
        Ok(PaymentCriteria {
            filter,
            certificate: optional_flag("certificate", self.certificate.as_deref())?,
        })
    }
}

/// Listing row: payment with its enrollment and person, plus certificate status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentListing {
    #[serde(flatten)]
    pub view: PaymentView,
    pub has_certificate: bool,
    pub certificate_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub brand: String,
    pub offset: FixedOffset,
}

impl PaymentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            brand: config.mail.brand.clone(),
            offset: config.reporting.offset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_words_and_digits() {
        assert_eq!(parse_flag("coin", "TRUE"), Ok(true));
        assert_eq!(parse_flag("coin", "1"), Ok(true));
        assert_eq!(parse_flag("coin", "0"), Ok(false));
        assert_eq!(parse_flag("coin", "false"), Ok(false));
        assert!(parse_flag("coin", "yes").is_err());
    }

    #[test]
    fn form_fields_are_parsed_and_unknown_ignored() {
        let mut form = PaymentForm::default();
        form.set("enrollment_id", "12").expect("id");
        form.set("amount_deposited", "45.50").expect("amount");
        form.set("coin", "1").expect("coin");
        form.set("observation", "   ").expect("observation");
        form.set("nickname", "whatever").expect("ignored");

        assert_eq!(form.require_enrollment(), Ok(EnrollmentId(12)));
        assert_eq!(form.amount_deposited, 45.5);
        assert!(form.coin);
        assert!(!form.badge);
        assert_eq!(form.observation, None);
    }

    #[test]
    fn form_rejects_malformed_numbers() {
        let mut form = PaymentForm::default();
        assert!(form.set("enrollment_id", "abc").is_err());
        assert!(form.set("amount_deposited", "-3").is_err());
        assert_eq!(
            PaymentForm::default().require_enrollment(),
            Err("enrollment_id is required".to_string())
        );
    }

    #[test]
    fn query_builds_filter_and_certificate_flag() {
        let offset = FixedOffset::west_opt(5 * 3600).expect("offset");
        let query = PaymentQuery {
            course: Some("CBPEA-2025".to_string()),
            verified: Some("false".to_string()),
            search: Some("  ".to_string()),
            from: Some("2025-03-01".to_string()),
            to: Some("2025-03-01".to_string()),
            certificate: Some("true".to_string()),
            ..PaymentQuery::default()
        };
        let criteria = query.into_criteria(offset).expect("valid query");
        assert_eq!(criteria.filter.course_label.as_deref(), Some("CBPEA-2025"));
        assert_eq!(criteria.filter.verified, Some(false));
        assert_eq!(criteria.filter.coin, None);
        assert_eq!(criteria.filter.search, None);
        assert_eq!(criteria.certificate, Some(true));
        let window = criteria.filter.created;
        let (from, until) = (window.from.expect("from"), window.until.expect("until"));
        assert_eq!(until - from, chrono::Duration::days(1));
        assert_eq!(from.to_rfc3339(), "2025-03-01T05:00:00+00:00");
    }

    #[test]
    fn query_rejects_bad_dates() {
        let query = PaymentQuery {
            to: Some("01/03/2025".to_string()),
            ..PaymentQuery::default()
        };
        let offset = FixedOffset::east_opt(0).expect("offset");
        assert!(query.into_criteria(offset).is_err());
    }
}
