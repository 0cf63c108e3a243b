use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BandCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub day: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayAmount {
    pub day: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentDashboard {
    pub total: usize,
    pub by_grade: Vec<LabelCount>,
    pub by_subsystem: Vec<LabelCount>,
    pub by_day: Vec<DayCount>,
    pub by_hour_band: Vec<BandCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservationDashboard {
    pub total: usize,
    pub by_day: Vec<DayCount>,
    pub by_hour_band: Vec<BandCount>,
    pub by_editor: Vec<LabelCount>,
}

/// Coin or badge sold alongside a payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptSummary {
    pub count: usize,
    pub total: f64,
    pub delivered: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentDashboard {
    pub amount_total: f64,
    pub payment_count: usize,
    /// Distinct (enrollment, course label) pairs.
    pub distinct_payments: usize,
    pub verified_count: usize,
    pub coin: ConceptSummary,
    pub badge: ConceptSummary,
    pub concepts_total: f64,
    pub amount_by_day: Vec<DayAmount>,
    pub by_course: Vec<LabelCount>,
    pub by_grade: Vec<LabelCount>,
}
