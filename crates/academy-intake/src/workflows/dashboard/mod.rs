//! Staff dashboards. Every timestamp is bucketed in the configured
//! reporting offset rather than UTC.

pub mod buckets;
pub mod router;
pub mod service;
pub mod summary;
pub mod views;

pub use router::dashboard_router;
pub use service::{
    DashboardError, DashboardService, EnrollmentDashboardQuery, ObservationDashboardQuery,
    PaymentDashboardQuery, VerifiedSelector,
};
pub use views::{EnrollmentDashboard, ObservationDashboard, PaymentDashboard};
