use academy_intake::config::AppConfig;
use academy_intake::error::AppError;
use academy_intake::integrations::{
    event_router, BroadcastHub, DisabledMailer, DisabledRegistry, EnrollmentRegistry, EventSink,
    MoodleRegistry, Notifier, SmtpMailer,
};
use academy_intake::store::RecordStore;
use academy_intake::workflows::certificates::certificate_router;
use academy_intake::workflows::contact::{contact_router, ContactService, ContactSettings};
use academy_intake::workflows::courses::course_router;
use academy_intake::workflows::dashboard::{dashboard_router, DashboardService};
use academy_intake::workflows::enrollment::{
    enrollment_router, EnrollmentService, EnrollmentSettings,
};
use academy_intake::workflows::payments::{
    payment_router, PaymentService, PaymentSettings, ReceiptStore,
};
use academy_intake::workflows::verification::{verification_router, VerificationService};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Outbound adapters shared by every workflow.
pub(crate) struct Integrations {
    pub(crate) registry: Arc<dyn EnrollmentRegistry>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) hub: Arc<BroadcastHub>,
    pub(crate) receipts: Arc<ReceiptStore>,
}

impl Integrations {
    pub(crate) fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let registry: Arc<dyn EnrollmentRegistry> = match MoodleRegistry::from_config(&config.lms)?
        {
            Some(moodle) => Arc::new(moodle),
            None => {
                warn!("LMS_URL or LMS_TOKEN unset; enrollments will stay pending");
                Arc::new(DisabledRegistry)
            }
        };

        let notifier: Arc<dyn Notifier> = match SmtpMailer::from_config(&config.mail)? {
            Some(mailer) => Arc::new(mailer),
            None => {
                warn!("SMTP_HOST unset; emails will only be logged");
                Arc::new(DisabledMailer)
            }
        };

        Ok(Self {
            registry,
            notifier,
            hub: Arc::new(BroadcastHub::default()),
            receipts: Arc::new(ReceiptStore::from_config(&config.uploads)),
        })
    }
}

/// Every workflow router over one shared store.
pub(crate) fn application_router<S>(
    store: Arc<S>,
    config: &AppConfig,
    integrations: Integrations,
) -> Router
where
    S: RecordStore + 'static,
{
    let Integrations {
        registry,
        notifier,
        hub,
        receipts,
    } = integrations;
    let events: Arc<dyn EventSink> = hub.clone();

    let enrollments = Arc::new(EnrollmentService::new(
        store.clone(),
        registry,
        notifier.clone(),
        events.clone(),
        receipts.clone(),
        EnrollmentSettings::from_config(config),
    ));
    let payments = Arc::new(PaymentService::new(
        store.clone(),
        receipts,
        notifier.clone(),
        events,
        PaymentSettings::from_config(config),
    ));
    let contact = Arc::new(ContactService::new(
        store.clone(),
        notifier,
        ContactSettings::from_config(config),
    ));
    let verification = Arc::new(VerificationService::new(store.clone()));
    let dashboards = Arc::new(DashboardService::new(
        store.clone(),
        config.reporting.clone(),
    ));

    Router::new()
        .merge(course_router(store.clone()))
        .merge(certificate_router(store))
        .merge(enrollment_router(enrollments))
        .merge(verification_router(verification))
        .merge(payment_router(payments))
        .merge(contact_router(contact))
        .merge(dashboard_router(dashboards))
        .merge(event_router(hub))
}
