//! Payment receipts: multipart intake, staff listing with certificate
//! status, and the stored receipt files.

pub mod domain;
pub mod receipts;
pub mod router;
pub mod service;
mod templates;


pub use domain::{PaymentForm, PaymentListing, PaymentQuery, PaymentSettings};
pub use receipts::{receipt_router, ReceiptStore};
pub use router::payment_router;
pub use service::{PaymentError, PaymentService, ReceiptUpload};
