pub mod index;
pub mod metrics;
pub mod qr_generator;
pub mod registrations;
pub mod storage;

pub use index::RegistrationIndex;
pub use metrics::{get_metrics, init_metrics};
pub use qr_generator::QrGenerator;
pub use registrations::{GeneratedQr, RegistrationService};
pub use storage::{LocalQrStore, QrFileName, QrStore};
