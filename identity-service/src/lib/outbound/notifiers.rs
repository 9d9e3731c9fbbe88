pub mod logging;
pub mod smtp;

pub use logging::LogNotifier;
pub use smtp::SmtpNotifier;
pub use smtp::SmtpSettings;
