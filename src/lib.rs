//! MediSnap: clinical document extraction.
//!
//! Uploaded reports (images, PDFs, text, DICOM) go through a generative model
//! with a fixed output schema; the resulting medications, lab results, vital
//! signs and diagnoses are stored per patient. Stored records feed the
//! clinical insights (medication safety, guideline adherence, vital trends and
//! SOAP notes).

pub mod config;
pub mod db;
pub mod insights;
pub mod models;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, filtered by `RUST_LOG` or the default filter.
/// A second call is a no-op.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_twice_is_safe() {
        init_tracing();
        init_tracing();
    }
}
