//! Observability (logging, tracing)
//!
//! Structured logging through `tracing`. Upload decisions are logged with a
//! `reason` field carrying the rejection code, so rejections can be counted
//! from the logs alone.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter in debug builds
pub const DEBUG_FILTER: &str = "debug,image_intake=trace,tower_http=debug";

/// Default filter in release builds
pub const RELEASE_FILTER: &str = "info,tower_http=info";

/// Initialize the logging stack
///
/// Sets up:
/// - JSON formatting (release) or pretty formatting (debug)
/// - `RUST_LOG`-based level filtering, falling back to [`DEBUG_FILTER`] or
///   [`RELEASE_FILTER`]
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
///
/// # Example
///
/// ```rust,no_run
/// use image_intake::observability;
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init()?;
/// tracing::info!("Application started");
/// # Ok(())
/// # }
/// ```
pub fn init() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter()));

    #[cfg(debug_assertions)]
    {
        // Pretty formatting for development
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?;
    }

    #[cfg(not(debug_assertions))]
    {
        // JSON formatting for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    }

    Ok(())
}

/// Filter used when `RUST_LOG` is unset
#[must_use]
pub const fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        DEBUG_FILTER
    } else {
        RELEASE_FILTER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters_parse() {
        assert!(EnvFilter::try_new(DEBUG_FILTER).is_ok());
        assert!(EnvFilter::try_new(RELEASE_FILTER).is_ok());
    }

    #[test]
    fn test_default_filter_matches_build() {
        #[cfg(debug_assertions)]
        assert_eq!(default_filter(), DEBUG_FILTER);

        #[cfg(not(debug_assertions))]
        assert_eq!(default_filter(), RELEASE_FILTER);
    }
}
