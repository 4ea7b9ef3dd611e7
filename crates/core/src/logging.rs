//! Logging setup
//!
//! Structured logging via `tracing-subscriber`, as human-readable text or as
//! JSON lines. All output goes to stderr so stdout stays free for the merged
//! feature.
//!
//! ## Environment Variables
//!
//! * `FEATMERGE_LOG` - filter directives, takes precedence over everything else
//! * `RUST_LOG` - used when `FEATMERGE_LOG` is unset
//! * `FEATMERGE_LOG_FORMAT` - `json` or `text`, used when no format is passed
//! * `FEATMERGE_LOG_SPAN_EVENTS` - comma separated span events
//!   (`new`, `close`, `enter`, `exit`, `active`, `full`, `none`)

use anyhow::Result;
use std::{io, sync::Once};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Filter used when neither the environment nor the caller provides one
const DEFAULT_FILTER: &str = "info";

/// Initialize logging
///
/// `format` selects `"json"` or text output; when `None`,
/// `FEATMERGE_LOG_FORMAT` decides. `default_filter` applies only when
/// neither `FEATMERGE_LOG` nor `RUST_LOG` is set. Later calls are no-ops.
///
/// ```rust
/// use featmerge_core::logging;
///
/// logging::init(None, Some("featmerge_core=debug")).expect("logging");
/// assert!(logging::is_initialized());
/// ```
pub fn init(format: Option<&str>, default_filter: Option<&str>) -> Result<()> {
    INIT.call_once(|| {
        let filter = create_env_filter(default_filter);

        let env_format = std::env::var("FEATMERGE_LOG_FORMAT").ok();
        let effective_format = format.or(env_format.as_deref()).unwrap_or("text");
        let span_events = span_events_for_format(effective_format);

        match effective_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .json()
                            .with_target(true)
                            .with_span_events(span_events)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .with_target(true)
                            .with_span_events(span_events)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
        }

        tracing::debug!("Logging initialized with format: {}", effective_format);
    });

    Ok(())
}

fn create_env_filter(default_filter: Option<&str>) -> EnvFilter {
    if let Ok(spec) = std::env::var("FEATMERGE_LOG") {
        return EnvFilter::try_new(&spec).unwrap_or_else(|_| {
            tracing::warn!(
                "Invalid FEATMERGE_LOG specification '{}', using default '{}'",
                spec,
                DEFAULT_FILTER
            );
            EnvFilter::new(DEFAULT_FILTER)
        });
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        default_filter
            .and_then(|spec| EnvFilter::try_new(spec).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
    })
}

/// Span lifecycle events: env override, else NEW|CLOSE for json and none for text
fn span_events_for_format(format: &str) -> fmt::format::FmtSpan {
    use fmt::format::FmtSpan;

    if let Ok(raw) = std::env::var("FEATMERGE_LOG_SPAN_EVENTS") {
        let mut acc = FmtSpan::NONE;
        for token in raw.split(&[',', '|'][..]).map(|t| t.trim().to_lowercase()) {
            acc |= match token.as_str() {
                "new" => FmtSpan::NEW,
                "close" => FmtSpan::CLOSE,
                "enter" => FmtSpan::ENTER,
                "exit" => FmtSpan::EXIT,
                "active" => FmtSpan::ACTIVE,
                "full" => FmtSpan::FULL,
                _ => FmtSpan::NONE,
            };
        }
        return acc;
    }

    match format {
        "json" => FmtSpan::NEW | FmtSpan::CLOSE,
        _ => FmtSpan::NONE,
    }
}

/// Whether [`init`] has run
pub fn is_initialized() -> bool {
    INIT.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_init_multiple_calls_safe() {
        let _guard = TEST_MUTEX.lock().unwrap();

        assert!(init(None, None).is_ok());
        assert!(init(Some("json"), Some("debug")).is_ok());
        assert!(init(Some("bogus"), None).is_ok());
        assert!(is_initialized());
    }

    #[test]
    fn test_invalid_default_filter_falls_back() {
        let _filter = create_env_filter(Some("not a [valid filter"));
    }

    #[test]
    fn test_span_events_default_by_format() {
        let _guard = TEST_MUTEX.lock().unwrap();
        if std::env::var_os("FEATMERGE_LOG_SPAN_EVENTS").is_some() {
            return;
        }
        use fmt::format::FmtSpan;
        assert_eq!(
            span_events_for_format("json"),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
        assert_eq!(span_events_for_format("text"), FmtSpan::NONE);
    }
}
