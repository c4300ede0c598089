//! Logging setup.
//!
//! Installs a compact `tracing` subscriber writing to stderr, so stdout
//! stays reserved for JSON results. `RUST_LOG` takes precedence over the
//! built-in default level:
//!
//! ```bash
//! RUST_LOG=debug ragdocs build
//! RUST_LOG=rag_docs::ingest=debug ragdocs refresh
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: Once = Once::new();

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LEVEL: &str = "warn";

/// Filter used by the CLI's `--verbose` when `RUST_LOG` is unset.
pub const VERBOSE_LEVEL: &str = "debug";

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Initialize logging at `warn` unless `RUST_LOG` says otherwise.
pub fn init() {
    init_with_level(DEFAULT_LEVEL);
}

/// Initialize logging with `default` as the filter when `RUST_LOG` is unset.
///
/// Only the first call in a process takes effect.
pub fn init_with_level(default: &str) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(default)
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        // Another subscriber may already be installed by an embedding program.
        let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
    });
}
