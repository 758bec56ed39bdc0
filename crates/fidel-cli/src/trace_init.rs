use std::sync::Once;

static INIT: Once = Once::new();

/// Install a stderr subscriber. `RUST_LOG` overrides the default filter.
///
/// Library spans are compiled out unless the `trace` feature is on.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fidel_core=debug")),
            )
            .init();
    });
}
