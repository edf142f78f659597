mod application;
mod presentation;

use shelf_core::error::Result;

fn main() -> Result<()> {
    init_logging();
    application::run()
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=info,shelf_core=info", env!("CARGO_CRATE_NAME")).into()
            }),
        )
        .with_writer(std::io::stderr)
        .init();
}
