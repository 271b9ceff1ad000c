//! Command-line tooling around the `vitonhd-data` loader: configuration
//! files, backend selection, dataset inspection and sample export.

pub mod backend;
pub mod config;
pub mod export;
pub mod inspect;

#[doc(inline)]
pub use backend::{batch_device, BatchBackend, BatchDevice, BACKEND_NAME};
pub use config::{LoaderArgs, LoaderConfig};
#[doc(inline)]
pub use vitonhd_data as data;

/// Installs the global `tracing` subscriber, filtered by `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
