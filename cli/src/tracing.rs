use sessionkeep_config::TracingConfig;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Installs the global subscriber for the `sessions` binary.
///
/// Events go to stderr so that command output on stdout (e.g. `sessions show`) stays
/// machine readable. `RUST_LOG` takes precedence over `tracing.env_filter`.
pub struct Tracing;

impl Tracing {
    pub fn init(config: &TracingConfig, ansi: bool) {
        tracing_subscriber::registry()
            .with(layers(config, ansi))
            .with(env_filter(config))
            .with(ErrorLayer::default())
            .init();
    }
}

fn layers(config: &TracingConfig, ansi: bool) -> Vec<Box<dyn Layer<Registry> + Sync + Send>> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Sync + Send>> = Vec::new();

    if config.enable {
        let stderr_layer = fmt::Layer::default()
            .with_ansi(ansi)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .boxed();
        layers.push(stderr_layer);
    }

    layers
}

fn env_filter(config: &TracingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.env_filter))
}
