pub mod config;
pub mod tnl;

pub use config::NormalizerConfig;
pub use tnl::{
    ArtifactReport, ArtifactReporter, Category, NormalizationResult, RuleSet, TnlEngine, Utterance,
};

/// 初始化日志（RUST_LOG 优先，默认 info）
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
