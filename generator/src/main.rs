use generator::batch::generate_batch;
use generator::catalog::load_catalog;
use generator::config::GeneratorConfig;
use generator::invariants::check_document;
use generator::sink::write_document;
use rand::Rng;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "generator=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GeneratorConfig::from_env()?;
    let catalog = load_catalog(config.catalog_path.as_deref())?;

    // Log the seed so any batch can be reproduced with TRANSCRIPT_SEED.
    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    info!(
        seed,
        count = config.conversation_count,
        output = %config.output_path.display(),
        "generating transcripts"
    );

    let document = generate_batch(&config, &catalog, seed)?.into_document();
    check_document(&document)?;
    write_document(&document, &config.output_path)?;

    info!(
        count = document.len(),
        path = %config.output_path.display(),
        "done"
    );
    Ok(())
}
