use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wildcrab::dns::{PropagationVerifier, TrustDnsResolver};
use wildcrab::renewal::StatusFile;
use wildcrab::{workflow, Config, ProviderAdapter, SharedConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let mut first_args = std::env::args().take(2);
    let (program_name, config_file) = (
        first_args.next().unwrap_or("wildcrab".to_string()),
        first_args.next(),
    );

    let config = config_init(&program_name, config_file)?;
    let adapter = Arc::new(adapter_init(&config).await?);

    if config.dns.set_ip {
        maintain_addresses(&config, &adapter).await;
    }

    if let Some(path) = &config.certificate_status_path {
        let ca = StatusFile::new(path);
        let renew =
            workflow::check_renewal(&adapter, &ca, &config.domains, config.renew_within()).await?;
        tracing::info!(domains = ?config.domains, renew, "checked certificate");
    }

    tracing::info!("API listening on {}", &config.api_bind_addr);
    let api_server = wildcrab::api::new(config.clone(), adapter.clone());
    let api_handle = tokio::spawn(api_server);

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("quitting from signal");
        },
        Ok(api_res) = api_handle => {
            if let Err(err) = api_res {
                return Err(err.into())
            }
        }
    }
    tracing::info!("goodbye");
    Ok(())
}

async fn adapter_init(config: &Config) -> Result<ProviderAdapter> {
    let provider = &config.dns.provider;
    tracing::debug!("using the {} provider", provider.name());
    let client = provider.build().await?;
    let resolver = Arc::new(TrustDnsResolver::new(config.propagation.query_timeout));
    let verifier = PropagationVerifier::new(
        resolver,
        config.propagation.resolver_addr,
        config.propagation_settings(),
    );
    Ok(ProviderAdapter::new(client, verifier, config.adapter_settings()).await?)
}

async fn maintain_addresses(config: &Config, adapter: &ProviderAdapter) {
    if config.dns.ip4_list.is_empty() && config.dns.ip6_list.is_empty() {
        tracing::warn!("set_ip is enabled but no addresses are configured, skipping");
        return;
    }
    let outcomes = workflow::maintain_addresses(
        adapter,
        &config.domains,
        &config.dns.ip4_list,
        &config.dns.ip6_list,
    )
    .await;
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    if failed > 0 {
        tracing::warn!(failed, "address update incomplete");
    }
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wildcrab=info".into()),
        )
        .init();
}

fn config_init(program_name: &str, config_file: Option<String>) -> Result<SharedConfig> {
    match config_file {
        None => Err(anyhow!("usage: {program_name} /path/to/config.json")),
        Some(config_file) => {
            tracing::debug!("loaded config from {config_file}");
            let config = Config::try_from_file(&config_file)?;
            Ok(Arc::new(config))
        }
    }
}
