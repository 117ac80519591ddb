use crate::api::routes;
use crate::config::SharedConfig;
use crate::provider::ProviderAdapter;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Clone)]
pub(super) struct AppState {
    pub config: SharedConfig,
    pub adapter: Arc<ProviderAdapter>,
}

pub fn new(
    config: SharedConfig,
    adapter: Arc<ProviderAdapter>,
) -> impl Future<Output = hyper::Result<()>> {
    axum::Server::bind(&config.api_bind_addr).serve(
        routes::new(AppState { config, adapter })
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
}
