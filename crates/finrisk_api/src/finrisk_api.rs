use crate::http::{build_router, run_http_server, FinriskApiServices, HttpServerConfig};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct FinriskApi {
    services: FinriskApiServices,
    config: HttpServerConfig,
}

impl FinriskApi {
    pub fn new(services: FinriskApiServices, config: HttpServerConfig) -> Self {
        debug!("Initializing Finrisk API module");
        Self { services, config }
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(
        CancellationToken,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
    > {
        move |ctx| {
            Box::pin(async move {
                run_http_server(self.config, build_router(self.services), ctx).await
            })
        }
    }
}
