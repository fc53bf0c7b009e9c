use super::{server, Action};
use crate::cli::telemetry;

pub(super) async fn execute(action: Action) -> anyhow::Result<()> {
    let result = match action {
        Action::Server(args) => server::execute(args).await,
    };

    telemetry::shutdown_tracer();

    result
}
