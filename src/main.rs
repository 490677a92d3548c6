use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    intellipix::init_tracing();

    match intellipix::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Intellipix failed to start: {e}");
            ExitCode::FAILURE
        }
    }
}
