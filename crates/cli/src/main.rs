use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dimodel_cli::run().await
}
