use clap::Parser;
use vitt_cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.json_logs {
        vitt_telemetry::init_json_telemetry("vitt-cli")?;
    } else {
        vitt_telemetry::init_telemetry("vitt-cli")?;
    }

    vitt_cli::run(cli).await
}
