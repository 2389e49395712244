use anyhow::Result;
use clap::Parser;
use gocd_octane_bridge::cli::Cli;
use gocd_octane_bridge::output;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting gocd-octane bridge");
    cli.execute().await?;

    Ok(())
}
