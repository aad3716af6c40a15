use claimboard::{
    client,
    config::{
        self,
        Command,
    },
};
use color_eyre::eyre::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let command = config::parse_args(
        std::env::args().skip(1),
        std::env::var(config::API_URL_ENV).ok(),
    )?;
    let app_config = match command {
        Command::Help => {
            println!("{}", config::usage());
            return Ok(());
        }
        Command::Run(app_config) => app_config,
    };
    let _guard = client::init_tracing(&app_config.log_dir)?;
    tracing::info!("starting claimboard client");
    client::run_app(app_config).await
}
