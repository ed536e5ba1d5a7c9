mod application;
mod domain;
mod infrastructure;
mod presentation;
mod server;

use anyhow::Result;

use infrastructure::logging::init_logging;
use infrastructure::settings::Settings;
use server::Supervisor;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env()?;

    let logging = init_logging(&settings.log_level, settings.log_format, settings.log_dir.as_deref())?;

    let code = Supervisor::new(settings, logging).run().await?;
    std::process::exit(code);
}
