// library system

use libman::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	// a missing .env is fine, the environment may already be set
	let _ = dotenvy::dotenv();
	libman::init_tracing();

	let config = Config::load()?;
	libman::start_server(config).await
}
