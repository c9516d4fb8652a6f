use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = courier_api::Args::parse();

	courier_api::run(args).await
}
