use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = imagegate::cli::Cli::parse();
    if let Err(e) = imagegate::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
