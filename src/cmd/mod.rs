//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`init`], [`validate`], or [`health`].
//! Each handler lives in its own submodule.

pub mod health;
pub mod init;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::GatewayError;

pub async fn dispatch(cli: Cli) -> Result<(), GatewayError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Init(ref args)) => init::execute(args),
        Some(Commands::Validate(ref args)) => validate::execute(args),
        Some(Commands::Health(args)) => health::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  imagegate v{version}: authenticating proxy for image generation\n\n  \
         No command provided. To get started:\n\n    \
         imagegate init                  Write a starter config\n    \
         imagegate run                   Start the proxy (needs NOVELAI_USERNAME, NOVELAI_PASSWORD)\n    \
         imagegate run -c gate.yaml      Start with a specific config file\n    \
         imagegate --help                See all commands and options\n"
    );
}
