use clap::Parser;
use vmpull_cli::{apply_log_level, handlers, VmPullArgs, VmPullCliResult, VmPullSubcommand};

#[tokio::main]
async fn main() -> VmPullCliResult<()> {
    let args = VmPullArgs::parse();

    apply_log_level(&args);
    tracing_subscriber::fmt::init();

    match args.subcommand {
        VmPullSubcommand::Pull {
            image,
            name,
            location,
        } => {
            handlers::pull_subcommand(image, name, location).await?;
        }
        VmPullSubcommand::List => {
            handlers::list_subcommand().await?;
        }
        VmPullSubcommand::Rm { repository } => {
            handlers::rm_subcommand(repository).await?;
        }
    }

    Ok(())
}
