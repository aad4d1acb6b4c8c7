use blogfront::cli::{query::QueryArgs, Cli, Commands};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blogfront=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            blogfront::cli::serve::run(&cli.config, host, port).await?;
        }
        Some(Commands::Query {
            q,
            category,
            page,
            per_page,
            json,
        }) => {
            let args = QueryArgs {
                term: q,
                category,
                page,
                per_page,
                json,
            };
            blogfront::cli::query::run(&cli.config, args).await?;
        }
        Some(Commands::Check) => {
            blogfront::cli::check::run(&cli.config).await?;
        }
        None => {
            // No subcommand provided, print help
            use clap::CommandFactory;
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
