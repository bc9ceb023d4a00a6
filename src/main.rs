use clap::Parser;
use research_workflow::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Research(args) => cli::research::run(args).await,
    }
}
