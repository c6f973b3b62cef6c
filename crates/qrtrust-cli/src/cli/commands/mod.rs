use super::args::*;

pub mod cache;
pub mod lookup;
pub mod refresh;
pub mod thumbprint;
pub mod verify;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let global = cli.global;
    match cli.cmd {
        Command::Verify(args) => verify::run(&global, args).await,
        Command::Lookup(args) => lookup::run(&global, args).await,
        Command::Thumbprint(args) => thumbprint::run(args),
        Command::Cache(args) => cache::run(&global, args.cmd),
        Command::Refresh(args) => refresh::run_once(&global, args).await,
        Command::Refresher => refresh::run_scheduler(&global).await,
    }
}
