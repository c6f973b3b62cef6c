use clap::Parser;

mod cli;
pub mod exit_codes;
mod logging;

use cli::args::Cli;
use cli::commands::dispatch;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.global.log_json);

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            exit_codes::for_error(&e)
        }
    };
    std::process::exit(code);
}
