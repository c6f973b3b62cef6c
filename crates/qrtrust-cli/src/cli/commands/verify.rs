use std::io::Read;

use anyhow::Context;
use qrtrust_core::Verifier;

use crate::cli::args::{GlobalArgs, VerifyArgs};
use crate::cli::helpers::{build_client, load_config, print_json};
use crate::exit_codes;

pub async fn run(global: &GlobalArgs, args: VerifyArgs) -> anyhow::Result<i32> {
    let input = read_input(&args)?;
    let config = load_config(global)?;
    let verifier = Verifier::new(build_client(&config)?);

    let result = verifier.verify(&input).await;

    let mut json = serde_json::to_value(&result)?;
    if args.no_steps {
        if let Some(obj) = json.as_object_mut() {
            obj.remove("steps");
        }
    }
    print_json(&json)?;

    Ok(if result.signature_valid {
        exit_codes::SUCCESS
    } else {
        exit_codes::UNVERIFIED
    })
}

fn read_input(args: &VerifyArgs) -> anyhow::Result<String> {
    if let Some(path) = &args.file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()));
    }
    match args.input.as_deref() {
        Some("-") | None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading credential from stdin")?;
            Ok(buf)
        }
        Some(text) => Ok(text.to_string()),
    }
}
