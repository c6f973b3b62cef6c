use anyhow::Context;
use qrtrust_core::{diagnose, resolver};

use crate::cli::args::ThumbprintArgs;
use crate::cli::helpers::print_json;
use crate::exit_codes;

pub fn run(args: ThumbprintArgs) -> anyhow::Result<i32> {
    let raw = match (&args.cert, args.thumbprint) {
        (Some(path), _) => {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("reading certificate {}", path.display()))?;
            let (_, thumbprint) = resolver::key_from_certificate(&pem)
                .with_context(|| format!("parsing certificate {}", path.display()))?;
            thumbprint
        }
        (None, Some(thumbprint)) => thumbprint,
        (None, None) => anyhow::bail!("a thumbprint or --cert is required"),
    };

    let diagnostics = diagnose(&raw);
    print_json(&diagnostics)?;
    Ok(exit_codes::SUCCESS)
}
