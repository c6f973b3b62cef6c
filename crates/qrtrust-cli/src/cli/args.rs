use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "qrtrust",
    version,
    about = "Verify QR-encoded signed credentials against a trust registry"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

/// Options shared by every command. Flags override environment, which
/// overrides the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// YAML config file
    #[arg(long, global = true, env = "QRTRUST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Trust registry base URL
    #[arg(long, global = true)]
    pub registry_url: Option<String>,

    /// SQLite trust cache file
    #[arg(long, global = true)]
    pub cache_path: Option<PathBuf>,

    /// Registry call timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode and verify a scanned credential
    Verify(VerifyArgs),
    /// Look an issuer up by certificate thumbprint
    Lookup(LookupArgs),
    /// Show how a thumbprint is normalized
    Thumbprint(ThumbprintArgs),
    /// Trust cache administration
    Cache(CacheArgs),
    /// Refresh stale cache entries once and exit
    Refresh(RefreshArgs),
    /// Run the background refresher until interrupted
    Refresher,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Scanned text; `-` reads stdin
    #[arg(conflicts_with = "file")]
    pub input: Option<String>,

    /// Read the scanned text from a file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Omit the per-stage trace from the output
    #[arg(long)]
    pub no_steps: bool,
}

#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Certificate thumbprint (standard or URL-safe base64)
    pub thumbprint: String,

    /// Skip the cache and query the registry
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ThumbprintArgs {
    /// Raw thumbprint
    #[arg(required_unless_present = "cert", conflicts_with = "cert")]
    pub thumbprint: Option<String>,

    /// Compute the thumbprint of a PEM or base64 certificate file instead
    #[arg(long)]
    pub cert: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub cmd: CacheSub,
}

#[derive(Subcommand, Debug)]
pub enum CacheSub {
    /// Entry counts, hit rate and last refresh
    Stats,
    /// Entries waiting for refresh, oldest first
    Stale {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// All entries, most recently checked first
    List {
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Flag every entry for refresh
    MarkStale,
    /// Delete every entry
    Clear,
}

#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Flag every entry stale before refreshing
    #[arg(long)]
    pub all: bool,
}
