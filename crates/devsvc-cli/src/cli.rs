use clap::Parser;
use devsvc_config::{CliArgs, RegistryArg};

/// Flags accepted by the `devsvc` binary, translated 1:1 onto
/// [`devsvc_config::CliArgs`]. `clap` owns all presence/value parsing;
/// `devsvc-config` never looks at argv itself.
#[derive(Debug, Parser)]
#[command(name = "devsvc", about = "Device service lifecycle engine", version)]
pub struct Cli {
    /// Device service name.
    #[arg(short, long)]
    pub name: String,

    /// Registry URL. Bare `-r`/`--registry` (no value) falls back to
    /// `edgex_registry` then the TOML file's `[Registry]` table.
    #[arg(short, long, num_args = 0..=1, default_missing_value = "")]
    pub registry: Option<String>,

    /// Configuration profile (selects `{confdir}/{profile}/configuration.toml`).
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Directory holding `configuration.toml` and device profiles.
    #[arg(short, long, default_value = "./res")]
    pub confdir: String,
}

impl From<Cli> for CliArgs {
    fn from(cli: Cli) -> Self {
        let registry = match cli.registry {
            None => RegistryArg::NotProvided,
            Some(s) if s.is_empty() => RegistryArg::Empty,
            Some(url) => RegistryArg::Url(url),
        };
        CliArgs { name: cli.name, registry, profile: cli.profile, confdir: cli.confdir }
    }
}
