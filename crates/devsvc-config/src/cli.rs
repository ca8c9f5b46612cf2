/// The `-r/--registry` flag's three distinct states: absent entirely,
/// present with no value (fall back to env var then file), or present
/// with an explicit URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryArg {
    NotProvided,
    Empty,
    Url(String),
}

/// Already-parsed CLI flags, as produced by `devsvc-cli`'s `clap`
/// parser. The resolver never parses argv itself.
#[derive(Debug, Clone)]
pub struct CliArgs {
    pub name: String,
    pub registry: RegistryArg,
    pub profile: Option<String>,
    pub confdir: String,
}
