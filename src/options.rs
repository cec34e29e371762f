use clap::Parser;

/// powerdev-bridge - decode power device protocols into typed readings
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    /// Run a single adhoc command against every configured device and exit
    #[clap(short = 'C', long = "command")]
    pub adhoc_command: Option<String>,

    /// List the supported protocols and exit
    #[clap(long = "list-protocols")]
    pub list_protocols: bool,

    /// List the commands of the named protocol and exit
    #[clap(long = "list-commands")]
    pub list_commands: Option<String>,

    /// Emit results as JSON instead of key=value lines
    #[clap(long = "json")]
    pub json: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}
