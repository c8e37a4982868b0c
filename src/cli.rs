use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "mediafront",
    about = "Home media server front door: HTTP listener and web browse API",
    long_about = None,
    version,
)]
pub struct Args {
    /// Directories whose content is published in the browse tree
    #[arg(num_args = 0..)]
    pub paths: Vec<PathBuf>,

    /// HTTP port to listen on [default: 5001]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Server name shown at the top of the web UI [default: mediafront@<host>]
    #[arg(short, long)]
    pub name: Option<String>,

    /// Path to TOML config file (overrides default search: ./mediafront.toml, ~/.config/mediafront/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Force the hostname or address to bind and advertise
    #[arg(long)]
    pub hostname: Option<String>,

    /// Bind to the address of this network interface (e.g. eth0)
    #[arg(long = "interface", value_name = "NAME")]
    pub network_interface: Option<String>,

    /// Use the event-driven engine (boss/worker pools) instead of thread-per-connection
    #[arg(long)]
    pub engine_v2: bool,

    /// Comma-separated IP allow-list, e.g. "192.168.1.*,10.0.0.1-10.0.0.9"
    #[arg(long, value_name = "RULES")]
    pub ip_filter: Option<String>,

    /// Tell the web UI that push-style control updates are available
    #[arg(long)]
    pub web_control: bool,
}
