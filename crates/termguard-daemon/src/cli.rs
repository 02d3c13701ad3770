use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "termguardd",
    about = "Remote terminal access over chat with lockout and resource alerts",
    version
)]
pub struct Args {
    /// Path to the authorization record (default: ~/.termguard/config.json)
    #[arg(long, env = "TERMGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Resource monitor poll interval in seconds
    #[arg(long, default_value_t = 60)]
    pub interval: u64,

    /// Command execution deadline in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}
