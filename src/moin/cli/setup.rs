use clap::{Parser, Subcommand};
use moin::client::DEFAULT_RECENT_DAYS;
use std::path::PathBuf;

/// Returns the version string, including git hash and commit date for non-release builds.
/// Format: "0.4.2" for releases, "0.4.2@abc1234 2024-01-15 14:30" for dev builds
fn get_version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const GIT_COMMIT_DATE: &str = env!("GIT_COMMIT_DATE");
    const IS_RELEASE: &str = env!("IS_RELEASE");

    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();

    VERSION_STRING.get_or_init(|| {
        if IS_RELEASE == "true" || GIT_HASH.is_empty() {
            VERSION.to_string()
        } else {
            format!("{}@{} {}", VERSION, GIT_HASH, GIT_COMMIT_DATE)
        }
    })
}

#[derive(Parser, Debug)]
#[command(name = "moin", bin_name = "moin", version = get_version())]
#[command(about = "Command-line client for MoinMoin wikis over XML-RPC", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of ~/.moin/config.toml
    #[arg(long, global = true, env = "MOIN_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in to a wiki and store its access token
    Auth,

    /// Print a page, an older revision of it, or its revision history
    Get {
        pagename: String,

        /// Server alias (defaults to settings.default_server)
        #[arg(short, long)]
        server: Option<String>,

        /// Revision to fetch
        #[arg(long = "version", value_name = "N", conflicts_with = "history")]
        revision: Option<u32>,

        /// Show the revision history instead of the content
        #[arg(long)]
        history: bool,
    },

    /// Create or replace a page
    Put {
        pagename: String,

        /// New page content (use --file to read it instead)
        content: Option<String>,

        /// Read content from a file, or `-` for stdin
        #[arg(short, long, value_name = "PATH", conflicts_with = "content")]
        file: Option<PathBuf>,

        /// Server alias (defaults to settings.default_server)
        #[arg(short, long)]
        server: Option<String>,
    },

    /// List all pages
    List {
        /// Server alias (defaults to settings.default_server)
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Search page names and content
    Search {
        query: String,

        /// Server alias (defaults to settings.default_server)
        #[arg(short, long)]
        server: Option<String>,
    },

    /// List recently changed pages
    Recent {
        /// How many days back to look
        #[arg(short, long, default_value_t = DEFAULT_RECENT_DAYS)]
        days: u32,

        /// Server alias (defaults to settings.default_server)
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Show configured servers
    Servers,
}
