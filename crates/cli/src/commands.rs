use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the sync pipeline to completion: discovers the newest feed
    /// folder, ingests every CSV within it, and reconciles rows against
    /// the remote catalog until every feed's counters catch up.
    Run {
        #[arg(long, help = "Path to a .env-style file to seed configuration from")]
        env_file: Option<String>,
    },
    /// Report progress for one feed or, if omitted, every discovered feed.
    Progress {
        #[arg(long, help = "Feed key to inspect; omit to report on every feed")]
        feed: Option<String>,

        #[arg(long, help = "Path to a .env-style file to seed configuration from")]
        env_file: Option<String>,

        #[arg(long, help = "Print the progress snapshot as JSON instead of a table")]
        json: bool,
    },
}
