use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "paiman",
    version,
    about = "Painting catalogue with a web-view front end",
    long_about = "Keeps a catalogue of paintings with their main photo, work-in-progress photos, reference photos and tags, and serves it to an embedded web view"
)]
pub struct Cli {
    /// Log verbosely (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the web server hosting the catalogue
    Run {
        /// Port to bind the web server to
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Host to bind the web server to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Glob pattern of image files to import as paintings on startup
        #[arg(short, long)]
        import: Option<String>,
        /// Decoded image cache budget in kilobytes
        #[arg(long)]
        cache_kb: Option<usize>,
        /// Use production settings (JSON logs written to files)
        #[arg(long)]
        production: bool,
    },
    /// Show build and system information
    #[command(name = "info")]
    Info,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_arguments() {
        let cli = Cli::parse_from(["paiman", "run", "-p", "9000", "--import", "pictures/*.png", "--cache-kb", "512"]);
        match cli.command {
            Commands::Run { port, host, import, cache_kb, production } => {
                assert_eq!(port, 9000);
                assert_eq!(host, "127.0.0.1");
                assert_eq!(import.as_deref(), Some("pictures/*.png"));
                assert_eq!(cache_kb, Some(512));
                assert!(!production);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
