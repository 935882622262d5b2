//! wallarss command-line entry point.
//!
//! Runs a single marketplace search or resolves a whole feed and prints the
//! result as JSON on stdout. Logging goes to stderr so stdout stays parseable.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wallarss_client::{FeedResolver, FeedSettings, Marketplace, SearchRequest, WallapopClient, WallapopConfig};
use wallarss_core::{AppConfig, Query};

#[derive(Debug, Parser)]
#[command(name = "wallarss", version, about = "Wallapop searches as feeds")]
struct Cli {
    /// Enable debug logs.
    #[arg(long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one search and print the listings it returns.
    Search {
        /// Search keyword.
        #[arg(long)]
        keyword: String,

        #[command(flatten)]
        area: AreaArgs,
    },

    /// Resolve a feed and print its entries.
    Feed {
        /// Search keyword; repeat for several.
        #[arg(long = "keyword", required = true)]
        keywords: Vec<String>,

        /// Skip listings whose description contains this word; repeat for several.
        #[arg(long = "ignore")]
        ignores: Vec<String>,

        #[command(flatten)]
        area: AreaArgs,
    },
}

#[derive(Debug, Args)]
struct AreaArgs {
    /// Place name to search around.
    #[arg(long)]
    location: String,

    /// Search radius in kilometers.
    #[arg(long, default_value_t = 5)]
    radius: u32,

    #[arg(long, default_value_t = 0)]
    min_price: u32,

    #[arg(long, default_value_t = 9999)]
    max_price: u32,
}

impl AreaArgs {
    fn into_query(self, keywords: Vec<String>, ignores: Vec<String>) -> Query {
        Query {
            keywords,
            ignores,
            location_name: self.location,
            location_radius: self.radius,
            min_price: self.min_price,
            max_price: self.max_price,
        }
    }
}

fn init_tracing(debug: bool, json: bool) {
    let filter = if debug { EnvFilter::new("debug") } else { EnvFilter::from_default_env() };
    let fmt = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        fmt.json().init();
    } else {
        fmt.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.json_logs);

    let config = AppConfig::load()?;
    let client = Arc::new(WallapopClient::new(WallapopConfig::from(&config))?);

    match cli.command {
        Command::Search { keyword, area } => {
            let query = area.into_query(vec![keyword.clone()], Vec::new());
            let location = client.location(&query.location_name).await?;
            let req = SearchRequest::new(&query, &keyword, location, &config.language);
            let items = client.search(&req).await?;
            tracing::info!(%keyword, results = items.len(), "search finished");
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        Command::Feed { keywords, ignores, area } => {
            let query = area.into_query(keywords, ignores);
            let details = Arc::new(FeedResolver::detail_cache(client.clone(), config.cache_ttl()));
            let resolver = FeedResolver::new(client, details, FeedSettings::from(&config));
            let feed = resolver.resolve(&query).await?;
            println!("{}", serde_json::to_string_pretty(&feed)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_defaults() {
        let cli = Cli::try_parse_from(["wallarss", "search", "--keyword", "kindle", "--location", "Madrid"]).unwrap();
        match cli.command {
            Command::Search { keyword, area } => {
                assert_eq!(keyword, "kindle");
                assert_eq!(area.location, "Madrid");
                assert_eq!(area.radius, 5);
                assert_eq!(area.min_price, 0);
                assert_eq!(area.max_price, 9999);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_feed_into_query() {
        let cli = Cli::try_parse_from([
            "wallarss",
            "--debug",
            "feed",
            "--keyword",
            "psp",
            "--keyword",
            "nds",
            "--ignore",
            "rota",
            "--location",
            "Barcelona",
            "--radius",
            "10",
            "--max-price",
            "200",
        ])
        .unwrap();
        assert!(cli.debug);

        let Command::Feed { keywords, ignores, area } = cli.command else {
            panic!("expected feed command");
        };
        let query = area.into_query(keywords, ignores);
        assert_eq!(query.keywords, vec!["psp", "nds"]);
        assert_eq!(query.ignores, vec!["rota"]);
        assert_eq!(query.radius_meters(), 10_000);
        assert_eq!(query.max_price, 200);
    }

    #[test]
    fn test_feed_requires_keyword() {
        assert!(Cli::try_parse_from(["wallarss", "feed", "--location", "Barcelona"]).is_err());
    }
}
