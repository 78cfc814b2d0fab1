use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Error};
use clap::{Parser, Subcommand};
use console::{style, Term};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};

use wallrotate::config::{
    build_http_client, username_key, AppConfig, ConfigStore, JsonFileConfigStore,
};
use wallrotate::display::StaticDimensions;
use wallrotate::fetch::{HttpTransport, ReqwestTransport};
use wallrotate::{
    Credentials, FetchClient, FetchContext, FetchError, ImageEnricher, Normalizer, ProviderId,
    ProviderRegistry, QueryId, QueryStore, SavedQuery,
};

/// The name of the cargo package.
const NAME: &str = env!("CARGO_PKG_NAME");

/// The version of the cargo package.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Manage saved wallpaper provider queries.
#[derive(Parser, Debug)]
#[command(name = "wallrotate", version, about)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub(crate) enum Commands {
    /// Show which provider recognizes a URL and its normalized query.
    Detect {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// List saved queries, newest first.
    List {
        #[arg(value_parser = parse_provider)]
        provider: ProviderId,
    },

    /// Save a new query.
    Add {
        #[arg(value_parser = parse_provider)]
        provider: ProviderId,
        description: String,
        #[arg(value_name = "URL")]
        url: String,
        /// Save the query disabled.
        #[arg(long)]
        inactive: bool,
    },

    /// Enable a saved query. The id may be any unambiguous prefix.
    Enable {
        #[arg(value_parser = parse_provider)]
        provider: ProviderId,
        id: String,
    },

    /// Disable a saved query.
    Disable {
        #[arg(value_parser = parse_provider)]
        provider: ProviderId,
        id: String,
    },

    /// Remove a saved query.
    Remove {
        #[arg(value_parser = parse_provider)]
        provider: ProviderId,
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Write a preference, e.g. wallhaven_api_key or wallhaven_username.
    Set { key: String, value: String },

    /// Fetch one page of every active query.
    Fetch {
        #[arg(value_parser = parse_provider)]
        provider: ProviderId,
        /// Page to fetch; defaults to `[rotation] page`.
        page: Option<u32>,
    },
}

fn parse_provider(value: &str) -> Result<ProviderId, String> {
    value.parse()
}

/// Handles the flow of a single command.
pub(crate) struct Program {
    config: AppConfig,
    registry: ProviderRegistry,
}

impl Program {
    pub(crate) fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: ProviderRegistry::builtin(),
        }
    }

    pub(crate) async fn run(&self, cli: Cli) -> Result<(), Error> {
        trace!("Program Name: {}", NAME);
        trace!("Program Version: {}", VERSION);
        trace!("Parsed command: {:?}", cli.command);

        let preferences: Arc<dyn ConfigStore> = Arc::new(JsonFileConfigStore::open(Path::new(
            &self.config.storage.preferences_file,
        ))?);

        match cli.command {
            Commands::Detect { url } => self.detect(&preferences, &url),
            Commands::List { provider } => {
                let store = self.open_store(&preferences, provider)?;
                print_queries(&store.list_queries());
                Ok(())
            }
            Commands::Add { provider, description, url, inactive } => {
                let store = self.open_store(&preferences, provider)?;
                let id = store.add_query(&description, &url, !inactive)?;
                println!("{} {}", style("added").green().bold(), style(id.short()).cyan());
                Ok(())
            }
            Commands::Enable { provider, id } => {
                let store = self.open_store(&preferences, provider)?;
                let id = resolve_id(&store, &id)?;
                store.enable_query(&id)?;
                println!("{} {}", style("enabled").green(), style(id.short()).cyan());
                Ok(())
            }
            Commands::Disable { provider, id } => {
                let store = self.open_store(&preferences, provider)?;
                let id = resolve_id(&store, &id)?;
                store.disable_query(&id)?;
                println!("{} {}", style("disabled").yellow(), style(id.short()).cyan());
                Ok(())
            }
            Commands::Remove { provider, id, yes } => {
                let store = self.open_store(&preferences, provider)?;
                let id = resolve_id(&store, &id)?;
                self.remove(&store, &id, yes)
            }
            Commands::Set { key, value } => {
                preferences.set_string(&key, &value)?;
                let shown = if key.ends_with("_api_key") {
                    "*".repeat(value.len())
                } else {
                    value
                };
                info!("Set {} = {}", key, shown);
                Ok(())
            }
            Commands::Fetch { provider, page } => {
                let page = page.unwrap_or(self.config.rotation.page);
                self.fetch(&preferences, provider, page).await
            }
        }
    }

    fn normalizer_for(&self, preferences: &Arc<dyn ConfigStore>, provider: ProviderId) -> Result<Normalizer, Error> {
        let definition = self
            .registry
            .get(provider)
            .ok_or_else(|| anyhow!("provider {provider} is not registered"))?;

        let username = preferences.get_string(&username_key(provider.name()), "");
        let normalizer = Normalizer::new(definition);
        Ok(if username.trim().is_empty() {
            normalizer
        } else {
            normalizer.with_username(username.trim())
        })
    }

    fn open_store(&self, preferences: &Arc<dyn ConfigStore>, provider: ProviderId) -> Result<QueryStore, Error> {
        let normalizer = self.normalizer_for(preferences, provider)?;
        Ok(QueryStore::open(normalizer, preferences.clone())?)
    }

    fn detect(&self, preferences: &Arc<dyn ConfigStore>, url: &str) -> Result<(), Error> {
        let definition = self
            .registry
            .detect(url)
            .ok_or_else(|| anyhow!("no provider recognizes '{}'", url.trim()))?;
        let normalized = self.normalizer_for(preferences, definition.id())?.normalize(url)?;

        println!("{:<10} {}", style("provider").bold(), definition.id());
        println!("{:<10} {}", style("query").bold(), normalized);
        println!("{:<10} {}", style("id").bold(), QueryId::of(&normalized));
        Ok(())
    }

    fn remove(&self, store: &QueryStore, id: &QueryId, yes: bool) -> Result<(), Error> {
        let Some(query) = store.get_query(id) else {
            bail!("query {} not found", id.short());
        };

        let confirmed = yes
            || Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(format!("Remove \"{}\"?", query.description))
                .default(false)
                .interact()?;
        if !confirmed {
            info!("Keeping {}", id.short());
            return Ok(());
        }

        store.remove_query(id)?;
        println!("{} {}", style("removed").red(), style(id.short()).cyan());
        Ok(())
    }

    async fn fetch(&self, preferences: &Arc<dyn ConfigStore>, provider: ProviderId, page: u32) -> Result<(), Error> {
        let store = self.open_store(preferences, provider)?;
        let active = store.active_queries();
        if active.is_empty() {
            warn!("No active {} queries", provider);
            return Ok(());
        }

        let definition = store.normalizer().provider().clone();
        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::new(build_http_client(&self.config.http)?));
        let credentials = Credentials::from_config(preferences.clone());

        let mut client = FetchClient::new(definition.clone(), transport.clone(), credentials.clone());
        if let Some((width, height)) = self.config.display.dimensions() {
            client = client.with_dimensions(Arc::new(StaticDimensions::new(width, height)));
        }
        let enricher = ImageEnricher::new(definition, transport, credentials);

        let (ctx, cancel) = FetchContext::new();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        let _ = Term::stdout().set_title(format!("{NAME} {provider}"));
        let spinner_style = ProgressStyle::with_template("{spinner:.green} {msg}")?;

        for query in active {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(spinner_style.clone());
            spinner.set_message(format!("{} page {}", query.description, page));
            spinner.enable_steady_tick(Duration::from_millis(120));

            let result = match client.fetch_page(&ctx, &query.url, page).await {
                Ok(fetched) if self.config.rotation.enrich => enricher
                    .enrich_all(&ctx, fetched.images)
                    .await
                    .map(|images| (images, fetched.last_page)),
                Ok(fetched) => Ok((fetched.images, fetched.last_page)),
                Err(e) => Err(e),
            };
            spinner.finish_and_clear();

            match result {
                Ok((images, last_page)) => print_images(&query, &images, page, last_page),
                Err(FetchError::Canceled) => {
                    warn!("Fetch canceled");
                    break;
                }
                Err(e) => warn!("Skipping \"{}\" ({}): {}", query.description, query.id.short(), e),
            }
        }
        Ok(())
    }
}

/// Resolves an unambiguous id prefix against the store.
fn resolve_id(store: &QueryStore, prefix: &str) -> Result<QueryId, Error> {
    let prefix = prefix.trim().to_ascii_lowercase();
    if prefix.is_empty() {
        bail!("empty query id");
    }

    let mut matches: Vec<QueryId> = store
        .list_queries()
        .into_iter()
        .map(|q| q.id)
        .filter(|id| id.as_str().starts_with(&prefix))
        .collect();

    match matches.len() {
        0 => bail!("no query matches '{prefix}'"),
        1 => Ok(matches.remove(0)),
        n => bail!("'{prefix}' is ambiguous ({n} queries match)"),
    }
}

fn print_queries(queries: &[SavedQuery]) {
    if queries.is_empty() {
        println!("{}", style("no saved queries").dim());
        return;
    }

    for query in queries {
        let state = if query.active {
            style("on ").green()
        } else {
            style("off").dim()
        };
        println!(
            "{} {} {}\n    {}",
            style(query.id.short()).cyan(),
            state,
            style(&query.description).bold(),
            style(query.url.as_str()).dim()
        );
    }
}

fn print_images(query: &SavedQuery, images: &[wallrotate::NormalizedImage], page: u32, last_page: Option<u32>) {
    let pages = last_page.map(|l| format!("{page}/{l}")).unwrap_or_else(|| page.to_string());
    println!(
        "{} {} (page {}, {} images)",
        style(query.id.short()).cyan(),
        style(&query.description).bold(),
        pages,
        images.len()
    );

    for image in images {
        let attribution = if image.has_attribution() {
            style(image.attribution.as_str()).green()
        } else {
            style("unknown").dim()
        };
        println!("  {:<12} {} {}", image.id, attribution, style(&image.path).dim());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Commands, clap::Error> {
        Cli::try_parse_from(std::iter::once("wallrotate").chain(args.iter().copied())).map(|cli| cli.command)
    }

    #[test]
    fn test_parse_add_with_flag() {
        let command = parse(&[
            "add",
            "wallhaven",
            "Cats at night",
            "https://wallhaven.cc/search?q=cats",
            "--inactive",
        ])
        .unwrap();

        assert_eq!(
            command,
            Commands::Add {
                provider: ProviderId::Wallhaven,
                description: "Cats at night".to_string(),
                url: "https://wallhaven.cc/search?q=cats".to_string(),
                inactive: true,
            }
        );
    }

    #[test]
    fn test_parse_fetch_page() {
        assert_eq!(
            parse(&["fetch", "pexels", "3"]).unwrap(),
            Commands::Fetch { provider: ProviderId::Pexels, page: Some(3) }
        );
        assert_eq!(
            parse(&["fetch", "unsplash"]).unwrap(),
            Commands::Fetch { provider: ProviderId::Unsplash, page: None }
        );
        assert!(parse(&["fetch", "unsplash", "x"]).is_err());
    }

    #[test]
    fn test_parse_remove_yes() {
        assert_eq!(
            parse(&["remove", "Wallhaven", "abc123", "--yes"]).unwrap(),
            Commands::Remove {
                provider: ProviderId::Wallhaven,
                id: "abc123".to_string(),
                yes: true,
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&["list", "flickr"]).is_err());
        assert!(parse(&["remove", "wallhaven"]).is_err());
        assert!(parse(&["bogus"]).is_err());
        assert!(parse(&["list", "wallhaven", "--force"]).is_err());
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resolve_id_prefix() {
        use wallrotate::config::MemoryConfigStore;
        use wallrotate::ProviderDefinition;

        let normalizer = Normalizer::new(Arc::new(ProviderDefinition::wallhaven()));
        let store = QueryStore::open(normalizer, Arc::new(MemoryConfigStore::new())).unwrap();
        let id = store
            .add_query("Cats and more", "https://wallhaven.cc/search?q=cats", true)
            .unwrap();

        assert_eq!(resolve_id(&store, &id.as_str()[..6]).unwrap(), id);
        assert!(resolve_id(&store, "").is_err());
        assert!(resolve_id(&store, "zzzz").is_err());
    }
}
