mod format;
mod tui;


use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::catalog::{CatalogClient, HttpCatalog};
use crate::cli::{Cli, Command};
use crate::config::load_config;
use crate::db::Database;
use crate::model::Show;
use crate::paths::{config_file_path, database_file_path, preferences_file_path};
use crate::prefs::{JsonPreferences, Preferences};
use crate::sync::{
    Clock, EpisodesSynchronizer, SeasonEpisodes, ShowsSynchronizer, SystemClock,
};

use self::format::{format_rating, format_synced_at, truncate};

/// Process-wide collaborators shared by the CLI commands and the TUI.
pub(crate) struct Services {
    pub(crate) prefs: Arc<dyn Preferences>,
    pub(crate) shows: Arc<ShowsSynchronizer>,
    pub(crate) episodes: Arc<EpisodesSynchronizer>,
}

impl Services {
    fn open(data_dir: &Path) -> Result<Self> {
        let config = load_config(config_file_path().as_deref());
        let catalog: Arc<dyn CatalogClient> = Arc::new(HttpCatalog::new(
            &config.base_url,
            config.connect_timeout,
            config.read_timeout,
        ));
        let db = Arc::new(open_db(data_dir)?);
        let prefs: Arc<dyn Preferences> =
            Arc::new(JsonPreferences::open(&preferences_file_path(data_dir))?);
        info!(data_dir = %data_dir.display(), base_url = %config.base_url, "services ready");
        Ok(Self::new(catalog, db, prefs, Arc::new(SystemClock)))
    }

    pub(crate) fn new(
        catalog: Arc<dyn CatalogClient>,
        db: Arc<Database>,
        prefs: Arc<dyn Preferences>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shows: Arc::new(ShowsSynchronizer::new(
                Arc::clone(&catalog),
                Arc::clone(&db),
                Arc::clone(&prefs),
                Arc::clone(&clock),
            )),
            episodes: Arc::new(EpisodesSynchronizer::new(
                catalog,
                db,
                Arc::clone(&prefs),
                clock,
            )),
            prefs,
        }
    }
}

pub fn run(cli: Cli, data_dir: &Path) -> Result<()> {
    let services = Services::open(data_dir)?;

    match cli.command {
        Some(Command::Sync { force }) => run_sync(&services, force)?,
        Some(Command::List { favorites }) => run_list(&services, favorites)?,
        Some(Command::Search { query }) => run_search(&services, &query)?,
        Some(Command::Episodes {
            show_api_id,
            cached,
        }) => run_episodes(&services, show_api_id, cached)?,
        Some(Command::ClearCache) => run_clear_cache(&services)?,
        Some(Command::Tui) | None => tui::run_tui(&services)?,
    }

    Ok(())
}

fn run_sync(services: &Services, force: bool) -> Result<()> {
    let before = services.shows.synced_at();
    let shows = services.shows.get_shows(force)?;
    let after = services.shows.synced_at();
    if after != before {
        println!("Synchronized {} shows.", shows.len());
    } else {
        println!(
            "Show list is still fresh ({} shows, last sync {}). Use --force to refetch.",
            shows.len(),
            format_synced_at(after)
        );
    }
    Ok(())
}

fn run_list(services: &Services, favorites_only: bool) -> Result<()> {
    let mut shows = services.shows.get_cached_shows()?;
    if favorites_only {
        shows.retain(|show| show.is_favorite);
    }
    if shows.is_empty() {
        if favorites_only {
            println!("No favorite shows yet. Mark some with `f` in `tvtrack tui`.");
        } else {
            println!("No cached shows yet. Run `tvtrack sync` first.");
        }
        return Ok(());
    }

    for line in show_table(&shows) {
        println!("{line}");
    }
    println!(
        "\nLast synchronized: {}",
        format_synced_at(services.shows.synced_at())
    );
    Ok(())
}

fn run_search(services: &Services, query: &str) -> Result<()> {
    let shows = services.shows.search_shows_by_name(query)?;
    if shows.is_empty() {
        println!("No cached show matches `{query}`.");
        return Ok(());
    }
    for line in show_table(&shows) {
        println!("{line}");
    }
    Ok(())
}

fn run_episodes(services: &Services, show_api_id: i64, cached: bool) -> Result<()> {
    let groups = if cached {
        services.episodes.get_cached_episodes(show_api_id)?
    } else {
        services.episodes.get_episodes(show_api_id)?
    };
    if groups.is_empty() {
        println!("No episodes found for show {show_api_id}.");
        return Ok(());
    }
    for line in episode_listing(&groups) {
        println!("{line}");
    }
    Ok(())
}

fn run_clear_cache(services: &Services) -> Result<()> {
    clear_cache(services)?;
    println!("Cache cleared. The next read fetches from the catalog.");
    Ok(())
}

pub(crate) fn clear_cache(services: &Services) -> Result<()> {
    services.episodes.clear()?;
    services.shows.invalidate()?;
    info!("cache cleared");
    Ok(())
}

pub(crate) fn show_table(shows: &[Show]) -> Vec<String> {
    let mut lines = vec![format!(
        "{:<8} {:<40} {:<7} {:<3}",
        "API ID", "NAME", "RATING", "FAV"
    )];
    lines.extend(shows.iter().map(|show| {
        format!(
            "{:<8} {:<40} {:<7} {:<3}",
            show.api_id,
            truncate(&show.name, 40),
            format_rating(show.rating),
            if show.is_favorite { "*" } else { "" }
        )
        .trim_end()
        .to_string()
    }));
    lines
}

pub(crate) fn episode_listing(groups: &SeasonEpisodes) -> Vec<String> {
    let mut lines = Vec::new();
    for (season, episodes) in groups {
        lines.push(format!("Season {season}"));
        for episode in episodes {
            lines.push(format!(
                "  {:>3}  {:<48} {}",
                episode.number,
                truncate(&episode.name, 48),
                format_rating(episode.rating)
            ));
        }
    }
    lines
}

fn open_db(data_dir: &Path) -> Result<Database> {
    let db = Database::open(&database_file_path(data_dir))?;
    db.migrate()?;
    Ok(db)
}
