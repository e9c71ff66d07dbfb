// src/main.rs

mod app_logic;
mod core;

use crate::app_logic::PackSession;
use crate::core::tokenizer_utils::create_token_counter;
use crate::core::{
    AppSettings, CheckState, ConfigManagerOperations, ContentFetcherOperations,
    CoreConfigManager, JsonListingSource, ListingSourceOperations, LocalContentFetcher,
    LocalDirectoryLister, ZipContentFetcher, ZipListingSource,
};
use clap::Parser;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::error::Error;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use time::macros::format_description;

const APP_NAME: &str = "TreePacker";

/// Packs a selection of files from a listing into one text document.
#[derive(Parser, Debug)]
#[command(name = "tree_packer", version, about)]
struct Cli {
    /// Listing document (git-tree JSON object or a bare array of items)
    #[arg(long, conflicts_with_all = ["dir", "zip"], required_unless_present_any = ["dir", "zip"])]
    listing: Option<PathBuf>,

    /// Local directory to scan instead of a listing document
    #[arg(long, conflicts_with = "zip")]
    dir: Option<PathBuf>,

    /// Zip archive to read files from instead of a listing document
    #[arg(long, value_name = "ARCHIVE")]
    zip: Option<PathBuf>,

    /// Directory listing paths are resolved against (defaults to the listing's directory)
    #[arg(long, conflicts_with_all = ["dir", "zip"])]
    content_root: Option<PathBuf>,

    /// Select every file with this extension (repeatable)
    #[arg(long = "select-ext", value_name = "EXT")]
    select_ext: Vec<String>,

    /// Select every file whose path matches this glob (repeatable)
    #[arg(long = "select", value_name = "GLOB")]
    select: Vec<String>,

    /// Deselect a file or directory (repeatable)
    #[arg(long, value_name = "PATH")]
    deselect: Vec<String>,

    /// File with one path per line to use as the starting selection
    #[arg(long, value_name = "FILE")]
    paths_from: Option<PathBuf>,

    /// Write the packed document here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Write the selected files to this zip archive instead of a text pack
    #[arg(long, value_name = "FILE", conflicts_with = "output")]
    export_zip: Option<PathBuf>,

    /// Print the listing tree with selection markers instead of packing
    #[arg(long)]
    list: bool,

    /// Settings file to use instead of the per-user one
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not write extension preferences back to the settings file
    #[arg(long)]
    no_save: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    /// Also write the log to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn level_filter(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn initialize_logging(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let level = cli.level_filter();
    let config = ConfigBuilder::new()
        .set_time_format_custom(format_description!(
            "[hour]:[minute]:[second].[subsecond digits:3]"
        ))
        .set_target_level(LevelFilter::Error)
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(log_path) = &cli.log_file {
        loggers.push(WriteLogger::new(level, config, File::create(log_path)?));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}

fn load_settings(cli: &Cli) -> (Box<dyn ConfigManagerOperations>, AppSettings) {
    let manager: Box<dyn ConfigManagerOperations> = match &cli.config {
        Some(path) => Box::new(CoreConfigManager::with_settings_file(path.clone())),
        None => Box::new(CoreConfigManager::new()),
    };
    let settings = match manager.load_settings(APP_NAME) {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Main: Could not load settings, using defaults: {e}");
            AppSettings::default()
        }
    };
    (manager, settings)
}

/*
 * Picks the listing source and the fetcher that reads its files.
 * clap guarantees exactly one of `--listing`, `--dir` and `--zip`.
 */
fn listing_source(
    cli: &Cli,
    settings: &AppSettings,
) -> (Box<dyn ListingSourceOperations>, Box<dyn ContentFetcherOperations>) {
    if let Some(dir) = &cli.dir {
        let lister = LocalDirectoryLister::new(dir.clone(), settings.exclude_patterns.clone());
        return (Box::new(lister), Box::new(LocalContentFetcher::new(dir.clone())));
    }
    if let Some(archive) = &cli.zip {
        return (
            Box::new(ZipListingSource::new(archive.clone())),
            Box::new(ZipContentFetcher::new(archive.clone())),
        );
    }
    let listing = cli.listing.clone().unwrap_or_default();
    let content_root = cli.content_root.clone().unwrap_or_else(|| {
        listing
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    (
        Box::new(JsonListingSource::new(listing)),
        Box::new(LocalContentFetcher::new(content_root)),
    )
}

fn read_path_list(path: &Path) -> std::io::Result<Vec<String>> {
    Ok(fs::read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn apply_cli_selection(cli: &Cli, session: &mut PackSession) -> Result<(), Box<dyn Error>> {
    if let Some(paths_file) = &cli.paths_from {
        let paths = read_path_list(paths_file)?;
        let applied = session.restore_selection(paths.iter().map(String::as_str));
        log::info!(
            "Main: {applied} of {} listed paths selected from {paths_file:?}",
            paths.len()
        );
    }
    for extension in &cli.select_ext {
        session.toggle_extension(extension, CheckState::Checked)?;
    }
    for glob_text in &cli.select {
        let pattern = glob::Pattern::new(glob_text)?;
        if session.select_matching(&pattern)? == 0 {
            log::warn!("Main: Pattern '{glob_text}' matched no files");
        }
    }
    for path in &cli.deselect {
        session.toggle_path(path, CheckState::Unchecked)?;
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let (config_manager, mut settings) = load_settings(cli);
    let (source, fetcher) = listing_source(cli, &settings);

    let token_counter = Arc::from(create_token_counter(settings.tokenizer));
    let mut session = PackSession::new(token_counter);
    session.load_from_source(source.as_ref(), &settings.effective_extension_preferences())?;
    apply_cli_selection(cli, &mut session)?;

    let summary = session.summary();
    log::info!(
        "Main: {} of {} files selected ({} of {} bytes)",
        summary.selected_files,
        summary.total_files,
        summary.selected_bytes,
        summary.total_bytes
    );

    if cli.list {
        print!("{}", session.tree().render_listing());
    } else if let Some(archive_path) = &cli.export_zip {
        let export = session.export_selection();
        session.export_archive(&export, fetcher.as_ref(), archive_path)?;
    } else {
        let export = session.export_selection();
        let document = session.render(&export, fetcher.as_ref())?;
        match &cli.output {
            Some(path) => {
                fs::write(path, &document.text)?;
                log::info!("Main: Wrote {} bytes to {path:?}", document.text.len());
            }
            None => print!("{}", document.text),
        }
    }

    if !cli.no_save {
        settings.merge_extension_preferences(&session.extension_preferences());
        if let Err(e) = config_manager.save_settings(APP_NAME, &settings) {
            log::warn!("Main: Could not save settings: {e}");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = initialize_logging(&cli) {
        eprintln!("Failed to initialize logging: {e}");
    }
    log::debug!("Main: Starting {APP_NAME} with {cli:?}");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Main: {e}");
            ExitCode::FAILURE
        }
    }
}
