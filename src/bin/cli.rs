//! Keiba Odds CLI - capture and inspect JRA odds from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use keiba_odds::core::format_pair;
use keiba_odds::models::{BetType, Diagnostic, OddsSnapshot, Route};
use keiba_odds::race::{get_venue_name, RaceId};
use keiba_odds::scraper::{
    extract_exacta_odds, extract_place_odds, extract_quinella_odds, extract_trifecta_odds,
    extract_trio_odds, extract_win_odds,
};
use keiba_odds::RaceOdds;

#[cfg(feature = "chromium")]
use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "chromium")]
use keiba_odds::config::NavigatorConfig;
#[cfg(feature = "chromium")]
use keiba_odds::scraper::{ChromiumLauncher, Navigator};

#[derive(Parser)]
#[command(name = "keiba-odds")]
#[command(author, version, about = "JRA real-time odds CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture odds for one race from jra.go.jp (requires chromium feature)
    #[cfg(feature = "chromium")]
    Fetch {
        /// Race id: year, venue, meeting, day, race (e.g. 202505041007)
        race_id: String,

        /// Bet types to skip, comma separated (default: wakuren,wide)
        #[arg(long, value_delimiter = ',')]
        skip: Vec<BetType>,

        /// Capture every tab, ignoring the skip list
        #[arg(long, conflicts_with = "skip")]
        all: bool,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Delay before each click in milliseconds
        #[arg(long)]
        delay: Option<u64>,

        /// Overall capture timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List venue codes
    Venues,

    /// Show how a race id is resolved to link labels
    Parse {
        /// Race id (12 digits)
        race_id: String,
    },

    /// Run one extractor over a saved odds page
    Extract {
        /// Bet type of the page (tanpuku, umaren, umatan, sanrenpuku, sanrentan)
        bet_type: BetType,

        /// Saved HTML file
        html_file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        #[cfg(feature = "chromium")]
        Commands::Fetch {
            race_id,
            skip,
            all,
            headed,
            delay,
            timeout,
            json,
        } => {
            let mut config = NavigatorConfig::from_env();
            if all {
                config.skip_bet_types.clear();
            } else if !skip.is_empty() {
                config.skip_bet_types = skip;
            }
            if headed {
                config.headless = false;
            }
            if let Some(ms) = delay {
                config.click_delay_ms = ms;
            }
            if let Some(secs) = timeout {
                config.timeout_secs = secs;
            }
            run_fetch(&race_id, config, json)?;
        }
        Commands::Venues => list_venues(),
        Commands::Parse { race_id } => parse_race_id(&race_id)?,
        Commands::Extract {
            bet_type,
            html_file,
        } => run_extract(bet_type, &html_file)?,
    }

    Ok(())
}

#[cfg(feature = "chromium")]
fn run_fetch(race_id: &str, config: NavigatorConfig, json: bool) -> Result<()> {
    let race = RaceId::parse(race_id).with_context(|| format!("Invalid race id {race_id}"))?;

    if !json {
        println!("{}", "Keiba Odds".cyan().bold());
        println!(
            "{}: {} {} {}",
            "Fetching".green(),
            race,
            race.meeting_name(),
            race.race_name()
        );
        if !config.skip_bet_types.is_empty() {
            let skipped: Vec<&str> = config.skip_bet_types.iter().map(|b| b.tag()).collect();
            println!("{}: {}", "Skipping".dimmed(), skipped.join(", "));
        }
        println!();
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let navigator = Navigator::new(ChromiumLauncher::new(&config), config);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("Invalid spinner template")?,
    );
    pb.set_message("Navigating jra.go.jp...");
    pb.enable_steady_tick(std::time::Duration::from_millis(120));

    let result = rt.block_on(navigator.capture(race.as_str()));
    pb.finish_and_clear();

    match result {
        Ok(snapshot) => {
            let odds = RaceOdds::from_snapshot(race.as_str(), &snapshot);
            if json {
                println!("{}", serde_json::to_string_pretty(&odds)?);
            } else {
                print_race_odds(&odds);
            }
            Ok(())
        }
        Err(failure) => {
            eprintln!("{}: {}", "Capture failed".red().bold(), failure);
            if !failure.partial.pages.is_empty() {
                let odds = RaceOdds::from_snapshot(race.as_str(), &failure.partial);
                if json {
                    println!("{}", serde_json::to_string_pretty(&odds)?);
                } else {
                    println!("{}", "Partial result:".yellow().bold());
                    print_race_odds(&odds);
                }
            }
            Err(failure).context(format!("Failed to capture odds for {race}"))
        }
    }
}

fn print_race_odds(odds: &RaceOdds) {
    println!(
        "{} ({:?}, {})",
        "単勝・複勝 (Win / Place):".yellow().bold(),
        odds.route,
        odds.captured_at
    );
    println!("{:>4} {:>8} {:>8}", "馬番", "単勝", "複勝");
    println!("{}", "-".repeat(24));

    let horses: BTreeSet<u8> = odds
        .tansho
        .keys()
        .chain(odds.fukusho.keys())
        .copied()
        .collect();
    for horse in horses {
        println!(
            "{:>4} {:>8} {:>8}",
            horse,
            format_odds(odds.tansho.get(&horse)),
            format_odds(odds.fukusho.get(&horse))
        );
    }
    println!();

    let counts = [
        ("馬連", odds.umaren.len()),
        ("馬単", odds.umatan.len()),
        ("3連複", odds.sanrenpuku.len()),
        ("3連単", odds.sanrentan.len()),
    ];
    let summary: Vec<String> = counts
        .iter()
        .filter(|(_, n)| *n > 0)
        .map(|(name, n)| format!("{name} {n}"))
        .collect();
    if !summary.is_empty() {
        println!("{}: {}", "Combinations".green(), summary.join(" / "));
        println!();
    }

    println!("{}", "軸馬 (Axis):".yellow().bold());
    match odds.axis.axis {
        Some(axis) => {
            for favourite in &odds.axis.favourites {
                let (a, b) = favourite.horses;
                println!("  {:<7} {:>8.1}", format_pair(a, b), favourite.odds);
            }
            println!("  {} {}", "→".green(), format!("{axis}").bold());
            println!("{}", "-".repeat(24));
            for partner in &odds.axis.partners {
                println!(
                    "  {:<7} {:>8.1}",
                    format_pair(axis, partner.horse),
                    partner.odds
                );
            }
        }
        None => println!("{}", "(馬連オッズが不足しています)".dimmed()),
    }

    print_diagnostics(&odds.diagnostics);
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    println!();
    println!("{} ({})", "Diagnostics:".yellow().bold(), diagnostics.len());
    for diagnostic in diagnostics {
        println!("  {}", diagnostic.to_string().dimmed());
    }
}

fn format_odds(odds: Option<&f64>) -> String {
    odds.map(|o| format!("{:.1}", o))
        .unwrap_or_else(|| "-".to_string())
}

fn list_venues() {
    println!("{}", "Venue Codes:".yellow().bold());
    println!("{}", "-".repeat(20));
    for code in 1..=10u8 {
        if let Some(name) = get_venue_name(code) {
            println!("  {:02}: {}", code, name);
        }
    }
}

fn parse_race_id(race_id: &str) -> Result<()> {
    let race = RaceId::parse(race_id).with_context(|| format!("Invalid race id {race_id}"))?;

    println!("{}: {}", "Race".green(), race);
    println!("  venue:   {:02} {}", race.venue_code(), race.venue_name());
    println!("  meeting: {}", race.meeting());
    println!("  day:     {}", race.day());
    println!("  race:    {}", race.race_no());
    println!();
    println!("{}", "Link labels:".yellow().bold());
    println!("  {}", race.meeting_name());
    println!("  {}", race.race_name());
    Ok(())
}

fn run_extract(bet_type: BetType, html_file: &Path) -> Result<()> {
    let html = std::fs::read_to_string(html_file)
        .with_context(|| format!("Failed to read {:?}", html_file))?;

    let mut snapshot = OddsSnapshot::new(Route::Direct);
    snapshot.pages.insert(bet_type, html);

    println!(
        "{}: {} from {:?}",
        "Extracting".green(),
        bet_type,
        html_file
    );
    println!();

    let diagnostics = match bet_type {
        BetType::Tanpuku => {
            let win = extract_win_odds(&snapshot);
            let place = extract_place_odds(&snapshot);
            println!("{}", "単勝:".yellow().bold());
            print_mapping(&win.odds);
            println!("{}", "複勝:".yellow().bold());
            print_mapping(&place.odds);
            [win.diagnostics, place.diagnostics].concat()
        }
        BetType::Umaren => print_extraction(extract_quinella_odds(&snapshot)),
        BetType::Umatan => print_extraction(extract_exacta_odds(&snapshot)),
        BetType::Sanrenpuku => print_extraction(extract_trio_odds(&snapshot)),
        BetType::Sanrentan => print_extraction(extract_trifecta_odds(&snapshot)),
        BetType::Wakuren | BetType::Wide => {
            anyhow::bail!("No extractor for {} pages", bet_type);
        }
    };

    print_diagnostics(&diagnostics);
    Ok(())
}

fn print_extraction(extraction: keiba_odds::Extraction<BTreeMap<String, f64>>) -> Vec<Diagnostic> {
    print_mapping(&extraction.odds);
    extraction.diagnostics
}

fn print_mapping<K: std::fmt::Display>(odds: &BTreeMap<K, f64>) {
    if odds.is_empty() {
        println!("  {}", "(none)".dimmed());
        return;
    }
    for (key, value) in odds {
        println!("  {:<10} {:>8.1}", key, value);
    }
    println!("  {} entries", odds.len());
}
