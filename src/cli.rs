use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{Cell, Table};
use dialoguer::{Confirm, Input};

use crate::config::{self, Config};
use crate::core::delivery::MediaServices;
use crate::core::renderer::ChromeRenderer;
use crate::core::selection::MusicCommand;
use crate::models::Platform;
use crate::session::terminal::TerminalSession;
use crate::sources::xingzhige::XingzhigeClient;
use crate::sources::MusicSource;

#[derive(Parser)]
#[command(name = "music-voice", about = "Search songs and send them as voice messages")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 로그 상세도 (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search songs and generate a voice message
    #[command(visible_aliases = ["mdff", "点歌"])]
    Music {
        /// Song keyword
        keyword: Vec<String>,
        /// Platform name reported by the terminal session
        #[arg(long, default_value = "terminal")]
        platform: String,
        /// Directory for images and voice files
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print raw catalog search results
    Search {
        keyword: Vec<String>,
        /// Only query one catalog
        #[arg(long, value_enum)]
        catalog: Option<Catalog>,
    },
    /// Edit settings
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Catalog {
    Qq,
    Netease,
}

impl From<Catalog> for Platform {
    fn from(c: Catalog) -> Self {
        match c {
            Catalog::Qq => Platform::QqMusic,
            Catalog::Netease => Platform::NetEase,
        }
    }
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Music {
            keyword,
            platform,
            out,
        } => cmd_music(&keyword.join(" "), &platform, out),
        Commands::Search { keyword, catalog } => cmd_search(&keyword.join(" "), catalog),
        Commands::Config => cmd_config(),
    }
}

fn cmd_music(keyword: &str, platform: &str, out: Option<PathBuf>) -> Result<()> {
    let cfg = config::load_config();
    let source = XingzhigeClient::new(cfg.http_timeout())?;
    let renderer = ChromeRenderer::new();
    let services = MediaServices::detect(&cfg.silk_encoder);

    let out_dir = out.unwrap_or_else(|| std::env::temp_dir().join("music-voice"));
    let mut session = TerminalSession::new(platform, &out_dir)?;

    MusicCommand::new(&cfg, &source, &renderer, &services).execute(&mut session, keyword)?;
    Ok(())
}

fn cmd_search(keyword: &str, catalog: Option<Catalog>) -> Result<()> {
    if keyword.trim().is_empty() {
        bail!("a keyword is required");
    }

    let cfg = config::load_config();
    let client = XingzhigeClient::new(cfg.http_timeout())?;
    let platforms: Vec<Platform> = match catalog {
        Some(c) => vec![c.into()],
        None => Platform::ALL.to_vec(),
    };

    let mut table = Table::new();
    table.set_header(vec!["#", "Catalog", "Title", "Artist", "Album", "Pay", "ID", "Page"]);

    let mut index = 0;
    for platform in platforms {
        let tracks = match client.search_tracks(platform, keyword, cfg.result_count) {
            Ok(t) => t,
            Err(e) => {
                println!("{platform} search failed: {e:#}");
                continue;
            }
        };

        for track in &tracks {
            index += 1;
            let id = track
                .track_id
                .or(track.song_id)
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![
                Cell::new(index),
                Cell::new(platform),
                Cell::new(track.full_title()),
                Cell::new(&track.artist),
                Cell::new(&track.album),
                Cell::new(&track.pay_tier),
                Cell::new(id),
                Cell::new(&track.page_url),
            ]);
        }
    }

    if index == 0 {
        println!("No results for \"{keyword}\".");
        return Ok(());
    }

    println!("{table}");
    Ok(())
}

fn cmd_config() -> Result<()> {
    let cfg = config::load_config();

    println!("music-voice settings\n");

    let generation_tip: String = Input::new()
        .with_prompt("Generation tip")
        .with_initial_text(cfg.generation_tip.clone())
        .interact_text()?;

    let wait_timeout: u64 = Input::new()
        .with_prompt("Selection wait timeout (ms)")
        .default(cfg.wait_timeout)
        .interact_text()?;

    let exit_command: String = Input::new()
        .with_prompt("Exit commands (comma separated)")
        .with_initial_text(cfg.exit_command.clone())
        .interact_text()?;

    let menu_exit_command_tip = Confirm::new()
        .with_prompt("Show exit commands under the song list?")
        .default(cfg.menu_exit_command_tip)
        .interact()?;

    let retry_exit_command_tip = Confirm::new()
        .with_prompt("Show exit commands after an invalid index?")
        .default(cfg.retry_exit_command_tip)
        .interact()?;

    let recall = Confirm::new()
        .with_prompt("Recall the generation tip after sending?")
        .default(cfg.recall)
        .interact()?;

    let image_mode = Confirm::new()
        .with_prompt("Send the song list as an image?")
        .default(cfg.image_mode)
        .interact()?;

    let dark_mode = Confirm::new()
        .with_prompt("Dark song list image?")
        .default(cfg.dark_mode)
        .interact()?;

    let result_count: String = Input::new()
        .with_prompt("Results per catalog (empty = API default)")
        .with_initial_text(cfg.result_count.map(|n| n.to_string()).unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    let result_count = config::parse_result_count(&result_count)?;

    let http_timeout_secs: u64 = Input::new()
        .with_prompt("Catalog request timeout (s)")
        .default(cfg.http_timeout_secs)
        .interact_text()?;

    let voice_platform: String = Input::new()
        .with_prompt("Platform that needs voice encoding")
        .with_initial_text(cfg.voice_platform.clone())
        .interact_text()?;

    let silk_encoder: String = Input::new()
        .with_prompt("SILK encoder program")
        .with_initial_text(cfg.silk_encoder.clone())
        .interact_text()?;

    let cfg = Config {
        generation_tip,
        wait_timeout,
        exit_command,
        menu_exit_command_tip,
        retry_exit_command_tip,
        recall,
        image_mode,
        dark_mode,
        result_count,
        http_timeout_secs,
        voice_platform,
        silk_encoder,
    };

    config::save_config(&cfg)?;
    println!("\nSettings saved!");
    Ok(())
}
