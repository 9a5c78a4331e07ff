use clap::{Parser, Subcommand};
use maroon_ink::assemble::PageContext;
use maroon_ink::cms::HttpContentSource;
use maroon_ink::emit::{self, Section};
use maroon_ink::import::{self, HttpAssetStore, ImportEvent, ImportOptions};
use maroon_ink::navigator::{Navigator, RecordingSurface};
use maroon_ink::{config, output, sitemap};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "maroon-ink")]
#[command(about = "Build tooling for The Maroon Ink")]
#[command(long_about = "\
Build tooling for The Maroon Ink

Articles, inkers and published papers live in the Content Repository. The
section commands query them, write one HTML page per record under the public
directory, and point the hosting rewrites at those pages:

  public/
  ├── articles/<slug>.html
  ├── inkers/<username>.html
  ├── published-papers/<slug>.html
  └── sitemap.html
  firebase.json                    # hosting.rewrites: /articles/<slug> → page

Page templates use {{Token}} placeholders. Built-in templates are used unless
site.templates_dir points at a directory with replacements.

Run 'maroon-ink gen-config' to generate a documented site.toml.")]
#[command(version)]
struct Cli {
    /// Config file (optional; stock defaults otherwise)
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write article pages and their rewrites
    Articles,
    /// Write inker profile pages and their rewrites
    Inkers,
    /// Write published paper pages and their rewrites
    PublishedPapers,
    /// Write public/sitemap.html
    Sitemap,
    /// All sections, then the sitemap
    Build,
    /// Run the navigator for a path and print the resulting patches
    Render {
        /// Site path, e.g. /articles/my-article or /search?q=sports
        path: String,
    },
    /// Import scraped posts into the Content Repository
    Import {
        /// Posts file (defaults to import.posts from the config)
        #[arg(long, conflicts_with = "clean")]
        posts: Option<PathBuf>,
        /// Delete every previously imported article instead
        #[arg(long)]
        clean: bool,
    },
    /// Print a stock site.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Articles => build_sections(&[Section::Articles], &config::load_config(&cli.config)?)?,
        Command::Inkers => build_sections(&[Section::Inkers], &config::load_config(&cli.config)?)?,
        Command::PublishedPapers => {
            build_sections(&[Section::PublishedPapers], &config::load_config(&cli.config)?)?
        }
        Command::Sitemap => write_sitemap(&config::load_config(&cli.config)?)?,
        Command::Build => {
            let site_config = config::load_config(&cli.config)?;
            build_sections(&Section::ALL, &site_config)?;
            write_sitemap(&site_config)?;
            println!(
                "==> Build complete: {}",
                site_config.site.public_dir.display()
            );
        }
        Command::Render { path } => {
            let site_config = config::load_config(&cli.config)?;
            let source = HttpContentSource::new(&site_config.cms)?;
            let mut navigator = Navigator::new(&source, PageContext::from_config(&site_config));
            let mut surface = RecordingSurface::new();
            let outcome = navigator.load(&path, &mut surface)?;
            output::print_render(&path, &outcome, surface.patches());
        }
        Command::Import { clean: true, .. } => {
            let site_config = config::load_config(&cli.config)?;
            let store = HttpAssetStore::new(&site_config.cms)?;
            let options = ImportOptions::from_config(&site_config.import);
            let deleted = import::clean_import(&store, &options)?;
            output::print_clean_report(deleted);
        }
        Command::Import { posts, clean: false } => {
            let site_config = config::load_config(&cli.config)?;
            let posts_path = posts.unwrap_or_else(|| site_config.import.posts.clone());
            let posts = import::load_posts(&posts_path)?;
            let store = HttpAssetStore::new(&site_config.cms)?;
            let options = ImportOptions::from_config(&site_config.import);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                let mut total = 0;
                for event in rx {
                    if let ImportEvent::Started { total: n, .. } = &event {
                        total = *n;
                    }
                    for line in output::format_import_event(&event, total) {
                        println!("{}", line);
                    }
                }
            });
            let summary = import::run_import(&store, posts, &options, Some(tx))?;
            printer.join().unwrap();
            output::print_import_summary(&summary);
        }
        Command::GenConfig => print!("{}", config::stock_config_toml()),
    }

    Ok(())
}

fn build_sections(
    sections: &[Section],
    site_config: &config::SiteConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = HttpContentSource::new(&site_config.cms)?;
    for section in sections {
        let report = emit::build_section(*section, &source, site_config)?;
        output::print_emit_report(&report);
    }
    Ok(())
}

fn write_sitemap(site_config: &config::SiteConfig) -> Result<(), Box<dyn std::error::Error>> {
    let source = HttpContentSource::new(&site_config.cms)?;
    let today = chrono::Local::now().date_naive();
    let report = sitemap::write_sitemap(&source, &site_config.site.public_dir, today)?;
    output::print_sitemap_report(&report);
    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("maroon_ink={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();
}
