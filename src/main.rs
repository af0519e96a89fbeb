//! CLI entry point for `mboxseek`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};

use mboxseek::config::Config;
use mboxseek::index::indexer::ScanOptions;
use mboxseek::index::{builder, reader as index_reader};
use mboxseek::model::message::MessageDescriptor;
use mboxseek::store::reader::MboxStore;

#[derive(Parser)]
#[command(
    name = "mboxseek",
    version,
    about = "Index MBOX files and fetch single messages by position"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Force rebuild index even if one already exists
    #[arg(short, long, global = true)]
    force: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Bytes per block read (overrides the config file)
    #[arg(long, value_name = "BYTES", global = true, env = "MBOXSEEK_BLOCK_SIZE")]
    block_size: Option<usize>,

    /// Keep a leading "Mail System Internal Data" message in the index
    #[arg(long, global = true)]
    keep_internal_data: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index an MBOX file and print statistics
    Index {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List indexed messages
    List {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the raw bytes of message N (0-based)
    Show { path: PathBuf, number: usize },
    /// Print the parsed headers of message N (0-based)
    Headers {
        path: PathBuf,
        number: usize,
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config {
        /// Write it to the config file location
        #[arg(long)]
        save: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = mboxseek::config::load_config();
    if let Some(block_size) = cli.block_size {
        config.scan.block_size = block_size;
    }
    if cli.keep_internal_data {
        config.scan.skip_internal_data = false;
    }
    config.validate()?;

    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    let force = cli.force;

    match cli.command {
        Commands::Index { path, json } => cmd_index(&path, json, force, &config),
        Commands::List { path, json } => cmd_list(&path, json, force, &config),
        Commands::Show { path, number } => cmd_show(&path, number, force, &config),
        Commands::Headers { path, number, json } => {
            cmd_headers(&path, number, json, force, &config)
        }
        Commands::Config { save } => cmd_config(&config, save),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = mboxseek::config::log_file_path(config);
    let log_dir = log_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "mboxseek.log".into());
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Build or load the index, showing a progress bar while scanning.
fn load_entries(path: &Path, force: bool, config: &Config) -> anyhow::Result<Vec<MessageDescriptor>> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let file_size = std::fs::metadata(path)?.len();
    let pb = ProgressBar::new(file_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} Indexing [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let options = ScanOptions::from(config);
    let progress = |current: u64, total: u64| {
        pb.set_length(total);
        pb.set_position(current);
    };

    let entries = if config.general.persist_index {
        builder::build_index(path, force, &options, Some(&progress))?
    } else {
        builder::scan_file(path, &options, Some(&progress))?
    };
    pb.finish_and_clear();
    Ok(entries)
}

fn entry_at(entries: &[MessageDescriptor], number: usize) -> anyhow::Result<&MessageDescriptor> {
    entries.get(number).ok_or_else(|| {
        anyhow::anyhow!(
            "Message {number} does not exist ({} message(s) indexed)",
            entries.len()
        )
    })
}

/// Index an MBOX file and print statistics.
fn cmd_index(path: &Path, json: bool, force: bool, config: &Config) -> anyhow::Result<()> {
    let start = Instant::now();
    let entries = load_entries(path, force, config)?;
    let elapsed = start.elapsed();
    let file_size = std::fs::metadata(path)?.len();
    let idx_size = builder::index_file_size(path);

    if json {
        print_stats_json(path, file_size, &entries, elapsed, idx_size)
    } else {
        print_stats_table(path, file_size, &entries, elapsed, idx_size);
        Ok(())
    }
}

/// List every indexed message.
fn cmd_list(path: &Path, json: bool, force: bool, config: &Config) -> anyhow::Result<()> {
    let entries = load_entries(path, force, config)?;

    if json {
        let items: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "index": e.sequence,
                    "position": e.position,
                    "header_length": e.header_length,
                    "content_length": e.content_length,
                    "total_length": e.total_length,
                    "content_length_declared": e.content_length_declared,
                    "subject": e.subject(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    println!(
        "  {:<6} {:>12} {:>8} {:>10} {:<50}",
        "#", "Offset", "Headers", "Body", "Subject"
    );
    println!("  {}", "-".repeat(90));
    for e in &entries {
        let subject: String = e.subject().unwrap_or("").chars().take(49).collect();
        let marker = if e.content_length_declared { "" } else { "*" };
        println!(
            "  {:<6} {:>12} {:>8} {:>9}{:1} {:<50}",
            e.sequence,
            e.position,
            e.header_length,
            e.content_length,
            marker,
            subject
        );
    }
    println!();
    println!("  * body length found by scanning for the next envelope line");
    Ok(())
}

/// Print the raw bytes of one message.
fn cmd_show(path: &Path, number: usize, force: bool, config: &Config) -> anyhow::Result<()> {
    let entries = load_entries(path, force, config)?;
    let entry = entry_at(&entries, number)?;
    let mut store = MboxStore::with_cache_size(path, config.store.lru_cache_size)?;
    let raw = store.get_message(entry)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(raw)?;
    stdout.flush()?;
    Ok(())
}

/// Print the parsed headers of one message.
fn cmd_headers(
    path: &Path,
    number: usize,
    json: bool,
    force: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let entries = load_entries(path, force, config)?;
    let entry = entry_at(&entries, number)?;

    if json {
        let output = serde_json::json!({
            "position": entry.position,
            "header_length": entry.header_length,
            "content_length": entry.content_length,
            "headers": entry.headers.to_json(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for (name, value) in entry.headers.iter() {
        for v in value.values() {
            println!("{name}:{v}");
        }
    }
    Ok(())
}

/// Print (and optionally save) the effective configuration.
fn cmd_config(config: &Config, save: bool) -> anyhow::Result<()> {
    if save {
        mboxseek::config::save_config(config)?;
        if let Some(path) = mboxseek::config::config_file_path() {
            println!("  Saved configuration to {}", path.display());
        }
        return Ok(());
    }
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Print statistics in a human-readable table.
fn print_stats_table(
    path: &Path,
    file_size: u64,
    entries: &[MessageDescriptor],
    elapsed: std::time::Duration,
    idx_size: u64,
) {
    println!();
    println!("  {:<22} {}", "File", path.display());
    println!("  {:<22} {}", "File size", format_size(file_size, BINARY));
    println!("  {:<22} {}", "Messages", entries.len());

    let declared = index_reader::count_declared(entries);
    println!(
        "  {:<22} {} ({} recovered by scan)",
        "Declared lengths",
        declared,
        entries.len() - declared
    );

    if let Some(largest) = index_reader::largest(entries) {
        println!(
            "  {:<22} #{} ({})",
            "Largest message",
            largest.sequence,
            format_size(largest.total_length, BINARY)
        );
    }

    if idx_size > 0 {
        println!("  {:<22} {}", "Index size", format_size(idx_size, BINARY));
    }

    println!("  {:<22} {:.2?}", "Indexing time", elapsed);

    let top = index_reader::top_senders(entries, 10);
    if !top.is_empty() {
        println!();
        println!("  Top senders:");
        for (sender, count) in &top {
            println!("    {count:>6}  {sender}");
        }
    }
    println!();
}

/// Print statistics as JSON.
fn print_stats_json(
    path: &Path,
    file_size: u64,
    entries: &[MessageDescriptor],
    elapsed: std::time::Duration,
    idx_size: u64,
) -> anyhow::Result<()> {
    let top: Vec<serde_json::Value> = index_reader::top_senders(entries, 10)
        .iter()
        .map(|(sender, count)| {
            serde_json::json!({
                "sender": sender,
                "count": count,
            })
        })
        .collect();

    let stats = serde_json::json!({
        "file": path.to_string_lossy(),
        "file_size": file_size,
        "message_count": entries.len(),
        "declared_lengths": index_reader::count_declared(entries),
        "indexed_bytes": index_reader::total_bytes(entries),
        "index_size": idx_size,
        "indexing_time_ms": elapsed.as_millis(),
        "top_senders": top,
    });

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
