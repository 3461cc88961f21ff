//! Layered settings CLI
//!
//! Entry point for the `settings` command-line tool.

use clap::{Parser, Subcommand};
use layered_settings::config::{export, is_secret_key, DEFAULT_ENV_PREFIX, REDACTED};
use layered_settings::{ExportFormat, LoadedSettings, SettingsLoader};
use std::path::PathBuf;
use std::process;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "settings")]
#[command(about = "Inspect layered application settings", version)]
struct Cli {
    /// Prefix of environment variables mapped to settings
    #[arg(long, global = true, default_value = DEFAULT_ENV_PREFIX)]
    prefix: String,

    /// Installation file (repeatable, later files win)
    #[arg(long = "config", short = 'c', global = true)]
    configs: Vec<PathBuf>,

    /// Project settings file
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Local overrides file
    #[arg(long, global = true)]
    local: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every resolved setting
    Show {
        /// Output format: json, toml, env or installation
        #[arg(long, short = 'f', default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Print secrets instead of [REDACTED]
        #[arg(long)]
        reveal: bool,
    },

    /// Print one resolved setting
    Get {
        key: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List the layers that contributed to the settings
    Sources {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show where a setting comes from and every layer defining it
    Explain { key: String },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let settings = load(&cli);

    match cli.command {
        Commands::Show { format, reveal } => run_show(&settings, format, reveal),
        Commands::Get { key, json } => run_get(&settings, &key, json),
        Commands::Sources { json } => run_sources(&settings, json),
        Commands::Explain { key } => run_explain(&settings, &key),
    }
}

fn load(cli: &Cli) -> LoadedSettings {
    let mut loader = SettingsLoader::new().env_prefix(&cli.prefix);
    if let Some(path) = &cli.project {
        loader = loader.project_defaults(path);
    }
    for path in &cli.configs {
        loader = loader.installation_file(path);
    }
    if let Some(path) = &cli.local {
        loader = loader.local_overrides(path);
    }

    match loader.load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            process::exit(1);
        }
    }
}

fn run_show(settings: &LoadedSettings, format: ExportFormat, reveal: bool) {
    let effective = settings.effective(reveal);

    let output = match format {
        ExportFormat::Json => effective.to_json().map_err(|e| e.to_string()),
        other => export(
            &effective.settings,
            settings.fields(),
            settings.env_prefix(),
            other,
        )
        .map_err(|e| e.to_string()),
    };

    match output {
        Ok(text) => print!("{}", ensure_newline(text)),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_get(settings: &LoadedSettings, key: &str, json: bool) {
    let Some(value) = settings.get(key) else {
        eprintln!("Unknown setting: {}", key);
        process::exit(1);
    };

    if json {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("{}", settings_core::template::render_value(value));
    }
}

fn run_sources(settings: &LoadedSettings, json: bool) {
    if json {
        match serde_json::to_string_pretty(settings.sources()) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    for source in settings.sources() {
        let origin = serde_json::to_value(source.origin)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        print!("{:>4}  {:<16} {:<13}", source.priority, source.name, origin);
        if let Some(path) = &source.path {
            print!(" {}", path.display());
        }
        if let Some(digest) = &source.digest {
            print!(" (sha256:{})", &digest[..12.min(digest.len())]);
        }
        println!();
    }
}

fn run_explain(settings: &LoadedSettings, key: &str) {
    let history = settings.history(key);
    if history.is_empty() {
        eprintln!("Unknown setting: {}", key);
        process::exit(1);
    }

    let effective = settings.effective(false);
    if let Some(value) = effective.get(key) {
        println!("{} = {}", key, value);
    }
    if let Some(entry) = settings.merged().entry(key) {
        println!("  winner: {} (priority {})", entry.layer, entry.priority);
    }

    let secret = is_secret_key(key);
    println!("  defined in (lowest priority first):");
    for (layer, raw) in history {
        let shown = if secret { REDACTED.to_string() } else { raw.describe() };
        let path = settings
            .sources()
            .iter()
            .find(|s| s.name == layer.name())
            .and_then(|s| s.path.as_ref());
        match path {
            Some(path) => println!(
                "    {} [{}] {}: {}",
                layer.name(),
                layer.priority(),
                path.display(),
                shown
            ),
            None => println!("    {} [{}]: {}", layer.name(), layer.priority(), shown),
        }
    }

    if let Some(field) = settings.fields().iter().find(|f| f.setting_name == key) {
        if let Some((section, option)) = field.section_option() {
            println!("  installation file: [{}] {}", section, option);
        }
        if let Some(var) = field.env_key(settings.env_prefix()) {
            println!("  environment: {}", var);
        }
        if let Some(help) = &field.help {
            println!("  {}", help);
        }
    }
}

fn ensure_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
