use std::fs;

use actix_web::middleware::{Compress, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use subpage::interfaces::dispatch;
use subpage::models::{AppState, CanonicalPayload, ClientFormat};
use subpage::settings::{set_current, Settings};
use subpage::web_handlers::{self, scope_path};

/// Serves per-user proxy subscriptions in client-specific formats
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (TOML or YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Listen address (e.g., 127.0.0.1 or 0.0.0.0)
    #[arg(short, long, value_name = "ADDRESS")]
    address: Option<String>,

    /// Listen port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Canonical subscription JSON to render directly instead of starting the server
    #[arg(short, long, value_name = "FILE")]
    input: Option<String>,

    /// Client type to render with --input
    #[arg(short, long, value_name = "TOKEN", default_value = "generic")]
    format: String,

    /// Output file for --input, stdout when absent
    #[arg(short, long, value_name = "OUTPUT_FILE", requires = "input")]
    output: Option<String>,
}

fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::load_from_file(path)?,
        None => Settings::new(),
    };
    settings.apply_env();

    if let Some(address) = &args.address {
        settings.server.listen_address = address.clone();
    }
    if let Some(port) = args.port {
        settings.server.listen_port = port;
    }
    Ok(settings)
}

fn render_file(input: &str, format: &str, output: Option<&str>) -> anyhow::Result<()> {
    let content =
        fs::read_to_string(input).with_context(|| format!("failed to read input file {}", input))?;
    let payload = CanonicalPayload::from_json(&content)
        .with_context(|| format!("failed to parse canonical payload in {}", input))?;

    let rendered = dispatch(format, &payload.subscription, &payload.nodes)?;
    match output {
        Some(path) => {
            fs::write(path, &rendered.body)
                .with_context(|| format!("failed to write output file {}", path))?;
            info!("Wrote {} subscription to {}", rendered.format, path);
        }
        None => println!("{}", rendered.body_str()),
    }
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings = load_settings(&args)?;
    env_logger::init_from_env(Env::default().default_filter_or(settings.server.log_level.as_str()));
    set_current(settings);

    if let Some(input) = &args.input {
        return render_file(input, &args.format, args.output.as_deref());
    }

    let settings = Settings::current();
    let state = AppState::with_panel(settings.clone())?;
    let scope = scope_path(&settings.server.custom_sub_prefix);
    let bind = (settings.server.listen_address.clone(), settings.server.listen_port);

    info!(
        "Subscription page starting on {}:{} (prefix '{}', formats: {})",
        bind.0,
        bind.1,
        scope,
        ClientFormat::ALL.map(ClientFormat::token).join(", ")
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .service(web::scope(&scope).configure(web_handlers::config))
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
