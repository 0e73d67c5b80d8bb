use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use serde_json::json;
use std::env;

use zap_manejo::chat::{BirthMessage, DeathMessage, RainMessage, TemperatureMessage, WeatherMessage};
use zap_manejo::{
    classify, db, setup_database, AreaParser, AreaResolver, BreedMatcher, Config, Language, Parser, RecordKind, References,
    Team,
};

const USAGE: &str = "\
Usage:
  zap-manejo setup
  zap-manejo parse <text> [account]
  zap-manejo add-breed <account> <name> <matches>
  zap-manejo add-area <account> <name> [label]
  zap-manejo add-team <account> <phone> <name> <lang>";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zap_manejo=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let config = Config::from_env()?;

    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    };

    let conn = Connection::open(&config.db_path)
        .with_context(|| format!("Failed to open database {:?}", config.db_path))?;

    match (command.as_str(), &args[1..]) {
        ("setup", []) => run_setup(&conn, &config),
        ("parse", [text]) => run_parse(&conn, text, ""),
        ("parse", [text, account]) => run_parse(&conn, text, account),
        ("add-breed", [account, name, matches]) => {
            setup_database(&conn)?;
            db::insert_breed(&conn, account, &name.to_lowercase(), matches)?;
            println!("✓ Breed {} added to account {}", name, account);
            Ok(())
        }
        ("add-area", [account, name, rest @ ..]) if rest.len() <= 1 => {
            setup_database(&conn)?;
            let label = rest.first().unwrap_or(name);
            db::insert_area(&conn, account, &name.to_lowercase(), label, "")?;
            println!("✓ Area {} added to account {}", name, account);
            Ok(())
        }
        ("add-team", [account, phone, name, lang]) => {
            setup_database(&conn)?;
            db::insert_team(
                &conn,
                &Team {
                    account: account.clone(),
                    phone_number: phone.clone(),
                    name: name.clone(),
                    language: lang.clone(),
                },
            )?;
            println!("✓ Team {} ({}) added to account {}", name, phone, account);
            Ok(())
        }
        _ => {
            eprintln!("{}", USAGE);
            bail!("Unknown command or wrong arguments: {}", args.join(" "))
        }
    }
}

fn run_setup(conn: &Connection, config: &Config) -> Result<()> {
    println!("🔧 Setting up database {:?}...", config.db_path);
    setup_database(conn)?;
    println!("✓ Database initialized with WAL mode");
    Ok(())
}

/// Classify a message without writing anything
fn run_parse(conn: &Connection, text: &str, account: &str) -> Result<()> {
    setup_database(conn)?;

    let breeds = BreedMatcher::load(conn, account)?;
    let mut areas = AreaParser::new(conn);
    areas.load_by_account(account)?;
    let refs = References {
        breeds: &breeds,
        areas: Some(&areas as &dyn AreaResolver),
    };

    let output = match classify(text, refs) {
        Some((kind, parser)) => {
            let mut preview = preview(kind, text.trim(), refs);
            preview["reply"] = json!(parser.reply(Language::PtBr.tag()));
            preview
        }
        None => json!({ "kind": null }),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn preview(kind: RecordKind, text: &str, refs: References) -> serde_json::Value {
    let collection = kind.collection();
    match kind {
        RecordKind::Death => {
            let mut message = DeathMessage::new();
            message.parse(text);
            json!({ "kind": collection, "date": message.date, "entries": message.entries })
        }
        RecordKind::Birth => {
            let mut message = BirthMessage::new(refs.breeds, refs.areas);
            message.parse(text);
            json!({
                "kind": collection,
                "date": message.date,
                "area": message.area_name(),
                "new_area": message.new_area_found,
                "entries": message.entries,
            })
        }
        RecordKind::Rain => {
            let mut message = RainMessage::new();
            message.parse(text);
            json!({ "kind": collection, "total_mm": message.total, "entries": message.entries })
        }
        RecordKind::Temperature => {
            let mut message = TemperatureMessage::new();
            message.parse(text);
            json!({ "kind": collection, "entries": message.entries })
        }
        RecordKind::Weather => {
            let mut message = WeatherMessage::new();
            message.parse(text);
            json!({ "kind": collection, "entries": message.entries })
        }
    }
}
