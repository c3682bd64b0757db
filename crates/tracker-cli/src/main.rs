use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracker_cli::{
    check_snapshot, load_config, logging, migrate_snapshot, read_snapshot, timeline_snapshot,
    write_snapshot,
};

fn cli() -> Command {
    Command::new("tracker")
        .version(tracker_cli::VERSION)
        .about("Initiative and M&A deal tracker maintenance")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML tracker configuration"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("migrate")
                .about("Convert legacy initiatives to phases and write the snapshot back")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Snapshot to read"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .value_parser(value_parser!(PathBuf))
                        .help("Where to write the result (defaults to --input)"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Report records whose stored status or progress is stale")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Snapshot to read"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("timeline")
                .about("Show schedule spans and overdue records")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Snapshot to read"),
                )
                .arg(
                    Arg::new("today")
                        .long("today")
                        .value_parser(value_parser!(NaiveDate))
                        .help("Reference day as YYYY-MM-DD (defaults to the current UTC date)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    logging::init_tracing(matches.get_flag("log-json"));

    let config = load_config(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;

    match matches.subcommand() {
        Some(("migrate", args)) => {
            let input = args.get_one::<PathBuf>("input").context("--input is required")?;
            let output = args.get_one::<PathBuf>("output").unwrap_or(input);

            let store = Arc::new(read_snapshot(input)?);
            let summary = migrate_snapshot(store.clone(), &config).await?;
            write_snapshot(&store, output)?;

            println!(
                "Loaded {} records, migrated {}, wrote {}",
                summary.loaded,
                summary.migrated_count(),
                output.display()
            );
            for (collection, ids) in &summary.skipped {
                println!("  skipped in {collection}: {}", ids.len());
            }
        }
        Some(("check", args)) => {
            let input = args.get_one::<PathBuf>("input").context("--input is required")?;
            let store = Arc::new(read_snapshot(input)?);
            let summary = check_snapshot(store, &config).await?;

            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", summary.render_text());
            }
            if !summary.is_clean() {
                std::process::exit(1);
            }
        }
        Some(("timeline", args)) => {
            let input = args.get_one::<PathBuf>("input").context("--input is required")?;
            let today = args
                .get_one::<NaiveDate>("today")
                .copied()
                .unwrap_or_else(|| Utc::now().date_naive());
            let store = Arc::new(read_snapshot(input)?);
            let summary = timeline_snapshot(store, &config, today).await?;

            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", summary.render_text());
                println!("{} overdue as of {today}", summary.overdue_count());
            }
        }
        _ => {}
    }
    Ok(())
}
