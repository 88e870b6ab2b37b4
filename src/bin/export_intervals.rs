//! export_intervals - dump persisted interval rows for inspection

use anyhow::Result;
use clap::Parser;

use lanewatch::SqliteIntervalStore;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the interval database.
    #[arg(long, env = "LANEWATCH_DB_PATH", default_value = "lanewatch.db")]
    db_path: String,
    /// Maximum rows to print (96 = one day of 15-minute buckets).
    #[arg(long, default_value_t = 96)]
    limit: usize,
    /// Emit JSON lines instead of a table.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let store = SqliteIntervalStore::open(&args.db_path)?;
    let rows = store.rows(args.limit)?;

    if args.json {
        for row in &rows {
            println!("{}", serde_json::to_string(row)?);
        }
        return Ok(());
    }

    println!(
        "{:<12} {:<15} {:>6} {:>6} {:>6} {:>6}",
        "date", "interval", "cyc", "b", "p", "c"
    );
    for row in &rows {
        println!(
            "{:<12} {:<15} {:>6} {:>6} {:>6} {:>6}",
            row.the_date,
            row.time_interval,
            row.counts.cyc,
            row.counts.b,
            row.counts.p,
            row.counts.c
        );
    }
    if rows.is_empty() {
        eprintln!("no intervals stored in {}", args.db_path);
    }
    Ok(())
}
