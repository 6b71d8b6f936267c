use anyhow::{bail, Result};
use std::env;
use std::path::Path;

use company_tracker::{import_entries, load_csv, Config, Store};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = Config::from_env()?;

    match args.get(1).map(String::as_str) {
        Some("import") => match args.get(2) {
            Some(csv_path) => run_import(&config, Path::new(csv_path))?,
            None => bail!("usage: company-tracker import <file.csv>"),
        },
        Some("list") => run_list(&config)?,
        _ => print_usage(),
    }

    Ok(())
}

fn run_import(config: &Config, csv_path: &Path) -> Result<()> {
    println!("📂 Import: CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load and validate CSV
    println!("\n📂 Loading CSV {:?}...", csv_path);
    let entries = load_csv(csv_path)?;
    println!("✓ Loaded {} entries from CSV", entries.len());

    // 2. Open store
    let store = Store::open(&config.database_path)?;
    println!("✓ Database opened: {:?}", config.database_path);

    // 3. Ingest
    println!("\n💾 Ingesting entries...");
    let summary = import_entries(&store, &entries)?;
    println!("✓ Companies created: {}", summary.created);
    println!("✓ Entries appended:  {}", summary.appended);

    let count = store.count_companies()?;
    store.close()?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Imported {} entries, database holds {} companies", summary.total(), count);

    Ok(())
}

fn run_list(config: &Config) -> Result<()> {
    if !config.database_path.exists() {
        eprintln!("❌ Database not found at {:?}", config.database_path);
        eprintln!("   Run: company-tracker import <file.csv>");
        std::process::exit(1);
    }

    let store = Store::open(&config.database_path)?;
    let companies = store.get_all_companies()?;

    for company in &companies {
        let latest = match company.latest_entry() {
            Some(e) => format!(
                "{:+}% ({})",
                e.entry_type.signed(e.percent),
                e.day().format("%d-%m-%Y")
            ),
            None => "—".to_string(),
        };
        println!("{:<30} {:>4} entries   latest: {}", company.name, company.entries.len(), latest);
    }
    println!("\n{} companies", companies.len());

    store.close()?;
    Ok(())
}

fn print_usage() {
    println!("company-tracker {}", company_tracker::VERSION);
    println!();
    println!("USAGE:");
    println!("  company-tracker import <file.csv>   Ingest rows (name,type,percent,date)");
    println!("  company-tracker list                Show every company and its latest entry");
    println!();
    println!("Web UI: cargo run --bin company-server");
}
