//! Validate command implementation

use anyhow::Result;
use straddle_engine::Config;
use tracing::info;

pub fn run(config_path: String) -> Result<()> {
    let config = Config::from_file(&config_path)?;
    let schedule = config.stop_loss_schedule()?;
    info!("Configuration valid: {}", config_path);

    let session = &config.session;
    let orders = &config.orders;

    println!("\n{}", "=".repeat(60));
    println!("CONFIGURATION");
    println!("{}", "=".repeat(60));
    println!("Underlying:         {} x {} lots", config.underlying.name, config.underlying.lots);
    println!(
        "Session:            {} - {} (exit {})",
        session.market_start.format("%H:%M"),
        session.market_end.format("%H:%M"),
        session.exit_time.format("%H:%M")
    );
    println!("Entry Interval:     {} min", session.entry_interval_minutes);
    println!("Max Entries:        {}", orders.max_entries);
    println!("Hedge Distance:     {} strikes", orders.hedge_strikes_away);
    println!("Protection:         {:.2}%", orders.market_protection_pct);
    println!("Stop Buffer:        {:.2}%", orders.stop_limit_buffer_pct);
    println!("Partial Entries:    {:?}", orders.partial_entry_policy);
    println!("{}", "-".repeat(60));
    println!("Stop-loss until first row: {:.1}%", schedule.default_pct());
    for entry in schedule.entries() {
        println!("  after {}  {:>6.1}%", entry.time.format("%H:%M"), entry.pct);
    }
    println!("{}", "=".repeat(60));

    Ok(())
}
