//! Simulate command implementation

use anyhow::{Context, Result};
use straddle_engine::data::load_price_ticks;
use straddle_engine::driver::Driver;
use straddle_engine::oms::Broker;
use straddle_engine::Config;
use tracing::info;

pub fn run(config_path: String, prices_path: String, lots_override: Option<u32>) -> Result<()> {
    info!("Starting simulation");

    let mut config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    if let Some(lots) = lots_override {
        info!("Overriding lots to: {}", lots);
        config.underlying.lots = lots;
        config.validate().context("Invalid lots override")?;
    }

    let ticks = load_price_ticks(&prices_path)?;
    let start = ticks
        .first()
        .map(|tick| tick.datetime)
        .context("Price file has no rows")?;

    let mut driver = Driver::new(config.clone(), start)?;
    let steps = driver.replay(&ticks);
    info!(steps, ticks = ticks.len(), "Replay finished");

    let pnl = driver.pnl();
    let venue = driver.venue();

    println!("\n{}", "=".repeat(60));
    println!("SIMULATION RESULTS");
    println!("{}", "=".repeat(60));
    println!("Underlying:         {}", config.underlying.name);
    println!("Lots:               {}", config.underlying.lots);
    println!("Final Phase:        {}", driver.strategy().phase());
    println!("Groups Open:        {}", driver.strategy().session().groups.len());
    println!("Legs Traded:        {}", venue.legs().len());
    println!("Open Legs:          {}", pnl.open_legs);
    println!("Closed Legs:        {}", pnl.closed_legs);
    println!("Realized PnL:       ₹{:.2}", pnl.realized.to_f64());
    println!("Unrealized PnL:     ₹{:.2}", pnl.unrealized.to_f64());
    println!("Total PnL:          ₹{:.2}", pnl.total.to_f64());
    println!("{}", "=".repeat(60));

    info!("Simulation completed successfully");

    Ok(())
}
