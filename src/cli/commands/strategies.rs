//! List strategies command.

use anyhow::Result;
use fx_strategies::StrategyRegistry;

pub async fn run() -> Result<()> {
    let registry = StrategyRegistry::new();

    println!("Available Strategies");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for info in registry.list() {
        println!("  {} ({})", info.name, info.key);
        println!("  ───────────────────────────────────────────────────────");
        println!("  {}", info.description);
        if info.uses_history {
            println!("  Reads the historical series store.");
        }
        println!("  Defaults: {}", serde_json::to_string(&info.default_config)?);
        println!();
    }

    println!("Select one with [strategy] name = \"<key>\" and override defaults under [strategy.params].");

    Ok(())
}
