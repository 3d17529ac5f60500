//! `dynaschema init` — Print or write a default configuration.

use dynaschema_config::AppConfig;

pub async fn run(write: bool) -> Result<(), Box<dyn std::error::Error>> {
    let default_toml = AppConfig::default_toml();
    if !write {
        print!("{default_toml}");
        return Ok(());
    }

    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete it and re-run init.");
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(&config_path, &default_toml)?;
    println!("Created config.toml at: {}", config_path.display());
    Ok(())
}
