use wg_domain::config::{Config, ConfigSeverity};

/// Print every validation issue; `true` when none is an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("{config_path}: ok");
        return true;
    }

    for issue in &issues {
        println!("{issue}");
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    println!(
        "\n{config_path}: {errors} error(s), {} warning(s)",
        issues.len() - errors
    );
    errors == 0
}

/// Render the resolved config, defaults included, as TOML.
pub fn show(config: &Config) -> anyhow::Result<String> {
    Ok(toml::to_string_pretty(config)?)
}
