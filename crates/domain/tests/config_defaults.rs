use std::io::Write;

use wg_domain::config::Config;
use wg_domain::error::Error;

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 3300);
}

#[test]
fn default_cors_allows_only_localhost() {
    let config = Config::default();
    assert!(config.server.cors.allowed_origins.contains(&"http://localhost:*".to_string()));
    assert!(config.server.cors.allowed_origins.contains(&"http://127.0.0.1:*".to_string()));
}

#[test]
fn whatsapp_section_overrides_defaults() {
    let config = Config::from_toml(
        r#"
[whatsapp]
session_prefix = "tenant_"
country_code = "351"
min_phone_digits = 11

[driver]
command = "node"
args = ["bridge.js"]
"#,
    )
    .unwrap();
    assert_eq!(config.whatsapp.session_prefix, "tenant_");
    assert_eq!(config.whatsapp.country_code, "351");
    assert_eq!(config.whatsapp.min_phone_digits, 11);
    assert_eq!(config.whatsapp.recovery_timeout_ms, 10_000);
    assert_eq!(config.driver.command, "node");
}

#[test]
fn load_reads_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[server]\nport = 8088").unwrap();
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.server.port, 8088);
}

#[test]
fn load_reports_parse_errors() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[server\nport = ").unwrap();
    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(err, Error::Toml(_)));
}

#[test]
fn from_toml_wraps_errors_as_config() {
    let err = Config::from_toml("server = 3").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
