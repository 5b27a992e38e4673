use pgmon::cli::Cli;
use pgmon::config::Config;
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

const ENV_VARS: [&str; 8] = [
    "VAULT_TOKEN",
    "VAULT_ADDR",
    "REVIEW_API_URL",
    "PG_LOG_PATH",
    "ENVIRONMENT",
    "PORT",
    "PGMON_REVIEW_API__URL",
    "PGMON_LOGS__WINDOW_SECS",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

fn config_file(toml_content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();
    file
}

fn cli_with_file(file: &NamedTempFile) -> Cli {
    Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    }
}

#[test]
#[serial]
fn test_load_full_valid_config() {
    clear_env();
    let file = config_file(
        r#"
        log_level = "debug"
        environment = "staging"
        log_path = "/srv/pg/log"
        [vault]
        address = "https://vault.internal:8200"
        token = "s.abc"
        mount = "kv"
        [review_api]
        url = "http://review:9000"
        timeout_secs = 5
        [server]
        host = "127.0.0.1"
        port = 9187
        system_metrics_interval_secs = 0
        [logs]
        directory = "pg_log"
        window_secs = 300
        [database]
        max_connections = 4
        connect_timeout_secs = 3
    "#,
    );

    let config = Config::load(&cli_with_file(&file)).unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.environment, "staging");
    assert_eq!(config.log_path, PathBuf::from("/srv/pg/log"));
    assert_eq!(config.vault.address, "https://vault.internal:8200");
    assert_eq!(config.vault.token, "s.abc");
    assert_eq!(config.vault.mount, "kv");
    assert_eq!(config.review_api.url, "http://review:9000");
    assert_eq!(config.review_api.timeout_secs, 5);
    assert_eq!(config.server.port, 9187);
    assert_eq!(config.server.system_metrics_interval_secs, 0);
    assert_eq!(config.logs.directory, "pg_log");
    assert_eq!(config.logs.window_secs, 300);
    assert_eq!(config.database.max_connections, 4);
    assert_eq!(config.listen_address().unwrap().to_string(), "127.0.0.1:9187");
}

#[test]
#[serial]
fn test_partial_config_uses_defaults() {
    clear_env();
    let file = config_file(
        r#"
        environment = "qa"
        [logs]
        window_secs = 120
    "#,
    );

    let config = Config::load(&cli_with_file(&file)).unwrap();
    let defaults = Config::default();

    assert_eq!(config.environment, "qa");
    assert_eq!(config.logs.window_secs, 120);
    assert_eq!(config.logs.directory, defaults.logs.directory);
    assert_eq!(config.review_api, defaults.review_api);
    assert_eq!(config.server, defaults.server);
}

#[test]
#[serial]
fn test_invalid_value_type() {
    clear_env();
    let file = config_file(
        r#"
        [server]
        port = "eighty"
    "#,
    );

    let err = Config::load(&cli_with_file(&file)).unwrap_err().to_string();
    assert!(err.contains("port"), "unexpected error: {err}");
}

#[test]
#[serial]
fn test_non_existent_config_file() {
    clear_env();
    let cli = Cli {
        config: Some(PathBuf::from("/path/to/non/existent/pgmon.toml")),
        ..Default::default()
    };
    let err = Config::load(&cli).unwrap_err().to_string();
    assert!(err.contains("configuration file not found"));
}

#[test]
#[serial]
fn test_legacy_env_vars_override_file() {
    clear_env();
    let file = config_file(
        r#"
        environment = "staging"
        [vault]
        token = "from-file"
    "#,
    );
    std::env::set_var("VAULT_TOKEN", "from-env");
    std::env::set_var("VAULT_ADDR", "http://vault:8200");
    std::env::set_var("REVIEW_API_URL", "http://review:8001");
    std::env::set_var("PG_LOG_PATH", "/data/log");
    std::env::set_var("ENVIRONMENT", "production-eu");
    std::env::set_var("PORT", "9100");

    let result = Config::load(&cli_with_file(&file));
    clear_env();
    let config = result.unwrap();

    assert_eq!(config.vault.token, "from-env");
    assert_eq!(config.vault.address, "http://vault:8200");
    assert_eq!(config.review_api.url, "http://review:8001");
    assert_eq!(config.log_path, PathBuf::from("/data/log"));
    assert_eq!(config.environment, "production-eu");
    assert_eq!(config.server.port, 9100);
}

#[test]
#[serial]
fn test_prefixed_env_vars_set_nested_keys() {
    clear_env();
    std::env::set_var("PGMON_REVIEW_API__URL", "http://review:7000");
    std::env::set_var("PGMON_LOGS__WINDOW_SECS", "900");

    let result = Config::load(&Cli::default());
    clear_env();
    let config = result.unwrap();

    assert_eq!(config.review_api.url, "http://review:7000");
    assert_eq!(config.logs.window_secs, 900);
}

#[test]
#[serial]
fn test_cli_overrides_env_and_file() {
    clear_env();
    let file = config_file(
        r#"
        environment = "staging"
        log_level = "warn"
    "#,
    );
    std::env::set_var("ENVIRONMENT", "from-env");

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        environment: Some("from-cli".to_string()),
        log_level: Some("trace".to_string()),
        review_url: Some("http://review:1234".to_string()),
        command: None,
    };
    let result = Config::load(&cli);
    clear_env();
    let config = result.unwrap();

    assert_eq!(config.environment, "from-cli");
    assert_eq!(config.log_level, "trace");
    assert_eq!(config.review_api.url, "http://review:1234");
}
