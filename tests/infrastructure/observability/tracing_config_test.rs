use parlance::infrastructure::observability::TracingConfig;
use parlance::presentation::{Environment, LoggingSettings};

#[test]
fn given_selected_environment_when_building_then_reports_its_name() {
    let config = TracingConfig::from_settings(Environment::Test, &LoggingSettings::default());

    assert_eq!(config.environment, "test");
    assert_eq!(config.default_filter, "info,parlance=debug,tower_http=debug");
}

#[test]
fn given_logging_settings_when_building_then_uses_environment_and_level() {
    let logging = LoggingSettings {
        level: "warn".to_string(),
        enable_json: true,
    };

    let config = TracingConfig::from_settings(Environment::Prod, &logging);

    assert_eq!(config.environment, "prod");
    assert_eq!(config.default_filter, "warn");
    assert!(config.json_format);
}
