use std::io::Write;

use relief_core::config::{AppConfig, ModelProvider};
use relief_core::error::ReliefError;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(content.as_bytes()).expect("write toml");
    tmp
}

#[test]
fn test_load_full_config_from_file() {
    let tmp = write_config(
        r#"
[model]
provider = "groq"
model_id = "llama3-70b-8192"
max_tokens = 2048
temperature = 0.2

[model.retry]
max_retries = 5
initial_backoff_ms = 500
max_backoff_ms = 10000

[credentials]
openai_api_key = "sk-test"
groq_api_key = "gsk-test"
serper_api_key = "serper-test"

[crew]
topic = "Flood Disaster Relief"
max_iterations = 5
verbose = false

[agent]
max_duration_secs = 120
max_tool_output_chars = 4000

[gateway]
bind = "0.0.0.0:9999"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, ModelProvider::Groq);
    assert_eq!(config.model.model_id(), "llama3-70b-8192");
    assert_eq!(config.model.max_tokens, 2048);
    let retry = config.model.retry.as_ref().expect("retry present");
    assert_eq!(retry.max_retries, 5);

    assert_eq!(config.crew.topic, "Flood Disaster Relief");
    assert_eq!(config.crew.max_iterations, 5);
    assert!(!config.crew.verbose);
    assert_eq!(config.agent.max_duration_secs, 120);
    assert_eq!(config.agent.max_tool_output_chars, 4000);
    assert_eq!(config.gateway.expect("gateway present").bind, "0.0.0.0:9999");

    config_is_valid(tmp.path());
}

fn config_is_valid(path: &std::path::Path) {
    AppConfig::load(path)
        .expect("load config")
        .validate()
        .expect("valid config");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let tmp = write_config(
        r#"
[credentials]
openai_api_key = "sk-test"
groq_api_key = "gsk-test"
serper_api_key = "serper-test"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, ModelProvider::OpenAi);
    assert_eq!(config.model.model_id(), "gpt-4-turbo");
    assert!((config.model.temperature - 0.7).abs() < f32::EPSILON);
    assert_eq!(config.crew.topic, "Earthquake Disaster Relief");
    assert_eq!(config.crew.max_iterations, 3);
    assert!(config.gateway.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("RELIEF_TEST_SERPER_KEY", "expanded-serper");

    let tmp = write_config(
        r#"
[credentials]
openai_api_key = "sk-test"
groq_api_key = "gsk-test"
serper_api_key = "${RELIEF_TEST_SERPER_KEY}"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.credentials.serper_key().unwrap(), "expanded-serper");

    std::env::remove_var("RELIEF_TEST_SERPER_KEY");
}

#[test]
fn test_missing_credential_is_fatal() {
    let tmp = write_config(
        r#"
[credentials]
openai_api_key = "sk-test"
serper_api_key = "serper-test"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");
    let err = config.validate().unwrap_err();
    assert!(matches!(err, ReliefError::MissingCredential("groq_api_key")));
}

#[test]
fn test_redacted_config_hides_secrets() {
    let tmp = write_config(
        r#"
[credentials]
openai_api_key = "sk-very-secret"
groq_api_key = "gsk-very-secret"
serper_api_key = "serper-very-secret"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");
    let printed = toml::to_string_pretty(&config.redacted()).expect("serialize");
    assert!(!printed.contains("very-secret"));
    assert!(printed.contains("********"));
}

#[test]
fn test_missing_file_reports_path() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/relief.toml")).unwrap_err();
    assert!(matches!(err, ReliefError::ConfigNotFound(p) if p.contains("relief.toml")));
}

#[test]
fn test_invalid_toml_is_config_error() {
    let tmp = write_config("[model\nprovider = ");
    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, ReliefError::Config(_)));
}

#[test]
fn test_unknown_provider_is_rejected() {
    let tmp = write_config("[model]\nprovider = \"anthropic\"\n");
    assert!(AppConfig::load(tmp.path()).is_err());
}
