//! Integration tests for hsm-load-config

use hsm_load_config::*;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use temp_env::with_vars;

/// Variables that could leak in from the developer's shell
const CLEARED: [(&str, Option<&str>); 6] = [
    ("HSM_URL", None),
    ("CLIENT_CERT", None),
    ("CLIENT_KEY", None),
    ("HSM_LOAD_BASE_URL", None),
    ("HSM_LOAD_CLIENT_CERT", None),
    ("HSM_LOAD_CLIENT_KEY", None),
];

fn write_config(yaml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn test_default_config_validation() {
    let config = HsmLoadConfig::default();
    assert!(config.validate_all().is_ok());
}

#[test]
fn test_config_loader_from_env() {
    let mut vars = CLEARED.to_vec();
    vars.extend([
        ("HSM_LOAD_HTTP_TIMEOUT", Some("30")),
        ("HSM_LOAD_LOG_LEVEL", Some("debug")),
        ("HSM_LOAD_CONTEXT", Some("2fa")),
        ("HSM_LOAD_SUMMARY_JSON", Some("")),
    ]);

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();

        assert_eq!(config.http.timeout, Duration::from_secs(30));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.target.context, "2fa");
        assert_eq!(config.output.summary_json, None);
    });
}

#[test]
fn test_prefixed_env_beats_legacy() {
    let mut vars = CLEARED.to_vec();
    vars.extend([
        ("HSM_URL", Some("https://legacy:8443")),
        ("HSM_LOAD_BASE_URL", Some("https://modern:8443")),
    ]);

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();
        assert_eq!(config.target.base_url, "https://modern:8443");
    });
}

#[test]
fn test_legacy_env_used_alone() {
    let mut vars = CLEARED.to_vec();
    vars.push(("HSM_URL", Some("https://legacy:8443")));

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();
        assert_eq!(config.target.base_url, "https://legacy:8443");
    });
}

#[test]
fn test_invalid_env_value() {
    let mut vars = CLEARED.to_vec();
    vars.push(("HSM_LOAD_HTTP_TIMEOUT", Some("ten")));

    with_vars(vars, || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::EnvError(_)));
    });
}

#[test]
fn test_yaml_config_serialization() {
    let yaml = HsmLoadConfig::generate_sample();
    assert!(yaml.contains("base_url"));
    assert!(yaml.contains("p(95)<500"));

    let parsed: HsmLoadConfig = serde_yaml::from_str(&yaml).unwrap();
    assert!(parsed.validate_all().is_ok());
    assert_eq!(parsed.scenario.stages, HsmLoadConfig::default().scenario.stages);
}

#[test]
fn test_comprehensive_config() {
    let file = write_config(
        r#"
target:
  base_url: https://hsm.staging:8443
  context: exchange-key
  tls:
    client_cert: certs/client.crt
    client_key: certs/client.key
    insecure_skip_verify: false

http:
  timeout: 5s
  user_agent: "staging-load"

scenario:
  start_users: 1
  stages:
    - { duration: 10s, target: 5 }
    - { duration: 20s, target: 0 }
  think_time: { min: 100ms, max: 200ms }
  health_check_probability: 0.5
  payloads: ["one", "two", "three"]

thresholds:
  errors: ["rate<0.02"]
  encrypt_duration:
    - expr: "p(95)<150"
      require_samples: true

logging:
  level: warn
  format: json

output:
  summary_json: out/results.json
  colors: false
"#,
    );

    with_vars(CLEARED.to_vec(), || {
        let config = ConfigLoader::new().from_file(file.path()).unwrap();

        assert_eq!(config.target.base_url, "https://hsm.staging:8443");
        assert!(!config.target.tls.insecure_skip_verify);
        assert_eq!(config.http.timeout, Duration::from_secs(5));
        assert_eq!(config.scenario.ramp_profile().unwrap().total_duration(), Duration::from_secs(30));
        assert_eq!(config.scenario.payloads.len(), 3);
        assert_eq!(config.thresholds.threshold_set().unwrap().len(), 2);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.output.summary_json, Some(PathBuf::from("out/results.json")));
        assert!(!config.output.colors);
        assert!(config.output.text_summary);
    });
}

#[test]
fn test_preset_overrides_file_scenario() {
    let file = write_config(
        r#"
scenario:
  stages:
    - { duration: 5s, target: 1 }
"#,
    );

    with_vars(CLEARED.to_vec(), || {
        let config = ConfigLoader::new()
            .preset(Some(Preset::Full))
            .from_file(file.path())
            .unwrap();
        assert_eq!(
            config.scenario.ramp_profile().unwrap().total_duration(),
            Duration::from_secs(22 * 60)
        );
        assert_eq!(config.scenario.think_time.min, Duration::from_millis(1500));
        assert_eq!(config.output.summary_json, Some(PathBuf::from("load-test-results.json")));
    });
}

#[test]
fn test_fatal_config_errors() {
    let cases = [
        ("scenario:\n  stages: []\n", "scenario"),
        ("thresholds:\n  errors: [\"rate=0.1\"]\n", "thresholds"),
        ("thresholds:\n  http_reqs: [\"p(95)<10\"]\n", "thresholds"),
        ("target:\n  base_url: ftp://hsm\n", "target"),
        ("scenario:\n  think_time: { min: 2s, max: 1s }\n", "scenario.think_time"),
        ("http:\n  timeout: 0\n", "http"),
        ("scenario:\n  graceful_stop: 0s\n", "scenario"),
        ("http:\n  timeout: 30s\n", "scenario"),
    ];

    for (yaml, domain) in cases {
        let file = write_config(yaml);
        with_vars(CLEARED.to_vec(), || {
            let err = ConfigLoader::new().from_file(file.path()).unwrap_err();
            match err {
                ConfigError::DomainError { domain: actual, .. } => {
                    assert_eq!(actual, domain, "unexpected domain for {:?}", yaml)
                }
                other => panic!("expected domain error for {:?}, got {}", yaml, other),
            }
        });
    }
}

#[test]
fn test_missing_file() {
    let err = ConfigLoader::new()
        .from_file("/nonexistent/hsm-load.yaml")
        .unwrap_err();
    assert!(matches!(err, ConfigError::FileReadError(_)));
}
