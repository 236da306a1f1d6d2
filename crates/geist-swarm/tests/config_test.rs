use std::path::PathBuf;
use std::time::Duration;

use geist_swarm::config::SwarmConfig;
use secrecy::SecretString;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn test_defaults_match_runner_image() {
    let config = SwarmConfig::default();
    assert_eq!(config.image, "geist-runner");
    assert_eq!(config.container_prefix, "geist-swarm");
    assert_eq!(config.credential_var, "ANTHROPIC_API_KEY");
    assert_eq!(config.personas_dir, PathBuf::from("personas"));
    assert_eq!(config.revive_grace_ms, 1000);
}

#[test]
fn test_toml_overrides_only_given_fields() {
    let config = SwarmConfig::from_toml_str(
        r#"
image = "custom-runner"
revive_grace_ms = 250
shuffle_seed = 42
"#,
    )
    .unwrap();
    assert_eq!(config.image, "custom-runner");
    assert_eq!(config.revive_grace_ms, 250);
    assert_eq!(config.shuffle_seed, Some(42));
    assert_eq!(config.container_prefix, "geist-swarm");
}

#[test]
fn test_unknown_keys_rejected() {
    assert!(SwarmConfig::from_toml_str("imgae = \"typo\"").is_err());
}

#[test]
fn test_env_wins_over_file() {
    let mut config = SwarmConfig::from_toml_str("image = \"from-file\"").unwrap();
    config
        .apply_env(|key| match key {
            "GEIST_IMAGE" => Some("from-env".into()),
            "GEIST_STATE_DIR" => Some("/var/lib/geist".into()),
            _ => None,
        })
        .unwrap();
    assert_eq!(config.image, "from-env");
    assert_eq!(config.state_dir, PathBuf::from("/var/lib/geist"));

    let before = config.clone();
    config.apply_env(no_env).unwrap();
    assert_eq!(config, before);
}

#[test]
fn test_from_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("geist.toml");
    std::fs::write(&path, "rounds = 3").unwrap();

    let err = SwarmConfig::from_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("geist.toml"));
}

#[test]
fn test_settings_carry_config_and_credential() {
    let mut config = SwarmConfig::default();
    config.container_prefix = "lab".into();
    config.revive_grace_ms = 0;
    config.shuffle_seed = Some(9);

    let settings = config.settings(SecretString::from("sk-test"));
    assert_eq!(settings.environment_prefix, "lab");
    assert_eq!(settings.revive_grace, Duration::ZERO);
    assert_eq!(settings.shuffle_seed, Some(9));
    assert_eq!(
        settings.credential_env().get("ANTHROPIC_API_KEY").map(String::as_str),
        Some("sk-test")
    );
}
