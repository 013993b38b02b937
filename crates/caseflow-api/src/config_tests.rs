//! Tests for service configuration and secret resolution.

use super::*;

mod service_config_tests {
    use super::*;

    /// The default configuration is valid out of the box.
    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert!(config.webhooks.payment_token.is_none());
        assert!(config.automation.scheduler_token.is_none());
    }

    /// A zero port is rejected at validation time.
    #[test]
    fn test_zero_port_rejected() {
        let mut config = ServiceConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    /// Blank assignee entries are rejected.
    #[test]
    fn test_blank_assignee_rejected() {
        let mut config = ServiceConfig::default();
        config.automation.assignees = vec!["ana".to_string(), "  ".to_string()];
        assert!(config.validate().is_err());
    }

    /// The automation settings convert into an engine config.
    #[test]
    fn test_engine_config_carries_pool() {
        let mut config = ServiceConfig::default();
        config.automation.assignees = vec!["ana".to_string(), "ben".to_string()];
        assert_eq!(
            config.automation.engine_config().assignees,
            vec!["ana".to_string(), "ben".to_string()]
        );
    }

    /// Partial configuration deserializes with defaults filling the gaps.
    #[test]
    fn test_partial_config_uses_defaults() {
        let raw = r#"{"server": {"port": 9090}, "automation": {"assignees": ["ana"]}}"#;
        let config: ServiceConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.automation.assignees, vec!["ana".to_string()]);
        assert!(config.webhooks.scm_secret.is_none());
    }
}

mod secret_config_tests {
    use super::*;

    /// Literal secrets resolve to their value.
    #[test]
    fn test_literal_resolves() {
        let secret = SecretConfig::Literal {
            value: "shh".to_string(),
        };
        assert_eq!(secret.resolve().unwrap().expose(), "shh");
    }

    /// A set environment variable resolves.
    #[test]
    fn test_env_resolves_when_set() {
        std::env::set_var("CASEFLOW_TEST_SECRET_SET", "from-env");
        let secret = SecretConfig::Env {
            var: "CASEFLOW_TEST_SECRET_SET".to_string(),
        };
        assert_eq!(secret.resolve().unwrap().expose(), "from-env");
    }

    /// An unset environment variable is a missing-configuration error.
    #[test]
    fn test_env_missing_is_error() {
        let secret = SecretConfig::Env {
            var: "CASEFLOW_TEST_SECRET_DEFINITELY_UNSET".to_string(),
        };
        assert!(matches!(
            secret.resolve(),
            Err(ConfigError::Missing { .. })
        ));
    }

    /// Debug output never reveals the resolved value.
    #[test]
    fn test_secret_string_debug_redacted() {
        let secret = SecretString::new("top-secret".to_string());
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("top-secret"));
        assert!(debug.contains("REDACTED"));
    }

    /// The tagged serde representation round-trips.
    #[test]
    fn test_secret_config_serde_round_trip() {
        let json = r#"{"source":"env","var":"MY_SECRET"}"#;
        let secret: SecretConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(secret, SecretConfig::Env { ref var } if var == "MY_SECRET"));
    }
}
