//! Configuration validation.

use std::net::SocketAddr;

use super::error::{ConfigError, ConfigResult};
use super::schema::{CourierConfig, RelayConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_robot(config)?;
    validate_addr(&config.server.addr)?;
    validate_relay(&config.relay)?;
    validate_program_scripts(config)?;
    Ok(())
}

fn validate_robot(config: &CourierConfig) -> ConfigResult<()> {
    if config.robot.name.trim().is_empty() {
        return Err(ConfigError::missing_field("robot.name"));
    }
    if config.robot.tokens.iter().any(|t| t.trim().is_empty()) {
        return Err(ConfigError::validation("robot.tokens must not contain empty tokens"));
    }
    Ok(())
}

fn validate_addr(addr: &str) -> ConfigResult<()> {
    addr.parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidAddress {
            addr: addr.to_string(),
            reason: e.to_string(),
        })
}

fn validate_relay(relay: &RelayConfig) -> ConfigResult<()> {
    if relay.max_attempts == 0 {
        return Err(ConfigError::validation("relay.max_attempts must be greater than 0"));
    }
    if relay.ack_timeout_ms == 0 {
        return Err(ConfigError::validation("relay.ack_timeout_ms must be greater than 0"));
    }
    if relay.handshake_timeout_ms == Some(0) {
        return Err(ConfigError::validation(
            "relay.handshake_timeout_ms must be greater than 0 when set",
        ));
    }
    Ok(())
}

fn validate_program_scripts(config: &CourierConfig) -> ConfigResult<()> {
    for (index, program) in config.program_scripts.iter().enumerate() {
        if program.path.as_os_str().is_empty() {
            return Err(ConfigError::missing_field(format!("program_scripts[{index}].path")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use courier_framework::ProgramScript;

    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_relay_bounds() {
        let mut config = CourierConfig::default();
        config.relay.max_attempts = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));

        let mut config = CourierConfig::default();
        config.relay.ack_timeout_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_addr() {
        let mut config = CourierConfig::default();
        config.server.addr = "not an address".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_validate_tokens_and_programs() {
        let mut config = CourierConfig::default();
        config.robot.tokens = vec!["ok".to_string(), " ".to_string()];
        assert!(validate_config(&config).is_err());

        let mut config = CourierConfig::default();
        config.program_scripts = vec![ProgramScript {
            path: PathBuf::new(),
            args: Vec::new(),
        }];
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }
}
