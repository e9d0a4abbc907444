//! Construction-time configuration for an escrow ledger instance.
//!
//! The role singletons (seller, lender, inspector) and the addresses of the
//! registry and the custodian are fixed when the ledger is built and never
//! change for its lifetime.

use serde::{Deserialize, Serialize};

use crate::{EscrowError, PartyAddress, Result, constants};

/// Immutable role and collaborator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// The asset registry instance deeds live in.
    pub registry: PartyAddress,
    /// The custodian's own account in the registry and funds ledger.
    pub escrow: PartyAddress,
    /// The only party allowed to list and finalize.
    pub seller: PartyAddress,
    /// Financing party; one of the three required approvers.
    pub lender: PartyAddress,
    /// The only party allowed to record inspection outcomes.
    pub inspector: PartyAddress,
    /// Event log capacity.
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,
}

fn default_event_log_capacity() -> usize {
    constants::DEFAULT_EVENT_LOG_CAPACITY
}

impl EscrowConfig {
    /// Build a configuration with the default event log capacity.
    #[must_use]
    pub fn new(
        registry: PartyAddress,
        escrow: PartyAddress,
        seller: PartyAddress,
        lender: PartyAddress,
        inspector: PartyAddress,
    ) -> Self {
        Self {
            registry,
            escrow,
            seller,
            lender,
            inspector,
            event_log_capacity: constants::DEFAULT_EVENT_LOG_CAPACITY,
        }
    }

    /// Parse a JSON configuration document and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| EscrowError::Configuration(format!("malformed config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject zero addresses and roles that share an address.
    pub fn validate(&self) -> Result<()> {
        let roles = [
            ("registry", self.registry),
            ("escrow", self.escrow),
            ("seller", self.seller),
            ("lender", self.lender),
            ("inspector", self.inspector),
        ];
        for (name, addr) in roles {
            if addr.is_zero() {
                return Err(EscrowError::Configuration(format!(
                    "{name} address must not be zero"
                )));
            }
        }
        for (i, (a_name, a)) in roles.iter().enumerate().skip(1) {
            for (b_name, b) in &roles[i + 1..] {
                if a == b {
                    return Err(EscrowError::Configuration(format!(
                        "{a_name} and {b_name} share address {a}"
                    )));
                }
            }
        }
        if self.event_log_capacity == 0 {
            return Err(EscrowError::Configuration(
                "event_log_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EscrowConfig {
        EscrowConfig::new(
            PartyAddress::from_label("registry"),
            PartyAddress::from_label("escrow"),
            PartyAddress::from_label("seller"),
            PartyAddress::from_label("lender"),
            PartyAddress::from_label("inspector"),
        )
    }

    #[test]
    fn distinct_roles_validate() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn shared_role_address_rejected() {
        let mut cfg = sample();
        cfg.lender = cfg.seller;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, EscrowError::Configuration(ref m) if m.contains("seller and lender")));
    }

    #[test]
    fn zero_address_rejected() {
        let mut cfg = sample();
        cfg.inspector = PartyAddress::ZERO;
        assert!(matches!(
            cfg.validate().unwrap_err(),
            EscrowError::Configuration(_)
        ));
    }

    #[test]
    fn json_roundtrip_with_default_capacity() {
        let cfg = sample();
        let json = format!(
            r#"{{"registry":"{}","escrow":"{}","seller":"{}","lender":"{}","inspector":"{}"}}"#,
            cfg.registry, cfg.escrow, cfg.seller, cfg.lender, cfg.inspector
        );
        let parsed = EscrowConfig::from_json(&json).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(
            parsed.event_log_capacity,
            constants::DEFAULT_EVENT_LOG_CAPACITY
        );
    }

    #[test]
    fn malformed_json_is_configuration_error() {
        let err = EscrowConfig::from_json("{\"seller\": 1}").unwrap_err();
        assert!(matches!(err, EscrowError::Configuration(_)));
    }
}
