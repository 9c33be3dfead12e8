//! Node type registry — per-kind config well-formedness.
//!
//! Static, polymorphic-over-kind checks consumed by the graph builder at
//! node creation and by full graph validation. Answers one question: is
//! this config minimally well-formed for its kind? Cross-node concerns
//! (dangling targets, undeclared variables) belong to graph validation.

use crate::types::{NodeConfig, MAX_WHATSAPP_BUTTONS};

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];

/// Check a node config for structural completeness.
///
/// Returns `Ok(())` or every violation found, prefixed with the node's
/// name so bulk-create failures point at the offending entries.
pub fn validate_config(node_name: &str, config: &NodeConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    let at = |field: &str| format!("node '{node_name}': {field}");

    match config {
        NodeConfig::Message(cfg) => {
            if cfg.message.trim().is_empty() {
                errors.push(at("message must not be empty"));
            }
            if cfg.use_buttons {
                if cfg.buttons.is_empty() {
                    errors.push(at("useButtons is set but no buttons are defined"));
                }
                if cfg.buttons.len() > MAX_WHATSAPP_BUTTONS {
                    errors.push(at(&format!(
                        "WhatsApp allows at most {MAX_WHATSAPP_BUTTONS} buttons, got {}",
                        cfg.buttons.len()
                    )));
                }
                for (i, button) in cfg.buttons.iter().enumerate() {
                    if button.id.trim().is_empty() || button.text.trim().is_empty() {
                        errors.push(at(&format!("button {i} needs both id and text")));
                    }
                }
            }
        }
        NodeConfig::Menu(cfg) => {
            if cfg.options.is_empty() {
                errors.push(at("menu must define at least one option"));
            }
            for (i, option) in cfg.options.iter().enumerate() {
                if option.label.trim().is_empty() {
                    errors.push(at(&format!("option {i} is missing a label")));
                }
                if option.value.trim().is_empty() {
                    errors.push(at(&format!("option {i} is missing a value")));
                }
            }
        }
        NodeConfig::Input(cfg) => {
            if cfg.message.trim().is_empty() {
                errors.push(at("message must not be empty"));
            }
            if cfg.variable_name.trim().is_empty() {
                errors.push(at("variableName must not be empty"));
            }
            if let Some(pattern) = &cfg.validation.pattern {
                if let Err(e) = regex::Regex::new(pattern) {
                    errors.push(at(&format!("validation pattern does not compile: {e}")));
                }
            }
            if let (Some(min), Some(max)) =
                (cfg.validation.min_length, cfg.validation.max_length)
            {
                if min > max {
                    errors.push(at("minLength exceeds maxLength"));
                }
            }
        }
        NodeConfig::Condition(cfg) => {
            if cfg.variable.trim().is_empty() {
                errors.push(at("variable must not be empty"));
            }
            if cfg.conditions.is_empty() {
                errors.push(at("condition node must define at least one branch"));
            }
        }
        NodeConfig::ApiCall(cfg) => {
            if cfg.url.trim().is_empty() {
                errors.push(at("url must not be empty"));
            }
            let method = cfg.method.to_uppercase();
            if !HTTP_METHODS.contains(&method.as_str()) {
                errors.push(at(&format!("unsupported HTTP method '{}'", cfg.method)));
            }
        }
        NodeConfig::TransferAgent(cfg) => {
            if cfg.message.trim().is_empty() {
                errors.push(at("message must not be empty"));
            }
            if cfg.transfer_reason.trim().is_empty() {
                errors.push(at("transferReason must not be empty"));
            }
        }
        NodeConfig::End(_) => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
