//! Structural validation for flow graphs.
//!
//! Gate for the `draft → active` transition. Dangling transition targets,
//! a missing start node, per-kind config violations, and undeclared input
//! variables are errors. Unreachable nodes, terminal nodes with a
//! successor, and undeclared `{{placeholders}}` are warnings. Cycles are
//! legal — retry loops back to an earlier message node are a normal
//! collection-flow shape — and are never flagged.

use std::collections::{HashSet, VecDeque};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::registry::validate_config;
use crate::types::{BotFlow, NodeConfig};

/// Outcome of a validation pass over one flow.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a flow for structural correctness.
pub fn validate_flow(flow: &BotFlow) -> ValidationReport {
    let mut report = ValidationReport::default();

    let node_ids: HashSet<&str> = flow.nodes.keys().map(String::as_str).collect();

    // 1. Every transition target must name a node in this flow.
    for node in flow.nodes.values() {
        for target in node.reference_targets() {
            if !node_ids.contains(target) {
                report.errors.push(format!(
                    "Node {} references unknown target {target}",
                    node.id
                ));
            }
        }
    }

    // 2. Start node: required, and must resolve.
    match &flow.start_node_id {
        None => report.errors.push("No start node defined".to_string()),
        Some(start) if !node_ids.contains(start.as_str()) => {
            report
                .errors
                .push(format!("Start node {start} does not exist in this flow"));
        }
        Some(_) => {}
    }

    // 3. Per-kind config completeness.
    for node in flow.nodes.values() {
        if let Err(errs) = validate_config(&node.name, &node.config) {
            report.errors.extend(errs);
        }
    }

    // 4. Input nodes must write into declared variables.
    for node in flow.nodes.values() {
        if let NodeConfig::Input(cfg) = &node.config {
            if !cfg.variable_name.trim().is_empty()
                && !flow.variables.contains_key(&cfg.variable_name)
            {
                report.errors.push(format!(
                    "node '{}': variableName '{}' is not declared in flow variables",
                    node.name, cfg.variable_name
                ));
            }
        }
    }

    // 5. Terminal nodes with a successor: the edge can never be taken.
    for node in flow.nodes.values() {
        if node.kind().is_terminal() && node.next_node_id.is_some() {
            report.warnings.push(format!(
                "Node {} is terminal ({}) but sets nextNodeId",
                node.id,
                node.kind()
            ));
        }
    }

    // 6. Message placeholders should name declared variables.
    for node in flow.nodes.values() {
        for message in node_messages(&node.config) {
            for var in placeholders(message) {
                if !flow.variables.contains_key(var) {
                    report.warnings.push(format!(
                        "node '{}': message references undeclared variable '{var}'",
                        node.name
                    ));
                }
            }
        }
    }

    // 7. Reachability from the start node. Soft: alternate entry points
    //    and not-yet-linked sub-flows are legitimate.
    if let Some(start) = &flow.start_node_id {
        if node_ids.contains(start.as_str()) {
            let reachable = reachable_from(flow, start);
            for node in flow.nodes.values() {
                if !reachable.contains(node.id.as_str()) {
                    report.warnings.push(format!(
                        "Node {} ('{}') is unreachable from the start node",
                        node.id, node.name
                    ));
                }
            }
        }
    }

    report
}

/// BFS over transition targets.
fn reachable_from<'a>(flow: &'a BotFlow, start: &'a str) -> HashSet<&'a str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    seen.insert(start);
    queue.push_back(start);

    while let Some(id) = queue.pop_front() {
        let Some(node) = flow.nodes.get(id) else {
            continue;
        };
        for target in node.reference_targets() {
            if flow.nodes.contains_key(target) && seen.insert(target) {
                queue.push_back(target);
            }
        }
    }

    seen
}

/// The message texts a node config carries, for placeholder checks.
fn node_messages(config: &NodeConfig) -> Vec<&str> {
    match config {
        NodeConfig::Message(cfg) => vec![cfg.message.as_str()],
        NodeConfig::Input(cfg) => vec![cfg.message.as_str()],
        NodeConfig::TransferAgent(cfg) => vec![cfg.message.as_str()],
        _ => vec![],
    }
}

/// Extract `{{variable}}` placeholder names from a message.
fn placeholders(message: &str) -> impl Iterator<Item = &str> {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let re = PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());
    re.captures_iter(message)
        .map(|c| c.get(1).unwrap().as_str())
}
