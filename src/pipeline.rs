use tracing::info;

use crate::model::{LineLayer, PointLayer};
use crate::network::LineNetwork;
use crate::report::ValidationReport;
use crate::rules::{self, Finding, RuleContext, RuleInput, Subject};

/// Runs the line rules over one network and records the results.
pub fn validate_network(
    network: &LineNetwork,
    neighbours: Option<&LineLayer>,
    context: &RuleContext,
    report: &mut ValidationReport,
) -> Vec<Finding> {
    info!("\n--- Validating {} ({} arcs) ---", network.layer.name, network.layer.len());
    let input = RuleInput {
        subject: Subject::Lines(network),
        neighbours,
        context,
    };
    let findings = rules::run_all(&input);
    report.record(&input.subject, &findings, &context.id_field);
    findings
}

pub fn validate_points(layer: &PointLayer, context: &RuleContext, report: &mut ValidationReport) -> Vec<Finding> {
    info!("\n--- Validating {} ({} points) ---", layer.name, layer.len());
    let input = RuleInput {
        subject: Subject::Points(layer),
        neighbours: None,
        context,
    };
    let findings = rules::run_all(&input);
    report.record(&input.subject, &findings, &context.id_field);
    findings
}
