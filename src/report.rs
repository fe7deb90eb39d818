use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;
use crate::rules::{Code, Finding, Subject};

#[derive(Debug, Clone, Serialize)]
pub struct FindingRecord {
    pub code: Code,
    pub description: &'static str,
    pub count: usize,
    pub ids: Vec<String>,
    /// Paste into a GIS attribute filter to select the flagged features.
    pub query: String,
    pub reference_features: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayerReport {
    pub layer: String,
    pub feature_count: usize,
    pub findings: Vec<FindingRecord>,
}

impl LayerReport {
    pub fn flagged_total(&self) -> usize {
        self.findings.iter().map(|f| f.count).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub layers: Vec<LayerReport>,
}

/// `"<field>" in ('a','b')`, quoting ids the way SQL-like GIS filters expect.
pub fn replay_query(id_field: &str, ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("'{}'", id.replace('\'', "''")))
        .collect();
    format!("\"{}\" in ({})", id_field, quoted.join(","))
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs each finding and adds the layer's results to the report.
    pub fn record(&mut self, subject: &Subject, findings: &[Finding], id_field: &str) {
        let layer = subject.name().to_string();
        let records = findings
            .iter()
            .map(|finding| {
                let ids: Vec<String> = finding
                    .flagged
                    .iter()
                    .map(|&i| subject.id(i).to_string())
                    .collect();
                let query = replay_query(id_field, &ids);
                let reference_features = finding.reference_points.len();

                if ids.is_empty() {
                    info!("{} {}: passed. {}", layer, finding.code, finding.code.description());
                } else {
                    warn!(
                        "{} {}: {} features flagged. {} Query: {}",
                        layer,
                        finding.code,
                        ids.len(),
                        finding.code.description(),
                        query
                    );
                }
                if reference_features > 0 {
                    info!("{} {}: {} reference features", layer, finding.code, reference_features);
                }

                FindingRecord {
                    code: finding.code,
                    description: finding.code.description(),
                    count: ids.len(),
                    ids,
                    query,
                    reference_features,
                }
            })
            .collect();

        self.layers.push(LayerReport {
            layer,
            feature_count: subject.len(),
            findings: records,
        });
    }

    pub fn flagged_total(&self) -> usize {
        self.layers.iter().map(LayerReport::flagged_total).sum()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Feature, PointLayer};
    use geo::point;

    #[test]
    fn query_quotes_ids() {
        let ids = vec!["abc".to_string(), "o'neil".to_string()];
        assert_eq!(replay_query("nid", &ids), r#""nid" in ('abc','o''neil')"#);
    }

    #[test]
    fn records_ids_and_writes_json() {
        let layer = PointLayer::new(
            "junction",
            vec![
                Feature::new("j0", point!(x: 0.0, y: 0.0)),
                Feature::new("j1", point!(x: 1.0, y: 0.0)),
            ],
        );
        let findings = vec![
            Finding::new(Code::E207, vec![1, 0]),
            Finding::new(Code::E102, Vec::new()),
        ];

        let mut report = ValidationReport::new();
        report.record(&Subject::Points(&layer), &findings, "nid");
        assert_eq!(report.flagged_total(), 2);
        assert_eq!(report.layers[0].findings[0].ids, vec!["j0", "j1"]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validation_report.json");
        report.write_json(&path).unwrap();
        let written: serde_json::Value = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(written["layers"][0]["findings"][0]["code"], "E207");
        assert_eq!(written["layers"][0]["feature_count"], 2);
    }
}
