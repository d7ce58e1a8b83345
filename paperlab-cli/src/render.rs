//! Text output for the `search` and `run` subcommands.

use crate::research::AnalysisRun;
use paperlab_core::pipeline::DesignedExperiment;
use paperlab_core::{AggregatedReport, DiscoveryResult, PipelineResult, PipelineStatus};
use std::fmt::Write;

#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

pub fn discovery(result: &DiscoveryResult) -> String {
    let mut out = String::new();
    if let Some(error) = &result.error {
        let _ = writeln!(out, "No papers found: {error}");
        return out;
    }
    let _ = writeln!(out, "Keywords: {}", result.keywords.join(", "));
    let _ = writeln!(out, "Found {} papers\n", result.total_results);
    for (i, paper) in result.papers.iter().enumerate() {
        let _ = writeln!(out, "{}. {} [{}]", i + 1, paper.title, paper.id);
        if !paper.authors.is_empty() {
            let _ = writeln!(out, "   {}", paper.authors.join(", "));
        }
        if !paper.published.is_empty() {
            let _ = writeln!(out, "   Published {}", paper.published);
        }
        if !paper.url.is_empty() {
            let _ = writeln!(out, "   {}", paper.url);
        }
    }
    out
}

pub fn analysis_run(run: &AnalysisRun, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(run)?),
        OutputFormat::Markdown => Ok(markdown(run)),
    }
}

fn markdown(run: &AnalysisRun) -> String {
    let mut out = String::from("# Paper results\n\n");
    for result in &run.results {
        out.push_str(&result_line(result));
    }
    out.push('\n');

    match (&run.report, &run.report_error) {
        (Some(report), _) => out.push_str(&report_markdown(report)),
        (None, Some(error)) => {
            let _ = writeln!(out, "No report: {error}");
        }
        (None, None) => {}
    }
    out
}

fn result_line(result: &PipelineResult) -> String {
    let elapsed = format!("{:.1}s", result.duration_ms as f64 / 1000.0);
    match (result.status(), result.analysis()) {
        (PipelineStatus::Completed, Some(analysis)) => {
            let degraded = if analysis.degraded_stages.is_empty() {
                String::new()
            } else {
                format!(", degraded: {:?}", analysis.degraded_stages)
            };
            format!(
                "- `{}` completed in {elapsed}: {} ({} hypotheses{degraded})\n",
                result.paper_id,
                analysis.paper.title,
                analysis.hypotheses.usable().count()
            )
        }
        (status, _) => format!(
            "- `{}` {status} after {elapsed}: {}\n",
            result.paper_id,
            result.reason().unwrap_or("")
        ),
    }
}

fn report_markdown(report: &AggregatedReport) -> String {
    let mut out = String::from("# Research report\n\n");
    let _ = writeln!(
        out,
        "Processed {} papers: {} analyzed, {} filtered out, {} timed out, {} failed.\n",
        report.total_papers_processed,
        report.successful_papers,
        report.filtered_out,
        report.timed_out,
        report.failed
    );

    bullet_section(&mut out, "Key findings", &report.key_findings);
    bullet_section(&mut out, "Knowledge gaps", &report.knowledge_gaps);

    if !report.proposed_hypotheses.is_empty() {
        out.push_str("## Hypotheses\n\n");
        for (i, hypothesis) in report.proposed_hypotheses.iter().enumerate() {
            let _ = writeln!(out, "### H{}: {}\n", i + 1, hypothesis.statement);
            if !hypothesis.rationale.is_empty() {
                let _ = writeln!(out, "{}\n", hypothesis.rationale);
            }
            for experiment in report.designs_for(hypothesis) {
                out.push_str(&design_markdown(experiment));
            }
        }
    }
    out
}

fn design_markdown(experiment: &DesignedExperiment) -> String {
    let design = &experiment.design;
    let mut out = format!("**Experiment:** {}\n\n", design.overview);
    for (label, items) in [
        ("Procedures", &design.procedures),
        ("Methodologies", &design.methodologies),
        ("Equipment", &design.required_equipment),
        ("Controls", &design.controls),
        ("Challenges", &design.potential_challenges),
        ("Expected outcomes", &design.expected_outcomes),
    ] {
        if !items.is_empty() {
            let _ = writeln!(out, "- {label}: {}", items.join("; "));
        }
    }
    out.push('\n');
    out
}

fn bullet_section(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "## {title}\n");
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperlab_core::analysis::ExperimentalDesign;
    use paperlab_core::{Hypothesis, Paper};

    fn report() -> AggregatedReport {
        let hypothesis = Hypothesis::new("Naps restore attention", "Observed in shift workers");
        AggregatedReport {
            total_papers_processed: 3,
            successful_papers: 2,
            filtered_out: 1,
            key_findings: vec!["Sleep aids recall".into()],
            proposed_hypotheses: vec![hypothesis.clone()],
            experimental_designs: vec![DesignedExperiment {
                hypothesis,
                design: ExperimentalDesign {
                    overview: "Crossover nap study".into(),
                    controls: vec!["No-nap arm".into()],
                    ..ExperimentalDesign::default()
                },
            }],
            ..AggregatedReport::default()
        }
    }

    #[test]
    fn test_report_markdown_pairs_designs_with_hypotheses() {
        let text = report_markdown(&report());
        assert!(text.contains("Processed 3 papers: 2 analyzed, 1 filtered out"));
        assert!(text.contains("- Sleep aids recall"));
        assert!(text.contains("### H1: Naps restore attention"));
        assert!(text.contains("**Experiment:** Crossover nap study"));
        assert!(text.contains("- Controls: No-nap arm"));
        assert!(!text.contains("Knowledge gaps"));
    }

    #[test]
    fn test_markdown_without_report_explains_why() {
        let run = AnalysisRun {
            results: vec![PipelineResult::filtered_out("p1", "Off topic", 1200)],
            report: None,
            report_error: Some("nothing to aggregate".into()),
        };
        let text = analysis_run(&run, OutputFormat::Markdown).unwrap();
        assert!(text.contains("- `p1` filtered_out after 1.2s: Off topic"));
        assert!(text.contains("No report: nothing to aggregate"));
    }

    #[test]
    fn test_json_output_is_tagged_by_status() {
        let run = AnalysisRun {
            results: vec![PipelineResult::timeout("p1", "too slow", 5)],
            report: None,
            report_error: None,
        };
        let json: serde_json::Value =
            serde_json::from_str(&analysis_run(&run, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["results"][0]["status"], "timeout");
        assert_eq!(json["results"][0]["paper_id"], "p1");
    }

    #[test]
    fn test_discovery_listing() {
        let result = DiscoveryResult {
            papers: vec![Paper::new("2401.1", "Sleep", "A").with_authors(vec!["Ada".into()])],
            keywords: vec!["sleep".into()],
            total_results: 1,
            error: None,
        };
        let text = discovery(&result);
        assert!(text.contains("Keywords: sleep"));
        assert!(text.contains("1. Sleep [2401.1]"));
        assert!(text.contains("   Ada"));
    }
}
