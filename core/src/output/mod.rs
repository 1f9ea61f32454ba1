//! Output formatting module
//!
//! Renders pipeline decisions, thermostat comparisons and audit records for
//! the terminal using colored output.

use crate::audit::AuditRecord;
use crate::estimator::{ComparisonRow, PreferenceSnapshot};
use crate::guard::{PipelineDecision, PipelineState, RiskLevel, StageVerdict, Verdict};
use console::Style;
use std::fmt::Write;

/// Output formatter for CLI results
pub struct OutputFormatter {
    // Styles
    green: Style,
    yellow: Style,
    red: Style,
    dim: Style,
    bold: Style,
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self {
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            dim: Style::new().dim(),
            bold: Style::new().bold(),
        }
    }
}

impl OutputFormatter {
    /// Create a new formatter
    pub fn new() -> Self {
        Self::default()
    }

    fn verdict_style(&self, verdict: Verdict) -> &Style {
        match verdict {
            Verdict::Approved => &self.green,
            Verdict::Escalated => &self.yellow,
            Verdict::Blocked => &self.red,
        }
    }

    fn state_style(&self, state: PipelineState) -> &Style {
        match state {
            PipelineState::Approved => &self.green,
            PipelineState::Blocked => &self.red,
            PipelineState::Escalated => &self.yellow,
            _ => &self.dim,
        }
    }

    fn risk_style(&self, risk: RiskLevel) -> &Style {
        match risk {
            RiskLevel::Low => &self.green,
            RiskLevel::Medium => &self.yellow,
            RiskLevel::High => &self.red,
        }
    }

    fn verdict_line(&self, verdict: &StageVerdict) -> String {
        format!(
            "{:<10} {:<18} {:<7} {}",
            self.verdict_style(verdict.verdict()).apply_to(verdict.verdict().to_string()),
            verdict.stage(),
            self.risk_style(verdict.risk()).apply_to(verdict.risk().to_string()),
            verdict.reason()
        )
    }

    /// Decision summary with the full verdict trail
    pub fn format_decision(&self, decision: &PipelineDecision) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} {} (risk: {})",
            self.bold.apply_to("Decision:"),
            self.state_style(decision.state()).apply_to(decision.state()),
            self.risk_style(decision.risk()).apply_to(decision.risk()),
        );
        if let Some(tier) = decision.halted_at() {
            let _ = writeln!(out, "Halted at: {} tier", tier);
        }
        let _ = writeln!(out, "Reason: {}", decision.reason());

        let _ = writeln!(out, "{}", self.bold.apply_to("Trail:"));
        for recorded in decision.verdicts() {
            let _ = writeln!(out, "  [{:<6}] {}", recorded.tier.to_string(), self.verdict_line(&recorded.verdict));
        }

        let recommendations = decision.terminal().recommendations();
        if !recommendations.is_empty() {
            let _ = writeln!(out, "{}", self.bold.apply_to("Recommendations:"));
            for hint in recommendations {
                let _ = writeln!(out, "  - {}", hint);
            }
        }
        let _ = writeln!(out, "{}", self.dim.apply_to(format!("run {}", decision.run_id())));
        out
    }

    pub fn print_decision(&self, decision: &PipelineDecision) {
        println!();
        print!("{}", self.format_decision(decision));
    }

    /// Side-by-side static vs adaptive table
    pub fn format_comparison(&self, rows: &[ComparisonRow]) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{}",
            self.bold.apply_to(format!(
                "{:>8}  {:<14}  {:<14}  {:>10}",
                "reading", "static", "adaptive", "preference"
            ))
        );
        for row in rows {
            let marker = if row.diverged() { "*" } else { " " };
            let _ = writeln!(
                out,
                "{:>8.1}  {:<14}  {:<14}  {:>10.1} {}",
                row.reading,
                row.static_action.device_label(),
                row.adaptive_action.device_label(),
                row.preference,
                self.yellow.apply_to(marker)
            );
        }
        let diverged = rows.iter().filter(|r| r.diverged()).count();
        let _ = writeln!(out, "{} of {} readings differ (*)", diverged, rows.len());
        out
    }

    pub fn print_comparison(&self, rows: &[ComparisonRow]) {
        println!();
        print!("{}", self.format_comparison(rows));
    }

    pub fn format_snapshot(&self, snapshot: &PreferenceSnapshot) -> String {
        let observations: Vec<String> = snapshot
            .observations
            .iter()
            .map(|o| format!("{:.1}", o))
            .collect();
        let actions: Vec<String> = snapshot.actions.iter().map(ToString::to_string).collect();
        format!(
            "{} {:.1} (tolerance ±{}, rate {})\nRecent readings: [{}]\nRecent actions: [{}]\n",
            self.bold.apply_to("Learned preference:"),
            snapshot.display_preference(),
            snapshot.tolerance,
            snapshot.learning_rate,
            observations.join(", "),
            actions.join(", ")
        )
    }

    pub fn print_snapshot(&self, snapshot: &PreferenceSnapshot) {
        println!();
        print!("{}", self.format_snapshot(snapshot));
    }

    /// One line per record
    pub fn format_audit_record(&self, record: &AuditRecord) -> String {
        let decision = record.decision();
        let digest = record.digest();
        format!(
            "{}  {:<10} {:<6} {:<6} {:>6}us  in={} tools=[{}] {}  {}",
            self.dim.apply_to(record.timestamp().format("%Y-%m-%d %H:%M:%S")),
            self.state_style(decision.state()).apply_to(decision.state().to_string()),
            record.tier().to_string(),
            self.risk_style(decision.risk()).apply_to(decision.risk().to_string()),
            record.elapsed().as_micros(),
            digest.input_chars,
            digest.tool_names.join(","),
            self.dim.apply_to(&digest.fingerprint),
            decision.reason()
        )
    }

    pub fn print_audit<'a>(&self, records: impl IntoIterator<Item = &'a AuditRecord>) -> usize {
        let mut count = 0;
        for record in records {
            println!("{}", self.format_audit_record(record));
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{compare, PreferenceEstimator, StaticThermostat};
    use crate::guard::{Request, ToolCall, ValidationPipeline};
    use std::time::Duration;

    #[test]
    fn test_decision_lists_trail_and_recommendations() {
        let decision = ValidationPipeline::standard()
            .run(&Request::new("Wipe it").with_tool(ToolCall::new("system_command")));
        let text = OutputFormatter::new().format_decision(&decision);

        assert!(text.contains("Halted at: tool tier"));
        assert!(text.contains("High-risk tool system_command automatically blocked"));
        assert!(text.contains("Escalate to security team"));
        assert!(text.contains(&decision.run_id().to_string()));
    }

    #[test]
    fn test_comparison_counts_divergence() {
        let mut fixed = StaticThermostat::default();
        let mut adaptive = PreferenceEstimator::initialize(22.0, 2.0, 0.1).unwrap();
        let rows = compare(&[19.0, 22.0, 26.0], &mut fixed, &mut adaptive);
        let text = OutputFormatter::new().format_comparison(&rows);

        let diverged = rows.iter().filter(|r| r.diverged()).count();
        assert!(text.contains(&format!("{} of 3 readings differ", diverged)));
    }

    #[test]
    fn test_audit_line_has_no_raw_input() {
        let request = Request::new("card 4111 1111 1111 1111 please");
        let decision = ValidationPipeline::standard().run(&request);
        let record = AuditRecord::new(decision, &request, Duration::from_micros(42));
        let line = OutputFormatter::new().format_audit_record(&record);

        assert!(!line.contains("4111"));
        assert!(line.contains("42us"));
    }
}
