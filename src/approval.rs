//! Terminal-based approval for escalated runs
//!
//! Prompts the operator in the terminal before an escalated run continues.

use console::Style;
use dialoguer::{Confirm, Input};
use guardlab_core::guard::{ApprovalError, ApprovalOutcome, EscalationHook, PipelineDecision, Request};

/// Terminal-based approval - prompts user interactively
pub struct TerminalApproval {
    yellow: Style,
    bold: Style,
}

impl TerminalApproval {
    pub fn new() -> Self {
        Self {
            yellow: Style::new().yellow(),
            bold: Style::new().bold(),
        }
    }
}

impl Default for TerminalApproval {
    fn default() -> Self {
        Self::new()
    }
}

impl EscalationHook for TerminalApproval {
    fn review(
        &self,
        decision: &PipelineDecision,
        request: &Request,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        println!();
        println!("{}", self.yellow.apply_to("APPROVAL REQUIRED"));
        println!("  Stage:  {}", decision.terminal().stage());
        println!("  Risk:   {}", decision.risk());
        println!("  Reason: {}", decision.reason());
        for call in &request.tool_calls {
            println!("  Tool:   {}", self.bold.apply_to(call.describe()));
        }

        let approved = Confirm::new()
            .with_prompt("Allow this request to continue?")
            .default(false)
            .interact()
            .map_err(|e| ApprovalError::new(e.to_string()))?;
        if approved {
            return Ok(ApprovalOutcome::Granted);
        }

        let reason: String = Input::new()
            .with_prompt("Reason (optional)")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| ApprovalError::new(e.to_string()))?;
        let reason = reason.trim();
        Ok(ApprovalOutcome::Denied {
            reason: (!reason.is_empty()).then(|| reason.to_string()),
        })
    }
}
