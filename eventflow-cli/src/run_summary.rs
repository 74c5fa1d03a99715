use std::path::PathBuf;

use eventflow::flow::StepRecord;
use eventflow::{FlowError, FlowReport, Outcome};
use serde_json::{json, Value};

/// What `eventflow run` prints once the flow has finished
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: Outcome,
    pub event_name: String,
    /// Human-readable message about the result
    pub message: String,
    pub screenshot: Option<PathBuf>,
    /// Step that failed
    pub failed_step: Option<String>,
    pub verified_by: Option<String>,
    pub steps: Vec<StepRecord>,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn from_report(report: &FlowReport, duration_ms: u64) -> Self {
        Self {
            outcome: report.outcome,
            event_name: report.event_name.clone(),
            message: format!("Event \"{}\" created and verified", report.event_name),
            screenshot: Some(report.screenshot.clone()),
            failed_step: None,
            verified_by: Some(report.verified_by.clone()),
            steps: report.steps.clone(),
            duration_ms,
        }
    }

    pub fn from_error(event_name: &str, error: &FlowError, duration_ms: u64) -> Self {
        let failed_step = match error {
            FlowError::Failed { step, .. } => Some(step.to_string()),
            _ => None,
        };
        Self {
            outcome: Outcome::Failure,
            event_name: event_name.to_string(),
            message: error.root().to_string(),
            screenshot: error.evidence().cloned(),
            failed_step,
            verified_by: None,
            steps: Vec::new(),
            duration_ms,
        }
    }

    pub fn success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn to_json(&self) -> Value {
        json!({
            "success": self.success(),
            "outcome": self.outcome,
            "event_name": self.event_name,
            "message": self.message,
            "screenshot": self.screenshot,
            "failed_step": self.failed_step,
            "verified_by": self.verified_by,
            "steps": self.steps,
            "duration_ms": self.duration_ms,
        })
    }

    /// Display the result in a user-friendly format
    pub fn display(&self) {
        use colored::*;

        println!();
        println!("{}", "═".repeat(60));
        match self.outcome {
            Outcome::Success => println!("{} {}", "✅ SUCCESS:".green().bold(), self.message),
            Outcome::Failure => println!("{} {}", "❌ FAILURE:".red().bold(), self.message),
        }

        println!("{}", "─".repeat(60));
        println!("📊 Run Details:");
        println!("   • Event: {}", self.event_name);
        if let Some(step) = &self.failed_step {
            println!("   • Failed at: {step}");
        }
        if let Some(signal) = &self.verified_by {
            println!("   • Verified by: {signal}");
        }
        let seconds = self.duration_ms as f64 / 1000.0;
        println!("   • Duration: {seconds:.2}s");

        if !self.steps.is_empty() {
            println!("{}", "─".repeat(60));
            println!("🧭 Steps:");
            for record in &self.steps {
                println!("   • {:<24} {:>6} ms", record.step.to_string(), record.duration_ms);
            }
        }

        println!("{}", "─".repeat(60));
        match &self.screenshot {
            Some(path) => println!("📸 Evidence: {}", path.display()),
            None => println!("{}", "⚠️  No screenshot was captured".yellow()),
        }
        println!("{}", "═".repeat(60));
        println!();
    }
}
