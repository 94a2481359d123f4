//! Colored CLI output for the operator commands.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use crate::ai::Completion;
use crate::router::{AssignmentSuggestion, TaskAnalysisOutcome};
use crate::templates::{PromptTemplate, ValidationReport};

/// Truncate a string to `max_len` characters, adding an ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

fn bullets(label: &str, items: &[String]) {
    println!("{}", label.bold());
    if items.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for item in items {
        println!("  - {item}");
    }
}

pub fn print_completion(completion: &Completion) {
    println!("{}", completion.text);
    println!(
        "{} model={} tokens={} cost={:.4}",
        "[USAGE]".cyan().bold(),
        completion.model,
        completion.usage.total_tokens,
        completion.cost
    );
    let _ = io::stdout().flush();
}

pub fn print_health(healthy: bool) {
    if healthy {
        println!("{} backend responded", "[HEALTHY]".green().bold());
    } else {
        println!("{} backend did not respond with OK", "[UNHEALTHY]".red().bold());
    }
}

pub fn print_templates(templates: &[PromptTemplate]) {
    for template in templates {
        println!(
            "{} {} {}",
            template.id.cyan().bold(),
            format!("[{:?}]", template.category).dimmed(),
            truncate(&template.description, 60)
        );
        println!("    vars: {}", template.variables.join(", ").dimmed());
    }
}

pub fn print_validation(report: &ValidationReport) {
    if report.is_valid {
        println!("{} template is valid", "[VALID]".green().bold());
        return;
    }
    println!("{}", "[INVALID]".red().bold());
    for error in &report.errors {
        println!("  - {error}");
    }
}

pub fn print_analysis(outcome: &TaskAnalysisOutcome) {
    let analysis = &outcome.analysis;
    println!("{} {}", "[TASK]".blue().bold(), outcome.task_id);
    println!("{} {}", "Summary:".bold(), analysis.summary);
    println!("{} {}", "Complexity:".bold(), analysis.complexity);
    bullets("Requirements:", &analysis.requirements);
    bullets("Skills:", &analysis.skills);
    bullets("Challenges:", &analysis.challenges);
    println!("{} {}", "Approach:".bold(), analysis.approach);
}

pub fn print_suggestion(suggestion: &AssignmentSuggestion) {
    let rec = &suggestion.recommendation;
    if rec.agent_id.is_empty() && rec.agent_name.is_empty() {
        println!(
            "{} could not parse a recommendation; raw response follows",
            "[WARN]".yellow().bold()
        );
        println!("{}", suggestion.raw_response);
        return;
    }
    println!(
        "{} {} ({})",
        "[SUGGEST]".green().bold(),
        rec.agent_name.bold(),
        rec.agent_id
    );
    println!("  reason: {}", rec.reasoning);
    println!("  confidence: {}", rec.confidence);
    println!("  alternative: {}", rec.alternative);
    println!("  success rate: {}", rec.success_rate);
}

pub fn print_error(error: &dyn std::error::Error) {
    eprintln!("{} {error}", "[ERROR]".red().bold());
    let mut source = error.source();
    while let Some(cause) = source {
        eprintln!("  {} {cause}", "caused by:".dimmed());
        source = cause.source();
    }
}
