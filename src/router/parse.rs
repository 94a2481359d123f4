//! Best-effort extraction of structured fields from model text.
//!
//! Unrecognized formatting yields empty fields, never an error.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ai::{
    FIELD_AGENT, FIELD_ALTERNATIVE, FIELD_CONFIDENCE, FIELD_REASON, FIELD_SUCCESS_RATE,
    SECTION_APPROACH, SECTION_CHALLENGES, SECTION_COMPLEXITY, SECTION_REQUIREMENTS,
    SECTION_SKILLS, SECTION_SUMMARY,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAnalysis {
    pub summary: String,
    pub requirements: Vec<String>,
    pub complexity: String,
    pub skills: Vec<String>,
    pub challenges: Vec<String>,
    pub approach: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecommendation {
    pub agent_id: String,
    pub agent_name: String,
    pub reasoning: String,
    pub confidence: String,
    pub alternative: String,
    pub success_rate: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Requirements,
    Skills,
    Challenges,
    Other,
}

fn after<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix).map(str::trim)
}

/// Parse the six labelled sections of a task analysis.
///
/// Bullets (`-` or `*`) are collected under the list section they follow.
#[must_use]
pub fn parse_task_analysis(text: &str) -> TaskAnalysis {
    let mut analysis = TaskAnalysis::default();
    let mut section = Section::None;

    for line in text.lines().map(str::trim) {
        if let Some(rest) = after(line, SECTION_SUMMARY) {
            analysis.summary = rest.to_string();
            section = Section::Other;
        } else if line.starts_with(SECTION_REQUIREMENTS) {
            section = Section::Requirements;
        } else if let Some(rest) = after(line, SECTION_COMPLEXITY) {
            analysis.complexity = rest.to_string();
            section = Section::Other;
        } else if line.starts_with(SECTION_SKILLS) {
            section = Section::Skills;
        } else if line.starts_with(SECTION_CHALLENGES) {
            section = Section::Challenges;
        } else if let Some(rest) = after(line, SECTION_APPROACH) {
            analysis.approach = rest.to_string();
            section = Section::Other;
        } else if let Some(item) = line
            .strip_prefix('-')
            .or_else(|| line.strip_prefix('*'))
            .map(str::trim)
        {
            if item.is_empty() {
                continue;
            }
            match section {
                Section::Requirements => analysis.requirements.push(item.to_string()),
                Section::Skills => analysis.skills.push(item.to_string()),
                Section::Challenges => analysis.challenges.push(item.to_string()),
                Section::None | Section::Other => {}
            }
        }
    }
    analysis
}

fn parenthesized() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^)]+)\)").expect("valid regex"))
}

/// Parse a `- Agent: Name (id)` recommendation block.
#[must_use]
pub fn parse_recommendation(text: &str) -> AgentRecommendation {
    let mut recommendation = AgentRecommendation::default();

    for line in text.lines().map(str::trim) {
        if let Some(rest) = after(line, FIELD_AGENT) {
            recommendation.agent_name = rest
                .split('(')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            recommendation.agent_id = parenthesized()
                .captures(rest)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
        } else if let Some(rest) = after(line, FIELD_REASON) {
            recommendation.reasoning = rest.to_string();
        } else if let Some(rest) = after(line, FIELD_CONFIDENCE) {
            recommendation.confidence = rest.to_string();
        } else if let Some(rest) = after(line, FIELD_ALTERNATIVE) {
            recommendation.alternative = rest.to_string();
        } else if let Some(rest) = after(line, FIELD_SUCCESS_RATE) {
            recommendation.success_rate = rest.to_string();
        }
    }
    recommendation
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANALYSIS: &str = "Task Summary: Users cannot log in after the session refactor.
Key Requirements:
- Restore cookie validation
- Add regression test
Estimated Complexity: medium
Required Skills:
- Rust
* Web security
Potential Challenges:
- Reproducing the race
Recommended Approach: Bisect the refactor, then fix validation.";

    #[test]
    fn test_parse_full_analysis() {
        let analysis = parse_task_analysis(ANALYSIS);
        assert_eq!(
            analysis.summary,
            "Users cannot log in after the session refactor."
        );
        assert_eq!(analysis.requirements.len(), 2);
        assert_eq!(analysis.complexity, "medium");
        assert_eq!(analysis.skills, vec!["Rust", "Web security"]);
        assert_eq!(analysis.challenges, vec!["Reproducing the race"]);
        assert!(analysis.approach.starts_with("Bisect"));
    }

    #[test]
    fn test_parse_malformed_analysis_is_empty() {
        let analysis = parse_task_analysis("I think this is hard.\n- maybe\n\nGood luck!");
        assert_eq!(analysis, TaskAnalysis::default());
    }

    #[test]
    fn test_bullets_after_scalar_section_ignored() {
        let analysis = parse_task_analysis("Recommended Approach: do it\n- step one");
        assert!(analysis.requirements.is_empty());
        assert_eq!(analysis.approach, "do it");
    }

    #[test]
    fn test_parse_recommendation() {
        let text = "Recommendation:
- Agent: Code Helper (agent-7)
- Reason: Strong Rust background
- Confidence: high
- Alternative: none
- Estimated Success Rate: 85%";
        let rec = parse_recommendation(text);
        assert_eq!(rec.agent_name, "Code Helper");
        assert_eq!(rec.agent_id, "agent-7");
        assert_eq!(rec.reasoning, "Strong Rust background");
        assert_eq!(rec.confidence, "high");
        assert_eq!(rec.alternative, "none");
        assert_eq!(rec.success_rate, "85%");
    }

    #[test]
    fn test_parse_recommendation_without_id() {
        let rec = parse_recommendation("- Agent: Solo");
        assert_eq!(rec.agent_name, "Solo");
        assert!(rec.agent_id.is_empty());
        assert!(parse_recommendation("no block here").agent_name.is_empty());
    }
}
