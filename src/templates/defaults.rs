//! Built-in prompt templates seeded into every registry.

use super::{NewTemplate, TemplateCategory};

/// Template id used for agent self-introductions.
pub const AGENT_INTRODUCTION: &str = "agent-introduction";

/// Template id used when one agent asks another for help.
pub const AGENT_COLLABORATION_REQUEST: &str = "agent-collaboration-request";

/// Template id used for progress reports.
pub const AGENT_STATUS_UPDATE: &str = "agent-status-update";

fn template(
    id: &str,
    name: &str,
    description: &str,
    category: TemplateCategory,
    text: &str,
    variables: &[&str],
) -> (String, NewTemplate) {
    (
        id.to_string(),
        NewTemplate {
            name: name.to_string(),
            description: description.to_string(),
            category,
            template: text.to_string(),
            variables: variables.iter().map(|v| (*v).to_string()).collect(),
        },
    )
}

/// The default templates as `(id, template)` pairs.
#[must_use]
pub fn default_templates() -> Vec<(String, NewTemplate)> {
    vec![
        template(
            AGENT_INTRODUCTION,
            "Agent Introduction",
            "Template for agent self-introduction",
            TemplateCategory::Agent,
            "Hello! I'm {agentName}, an AI agent with expertise in {capabilities}. \
             I'm here to help you with {taskContext}. How can I assist you today?",
            &["agentName", "capabilities", "taskContext"],
        ),
        template(
            AGENT_COLLABORATION_REQUEST,
            "Agent Collaboration Request",
            "Template for requesting collaboration between agents",
            TemplateCategory::Communication,
            "Hi {targetAgent}, I'm working on {taskDescription} and could use your expertise \
             in {requiredCapability}. Would you be available to collaborate? \
             The task involves {taskDetails}.",
            &[
                "targetAgent",
                "taskDescription",
                "requiredCapability",
                "taskDetails",
            ],
        ),
        template(
            AGENT_STATUS_UPDATE,
            "Agent Status Update",
            "Template for providing status updates",
            TemplateCategory::Communication,
            "Status update for {taskName}: {progressDescription}. \
             Current status: {currentStatus}. Next steps: {nextSteps}.",
            &[
                "taskName",
                "progressDescription",
                "currentStatus",
                "nextSteps",
            ],
        ),
        template(
            "task-analysis",
            "Task Analysis",
            "Template for analyzing task requirements and complexity",
            TemplateCategory::Analysis,
            r"Analyze the following task:

Title: {taskTitle}
Description: {taskDescription}
Priority: {taskPriority}

Please provide:
1. Task Summary: {summary}
2. Key Requirements: {requirements}
3. Estimated Complexity: {complexity}
4. Required Skills: {skills}
5. Potential Challenges: {challenges}
6. Recommended Approach: {approach}",
            &[
                "taskTitle",
                "taskDescription",
                "taskPriority",
                "summary",
                "requirements",
                "complexity",
                "skills",
                "challenges",
                "approach",
            ],
        ),
        template(
            "task-breakdown",
            "Task Breakdown",
            "Template for breaking down complex tasks into subtasks",
            TemplateCategory::Analysis,
            r"Break down the following task into manageable subtasks:

Main Task: {taskTitle}
Description: {taskDescription}

Please provide a structured breakdown with:
1. Subtask 1: {subtask1}
   - Estimated time: {time1}
   - Dependencies: {deps1}
   - Required skills: {skills1}

2. Overall Timeline: {timeline}
3. Critical Path: {criticalPath}",
            &[
                "taskTitle",
                "taskDescription",
                "subtask1",
                "time1",
                "deps1",
                "skills1",
                "timeline",
                "criticalPath",
            ],
        ),
        template(
            "agent-recommendation",
            "Agent Recommendation",
            "Template for recommending agents for task assignment",
            TemplateCategory::Analysis,
            r"Based on the task requirements and available agents, recommend the best agent:

Task: {taskDescription}
Required Skills: {requiredSkills}
Available Agents: {agentsList}

Recommendation:
- Agent: {recommendedAgent}
- Reason: {reasoning}
- Confidence: {confidenceLevel}
- Alternative: {alternativeAgent}
- Estimated Success Rate: {successRate}",
            &[
                "taskDescription",
                "requiredSkills",
                "agentsList",
                "recommendedAgent",
                "reasoning",
                "confidenceLevel",
                "alternativeAgent",
                "successRate",
            ],
        ),
        template(
            "escalation-request",
            "Escalation Request",
            "Template for escalating issues to higher-level agents",
            TemplateCategory::Communication,
            r"Issue Escalation Request:
- Task: {taskName}
- Current Agent: {currentAgent}
- Issue Description: {issueDescription}
- Impact: {impactLevel}
- Attempts Made: {attemptsMade}
- Required Assistance: {assistanceNeeded}
- Urgency: {urgencyLevel}",
            &[
                "taskName",
                "currentAgent",
                "issueDescription",
                "impactLevel",
                "attemptsMade",
                "assistanceNeeded",
                "urgencyLevel",
            ],
        ),
        template(
            "completion-report",
            "Task Completion Report",
            "Template for reporting task completion",
            TemplateCategory::Communication,
            r"Task Completion Report:

Task: {taskName}
Assigned to: {agentName}
Started: {startTime}
Completed: {completionTime}
Duration: {duration}

Results:
- {result1}
- {result2}
- {result3}

Challenges Overcome: {challenges}
Lessons Learned: {lessonsLearned}
Recommendations: {recommendations}",
            &[
                "taskName",
                "agentName",
                "startTime",
                "completionTime",
                "duration",
                "result1",
                "result2",
                "result3",
                "challenges",
                "lessonsLearned",
                "recommendations",
            ],
        ),
    ]
}
