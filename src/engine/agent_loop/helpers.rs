// Vitalis Engine — Agent Loop Helpers
// Prompt composition and fallback text, kept out of the loop body.

use crate::atoms::memory_types::MemoryContext;

/// Assemble the system instructions for one turn from retrieved memory.
/// Sections are included only when their slice is non-empty, so a degraded
/// context produces a shorter prompt, not placeholders.
pub fn compose_system_prompt(context: &MemoryContext) -> String {
    let mut prompt = String::from(
        "You are a personal health assistant. Answer questions about the user's \
         wellness data using the available tools, and never invent numbers: every \
         value you state must come from a tool result. Keep answers concise.",
    );

    if let Some(conversation) = &context.conversation {
        prompt.push_str("\n\n## Recent conversation\n");
        prompt.push_str(conversation);
    }

    if !context.goals.is_empty() {
        prompt.push_str("\n\n## User goals\n");
        for hit in &context.goals {
            prompt.push_str(&format!("- {}\n", hit.record.description));
        }
    }

    if !context.facts.is_empty() {
        prompt.push_str("\n\n## Health knowledge\n");
        for hit in &context.facts {
            prompt.push_str(&format!("- {}\n", hit.record.description));
        }
    }

    if let Some(plan) = &context.plan {
        prompt.push_str(&format!(
            "\n\n## Suggested approach\nFor this kind of question ({}), these tools have worked \
             before (confidence {:.2}): {}.",
            plan.query_type,
            plan.confidence,
            plan.tools.join(", ")
        ));
    }

    prompt
}

/// Shown when the model produced neither text nor tool calls.
pub fn empty_response_fallback() -> String {
    "I wasn't able to put together a response just now. Could you rephrase or try again?".to_string()
}

/// Shown when the tool-call budget ran out before a final summary.
/// Deliberately digit-free: the validator scans the final text, and a count
/// here would read as an unverifiable number.
pub fn budget_exhausted_fallback() -> String {
    "I gathered data across several tool calls but ran out of steps before I could \
     write a final summary. Please ask again with a narrower question."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::memory_types::{QueryType, ToolPlan};

    #[test]
    fn empty_context_is_just_the_persona() {
        let prompt = compose_system_prompt(&MemoryContext::default());
        assert!(prompt.contains("health assistant"));
        assert!(!prompt.contains("## Recent conversation"));
        assert!(!prompt.contains("## User goals"));
    }

    #[test]
    fn sections_appear_with_content() {
        let context = MemoryContext {
            conversation: Some("User: hi\nAssistant: hello".into()),
            plan: Some(ToolPlan {
                query_type: QueryType::HealthMetric,
                tools: vec!["get_health_metrics".into()],
                confidence: 0.3,
                from_pattern: false,
            }),
            ..Default::default()
        };
        let prompt = compose_system_prompt(&context);
        assert!(prompt.contains("## Recent conversation"));
        assert!(prompt.contains("User: hi"));
        assert!(prompt.contains("get_health_metrics"));
        assert!(prompt.contains("0.30"));
    }
}
