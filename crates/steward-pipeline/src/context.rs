use anyhow::Result;
use steward_core::agent_definition::AgentDefinition;
use steward_core::platform::PlatformClient;
use steward_core::run_context::{EventKind, RunContext};
use steward_outputs::handler::HandlerContext;
use steward_outputs::registry::CapabilityRegistry;

pub const CONTEXT_END_MARKER: &str = "<!-- steward:context:end -->";

/// Builds the ordered text bundle handed to the execution stage:
/// static header, event-detail block, optional collected input, one dynamic
/// fragment per configured capability in declaration order, the operation
/// contracts, closing marker.
pub struct ContextAssembler;

impl ContextAssembler {
    pub async fn assemble(
        run: &RunContext,
        definition: &AgentDefinition,
        registry: &CapabilityRegistry,
        client: &dyn PlatformClient,
        collected_input: Option<&str>,
    ) -> Result<String> {
        let mut blocks = vec![Self::header(run, definition)];

        if let Some(event_block) = Self::event_detail(run) {
            blocks.push(event_block);
        }

        if let Some(input) = collected_input.filter(|input| !input.trim().is_empty()) {
            blocks.push(format!("## Collected input\n\n{input}"));
        }

        let handler_context = HandlerContext {
            run,
            definition,
            client,
        };
        for entry in &definition.capabilities {
            let Some(handler) = registry.resolve(entry.capability)? else {
                continue;
            };
            if let Some(fragment) = handler.dynamic_context(&handler_context).await? {
                blocks.push(fragment);
            }
        }

        let briefing = Self::usage_briefing(definition, registry)?;
        if !briefing.is_empty() {
            blocks.push(format!("## Operations\n\n{briefing}"));
        }

        blocks.push(CONTEXT_END_MARKER.to_string());
        Ok(blocks.join("\n\n"))
    }

    /// Operation contracts briefing the execution stage, one per configured
    /// capability in declaration order.
    pub fn usage_briefing(definition: &AgentDefinition, registry: &CapabilityRegistry) -> Result<String> {
        let mut sections = Vec::new();
        for entry in &definition.capabilities {
            let Some(handler) = registry.resolve(entry.capability)? else {
                continue;
            };
            sections.push(handler.describe_usage(&entry.constraint));
        }
        Ok(sections.join("\n\n"))
    }

    fn header(run: &RunContext, definition: &AgentDefinition) -> String {
        let mut header = format!(
            "# Agent: {}\n\nRepository: {}\nActor: {}\nRun: {}",
            definition.name,
            run.repo.as_slug(),
            run.actor,
            run.run_id
        );
        if !definition.instructions.trim().is_empty() {
            header.push_str("\n\n## Instructions\n\n");
            header.push_str(definition.instructions.trim());
        }
        header
    }

    /// Exactly one event block, chosen by event kind; schedule and manual
    /// runs have no triggering subject to describe.
    fn event_detail(run: &RunContext) -> Option<String> {
        match run.event {
            EventKind::Issue => run
                .subject()
                .map(|number| format!("## Triggering issue\n\nIssue #{number}")),
            EventKind::PullRequest => run
                .subject()
                .map(|number| format!("## Triggering pull request\n\nPR #{number}")),
            EventKind::Discussion => Some("## Triggering discussion".to_string()),
            EventKind::Schedule | EventKind::Manual => None,
        }
    }
}
