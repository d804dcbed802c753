#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Prompt assembly for the scoring stage: renders the preprocessed
//! artifact, the reference solution when one is configured, and the
//! rubric into chat messages.

use anyhow::Result;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs,
};
use itertools::Itertools;

use crate::{
    config,
    notebook::{Artifact, Cell},
    rubric::Rubric,
    util,
};

/// Builds the chat messages for one scoring request.
pub fn scoring_messages(
    artifact: &Artifact,
    reference: Option<&Artifact>,
    rubric: &Rubric,
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let prompts = config::prompts();

    let mut user_content = String::new();
    user_content.push_str(&render_rubric(rubric));
    user_content.push_str(&render_artifact(artifact));
    if let Some(reference) = reference {
        user_content.push_str(&render_reference(reference));
    }
    user_content.push_str(prompts.response_format());

    let messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(prompts.system_message().to_string())
            .build()?
            .into(),
        ChatCompletionRequestSystemMessageArgs::default()
            .content(prompts.dimension_instructions().to_string())
            .build()?
            .into(),
        ChatCompletionRequestUserMessageArgs::default()
            .content(user_content)
            .build()?
            .into(),
    ];

    Ok(messages)
}

/// Renders the rubric as a markdown header block.
fn render_rubric(rubric: &Rubric) -> String {
    let dimensions = rubric
        .dimensions()
        .iter()
        .map(|dim| format!("- {} ({:.0}% of total)", dim.name(), dim.weight() * 100.0))
        .join("\n");

    format!(
        "## Rubric: {} ({:.0} points)\n\n{dimensions}\n\n",
        rubric.title(),
        rubric.total_points()
    )
}

/// Renders the submission's cells in document order, truncated to the
/// prompt budget.
pub fn render_artifact(artifact: &Artifact) -> String {
    render_cells(artifact, "## Notebook\n\n")
}

/// Renders the reference solution under its own header, truncated to
/// the same prompt budget.
fn render_reference(reference: &Artifact) -> String {
    render_cells(reference, "## Reference solution\n\n")
}

/// Renders an artifact's cells under `header`.
fn render_cells(artifact: &Artifact, header: &str) -> String {
    let mut out = String::from(header);

    for (index, cell) in artifact.cells().iter().enumerate() {
        match cell {
            Cell::Narrative { text } => {
                out.push_str(&format!("### Cell {index} (narrative)\n\n"));
                out.push_str(text);
                out.push_str("\n\n");
            }
            Cell::Executable {
                source,
                execution_index,
                ..
            } => {
                match execution_index {
                    Some(n) => {
                        out.push_str(&format!("### Cell {index} (code, executed as [{n}])\n\n"));
                    }
                    None => out.push_str(&format!("### Cell {index} (code, never executed)\n\n")),
                }
                out.push_str("```python\n");
                out.push_str(source);
                out.push_str("\n```\n\n");

                if let Some(output) = cell.output_text() {
                    out.push_str("**Output:**\n\n```\n");
                    out.push_str(&output);
                    out.push_str("\n```\n\n");
                }
            }
        }
    }

    util::truncate_with_notice(&mut out, config::PROMPT_TRUNCATE);
    out
}
