//! Rendering of the instructions file handed to the agent (`AGENTS.md`).

use anyhow::{Context, Result};
use minijinja::{Environment, context};

const INSTRUCTIONS_TEMPLATE: &str = include_str!("../prompts/instructions.md");

/// Everything that shapes the instructions for one run.
#[derive(Debug, Clone, Default)]
pub struct InstructionInputs<'a> {
    pub goal: &'a str,
    /// Persona body, placed before the task.
    pub persona: Option<&'a str>,
    pub repo: Option<&'a str>,
    pub branch: Option<&'a str>,
    pub issue: Option<u64>,
    /// Ask the agent to open a pull request after pushing.
    pub pr: bool,
}

/// Render the instructions document.
pub fn render_instructions(inputs: &InstructionInputs<'_>) -> Result<String> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.add_template("instructions", INSTRUCTIONS_TEMPLATE)
        .context("load instructions template")?;
    let template = env
        .get_template("instructions")
        .context("get instructions template")?;
    let rendered = template
        .render(context! {
            goal => inputs.goal.trim(),
            persona => inputs.persona.map(str::trim).filter(|p| !p.is_empty()),
            repo => inputs.repo,
            branch => inputs.branch,
            issue => inputs.issue,
            pr => inputs.pr,
        })
        .context("render instructions")?;
    let mut out = rendered.trim().to_string();
    out.push('\n');
    Ok(out)
}
