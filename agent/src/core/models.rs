//! Model shortcuts and backend selection.

use serde::Serialize;

/// Agent execution engine used for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Default backend (`claude`).
    Claude,
    /// Multi-provider backend (`opencode`), used for `provider/model` ids.
    OpenCode,
}

impl Backend {
    /// Pick the backend for a canonical model identifier.
    pub fn for_model(model: &str) -> Self {
        if model.contains('/') {
            Backend::OpenCode
        } else {
            Backend::Claude
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Claude => "claude",
            Backend::OpenCode => "opencode",
        }
    }
}

/// Shortcut name to canonical model identifier.
pub const MODEL_SHORTCUTS: &[(&str, &str)] = &[
    ("sonnet", "claude-sonnet-4-5"),
    ("opus", "claude-opus-4-5"),
    ("haiku", "claude-haiku-4-5"),
    ("qwen3", "opencode/qwen3-coder"),
    ("deepseek", "openrouter/deepseek/deepseek-chat-v3.1"),
    ("gpt4mini", "openrouter/openai/gpt-4o-mini"),
];

/// A model shortcut resolved to its backend and canonical identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub backend: Backend,
    pub model: String,
}

/// Expand a shortcut; provider-qualified and unknown names pass through.
pub fn translate_model(name: &str) -> String {
    if name.contains('/') {
        return name.to_string();
    }
    MODEL_SHORTCUTS
        .iter()
        .find(|(shortcut, _)| *shortcut == name)
        .map(|(_, model)| (*model).to_string())
        .unwrap_or_else(|| name.to_string())
}

pub fn resolve_model(name: &str) -> ResolvedModel {
    let model = translate_model(name);
    ResolvedModel {
        backend: Backend::for_model(&model),
        model,
    }
}
