//! Context assembly: source excerpts plus recent history.
//!
//! Sections are emitted in a fixed order (PDF, web, history) and joined by a
//! blank line. Only a successfully loaded, non-empty source makes the context
//! strict; history on its own never does.

use sourcechat_shared::{AnswerConfig, SessionState, SourceOutcome, truncate_chars};

pub const PDF_SECTION: &str = "PDF_CONTENT:";
pub const WEB_SECTION: &str = "WEB_CONTENT:";
pub const HISTORY_SECTION: &str = "RECENT_CHAT_HISTORY:";

/// Assembled grounding context for one model call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    /// Labeled sections joined by blank lines. Empty when nothing contributed.
    pub text: String,
    /// At least one external source (PDF or web) contributed a section.
    pub strict: bool,
}

/// Limits applied while assembling a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBuilder {
    pub pdf_max_chars: usize,
    pub web_max_chars: usize,
    /// Number of recent exchanges; `max_turns * 2` turns are considered.
    pub max_turns: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            pdf_max_chars: 4000,
            web_max_chars: 3000,
            max_turns: 6,
        }
    }
}

impl From<&AnswerConfig> for ContextBuilder {
    fn from(config: &AnswerConfig) -> Self {
        Self {
            pdf_max_chars: config.pdf_max_chars,
            web_max_chars: config.web_max_chars,
            max_turns: config.max_turns,
        }
    }
}

impl ContextBuilder {
    pub fn build(
        &self,
        pdf: &SourceOutcome,
        web: &SourceOutcome,
        session: &SessionState,
    ) -> Context {
        let mut sections: Vec<String> = Vec::with_capacity(3);
        let mut strict = false;

        if let Some(section) = source_section(PDF_SECTION, pdf, self.pdf_max_chars) {
            sections.push(section);
            strict = true;
        }

        if let Some(section) = source_section(WEB_SECTION, web, self.web_max_chars) {
            sections.push(section);
            strict = true;
        }

        if let Some(section) = history_section(session, self.max_turns) {
            sections.push(section);
        }

        Context {
            text: sections.join("\n\n"),
            strict,
        }
    }
}

/// Build a context with default source limits and the given history window.
pub fn build_context(
    pdf: &SourceOutcome,
    web: &SourceOutcome,
    session: &SessionState,
    max_turns: usize,
) -> Context {
    ContextBuilder {
        max_turns,
        ..ContextBuilder::default()
    }
    .build(pdf, web, session)
}

fn source_section(label: &str, outcome: &SourceOutcome, max_chars: usize) -> Option<String> {
    match outcome {
        Ok(source) if !source.is_empty() => {
            Some(format!("{label}\n{}", truncate_chars(&source.text, max_chars)))
        }
        _ => None,
    }
}

fn history_section(session: &SessionState, max_turns: usize) -> Option<String> {
    let lines: Vec<String> = session
        .recent(max_turns.saturating_mul(2))
        .iter()
        .filter_map(|turn| {
            let content = turn.content.trim();
            (!content.is_empty()).then(|| format!("{}: {content}", turn.role.label()))
        })
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(format!("{HISTORY_SECTION}\n{}", lines.join("\n")))
    }
}
