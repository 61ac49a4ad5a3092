//! An interactive, terminal-backed [`Prompter`]: presents each
//! missing capability and reads a one-line decision from stdin.

use std::io::{BufRead, Write};

use cce_capability::{CapabilityInfo, PromptDecision, Prompter};

/// Prompts on stdout/stdin. Falls back to denial on a read failure or
/// an unrecognized answer, rather than looping forever or granting by
/// default.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn prompt(&self, info: &CapabilityInfo) -> PromptDecision {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        let risk = if info.is_broad { "BROAD" } else { "narrow" };
        let _ = writeln!(
            out,
            "plugin '{}' requests {} [{}] {}",
            info.plugin_name, info.capability.kind, info.capability.pattern, risk
        );
        if let Some(alt) = &info.profile_specific {
            let _ = writeln!(out, "  a narrower alternative is available: {} [{}]", alt.kind, alt.pattern);
        }
        let _ = write!(out, "  grant? [y]es-session / [a]lways / [N]o: ");
        let _ = out.flush();

        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_err() {
            return PromptDecision::No;
        }
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => PromptDecision::YesSession,
            "a" | "always" => PromptDecision::AlwaysPersist,
            _ => PromptDecision::No,
        }
    }
}
