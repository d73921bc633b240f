//! Speech text preparation.
//!
//! Card fields carry editor HTML (line breaks, list items, entities) and
//! word-stack notation (`å huske < husker`) that reads badly aloud.  This
//! pass turns a field into clean speakable text with comma and ellipsis
//! pauses.  The prepared text is also what artifact hashes are computed
//! over, so formatting-only edits reuse the cached audio.

use std::sync::OnceLock;

use regex::Regex;

fn marker_lines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Lines starting with the 🔸 bullet are display-only annotations.
    RE.get_or_init(|| Regex::new(r"(?m)^\s*🔸.*$").expect("valid pattern"))
}

fn double_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(<br\s*/?>\s*){2,}").expect("valid pattern"))
}

fn single_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("valid pattern"))
}

fn block_close() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</(li|div|p)>").expect("valid pattern"))
}

fn any_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^<>]+>").expect("valid pattern"))
}

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Word-stack and layout separators become spoken pauses.
    RE.get_or_init(|| Regex::new(r"\s*[|<>–—]+\s*").expect("valid pattern"))
}

fn comma_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\s*,)+").expect("valid pattern"))
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid pattern"))
}

fn edge_ellipses() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Pause markers at the very start or end of the text speak badly.
    RE.get_or_init(|| Regex::new(r"^(\s*\.{2,})+|(\s*\.{2,})+\s*$").expect("valid pattern"))
}

/// Convert an editor field into speakable text.
///
/// Returns an empty string when nothing speakable remains.
pub fn prepare_speech_text(field: &str) -> String {
    let text = marker_lines().replace_all(field, "");
    let text = decode_entities(&text);

    // Breaks before tag stripping so pause lengths survive.
    let text = double_break().replace_all(&text, " ... ");
    let text = single_break().replace_all(&text, " .. ");
    let text = block_close().replace_all(&text, " ... ");
    let text = any_tag().replace_all(&text, " ");

    let text = text.replace('\n', " ... ");
    let text = separators().replace_all(&text, ", ");
    let text = comma_runs().replace_all(&text, ",");
    let text = whitespace().replace_all(&text, " ");
    let text = edge_ellipses().replace_all(&text, "");

    text.trim().trim_matches(',').trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_stack_notation_becomes_pauses() {
        let out = prepare_speech_text("å huske < husker < husket");
        assert_eq!(out, "å huske, husker, husket");
    }

    #[test]
    fn breaks_become_ellipses() {
        let out = prepare_speech_text("Jeg husker deg.<br>Du husker meg.");
        assert_eq!(out, "Jeg husker deg. .. Du husker meg.");

        let out = prepare_speech_text("Jeg husker deg.<br><br>Du husker meg.");
        assert_eq!(out, "Jeg husker deg. ... Du husker meg.");
    }

    #[test]
    fn marker_lines_are_dropped() {
        let out = prepare_speech_text("🔸 Å huske betyr å minnes.\nJeg husker deg.");
        assert_eq!(out, "Jeg husker deg.");
    }

    #[test]
    fn tags_and_entities_are_cleaned() {
        let out = prepare_speech_text("<div>Jeg&nbsp;husker</div><li>en huske</li>");
        assert_eq!(out, "Jeg husker ... en huske");
    }

    #[test]
    fn formatting_variants_normalize_identically() {
        let a = prepare_speech_text("en huske  <  husken");
        let b = prepare_speech_text("en huske<husken");
        assert_eq!(a, b);
    }

    #[test]
    fn display_only_field_prepares_to_empty() {
        assert_eq!(prepare_speech_text("🔸 bare pynt"), "");
        assert_eq!(prepare_speech_text("  <br> "), "");
    }
}
