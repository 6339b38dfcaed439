// ── Vitalis Memory — Token Estimation ──────────────────────────────────────
// Single source of truth for token counting in the short-term trimmer.
//
// The engine operates on text, not raw tokens, so counts are estimated from
// character length with model-appropriate ratios. Without a known model
// family the estimator falls back to the classic chars/4 heuristic, which
// overestimates slightly for English — the safe direction for a budget.

/// Estimates token counts for context budgeting.
#[derive(Debug, Clone, Copy)]
pub struct Tokenizer {
    /// Average characters per token for the active model family.
    chars_per_token: f32,
}

impl Tokenizer {
    /// Ratio-based tokenizer for a known model family.
    pub fn for_model(model: &str) -> Self {
        let m = model.to_lowercase();
        let chars_per_token = if m.contains("gpt-4") || m.contains("claude") {
            3.7
        } else if m.contains("llama") || m.contains("mistral") {
            3.3
        } else {
            4.0
        };
        Tokenizer { chars_per_token }
    }

    /// The chars/4 fallback used when no model-specific ratio applies.
    pub fn heuristic() -> Self {
        Tokenizer { chars_per_token: 4.0 }
    }

    /// Estimate the number of tokens in a string. Non-empty text always
    /// counts as at least one token.
    pub fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        // Char count, not byte count: byte length overcounts CJK/emoji text.
        let chars = text.chars().count();
        ((chars as f32 / self.chars_per_token).ceil() as usize).max(1)
    }

    /// Estimate tokens for a message list, including per-message framing
    /// overhead (role markers, separators).
    pub fn count_messages<'a, I>(&self, messages: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        const OVERHEAD_PER_MESSAGE: usize = 4;
        messages.into_iter().map(|m| self.count_tokens(m) + OVERHEAD_PER_MESSAGE).sum()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::heuristic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero() {
        assert_eq!(Tokenizer::heuristic().count_tokens(""), 0);
    }

    #[test]
    fn single_char_is_one_token() {
        assert_eq!(Tokenizer::heuristic().count_tokens("a"), 1);
    }

    #[test]
    fn heuristic_is_len_over_four() {
        let tok = Tokenizer::heuristic();
        let text = "a".repeat(400);
        assert_eq!(tok.count_tokens(&text), 100);
    }

    #[test]
    fn known_models_use_tighter_ratios() {
        let text = "a".repeat(370);
        assert!(Tokenizer::for_model("gpt-4o").count_tokens(&text) >= 100);
        assert!(Tokenizer::for_model("unknown-model").count_tokens(&text) < 100);
    }

    #[test]
    fn message_framing_overhead_counts() {
        let tok = Tokenizer::heuristic();
        let msgs = ["hi", "there"];
        assert_eq!(
            tok.count_messages(msgs.iter().copied()),
            tok.count_tokens("hi") + tok.count_tokens("there") + 8
        );
    }

    #[test]
    fn unicode_counts_chars_not_bytes() {
        let tok = Tokenizer::heuristic();
        // 4 chars, 12+ bytes
        assert_eq!(tok.count_tokens("你好世界"), 1);
    }
}
