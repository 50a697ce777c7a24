use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;

use crate::models::Match;

static TOKENIZER: Lazy<Option<CoreBPE>> = Lazy::new(|| match tiktoken_rs::cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(e) => {
        tracing::warn!("Tokenizer unavailable, context size will not be checked: {}", e);
        None
    }
});

/// Joins the text of each match, in the given order, each followed by a newline.
pub fn build_context(matches: &[Match]) -> String {
    let mut context = String::new();
    for m in matches {
        context.push_str(m.text());
        context.push('\n');
    }
    context
}

/// Number of cl100k tokens in `text`, if the tokenizer could be loaded.
pub fn count_tokens(text: &str) -> Option<usize> {
    TOKENIZER
        .as_ref()
        .map(|bpe| bpe.encode_with_special_tokens(text).len())
}
