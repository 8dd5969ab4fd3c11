//! Token count estimates. None of these are authoritative; they only size requests.

/// Roughly `chars / chars_per_token`, rounded up.
pub fn estimate_by_chars(text: &str, chars_per_token: f64) -> usize {
    let chars = text.chars().count();
    if chars == 0 {
        return 0;
    }
    (chars as f64 / chars_per_token).ceil() as usize
}

/// Roughly four tokens per three words, rounded up.
pub fn estimate_by_words(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words * 4).div_ceil(3)
}

/// Provider-agnostic estimate used when no provider is active.
pub fn default_estimate(text: &str) -> usize {
    estimate_by_chars(text, 4.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates() {
        assert_eq!(default_estimate(""), 0);
        assert_eq!(default_estimate("abcd"), 1);
        assert_eq!(default_estimate("abcde"), 2);
        assert_eq!(estimate_by_chars("abcdefg", 3.5), 2);
        assert_eq!(estimate_by_words("one two three"), 4);
        assert_eq!(estimate_by_words("   "), 0);
    }
}
