//! Masking helpers for anything that might reach a log line.

use std::collections::BTreeMap;

/// Shorten a secret-looking value to a recognizable but useless preview.
pub fn mask_sensitive_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let edge = |head: usize, tail: usize| -> String {
        let start: String = chars[..head].iter().collect();
        let end: String = chars[chars.len() - tail..].iter().collect();
        format!("{start}...{end}")
    };

    if let Some(token) = value.strip_prefix("Bearer ") {
        return format!("Bearer {}", mask_sensitive_value(token));
    }
    if (value.starts_with("sk-") || value.starts_with("sk-ant-")) && chars.len() > 12 {
        return edge(8, 4);
    }
    if chars.len() > 16 {
        edge(6, 4)
    } else {
        "***".to_string()
    }
}

/// Header names whose values must never be logged verbatim.
pub fn is_sensitive_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.contains("authorization") || name.contains("key") || name.contains("token")
}

/// Header map with sensitive values masked, for debug logging.
pub fn masked_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| {
            let value = if is_sensitive_header(k) {
                mask_sensitive_value(v)
            } else {
                v.clone()
            };
            (k.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_provider_keys() {
        assert_eq!(
            mask_sensitive_value("sk-abcdefghijklmnopqrstuvwxyz"),
            "sk-abcde...wxyz"
        );
        assert_eq!(mask_sensitive_value("short"), "***");
        assert_eq!(
            mask_sensitive_value("Bearer sk-abcdefghijklmnop"),
            "Bearer sk-abcde...mnop"
        );
    }

    #[test]
    fn masks_only_sensitive_headers() {
        let mut headers = BTreeMap::new();
        headers.insert("X-Api-Key".to_string(), "abcdefghijklmnopqrstuvwxyz".to_string());
        headers.insert("X-Azure-Deployment-Name".to_string(), "gpt4o-prod".to_string());
        let masked = masked_headers(&headers);
        assert_eq!(masked["X-Api-Key"], "abcdef...wxyz");
        assert_eq!(masked["X-Azure-Deployment-Name"], "gpt4o-prod");
    }

    #[test]
    fn handles_multibyte_values() {
        let value = "ключ-ключ-ключ-ключ-ключ";
        let masked = mask_sensitive_value(value);
        assert!(masked.starts_with("ключ-к"));
    }
}
