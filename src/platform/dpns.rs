//! DPNS label handling: homograph-safe normalization and the contested-name
//! rule that decides whether a registration goes to a masternode vote.

/// Lowercases the label and folds the homograph-prone characters the
/// naming contract normalizes: `o` to `0`, `i` and `l` to `1`.
pub fn convert_to_homograph_safe_chars(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'o' => '0',
            'i' | 'l' => '1',
            other => other,
        })
        .collect()
}

/// A normalized label is contested when it is short enough to be scarce:
/// 3 to 19 characters from `[a-z01-]` with no digit 2-9.
pub fn is_contested_name(label: &str) -> bool {
    let normalized = convert_to_homograph_safe_chars(label);
    if normalized.len() < 3 || normalized.len() > 19 {
        return false;
    }
    normalized
        .chars()
        .all(|c| c.is_ascii_lowercase() || c == '0' || c == '1' || c == '-')
}

/// Basic label shape check before hitting the network: DNS-label rules,
/// 3-63 characters, alphanumeric plus interior hyphens.
pub fn is_valid_label(label: &str) -> bool {
    if label.len() < 3 || label.len() > 63 {
        return false;
    }
    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }
    label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
