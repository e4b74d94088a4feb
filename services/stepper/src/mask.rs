//! Masking of account identifiers in logs and summaries

/// Mask an account identifier, keeping a few characters at each end
///
/// Identifiers of up to 8 characters keep `max(len / 3, 1)` characters on
/// each side; longer ones keep the first 3 and the last 4.
pub fn mask_account(account: &str) -> String {
    let chars: Vec<char> = account.chars().collect();
    let len = chars.len();

    if len == 0 {
        return "***".to_string();
    }

    if len <= 8 {
        let keep = (len / 3).max(1);
        let head: String = chars[..keep].iter().collect();
        let tail: String = chars[len - keep..].iter().collect();
        return format!("{head}***{tail}");
    }

    let head: String = chars[..3].iter().collect();
    let tail: String = chars[len - 4..].iter().collect();
    format!("{head}****{tail}")
}
