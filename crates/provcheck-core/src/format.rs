//! Display forms for hex digests (badges, tooltips, tables).

const SHORT_LEN: usize = 6;
const DISPLAY_LEN: usize = 30;
const DISPLAY_TRUNCATE_AT: usize = 32;

pub const SHORT_PLACEHOLDER: &str = "------";
pub const DISPLAY_PLACEHOLDER: &str = "----";
pub const ELLIPSIS: &str = "...";

/// First 6 characters of `hash`, or `"------"` if it is shorter than that.
pub fn format_short(hash: &str) -> String {
    if hash.chars().count() < SHORT_LEN {
        return SHORT_PLACEHOLDER.to_string();
    }
    hash.chars().take(SHORT_LEN).collect()
}

/// First 30 characters plus `"..."` for hashes of 32+ characters; `"----"` for
/// empty or too-short values; otherwise the value unchanged.
pub fn format_display(hash: &str) -> String {
    let len = hash.chars().count();
    if len >= DISPLAY_TRUNCATE_AT {
        let mut out: String = hash.chars().take(DISPLAY_LEN).collect();
        out.push_str(ELLIPSIS);
        return out;
    }
    if len < SHORT_LEN {
        return DISPLAY_PLACEHOLDER.to_string();
    }
    hash.to_string()
}
