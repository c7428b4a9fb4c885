// Command text normalization.
// Applied before uniqueness checks and before any lookup so that "!Hola ",
// "hola" + use_prefix and "!hola" all land on the same stored key.

/// Trim, lowercase, drop one leading `prefix`, then re-apply it iff
/// `use_prefix`.
pub fn normalize_command(raw: &str, use_prefix: bool, prefix: char) -> String {
    let lowered = raw.trim().to_lowercase();
    let bare = lowered.strip_prefix(prefix).unwrap_or(&lowered).trim_start();
    if use_prefix {
        format!("{}{}", prefix, bare)
    } else {
        bare.to_string()
    }
}

/// True when `text` starts with the command prefix.
pub fn is_prefixed(text: &str, prefix: char) -> bool {
    text.starts_with(prefix)
}
