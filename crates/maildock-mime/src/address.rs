//! Address-list extraction from To/Cc style headers.
//!
//! Header values like `"Ada L" <ada@example.com>, bob@example.com` are
//! split into their bare addr-spec forms. This is deliberately lenient;
//! display names and comments are discarded.

/// Extracts the addr-spec from a single mailbox entry.
///
/// Handles `Name <addr>` and bare `addr` forms. Returns `None` for
/// entries with no address in them (group syntax placeholders, empty
/// entries).
#[must_use]
pub fn extract_addr_spec(entry: &str) -> Option<String> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }

    if let Some(open) = entry.rfind('<') {
        let close = entry[open..].find('>')? + open;
        let addr = entry[open + 1..close].trim();
        if addr.is_empty() {
            return None;
        }
        return Some(addr.to_string());
    }

    // Bare form; must look like an address at all.
    if entry.contains('@') {
        Some(entry.trim_matches('"').to_string())
    } else {
        None
    }
}

/// Splits a To/Cc header value into individual addresses.
///
/// Commas inside double quotes or angle brackets do not split.
#[must_use]
pub fn parse_address_list(value: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_brackets = false;

    for ch in value.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '<' if !in_quotes => {
                in_brackets = true;
                current.push(ch);
            }
            '>' if !in_quotes => {
                in_brackets = false;
                current.push(ch);
            }
            ',' if !in_quotes && !in_brackets => {
                entries.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    entries.push(current);

    entries
        .iter()
        .filter_map(|e| extract_addr_spec(e))
        .collect()
}
