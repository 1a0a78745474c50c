//! Validation of ids supplied by tool callers

use mcp_attr::Result as McpResult;

/// Prefix the chat UI puts on checkbox option values
const OPTION_VALUE_PREFIX: &str = "notion-id-";

/// Normalize a block id the way Notion returns it.
///
/// Accepts the dashed UUID form, the undashed 32-hex form found in page URLs,
/// and option values carrying the `notion-id-` prefix.
///
/// # Returns
/// The dashed id, or an invalid-params error
pub fn normalize_block_id(raw: &str) -> McpResult<String> {
    let id = raw.trim();
    let id = id.strip_prefix(OPTION_VALUE_PREFIX).unwrap_or(id);

    if id.is_empty() {
        return Err(invalid_id("Block id must not be empty".to_string()));
    }
    if id.chars().any(char::is_whitespace) {
        return Err(invalid_id(format!(
            "Invalid block id '{}': contains whitespace",
            id
        )));
    }

    if id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit()) {
        let lower = id.to_ascii_lowercase();
        return Ok(format!(
            "{}-{}-{}-{}-{}",
            &lower[0..8],
            &lower[8..12],
            &lower[12..16],
            &lower[16..20],
            &lower[20..32]
        ));
    }
    Ok(id.to_string())
}

fn invalid_id(message: String) -> mcp_attr::Error {
    mcp_attr::Error::new(mcp_attr::ErrorCode::INVALID_PARAMS).with_message(message, true)
}
