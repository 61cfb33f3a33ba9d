//! Chat addressing helpers.

/// Suffix of an individual (one-to-one) chat identifier.
pub const INDIVIDUAL_SUFFIX: &str = "@c.us";

/// Marker contained in every group chat address.
pub const GROUP_MARKER: &str = "@g.us";

/// Turn a raw phone number into a fully-qualified chat identifier.
///
/// Values that already carry the individual-chat suffix are returned as-is
/// (apart from surrounding whitespace); everything else gets the suffix
/// appended once.
pub fn normalize_chat_id(phone: &str) -> String {
    let phone = phone.trim();
    if phone.contains(INDIVIDUAL_SUFFIX) {
        phone.to_string()
    } else {
        format!("{}{}", phone, INDIVIDUAL_SUFFIX)
    }
}

/// Whether an address belongs to a group chat.
pub fn is_group_address(address: &str) -> bool {
    address.contains(GROUP_MARKER)
}
