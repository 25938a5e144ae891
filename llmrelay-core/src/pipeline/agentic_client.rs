//! Step 5 of the request pipeline: known agentic coding clients (Cline,
//! Aider, Continue, Copilot) default to a weak model for their own internal
//! housekeeping calls; relayed through here, those get bumped up a tier so
//! the agent doesn't stumble on its own tool-use loop.

const AGENTIC_CLIENT_MARKERS: &[&str] = &["cline", "aider", "continue", "copilot"];

fn is_agentic_client(client_hint: Option<&str>) -> bool {
    let Some(hint) = client_hint else { return false };
    let lower = hint.to_ascii_lowercase();
    AGENTIC_CLIENT_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn is_haiku_alias(requested_model: &str) -> bool {
    requested_model.to_ascii_lowercase().contains("haiku")
}

/// Upgrades `requested_model` from a haiku alias to sonnet when the caller
/// is a known agentic client; otherwise returns it unchanged.
pub fn maybe_upgrade_for_agentic_client(requested_model: &str, client_hint: Option<&str>) -> String {
    if is_agentic_client(client_hint) && is_haiku_alias(requested_model) {
        "sonnet".to_string()
    } else {
        requested_model.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cline_requesting_haiku_is_upgraded_to_sonnet() {
        assert_eq!(maybe_upgrade_for_agentic_client("haiku", Some("Cline/2.0")), "sonnet");
    }

    #[test]
    fn non_agentic_client_requesting_haiku_is_left_alone() {
        assert_eq!(maybe_upgrade_for_agentic_client("haiku", Some("curl/8.0")), "haiku");
    }

    #[test]
    fn agentic_client_requesting_a_non_haiku_model_is_left_alone() {
        assert_eq!(maybe_upgrade_for_agentic_client("opus", Some("aider")), "opus");
    }

    #[test]
    fn no_client_hint_is_left_alone() {
        assert_eq!(maybe_upgrade_for_agentic_client("haiku", None), "haiku");
    }
}
