//! Helpers shared by client implementations for publishing events.

use utr_model::Document;

/// Commands whose bodies and replies are never published unredacted unless
/// the client opts in.
const SENSITIVE_COMMANDS: &[&str] = &[
    "authenticate",
    "saslstart",
    "saslcontinue",
    "getnonce",
    "createuser",
    "updateuser",
    "copydbgetnonce",
    "copydbsaslstart",
    "copydb",
];

/// Whether a command carries credentials.
///
/// `hello` and its legacy spelling are sensitive only when they carry
/// `speculativeAuthenticate`.
#[must_use]
pub fn is_sensitive_command(command_name: &str, command: &Document) -> bool {
    let lowered = command_name.to_ascii_lowercase();
    if SENSITIVE_COMMANDS.contains(&lowered.as_str()) {
        return true;
    }
    matches!(lowered.as_str(), "hello" | "ismaster")
        && command.contains_key("speculativeAuthenticate")
}

/// Returns the document to publish: the original, or an empty document when
/// the command is sensitive and the client does not observe sensitive
/// commands.
#[must_use]
pub fn published_body(
    command_name: &str,
    command: &Document,
    body: &Document,
    observe_sensitive: bool,
) -> Document {
    if !observe_sensitive && is_sensitive_command(command_name, command) {
        Document::new()
    } else {
        body.clone()
    }
}
