//! Server error codes and their symbolic names.

use std::borrow::Cow;

/// Invalid argument value.
pub const BAD_VALUE: i32 = 2;
/// Malformed command.
pub const FAILED_TO_PARSE: i32 = 9;
/// Command not permitted against this database.
pub const UNAUTHORIZED: i32 = 13;
/// Operand of the wrong type.
pub const TYPE_MISMATCH: i32 = 14;
/// Collection or database does not exist.
pub const NAMESPACE_NOT_FOUND: i32 = 26;
/// Update path traverses a non-document.
pub const PATH_NOT_VIABLE: i32 = 28;
/// Cursor id is not open.
pub const CURSOR_NOT_FOUND: i32 = 43;
/// Collection already exists.
pub const NAMESPACE_EXISTS: i32 = 48;
/// Command name is unknown.
pub const COMMAND_NOT_FOUND: i32 = 59;
/// Update would change `_id`.
pub const IMMUTABLE_FIELD: i32 = 66;
/// Declared API version is unknown.
pub const API_VERSION_ERROR: i32 = 322;
/// Command is outside the strict API.
pub const API_STRICT_ERROR: i32 = 323;
/// Unique index violation.
pub const DUPLICATE_KEY: i32 = 11000;
/// Unknown aggregation stage.
pub const UNRECOGNIZED_STAGE: i32 = 40324;

const NAMES: &[(i32, &str)] = &[
    (BAD_VALUE, "BadValue"),
    (FAILED_TO_PARSE, "FailedToParse"),
    (UNAUTHORIZED, "Unauthorized"),
    (TYPE_MISMATCH, "TypeMismatch"),
    (NAMESPACE_NOT_FOUND, "NamespaceNotFound"),
    (PATH_NOT_VIABLE, "PathNotViable"),
    (CURSOR_NOT_FOUND, "CursorNotFound"),
    (NAMESPACE_EXISTS, "NamespaceExists"),
    (50, "MaxTimeMSExpired"),
    (COMMAND_NOT_FOUND, "CommandNotFound"),
    (IMMUTABLE_FIELD, "ImmutableField"),
    (89, "NetworkTimeout"),
    (91, "ShutdownInProgress"),
    (189, "PrimarySteppedDown"),
    (262, "ExceededTimeLimit"),
    (API_VERSION_ERROR, "APIVersionError"),
    (API_STRICT_ERROR, "APIStrictError"),
    (10107, "NotWritablePrimary"),
    (DUPLICATE_KEY, "DuplicateKey"),
    (11600, "InterruptedAtShutdown"),
    (11602, "InterruptedDueToReplStateChange"),
    (13435, "NotPrimaryNoSecondaryOk"),
    (13436, "NotPrimaryOrSecondary"),
];

/// Symbolic name of a server error code.
///
/// Codes without a registered name render as `Location<code>`, the way the
/// server names ad hoc assertion codes.
#[must_use]
pub fn code_name(code: i32) -> Cow<'static, str> {
    NAMES
        .iter()
        .find(|(known, _)| *known == code)
        .map_or_else(|| Cow::Owned(format!("Location{code}")), |(_, name)| Cow::Borrowed(*name))
}
