//! Quoting for values spliced into remote `sh` command lines.

/// Characters that force an argument into single quotes.
const SHELL_META: &[char] = &[
    ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}', '<',
    '>', '|', '&', ';', '#', '~',
];

/// Quote a single argument. Plain words pass through untouched.
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_owned();
    }
    if !arg.contains(SHELL_META) {
        return arg.to_owned();
    }
    format!("'{}'", arg.replace('\'', "'\\''"))
}

/// Always wrap `arg` in single quotes, even when it is a plain word.
pub fn quote_literal(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "'\\''"))
}

/// Quote a remote path while leaving a leading `~` or `~/` for the remote
/// shell to expand.
pub fn quote_path(path: &str) -> String {
    if path == "~" {
        return "~".to_owned();
    }
    match path.strip_prefix("~/") {
        Some("") => "~/".to_owned(),
        Some(rest) => format!("~/{}", quote_arg(rest)),
        None => quote_arg(path),
    }
}
