/// Presentation layer
///
/// The `wsync` command line: argument parsing, command handlers and the
/// mapping from errors to exit statuses.
pub mod cli;
