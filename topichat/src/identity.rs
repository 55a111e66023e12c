//! Interactive identity resolution.
//!
//! A session cannot start without a valid display name, since the name is
//! a topic segment. The configured name is tried first; otherwise the user
//! is prompted until they supply one that parses.

use std::io::{BufRead, Write};

use topichat_proto::identity::Identity;

/// Resolves the session identity, prompting when needed.
///
/// A configured name that fails to parse falls through to the prompt with
/// an explanation, rather than aborting startup.
///
/// # Errors
///
/// Returns an I/O error if the prompt cannot be written or input ends
/// before a valid name is entered.
pub fn resolve_identity(
    configured: Option<&str>,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> std::io::Result<Identity> {
    if let Some(name) = configured {
        match Identity::parse(name) {
            Ok(id) => return Ok(id),
            Err(e) => {
                tracing::warn!(name = %name, err = %e, "configured name rejected");
                writeln!(output, "Configured name {name:?} rejected: {e}")?;
            }
        }
    }

    loop {
        write!(output, "Enter your name: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "input ended before a name was entered",
            ));
        }

        match Identity::parse(&line) {
            Ok(id) => return Ok(id),
            Err(e) => writeln!(output, "That name won't work: {e}")?,
        }
    }
}
