//! The event loop (C5) and its immediate collaborators: CLI/config
//! resolution (C7), rendering (part of C5's output contract), and the
//! top-level error taxonomy (C9). The three core subsystems this crate
//! drives — codec, FSM, reliability engine — live in their own crates.

pub mod cli;
pub mod datagram_loop;
pub mod error;
pub mod render;
pub mod stream_loop;

pub use error::ClientError;
pub use cli::{Cli, Config, TransportKind};

use ipk24chat_wire::Content;

/// Builds a `Content` from arbitrary `Display` text (an error reason, a
/// violation description) for embedding in an outgoing ERR. Strips NUL/CR/LF
/// so the result always satisfies `Content`'s invariant — diagnostic text
/// never legitimately contains framing bytes, so this never loses anything
/// that matters.
pub(crate) fn safe_content(text: impl std::fmt::Display) -> Content {
    let sanitized: String = text
        .to_string()
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\0'))
        .collect();
    Content::try_from(sanitized).expect("a CR/LF/NUL-free string always satisfies Content")
}
