//! The five rendered output line shapes from §6, each written to stdout
//! followed by a newline. Distinct from the `tracing` diagnostic stream
//! (stderr) — piping stdout yields exactly the wire-level transcript the
//! spec promises, logging or not.

use ipk24chat_wire::{Content, DisplayName};

pub fn incoming_message(display_name: &DisplayName, content: &Content) {
    println!("{display_name}: {content}");
}

pub fn reply(ok: bool, content: &Content) {
    if ok {
        println!("Action Success: {content}");
    } else {
        println!("Action Failure: {content}");
    }
}

pub fn incoming_error(display_name: &DisplayName, content: &Content) {
    println!("ERROR FROM {display_name}: {content}");
}

pub fn user_error(message: &str) {
    println!("ERROR: {message}");
}

/// `/help`: out of scope per §1 ("structured help-text rendering" is an
/// external collaborator), so this is a minimal command summary rather
/// than the real client's help renderer.
pub fn help() {
    println!("Available commands:");
    println!("  /auth <username> <secret> <displayName>   authenticate");
    println!("  /join <channelId>                         join a channel");
    println!("  /rename <displayName>                     change your local display name");
    println!("  /help                                     show this message");
    println!("  <anything else>                           send a chat message");
}
