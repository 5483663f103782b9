use std::fmt;

use crate::error::ValidationError;

fn check_no_nul_crlf(s: &str) -> Result<(), ValidationError> {
    if s.is_empty() {
        return Err(ValidationError::Empty);
    }
    if s.contains('\0') {
        return Err(ValidationError::ContainsNul);
    }
    if s.contains('\r') || s.contains('\n') {
        return Err(ValidationError::ContainsCrOrLf);
    }
    Ok(())
}

/// Validates an identifier-shaped token: non-empty, no NUL/CR/LF, and no
/// internal whitespace at all (the wire grammar captures these fields as a
/// single `\S+` token).
fn check_identifier_token(s: &str) -> Result<(), ValidationError> {
    check_no_nul_crlf(s)?;
    if s.chars().any(|c| c.is_whitespace()) {
        return Err(ValidationError::ContainsWhitespace);
    }
    Ok(())
}

macro_rules! identifier_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                check_identifier_token(&value)?;
                Ok($name(value))
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValidationError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                $name::try_from(value.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

identifier_newtype!(DisplayName);
identifier_newtype!(Username);
identifier_newtype!(ChannelId);

/// A free-form field: no NUL byte, no embedded CR/LF, but internal spaces
/// are allowed. Used for `Secret` and `Content`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FreeText(String);

impl FreeText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FreeText {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.contains('\0') {
            return Err(ValidationError::ContainsNul);
        }
        if value.contains('\r') || value.contains('\n') {
            return Err(ValidationError::ContainsCrOrLf);
        }
        Ok(FreeText(value))
    }
}

impl TryFrom<&str> for FreeText {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        FreeText::try_from(value.to_string())
    }
}

impl fmt::Display for FreeText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type Secret = FreeText;
pub type Content = FreeText;

/// Mutable client identity, threaded through the codec and event loop by
/// reference. Owned exclusively by the event loop (Design Note: singleton
/// identity record is not global).
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub display_name: DisplayName,
    pub username: Option<Username>,
    pub secret: Option<Secret>,
    pub current_channel: Option<ChannelId>,
}

impl ClientIdentity {
    /// A fresh identity before the first `/auth`. `placeholder` is an
    /// implementation-chosen, non-empty display name shown until the user
    /// authenticates or renames.
    pub fn placeholder() -> Self {
        ClientIdentity {
            display_name: DisplayName::try_from("unknown")
                .expect("\"unknown\" satisfies the identifier-token invariants"),
            username: None,
            secret: None,
            current_channel: None,
        }
    }

    /// `/rename` mutates the display name locally; no wire traffic results.
    pub fn rename(&mut self, display_name: DisplayName) {
        self.display_name = display_name;
    }

    /// Records the credentials used by an AUTH the client is about to send.
    /// `username`/`secret` are set only here and never mutated afterward.
    pub fn authenticate(&mut self, username: Username, secret: Secret, display_name: DisplayName) {
        self.username = Some(username);
        self.secret = Some(secret);
        self.display_name = display_name;
    }

    pub fn join(&mut self, channel: ChannelId) {
        self.current_channel = Some(channel);
    }
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self::placeholder()
    }
}
