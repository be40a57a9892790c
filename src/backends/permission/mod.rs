// SPDX-License-Identifier: GPL-3.0-only

//! Runtime permission adapters
//!
//! - [`PolicyPermissions`]: fixed or scripted answers (`--permission grant|deny`, tests)
//! - [`PromptPermissions`]: asks on the terminal (CLI subcommands)
//! - [`ChannelPermissions`]: forwards prompts to the terminal UI loop

mod channel;
mod policy;
mod prompt;

pub use channel::{ChannelPermissions, PromptAnswer, PromptReceiver, PromptRequest};
pub use policy::{PermissionProbe, PolicyPermissions};
pub use prompt::{PromptPermissions, prompt_text};

use super::{Capability, PermissionStatus};
use std::collections::HashMap;

/// Statuses remembered from earlier answers
///
/// Desktop Linux has no system-wide permission store for cameras, so the
/// adapters remember answers for the lifetime of the process, the same way
/// a mobile platform remembers them across screen mounts.
#[derive(Debug, Default, Clone)]
pub(crate) struct Remembered {
    statuses: HashMap<Capability, PermissionStatus>,
}

impl Remembered {
    pub fn get(&self, capability: Capability) -> PermissionStatus {
        self.statuses.get(&capability).copied().unwrap_or_default()
    }

    pub fn set(&mut self, capability: Capability, status: PermissionStatus) {
        self.statuses.insert(capability, status);
    }
}

/// Answer typed at a prompt
///
/// Accepts Portuguese and English forms. Anything unrecognized postpones
/// the decision.
pub(crate) fn parse_answer(line: &str) -> PermissionStatus {
    match line.trim().to_lowercase().as_str() {
        "s" | "sim" | "y" | "yes" | "ok" | "p" => PermissionStatus::Granted,
        "n" | "nao" | "não" | "no" | "c" | "cancelar" | "cancel" => PermissionStatus::Denied,
        _ => PermissionStatus::Undetermined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("s\n"), PermissionStatus::Granted);
        assert_eq!(parse_answer("Yes"), PermissionStatus::Granted);
        assert_eq!(parse_answer("NÃO"), PermissionStatus::Denied);
        assert_eq!(parse_answer(""), PermissionStatus::Undetermined);
        assert_eq!(parse_answer("depois"), PermissionStatus::Undetermined);
    }

    #[test]
    fn test_remembered_defaults_to_undetermined() {
        let mut remembered = Remembered::default();
        assert_eq!(remembered.get(Capability::Camera), PermissionStatus::Undetermined);
        remembered.set(Capability::Camera, PermissionStatus::Granted);
        assert_eq!(remembered.get(Capability::Camera), PermissionStatus::Granted);
        assert_eq!(
            remembered.get(Capability::FineLocation),
            PermissionStatus::Undetermined
        );
    }
}
