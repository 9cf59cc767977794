//! Derives which FTP commands an account may issue.

use derive_more::Display;
use ftpgate_core::{
    account::Account,
    command::{CommandSet, CommandToken, Permission},
};
use std::fmt;

/// The outcome of checking a command against a session's policy.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The command may proceed.
    #[display("permitted")]
    Permitted,
    /// The command is not allowed for this account.
    #[display("denied")]
    Denied,
    /// The session has not logged in yet.
    #[display("not-logged-in")]
    NotLoggedIn,
}

/// Splits account permission lists into allow and deny sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionPolicy;

impl PermissionPolicy {
    /// The policy for `account`: bare tokens are allowed, `!` tokens denied.
    pub fn derive(account: &Account) -> CommandPolicy {
        CommandPolicy::from_permissions(&account.permissions)
    }
}

/// The allow and deny sets of one account. A command is permitted iff it is allowed and not
/// denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPolicy {
    allow: CommandSet,
    deny: CommandSet,
}

impl CommandPolicy {
    /// Partitions a permission list by its `!` prefix.
    pub fn from_permissions(permissions: &[Permission]) -> Self {
        let mut allow = CommandSet::empty();
        let mut deny = CommandSet::empty();
        for permission in permissions {
            match permission {
                Permission::Allow(token) => allow.add(*token),
                Permission::Deny(token) => deny.add(*token),
            }
        }
        CommandPolicy { allow, deny }
    }

    /// Whether `token` may be issued. Denial wins over allowance.
    pub fn permits(&self, token: CommandToken) -> bool {
        self.allow.has(token) && !self.deny.has(token)
    }

    /// [`Verdict::Permitted`] or [`Verdict::Denied`] for `token`.
    pub fn authorize(&self, token: CommandToken) -> Verdict {
        if self.permits(token) { Verdict::Permitted } else { Verdict::Denied }
    }

    /// The explicitly denied tokens, without their `!`.
    pub fn deny_list(&self) -> Vec<CommandToken> {
        self.deny.tokens()
    }

    /// The allowed tokens.
    pub fn allow_set(&self) -> CommandSet {
        self.allow
    }

    /// The denied tokens.
    pub fn deny_set(&self) -> CommandSet {
        self.deny
    }
}

impl fmt::Display for CommandPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |set: CommandSet| set.tokens().into_iter().map(CommandToken::as_str).collect::<Vec<_>>().join(",");
        write!(f, "allow=[{}] deny=[{}]", join(self.allow), join(self.deny))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(list: &[&str]) -> Vec<Permission> {
        list.iter().map(|p| p.parse().unwrap()).collect()
    }

    #[test]
    fn partitions_by_prefix() {
        let policy = CommandPolicy::from_permissions(&parse(&["STOR", "RETR", "!DELE"]));
        assert_eq!(policy.allow_set().tokens(), vec![CommandToken::Stor, CommandToken::Retr]);
        assert_eq!(policy.deny_list(), vec![CommandToken::Dele]);
    }

    #[test]
    fn deny_wins() {
        let policy = CommandPolicy::from_permissions(&parse(&["STOR", "!STOR"]));
        assert!(!policy.permits(CommandToken::Stor));
        assert_eq!(policy.authorize(CommandToken::Stor), Verdict::Denied);
    }

    #[test]
    fn unlisted_commands_are_not_permitted() {
        let policy = CommandPolicy::from_permissions(&parse(&["RETR"]));
        assert!(policy.permits(CommandToken::Retr));
        assert!(!policy.permits(CommandToken::Mkd));
    }

    #[test]
    fn every_token_lands_in_exactly_the_listed_set() {
        let permissions: Vec<Permission> = CommandToken::ALL
            .iter()
            .enumerate()
            .map(|(i, t)| if i % 3 == 0 { Permission::Deny(*t) } else { Permission::Allow(*t) })
            .collect();
        let policy = CommandPolicy::from_permissions(&permissions);
        for p in &permissions {
            assert_eq!(policy.deny_set().has(p.token()), p.is_denial());
            assert_eq!(policy.allow_set().has(p.token()), !p.is_denial());
            assert_eq!(policy.permits(p.token()), !p.is_denial());
        }
    }

    #[test]
    fn default_permissions_permit_everything() {
        let policy = CommandPolicy::from_permissions(&Permission::defaults());
        assert!(CommandToken::ALL.iter().all(|t| policy.permits(*t)));
        assert!(policy.deny_list().is_empty());
    }

    #[test]
    fn verdict_display() {
        assert_eq!(Verdict::NotLoggedIn.to_string(), "not-logged-in");
    }

    #[test]
    fn display() {
        let policy = CommandPolicy::from_permissions(&parse(&["RETR", "!DELE"]));
        assert_eq!(policy.to_string(), "allow=[RETR] deny=[DELE]");
    }
}
