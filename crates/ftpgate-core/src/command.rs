//! The fixed vocabulary of FTP commands that account permissions and command interception are
//! expressed in.

use bitflags::bitflags;
use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// An FTP command that can be granted or denied to an account.
///
/// The set is closed: permission lists may only name these tokens, optionally negated with a
/// `!` prefix (see [`Permission`]).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CommandToken {
    /// Store a file
    #[display("STOR")]
    Stor,
    /// Retrieve a file
    #[display("RETR")]
    Retr,
    /// Rename from
    #[display("RNFR")]
    Rnfr,
    /// Rename to
    #[display("RNTO")]
    Rnto,
    /// Delete a file
    #[display("DELE")]
    Dele,
    /// Make a directory
    #[display("MKD")]
    Mkd,
    /// Remove a directory
    #[display("RMD")]
    Rmd,
    /// Change the working directory
    #[display("CWD")]
    Cwd,
    /// Print the working directory
    #[display("PWD")]
    Pwd,
    /// List a directory
    #[display("LIST")]
    List,
    /// List names only
    #[display("NLST")]
    Nlst,
    /// Append to a file
    #[display("APPE")]
    Appe,
    /// Size of a file
    #[display("SIZE")]
    Size,
    /// Status
    #[display("STAT")]
    Stat,
    /// Restart a transfer at an offset
    #[display("REST")]
    Rest,
    /// Abort a transfer
    #[display("ABOR")]
    Abor,
    /// Log out
    #[display("QUIT")]
    Quit,
    /// System type
    #[display("SYST")]
    Syst,
    /// Representation type
    #[display("TYPE")]
    Type,
    /// Active mode data port
    #[display("PORT")]
    Port,
    /// Passive mode
    #[display("PASV")]
    Pasv,
    /// Feature list
    #[display("FEAT")]
    Feat,
    /// Options
    #[display("OPTS")]
    Opts,
    /// No operation
    #[display("NOOP")]
    Noop,
    /// Allocate storage
    #[display("ALLO")]
    Allo,
    /// User name
    #[display("USER")]
    User,
    /// Password
    #[display("PASS")]
    Pass,
    /// Account information
    #[display("ACCT")]
    Acct,
}

impl CommandToken {
    /// Every token in the vocabulary, in declaration order.
    pub const ALL: [CommandToken; 28] = [
        CommandToken::Stor,
        CommandToken::Retr,
        CommandToken::Rnfr,
        CommandToken::Rnto,
        CommandToken::Dele,
        CommandToken::Mkd,
        CommandToken::Rmd,
        CommandToken::Cwd,
        CommandToken::Pwd,
        CommandToken::List,
        CommandToken::Nlst,
        CommandToken::Appe,
        CommandToken::Size,
        CommandToken::Stat,
        CommandToken::Rest,
        CommandToken::Abor,
        CommandToken::Quit,
        CommandToken::Syst,
        CommandToken::Type,
        CommandToken::Port,
        CommandToken::Pasv,
        CommandToken::Feat,
        CommandToken::Opts,
        CommandToken::Noop,
        CommandToken::Allo,
        CommandToken::User,
        CommandToken::Pass,
        CommandToken::Acct,
    ];

    /// The wire name of the command, e.g. `"STOR"`.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandToken::Stor => "STOR",
            CommandToken::Retr => "RETR",
            CommandToken::Rnfr => "RNFR",
            CommandToken::Rnto => "RNTO",
            CommandToken::Dele => "DELE",
            CommandToken::Mkd => "MKD",
            CommandToken::Rmd => "RMD",
            CommandToken::Cwd => "CWD",
            CommandToken::Pwd => "PWD",
            CommandToken::List => "LIST",
            CommandToken::Nlst => "NLST",
            CommandToken::Appe => "APPE",
            CommandToken::Size => "SIZE",
            CommandToken::Stat => "STAT",
            CommandToken::Rest => "REST",
            CommandToken::Abor => "ABOR",
            CommandToken::Quit => "QUIT",
            CommandToken::Syst => "SYST",
            CommandToken::Type => "TYPE",
            CommandToken::Port => "PORT",
            CommandToken::Pasv => "PASV",
            CommandToken::Feat => "FEAT",
            CommandToken::Opts => "OPTS",
            CommandToken::Noop => "NOOP",
            CommandToken::Allo => "ALLO",
            CommandToken::User => "USER",
            CommandToken::Pass => "PASS",
            CommandToken::Acct => "ACCT",
        }
    }

    /// The single-bit [`CommandSet`] holding only this token.
    pub fn as_set(self) -> CommandSet {
        CommandSet::from_bits_retain(1 << (self as u32))
    }
}

/// Returned when a string does not name a token of the vocabulary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown command token '{0}'")]
pub struct UnknownCommand(pub String);

impl FromStr for CommandToken {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandToken::ALL
            .iter()
            .copied()
            .find(|token| token.as_str() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

impl Serialize for CommandToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CommandToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

bitflags! {
    /// A set of [`CommandToken`]s, one bit per token.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CommandSet: u32 {
        /// All 28 tokens of the vocabulary.
        const ALL = (1 << 28) - 1;
    }
}

impl CommandSet {
    /// Whether `token` is a member of this set.
    pub fn has(&self, token: CommandToken) -> bool {
        self.contains(token.as_set())
    }

    /// Adds `token` to the set.
    pub fn add(&mut self, token: CommandToken) {
        self.insert(token.as_set());
    }

    /// The members of the set in vocabulary order.
    pub fn tokens(&self) -> Vec<CommandToken> {
        CommandToken::ALL.iter().copied().filter(|t| self.has(*t)).collect()
    }
}

impl FromIterator<CommandToken> for CommandSet {
    fn from_iter<I: IntoIterator<Item = CommandToken>>(iter: I) -> Self {
        let mut set = CommandSet::empty();
        for token in iter {
            set.add(token);
        }
        set
    }
}

/// One entry of an account's permission list: either a bare token (`STOR`, allowed) or a negated
/// token (`!STOR`, explicitly denied).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// The command is allowed
    Allow(CommandToken),
    /// The command is explicitly denied
    Deny(CommandToken),
}

impl Permission {
    /// The command this entry is about, regardless of its polarity.
    pub fn token(&self) -> CommandToken {
        match self {
            Permission::Allow(t) | Permission::Deny(t) => *t,
        }
    }

    /// True for `!TOKEN` entries.
    pub fn is_denial(&self) -> bool {
        matches!(self, Permission::Deny(_))
    }

    /// The permission list new accounts get: every token, unnegated.
    pub fn defaults() -> Vec<Permission> {
        CommandToken::ALL.iter().copied().map(Permission::Allow).collect()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Allow(t) => write!(f, "{t}"),
            Permission::Deny(t) => write!(f, "!{t}"),
        }
    }
}

impl FromStr for Permission {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix('!') {
            Some(bare) => bare.parse().map(Permission::Deny).map_err(|_| UnknownCommand(s.to_string())),
            None => s.parse().map(Permission::Allow),
        }
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_token_parses_back_from_its_name() {
        for token in CommandToken::ALL {
            assert_eq!(token.to_string().parse::<CommandToken>(), Ok(token));
        }
    }

    #[test]
    fn tokens_are_case_sensitive() {
        assert_eq!("stor".parse::<CommandToken>(), Err(UnknownCommand("stor".to_string())));
    }

    #[test]
    fn all_set_covers_vocabulary() {
        let set: CommandSet = CommandToken::ALL.into_iter().collect();
        assert_eq!(set, CommandSet::ALL);
        assert_eq!(set.tokens().len(), 28);
    }

    #[test]
    fn negated_permission_parses() {
        assert_eq!("!DELE".parse::<Permission>(), Ok(Permission::Deny(CommandToken::Dele)));
        assert_eq!("DELE".parse::<Permission>(), Ok(Permission::Allow(CommandToken::Dele)));
        assert_eq!(Permission::Deny(CommandToken::Mkd).to_string(), "!MKD");
    }

    #[test]
    fn unknown_permission_rejected() {
        assert!("!SITE".parse::<Permission>().is_err());
        assert!("!!STOR".parse::<Permission>().is_err());
        assert!("".parse::<Permission>().is_err());
    }

    #[test]
    fn permissions_serialize_as_strings() {
        let perms = vec![Permission::Allow(CommandToken::Stor), Permission::Deny(CommandToken::Dele)];
        let json = serde_json::to_string(&perms).unwrap();
        assert_eq!(json, r#"["STOR","!DELE"]"#);
        let back: Vec<Permission> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, perms);
    }

    #[test]
    fn defaults_hold_no_denials() {
        let defaults = Permission::defaults();
        assert_eq!(defaults.len(), CommandToken::ALL.len());
        assert!(defaults.iter().all(|p| !p.is_denial()));
    }
}
