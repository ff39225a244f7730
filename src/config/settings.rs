use std::env;

use crate::constants::defaults::{DEFAULT_COMMAND_PREFIX, DEFAULT_STRICT_GMUTE};

/// Users allowed to run the global mute commands
#[derive(Debug, Clone, Default)]
pub struct Operators {
    pub owner_id: Option<u64>,
    pub sudo_users: Vec<u64>,
    pub support_users: Vec<u64>,
}

impl Operators {
    pub fn new(owner_id: Option<u64>, sudo_users: Vec<u64>, support_users: Vec<u64>) -> Self {
        let mut sudo_users = sudo_users;
        // The owner always counts as a sudo user
        if let Some(owner) = owner_id {
            if !sudo_users.contains(&owner) {
                sudo_users.insert(0, owner);
            }
        }

        Self {
            owner_id,
            sudo_users,
            support_users,
        }
    }

    pub fn is_sudo(&self, user_id: u64) -> bool {
        self.sudo_users.contains(&user_id)
    }

    pub fn is_support(&self, user_id: u64) -> bool {
        self.support_users.contains(&user_id)
    }

    pub fn is_operator(&self, user_id: u64) -> bool {
        self.is_sudo(user_id) || self.is_support(user_id)
    }

    /// Everyone who receives gmute progress notices, sudo users first
    pub fn broadcast_list(&self) -> Vec<u64> {
        let mut list = self.sudo_users.clone();
        for id in &self.support_users {
            if !list.contains(id) {
                list.push(*id);
            }
        }
        list
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub discord_token: String,
    pub database_url: String,
    pub guild_id: Option<u64>,
    pub operators: Operators,
    /// Mute globally muted users on sight in enforcing guilds
    pub strict_gmute: bool,
    pub command_prefix: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, String> {
        let discord_token = env::var("DISCORD_TOKEN")
            .map_err(|_| "DISCORD_TOKEN environment variable not set")?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable not set")?;

        let guild_id = env::var("GUILD_ID")
            .ok()
            .and_then(|s| s.parse::<u64>().ok());

        let owner_id = match env::var("OWNER_ID") {
            Ok(s) if !s.trim().is_empty() => match s.trim().parse::<u64>() {
                Ok(id) if id != 0 => Some(id),
                _ => return Err(format!("OWNER_ID is not a valid user id: {}", s)),
            },
            _ => None,
        };

        let sudo_users = parse_id_list(&env::var("SUDO_USERS").unwrap_or_default())
            .map_err(|e| format!("SUDO_USERS: {}", e))?;

        let support_users = parse_id_list(&env::var("SUPPORT_USERS").unwrap_or_default())
            .map_err(|e| format!("SUPPORT_USERS: {}", e))?;

        let strict_gmute = env::var("STRICT_GMUTE")
            .ok()
            .and_then(|s| parse_bool(&s))
            .unwrap_or(DEFAULT_STRICT_GMUTE);

        let command_prefix = env::var("COMMAND_PREFIX")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_COMMAND_PREFIX.to_string());

        Ok(Self {
            discord_token,
            database_url,
            guild_id,
            operators: Operators::new(owner_id, sudo_users, support_users),
            strict_gmute,
            command_prefix,
        })
    }
}

/// Parse a comma or whitespace separated list of user ids
pub fn parse_id_list(raw: &str) -> Result<Vec<u64>, String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<u64>() {
            Ok(id) if id != 0 => Ok(id),
            _ => Err(format!("'{}' is not a valid user id", s)),
        })
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("").unwrap(), Vec::<u64>::new());
        assert_eq!(parse_id_list("1, 2,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_id_list("4 5").unwrap(), vec![4, 5]);
        assert!(parse_id_list("1,abc").is_err());
        assert!(parse_id_list("0").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_owner_is_sudo() {
        let ops = Operators::new(Some(9), vec![1], vec![2, 1]);
        assert!(ops.is_sudo(9));
        assert!(ops.is_operator(2));
        assert!(!ops.is_operator(3));
        assert_eq!(ops.broadcast_list(), vec![9, 1, 2]);
    }
}
