//! User identity resolution for CLI commands.
//!
//! The resolution chain: `--user` flag > `KANBAN_USER` env > `user` in the
//! user config > `USER` env (TTY only). Creating tickets requires an
//! identity, since it becomes the reporter; other commands fall back to
//! [`ANONYMOUS`].

use std::env;

/// Identity used when nothing else resolves.
pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct UserResolutionError {
    pub message: String,
    /// Machine error code.
    pub code: &'static str,
}

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_user_with(
    cli_flag: Option<&str>,
    configured: Option<&str>,
    env: &dyn EnvReader,
) -> Option<String> {
    if let Some(user) = cli_flag.filter(|u| !u.is_empty()) {
        return Some(user.to_string());
    }
    if let Some(val) = env.get("KANBAN_USER") {
        return Some(val);
    }
    if let Some(user) = configured.filter(|u| !u.is_empty()) {
        return Some(user.to_string());
    }
    if env.is_tty() {
        return env.get("USER");
    }
    None
}

/// Resolve the user identity, `None` if no source provides one.
pub fn resolve_user(cli_flag: Option<&str>, configured: Option<&str>) -> Option<String> {
    resolve_user_with(cli_flag, configured, &RealEnv)
}

/// Resolve the user identity for commands that record it.
pub fn require_user(
    cli_flag: Option<&str>,
    configured: Option<&str>,
) -> Result<String, UserResolutionError> {
    resolve_user(cli_flag, configured).ok_or_else(|| UserResolutionError {
        message: "User identity required for this command. \
                  Set --user, KANBAN_USER, or `user` in the user config."
            .to_string(),
        code: "missing_user",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockEnv {
        vars: HashMap<String, String>,
        tty: bool,
    }

    impl MockEnv {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
                tty: false,
            }
        }

        fn var(mut self, key: &str, val: &str) -> Self {
            self.vars.insert(key.to_string(), val.to_string());
            self
        }

        const fn tty(mut self) -> Self {
            self.tty = true;
            self
        }
    }

    impl EnvReader for MockEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).filter(|v| !v.is_empty()).cloned()
        }

        fn is_tty(&self) -> bool {
            self.tty
        }
    }

    #[test]
    fn cli_flag_takes_priority() {
        let env = MockEnv::new().var("KANBAN_USER", "env-user").tty();
        assert_eq!(
            resolve_user_with(Some("flag-user"), Some("config-user"), &env).as_deref(),
            Some("flag-user")
        );
    }

    #[test]
    fn env_beats_config() {
        let env = MockEnv::new().var("KANBAN_USER", "env-user");
        assert_eq!(
            resolve_user_with(None, Some("config-user"), &env).as_deref(),
            Some("env-user")
        );
    }

    #[test]
    fn config_beats_login_name() {
        let env = MockEnv::new().var("USER", "login").tty();
        assert_eq!(
            resolve_user_with(None, Some("config-user"), &env).as_deref(),
            Some("config-user")
        );
    }

    #[test]
    fn empty_values_are_skipped() {
        let env = MockEnv::new().var("KANBAN_USER", "");
        assert_eq!(
            resolve_user_with(Some(""), Some("config-user"), &env).as_deref(),
            Some("config-user")
        );
    }

    #[test]
    fn login_name_only_in_tty() {
        let env = MockEnv::new().var("USER", "bob");
        assert_eq!(resolve_user_with(None, None, &env), None);

        let env = MockEnv::new().var("USER", "bob").tty();
        assert_eq!(resolve_user_with(None, None, &env).as_deref(), Some("bob"));
    }

    #[test]
    fn require_user_succeeds_with_flag() {
        assert_eq!(require_user(Some("carol"), None).as_deref(), Ok("carol"));
    }
}
