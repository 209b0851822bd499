use crate::synthetic::SyntheticData;
use std::net::Ipv4Addr;

/// Length of a generated session token.
pub const SESSION_ID_LEN: usize = 25;

/// User id recorded for every synthetic session.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Synthetic identity owned by one worker for its whole lifetime.
///
/// Created once at worker startup, written once to the backend, and then
/// attached to every record that worker produces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub user_ip: Ipv4Addr,
    pub user_agent: String,
    pub user_id: &'static str,
}

impl Session {
    pub fn generate(data: &mut SyntheticData) -> Self {
        Self {
            session_id: data.letters(SESSION_ID_LEN),
            user_ip: data.ipv4(),
            user_agent: data.user_agent(),
            user_id: ANONYMOUS_USER,
        }
    }
}
