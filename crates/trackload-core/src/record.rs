use crate::{JobId, Session, synthetic::SyntheticData};
use chrono::NaiveDateTime;
use core::fmt;
use uuid::Uuid;

/// Format used when binding `created` into SQL.
pub const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kind of user action carried by a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionType {
    Play,
    Pause,
    Seek,
    Heartbeat,
}

impl ActionType {
    pub const ALL: [ActionType; 4] = [
        ActionType::Play,
        ActionType::Pause,
        ActionType::Seek,
        ActionType::Heartbeat,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ActionType::Play => "PLAY",
            ActionType::Pause => "PAUSE",
            ActionType::Seek => "SEEK",
            ActionType::Heartbeat => "HEARTBEAT",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row for the user action table.
///
/// Built fresh for every job from the job id, the worker's [`Session`] and
/// newly drawn synthetic values. Never reused.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionRecord {
    pub id: JobId,
    pub inpoint: i32,
    pub outpoint: i32,
    pub mediapackage: Uuid,
    pub session_id: String,
    pub created: NaiveDateTime,
    pub length: i32,
    pub action_type: ActionType,
    pub playing: bool,
}

impl ActionRecord {
    pub fn synthesize(id: JobId, session: &Session, data: &mut SyntheticData) -> Self {
        Self {
            id,
            inpoint: data.small_int(),
            outpoint: data.small_int(),
            mediapackage: data.uuid4(),
            session_id: session.session_id.clone(),
            created: data.date_time(),
            length: 0,
            action_type: data.pick(&ActionType::ALL),
            playing: true,
        }
    }

    pub fn created_text(&self) -> String {
        self.created.format(CREATED_FORMAT).to_string()
    }
}
