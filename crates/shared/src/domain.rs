use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(UserId);
id_newtype!(EventId);
id_newtype!(EventTypeId);

/// Length bounds are inclusive on both ends and counted in characters.
pub const EVENT_NAME_MIN: usize = 5;
pub const EVENT_NAME_MAX: usize = 20;

pub const EVENT_DESCRIPTION_MIN: usize = 15;
pub const EVENT_DESCRIPTION_MAX: usize = 150;

pub const TYPE_NAME_MIN: usize = 5;
pub const TYPE_NAME_MAX: usize = 15;
