//! Snowflake identifier newtypes.
//!
//! Discord ids are unsigned 64-bit integers. PostgreSQL has no unsigned
//! type, so they are stored as `BIGINT` by reinterpreting the bits.

use serde::{Deserialize, Serialize};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
            derive_more::Display,
            derive_more::From,
        )]
        #[serde(transparent)]
        #[display("{}", _0)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw snowflake value.
            pub fn get(self) -> u64 {
                self.0
            }

            /// Bit-preserving conversion for `BIGINT` columns.
            pub fn to_db(self) -> i64 {
                self.0 as i64
            }

            /// Inverse of [`Self::to_db`].
            pub fn from_db(value: i64) -> Self {
                Self(value as u64)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u64>().map(Self)
            }
        }
    };
}

snowflake!(
    /// A guild (server).
    GuildId
);
snowflake!(
    /// A user, whether or not they are a member of any guild.
    UserId
);
snowflake!(
    /// A role within a guild.
    RoleId
);
snowflake!(
    /// A text channel.
    ChannelId
);
snowflake!(
    /// A message within a channel.
    MessageId
);

impl UserId {
    /// Mention syntax understood by the client.
    pub fn mention(self) -> String {
        format!("<@{}>", self.0)
    }
}

impl RoleId {
    /// Mention syntax understood by the client.
    pub fn mention(self) -> String {
        format!("<@&{}>", self.0)
    }
}

impl ChannelId {
    /// Mention syntax understood by the client.
    pub fn mention(self) -> String {
        format!("<#{}>", self.0)
    }
}
