//! Store commands and replies.

/// A single request sent to the store.
///
/// The set mirrors the small command surface the object mapper needs: hashes
/// for records and unique indexes, sets for membership and secondary indexes,
/// lists for ordered sub-entity membership, and a counter for id minting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read every field of a hash.
    HGetAll {
        /// Hash key.
        key: String,
    },
    /// Read one field of a hash.
    HGet {
        /// Hash key.
        key: String,
        /// Field name.
        field: String,
    },
    /// Set fields of a hash.
    HSet {
        /// Hash key.
        key: String,
        /// Field/value pairs.
        pairs: Vec<(String, String)>,
    },
    /// Delete fields of a hash.
    HDel {
        /// Hash key.
        key: String,
        /// Fields to delete.
        fields: Vec<String>,
    },
    /// Delete whole keys.
    Del {
        /// Keys to delete.
        keys: Vec<String>,
    },
    /// Add members to a set.
    SAdd {
        /// Set key.
        key: String,
        /// Members to add.
        members: Vec<String>,
    },
    /// Remove members from a set.
    SRem {
        /// Set key.
        key: String,
        /// Members to remove.
        members: Vec<String>,
    },
    /// Test set membership.
    SIsMember {
        /// Set key.
        key: String,
        /// Candidate member.
        member: String,
    },
    /// Read all members of a set.
    SMembers {
        /// Set key.
        key: String,
    },
    /// Count members of a set.
    SCard {
        /// Set key.
        key: String,
    },
    /// Atomically increment an integer counter.
    Incr {
        /// Counter key.
        key: String,
    },
    /// Append values to a list.
    RPush {
        /// List key.
        key: String,
        /// Values to append.
        values: Vec<String>,
    },
    /// Remove occurrences of a value from a list.
    LRem {
        /// List key.
        key: String,
        /// `0` removes all, positive from head, negative from tail.
        count: i64,
        /// Value to remove.
        value: String,
    },
    /// Read a range of a list; negative indexes count from the end.
    LRange {
        /// List key.
        key: String,
        /// First index.
        start: i64,
        /// Last index, inclusive.
        stop: i64,
    },
}

impl Command {
    /// `HGETALL key`
    pub fn hgetall(key: impl Into<String>) -> Self {
        Self::HGetAll { key: key.into() }
    }

    /// `HGET key field`
    pub fn hget(key: impl Into<String>, field: impl Into<String>) -> Self {
        Self::HGet {
            key: key.into(),
            field: field.into(),
        }
    }

    /// `HSET key field value [field value ...]`
    pub fn hset(key: impl Into<String>, pairs: Vec<(String, String)>) -> Self {
        Self::HSet {
            key: key.into(),
            pairs,
        }
    }

    /// `HDEL key field [field ...]`
    pub fn hdel(key: impl Into<String>, fields: Vec<String>) -> Self {
        Self::HDel {
            key: key.into(),
            fields,
        }
    }

    /// `DEL key [key ...]`
    pub fn del(keys: Vec<String>) -> Self {
        Self::Del { keys }
    }

    /// `SADD key member`
    pub fn sadd(key: impl Into<String>, member: impl Into<String>) -> Self {
        Self::SAdd {
            key: key.into(),
            members: vec![member.into()],
        }
    }

    /// `SREM key member`
    pub fn srem(key: impl Into<String>, member: impl Into<String>) -> Self {
        Self::SRem {
            key: key.into(),
            members: vec![member.into()],
        }
    }

    /// `SISMEMBER key member`
    pub fn sismember(key: impl Into<String>, member: impl Into<String>) -> Self {
        Self::SIsMember {
            key: key.into(),
            member: member.into(),
        }
    }

    /// `SMEMBERS key`
    pub fn smembers(key: impl Into<String>) -> Self {
        Self::SMembers { key: key.into() }
    }

    /// `SCARD key`
    pub fn scard(key: impl Into<String>) -> Self {
        Self::SCard { key: key.into() }
    }

    /// `INCR key`
    pub fn incr(key: impl Into<String>) -> Self {
        Self::Incr { key: key.into() }
    }

    /// `RPUSH key value`
    pub fn rpush(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::RPush {
            key: key.into(),
            values: vec![value.into()],
        }
    }

    /// `LREM key count value`
    pub fn lrem(key: impl Into<String>, count: i64, value: impl Into<String>) -> Self {
        Self::LRem {
            key: key.into(),
            count,
            value: value.into(),
        }
    }

    /// `LRANGE key start stop`
    pub fn lrange(key: impl Into<String>, start: i64, stop: i64) -> Self {
        Self::LRange {
            key: key.into(),
            start,
            stop,
        }
    }

    /// Command name as the store spells it, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::HGetAll { .. } => "HGETALL",
            Self::HGet { .. } => "HGET",
            Self::HSet { .. } => "HSET",
            Self::HDel { .. } => "HDEL",
            Self::Del { .. } => "DEL",
            Self::SAdd { .. } => "SADD",
            Self::SRem { .. } => "SREM",
            Self::SIsMember { .. } => "SISMEMBER",
            Self::SMembers { .. } => "SMEMBERS",
            Self::SCard { .. } => "SCARD",
            Self::Incr { .. } => "INCR",
            Self::RPush { .. } => "RPUSH",
            Self::LRem { .. } => "LREM",
            Self::LRange { .. } => "LRANGE",
        }
    }

    /// Whether the command leaves the keyspace untouched.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::HGetAll { .. }
                | Self::HGet { .. }
                | Self::SIsMember { .. }
                | Self::SMembers { .. }
                | Self::SCard { .. }
                | Self::LRange { .. }
        )
    }

    /// Keys the command writes to.
    pub fn written_keys(&self) -> Vec<&str> {
        match self {
            Self::Del { keys } => keys.iter().map(String::as_str).collect(),
            Self::HSet { key, .. }
            | Self::HDel { key, .. }
            | Self::SAdd { key, .. }
            | Self::SRem { key, .. }
            | Self::Incr { key }
            | Self::RPush { key, .. }
            | Self::LRem { key, .. } => vec![key.as_str()],
            _ => Vec::new(),
        }
    }
}

/// A store reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Absent value.
    Nil,
    /// Status line such as `OK`.
    Status(String),
    /// Integer result.
    Integer(i64),
    /// String value.
    Bulk(String),
    /// Multiple values.
    Array(Vec<Reply>),
}

impl Reply {
    /// Integer payload, if any.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// String payload of a bulk or status reply; `None` for nil.
    pub fn into_string(self) -> Option<String> {
        match self {
            Reply::Bulk(s) | Reply::Status(s) => Some(s),
            Reply::Integer(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Elements of an array reply as strings. Non-string elements are dropped;
    /// a nil reply is an empty list.
    pub fn into_strings(self) -> Vec<String> {
        match self {
            Reply::Array(items) => items.into_iter().filter_map(Reply::into_string).collect(),
            _ => Vec::new(),
        }
    }

    /// Build an array reply of bulk strings.
    pub fn bulk_array<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Reply::Array(items.into_iter().map(|s| Reply::Bulk(s.into())).collect())
    }

    /// Short name of the reply kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Nil => "nil",
            Reply::Status(_) => "status",
            Reply::Integer(_) => "integer",
            Reply::Bulk(_) => "bulk",
            Reply::Array(_) => "array",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_classification() {
        assert!(Command::hgetall("user:1").is_read_only());
        assert!(Command::lrange("user:1:posts", 0, -1).is_read_only());
        assert!(!Command::incr("user:id").is_read_only());
        assert!(!Command::del(vec!["a".into()]).is_read_only());
    }

    #[test]
    fn written_keys() {
        assert_eq!(Command::sadd("user:all", "1").written_keys(), vec!["user:all"]);
        assert_eq!(
            Command::del(vec!["a".into(), "b".into()]).written_keys(),
            vec!["a", "b"]
        );
        assert!(Command::hget("k", "f").written_keys().is_empty());
    }

    #[test]
    fn reply_conversions() {
        assert_eq!(Reply::Bulk("7".into()).into_string().as_deref(), Some("7"));
        assert_eq!(Reply::Integer(7).into_string().as_deref(), Some("7"));
        assert_eq!(Reply::Nil.into_string(), None);
        assert_eq!(
            Reply::bulk_array(["a", "b"]).into_strings(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(Reply::Nil.into_strings().is_empty());
    }
}
