use bitflags::bitflags;
use serde::de::{Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Problems detected with a loadable manifest.
    ///
    /// Serialized in system reports as an array of nicknames, e.g.
    /// `["cannot-load", "duplicated"]`. An empty array means no issues.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Issues: u32 {
        /// An issue this version does not recognise, or an unexpected internal condition.
        const UNKNOWN = 1 << 0;
        /// The manifest is missing, unreadable, not JSON, or lacks a required field.
        const CANNOT_LOAD = 1 << 1;
        /// Another manifest points at the same library.
        const DUPLICATED = 1 << 2;
        /// The manifest's file_format_version is outside the accepted range.
        const UNSUPPORTED = 1 << 3;
    }
}

const NICKNAMES: &[(Issues, &str)] = &[
    (Issues::UNKNOWN, "unknown"),
    (Issues::CANNOT_LOAD, "cannot-load"),
    (Issues::DUPLICATED, "duplicated"),
    (Issues::UNSUPPORTED, "unsupported"),
];

impl Issues {
    /// Nicknames of the set flags, in bit order.
    pub fn nicknames(self) -> Vec<&'static str> {
        NICKNAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, nick)| *nick)
            .collect()
    }

    /// Parse a single nickname. `"none"` maps to the empty set; anything
    /// unrecognised maps to [`Issues::UNKNOWN`].
    pub fn from_nickname(nick: &str) -> Self {
        if nick == "none" {
            return Self::empty();
        }
        NICKNAMES
            .iter()
            .find(|(_, n)| *n == nick)
            .map_or(Self::UNKNOWN, |(flag, _)| *flag)
    }
}

impl fmt::Display for Issues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        f.write_str(&self.nicknames().join(", "))
    }
}

impl Serialize for Issues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let nicks = self.nicknames();
        let mut seq = serializer.serialize_seq(Some(nicks.len()))?;
        for nick in nicks {
            seq.serialize_element(nick)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Issues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IssuesVisitor;

        impl<'de> Visitor<'de> for IssuesVisitor {
            type Value = Issues;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an array of issue nicknames")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Issues, A::Error> {
                let mut issues = Issues::empty();
                while let Some(value) = seq.next_element::<serde_json::Value>()? {
                    issues |= match value.as_str() {
                        Some(nick) => Issues::from_nickname(nick),
                        None => Issues::UNKNOWN,
                    };
                }
                Ok(issues)
            }
        }

        deserializer.deserialize_seq(IssuesVisitor)
    }
}
