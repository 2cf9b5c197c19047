//! Utilities for serde

/// A reply payload that may be the empty sentinel.
///
/// A missing field, `null` and `""` all decode to `None`, anything else is decoded as `T`.
pub mod empty_as_none {
    use serde::de::DeserializeOwned;
    use serde::Deserialize;
    use serde_json::Value;

    /// Deserialize an optional payload, mapping the empty sentinel to `None`
    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Reply {
        #[serde(default, deserialize_with = "super::empty_as_none::deserialize")]
        payload: Option<String>,
    }

    #[test]
    fn empty_string_is_the_sentinel() {
        let reply: Reply = serde_json::from_str(r#"{"payload":""}"#).unwrap();
        assert_eq!(reply.payload, None);

        let reply: Reply = serde_json::from_str(r#"{"payload":null}"#).unwrap();
        assert_eq!(reply.payload, None);

        let reply: Reply = serde_json::from_str("{}").unwrap();
        assert_eq!(reply.payload, None);

        let reply: Reply = serde_json::from_str(r#"{"payload":"0xbeef"}"#).unwrap();
        assert_eq!(reply.payload.as_deref(), Some("0xbeef"));
    }
}
