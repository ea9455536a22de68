//! Artifactory item properties
//!
//! Artifactory stores every property as a list of values. Appending keeps the
//! existing values and adds new ones at the end.

use indexmap::IndexMap;

use crate::error::{CoreError, Result};

/// Property carrying the build name
pub const BUILD_NAME: &str = "build.name";
/// Property carrying the build number
pub const BUILD_NUMBER: &str = "build.number";

/// Multi-valued properties, in insertion order
pub type Properties = IndexMap<String, Vec<String>>;

/// Split `key=value` at the first `=`
pub fn parse_property(text: &str) -> Result<(String, String)> {
    match text.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(CoreError::InvalidProperty {
            property: text.to_string(),
        }),
    }
}

/// Parse every `key=value` argument
pub fn parse_properties<S: AsRef<str>>(items: &[S]) -> Result<Vec<(String, String)>> {
    items.iter().map(|s| parse_property(s.as_ref())).collect()
}

/// Append `additions` to `existing`, creating keys as needed
pub fn append_properties<'a, I>(existing: &mut Properties, additions: I)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    for (key, value) in additions {
        existing
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
    }
}

/// Properties linking an artifact to a build, plus any extra ones
pub fn tag_with_build(existing: &mut Properties, name: &str, number: &str, extra: &[(String, String)]) {
    append_properties(existing, [(BUILD_NAME, name), (BUILD_NUMBER, number)]);
    append_properties(existing, extra.iter().map(|(k, v)| (k.as_str(), v.as_str())));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_property() {
        assert_eq!(
            parse_property("build.name=my=build").unwrap(),
            ("build.name".to_string(), "my=build".to_string())
        );
        assert_eq!(
            parse_property("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
        assert!(parse_property("novalue").is_err());
        assert!(parse_property("=value").is_err());
    }

    #[test]
    fn test_append_keeps_existing_values() {
        let mut props = Properties::new();
        props.insert("build.name".to_string(), vec!["old".to_string()]);

        tag_with_build(
            &mut props,
            "new",
            "7",
            &[("team".to_string(), "core".to_string())],
        );

        assert_eq!(props["build.name"], ["old", "new"]);
        assert_eq!(props["build.number"], ["7"]);
        assert_eq!(props["team"], ["core"]);
    }
}
