// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Canonical, parameter-erased form of a step text.

use derive_more::with_trait::Display;
use lazy_regex::regex;

/// Token every parameter placeholder is normalized to.
pub const PARAMETER_TOKEN: &str = "{}";

/// Parameter-erased form of a step text, used as a [`Registry`] key.
///
/// Two step texts having the same [`StepValue`] are the same logical step:
/// `Say <greeting> to <name>` and `Say "hello" to "world"` both become
/// `Say {} to {}`.
///
/// [`Registry`]: super::Registry
#[derive(Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("{value}")]
pub struct StepValue {
    /// Step text with every placeholder replaced by [`PARAMETER_TOKEN`].
    value: String,

    /// Step text with every placeholder rendered as `<name>`.
    parameterized: String,

    /// Names of the placeholders, in the order of their appearance.
    parameters: Vec<String>,
}

impl StepValue {
    /// Parses the given step `text`, recognizing both `<name>` and
    /// `"literal"` placeholders.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let re = regex!(r#"<([^<>]*)>|"([^"]*)""#);

        let mut parameters = Vec::new();
        let mut value = String::with_capacity(text.len());
        let mut parameterized = String::with_capacity(text.len());
        let mut last = 0;

        for caps in re.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or("", |m| m.as_str());

            value.push_str(&text[last..whole.start()]);
            value.push_str(PARAMETER_TOKEN);
            parameterized.push_str(&text[last..whole.start()]);
            parameterized.push('<');
            parameterized.push_str(name);
            parameterized.push('>');

            parameters.push(name.to_owned());
            last = whole.end();
        }
        value.push_str(&text[last..]);
        parameterized.push_str(&text[last..]);

        Self {
            value: value.trim().to_owned(),
            parameterized: parameterized.trim().to_owned(),
            parameters,
        }
    }

    /// Returns the parameter-erased step value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns the step text with `<name>` placeholders.
    #[must_use]
    pub fn parameterized(&self) -> &str {
        &self.parameterized
    }

    /// Returns the placeholder names.
    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Returns the number of placeholders.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }
}

impl From<StepValue> for String {
    fn from(value: StepValue) -> Self {
        value.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erases_angle_placeholders() {
        let value = StepValue::parse("Say <greeting> to <name>");

        assert_eq!(value.as_str(), "Say {} to {}");
        assert_eq!(value.parameterized(), "Say <greeting> to <name>");
        assert_eq!(value.parameters(), ["greeting", "name"]);
    }

    #[test]
    fn erases_quoted_literals() {
        let value = StepValue::parse(r#"Say "hello" to "world""#);

        assert_eq!(value.as_str(), "Say {} to {}");
        assert_eq!(value.parameterized(), "Say <hello> to <world>");
        assert_eq!(value.parameter_count(), 2);
    }

    #[test]
    fn same_logical_step_has_same_value() {
        assert_eq!(
            StepValue::parse("Say <a> to <b>"),
            StepValue::parse("Say <a> to <b>"),
        );
        assert_eq!(
            StepValue::parse("Say <a> to <b>").as_str(),
            StepValue::parse(r#"Say "x" to <y>"#).as_str(),
        );
    }

    #[test]
    fn text_without_placeholders_is_kept() {
        let value = StepValue::parse("  Open the browser ");

        assert_eq!(value.as_str(), "Open the browser");
        assert!(value.parameters().is_empty());
        assert_eq!(value.to_string(), "Open the browser");
    }
}
