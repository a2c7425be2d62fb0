//! Query option translation
//!
//! Options map onto OData system query options in a fixed order:
//! `$filter`, `$select`, `$orderby`, `$top`, `$skip`, `$expand`, `$count`.
//! Option names are written literally, values are percent-encoded.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except RFC 3986 unreserved characters
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Options for a collection query
///
/// Empty strings are treated the same as absent values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub filter: Option<String>,
    pub select: Option<String>,
    pub orderby: Option<String>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub expand: Option<String>,
    pub count: Option<bool>,
}

/// Options for a single-record lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordOptions {
    pub select: Option<String>,
    pub expand: Option<String>,
}

impl QueryOptions {
    /// Only a filter, as used by `$count`
    pub fn filtered(filter: Option<String>) -> Self {
        Self { filter, ..Self::default() }
    }

    /// Build the query string (without the leading `?`), or `None` when nothing is set
    #[must_use]
    pub fn to_query_string(&self) -> Option<String> {
        let mut params: Vec<(&str, String)> = Vec::new();

        if let Some(filter) = present(&self.filter) {
            params.push(("$filter", encode(filter)));
        }
        if let Some(select) = present(&self.select) {
            params.push(("$select", encode(select)));
        }
        if let Some(orderby) = present(&self.orderby) {
            params.push(("$orderby", encode(orderby)));
        }
        if let Some(top) = self.top {
            params.push(("$top", top.to_string()));
        }
        if let Some(skip) = self.skip {
            params.push(("$skip", skip.to_string()));
        }
        if let Some(expand) = present(&self.expand) {
            params.push(("$expand", encode(expand)));
        }
        if self.count == Some(true) {
            params.push(("$count", "true".to_string()));
        }

        if params.is_empty() {
            return None;
        }

        Some(params.iter().map(|(name, value)| format!("{name}={value}")).collect::<Vec<_>>().join("&"))
    }
}

impl From<&RecordOptions> for QueryOptions {
    fn from(options: &RecordOptions) -> Self {
        Self { select: options.select.clone(), expand: options.expand.clone(), ..Self::default() }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_options() {
        assert_eq!(QueryOptions::default().to_query_string(), None);
    }

    #[test]
    fn test_filter_top_count() {
        let options = QueryOptions {
            filter: Some("Age gt 25".to_string()),
            top: Some(3),
            count: Some(true),
            ..QueryOptions::default()
        };

        let query = options.to_query_string().unwrap();
        assert_eq!(query, "$filter=Age%20gt%2025&$top=3&$count=true");
        assert!(!query.contains("$select"));
        assert!(!query.contains("$orderby"));
        assert!(!query.contains("$skip"));
        assert!(!query.contains("$expand"));
    }

    #[test]
    fn test_all_options_in_fixed_order() {
        let options = QueryOptions {
            filter: Some("a eq 1".to_string()),
            select: Some("name,email".to_string()),
            orderby: Some("name desc".to_string()),
            top: Some(10),
            skip: Some(20),
            expand: Some("orders".to_string()),
            count: Some(true),
        };

        assert_eq!(
            options.to_query_string().unwrap(),
            "$filter=a%20eq%201&$select=name%2Cemail&$orderby=name%20desc&$top=10&$skip=20&$expand=orders&$count=true"
        );
    }

    #[test]
    fn test_empty_strings_are_absent() {
        let options = QueryOptions {
            filter: Some(String::new()),
            select: Some(String::new()),
            top: Some(5),
            ..QueryOptions::default()
        };

        assert_eq!(options.to_query_string().unwrap(), "$top=5");
    }

    #[test]
    fn test_count_false_omitted() {
        let options = QueryOptions { count: Some(false), ..QueryOptions::default() };
        assert_eq!(options.to_query_string(), None);
    }

    #[test]
    fn test_zero_paging_values_kept() {
        let options = QueryOptions { top: Some(0), skip: Some(0), ..QueryOptions::default() };
        assert_eq!(options.to_query_string().unwrap(), "$top=0&$skip=0");
    }

    #[test]
    fn test_quotes_and_unicode_encoded() {
        let options = QueryOptions {
            filter: Some("name eq 'José & Co'".to_string()),
            ..QueryOptions::default()
        };

        assert_eq!(
            options.to_query_string().unwrap(),
            "$filter=name%20eq%20%27Jos%C3%A9%20%26%20Co%27"
        );
    }

    #[test]
    fn test_unreserved_characters_kept() {
        let options = QueryOptions { select: Some("a-b.c_d~e".to_string()), ..QueryOptions::default() };
        assert_eq!(options.to_query_string().unwrap(), "$select=a-b.c_d~e");
    }

    #[test]
    fn test_record_options_only_select_and_expand() {
        let record = RecordOptions { select: Some("name".to_string()), expand: None };
        assert_eq!(QueryOptions::from(&record).to_query_string().unwrap(), "$select=name");
    }
}
