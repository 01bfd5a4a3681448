//! Locators - structured identifiers naming what an interval refers to.
//!
//! A locator is a space-separated list of `key/value` tags, for example
//! `ns/openshift-etcd pod/etcd-0` or `disruption/service-lb connection/new`.

use std::collections::BTreeMap;
use std::fmt;

const E2E_TEST_PREFIX: &str = "e2e-test/";
const NODE_PREFIX: &str = "node/";
const OPERATOR_PREFIX: &str = "clusteroperator/";

/// How a disruption probe connects to its backend.
///
/// Reused connections detect abrupt breaks of established connections; new
/// connections detect failures to establish one. Connection pooling can mask
/// the latter, so both are sampled separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ConnectionType {
    New,
    Reused,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::New => "new",
            ConnectionType::Reused => "reused",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locator for an e2e test, with the name quoted.
pub fn e2e_test_locator(test_name: &str) -> String {
    format!("{}{:?}", E2E_TEST_PREFIX, test_name)
}

pub fn is_e2e_test(locator: &str) -> bool {
    e2e_test_from_locator(locator).is_some()
}

/// Extract the unquoted test name from an e2e test locator.
pub fn e2e_test_from_locator(locator: &str) -> Option<String> {
    let quoted = locator.strip_prefix(E2E_TEST_PREFIX)?;
    unquote(quoted)
}

pub fn node_locator(node_name: &str) -> String {
    format!("{}{}", NODE_PREFIX, node_name)
}

pub fn is_node(locator: &str) -> bool {
    node_from_locator(locator).is_some()
}

/// Node name from a `node/<name> ...` locator.
pub fn node_from_locator(locator: &str) -> Option<&str> {
    first_tag_value(locator, NODE_PREFIX)
}

pub fn operator_locator(operator_name: &str) -> String {
    format!("{}{}", OPERATOR_PREFIX, operator_name)
}

pub fn is_operator(locator: &str) -> bool {
    operator_from_locator(locator).is_some()
}

/// Operator name from a `clusteroperator/<name> ...` locator.
pub fn operator_from_locator(locator: &str) -> Option<&str> {
    first_tag_value(locator, OPERATOR_PREFIX)
}

fn first_tag_value<'a>(locator: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = locator.strip_prefix(prefix)?;
    Some(rest.split(' ').next().unwrap_or(""))
}

/// Split a locator into its tags. A tag without `/` maps to an empty value.
pub fn locator_parts(locator: &str) -> BTreeMap<String, String> {
    locator
        .split(' ')
        .map(|tag| match tag.split_once('/') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (tag.to_string(), String::new()),
        })
        .collect()
}

/// Namespace from `ns/` or, failing that, `namespace/`.
pub fn namespace_from(parts: &BTreeMap<String, String>) -> &str {
    parts
        .get("ns")
        .or_else(|| parts.get("namespace"))
        .map(String::as_str)
        .unwrap_or("")
}

pub fn alert_from(parts: &BTreeMap<String, String>) -> &str {
    parts.get("alert").map(String::as_str).unwrap_or("")
}

/// Locator for a disruption check against a named backend.
pub fn locate_disruption_check(backend: &str, connection: ConnectionType) -> String {
    format!("disruption/{} connection/{}", backend, connection)
}

fn backend_of(locator: &str) -> String {
    let parts = locator_parts(locator);
    match parts.get("disruption") {
        Some(backend) if !backend.is_empty() => backend.clone(),
        _ => locator.to_string(),
    }
}

pub fn disruption_began_message(
    locator: &str,
    connection: ConnectionType,
    err: &dyn fmt::Display,
) -> String {
    format!(
        "{} stopped responding to GET requests over {} connections: {}",
        backend_of(locator),
        connection,
        err
    )
}

pub fn disruption_ended_message(locator: &str, connection: ConnectionType) -> String {
    format!(
        "{} started responding to GET requests over {} connections",
        backend_of(locator),
        connection
    )
}

pub fn disruption_continuing_message(locator: &str, connection: ConnectionType) -> String {
    format!(
        "{} is not responding to GET requests over {} connections",
        backend_of(locator),
        connection
    )
}

/// Reverse of `{:?}` quoting for the escapes it produces.
fn unquote(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => return None,
            '\\' => match chars.next()? {
                '\\' => out.push('\\'),
                '"' => out.push('"'),
                '\'' => out.push('\''),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                'u' => {
                    if chars.next()? != '{' {
                        return None;
                    }
                    let mut hex = String::new();
                    loop {
                        match chars.next()? {
                            '}' => break,
                            h => hex.push(h),
                        }
                    }
                    let code = u32::from_str_radix(&hex, 16).ok()?;
                    out.push(char::from_u32(code)?);
                }
                _ => return None,
            },
            other => out.push(other),
        }
    }

    Some(out)
}
