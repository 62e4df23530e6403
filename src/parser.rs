//! Normalize index payloads into a `FragmentIndex`.
//!
//! Two payload shapes are accepted: raw search hits grouped per file, and a
//! pre-built fragment index as written by `index_file`.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, json_type_name};
use crate::query::FragmentContract;
use crate::types::{FragmentIndex, PageLocation, Reference};

/// Metadata key the search service sets when it gave up before finishing.
const TIMED_OUT_KEY: &str = "*timedout*";

/// Search hits for one file.
#[derive(Deserialize)]
struct ResultGroup {
    /// Repository-relative file path.
    path: String,
    /// Matching lines in file order.
    #[serde(default)]
    lines: Vec<ResultLine>,
}

/// One matching line of a search hit.
#[derive(Deserialize)]
struct ResultLine {
    /// Text of the line.
    line: String,
    /// One-based line number.
    lno: u32,
}

/// One record of a pre-built index. Unknown fields are ignored.
#[derive(Deserialize)]
struct ReferenceRecord {
    /// Repository-relative file path.
    filepath: String,
    /// One-based line number.
    line_number: u32,
    /// Canonical page URL with fragment.
    url: String,
}

/// Reject anything but a JSON object at the top level.
///
/// # Errors
///
/// Returns `Error::InvalidResponseFormat` naming the type that was found.
fn expect_object(payload: &Value) -> Result<&Map<String, Value>, Error> {
    return match payload {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidResponseFormat {
            found: json_type_name(other),
        }),
    };
}

/// Build a fragment index from raw search results.
///
/// Top-level keys starting with `*` are service metadata. Every other value is
/// either an array of per-file result groups or an object of labelled arrays
/// (`"Textual Occurrences"` and the like). Lines that do not link into the
/// contract's domain are skipped.
///
/// # Errors
///
/// Returns `Error::InvalidResponseFormat` if the payload is not a JSON object.
pub fn parse_search_results(
    contract: &FragmentContract,
    page: &PageLocation,
    payload: &Value,
) -> Result<FragmentIndex, Error> {
    let sections = expect_object(payload)?;
    if sections.get(TIMED_OUT_KEY).and_then(Value::as_bool) == Some(true) {
        let degraded = Error::DegradedResult {
            domain: contract.domain().to_string(),
        };
        log::warn!("{degraded}");
    }

    let mut index = FragmentIndex::default();
    for (key, value) in sections {
        if key.starts_with('*') {
            continue;
        }
        match value {
            Value::Array(groups) => index_result_groups(contract, page, groups, &mut index),
            Value::Object(labelled) => {
                for (label, section) in labelled {
                    if let Value::Array(groups) = section {
                        index_result_groups(contract, page, groups, &mut index);
                    } else {
                        log::debug!("skipping {key}/{label}: {}", json_type_name(section));
                    }
                }
            },
            other => log::debug!("skipping {key}: {}", json_type_name(other)),
        }
    }

    log::info!(
        "indexed {} references across {} fragments for {}",
        index.reference_count(),
        index.len(),
        contract.domain()
    );
    return Ok(index);
}

/// Apply the extraction pattern to every line of every group.
fn index_result_groups(
    contract: &FragmentContract,
    page: &PageLocation,
    groups: &[Value],
    index: &mut FragmentIndex,
) {
    for raw in groups {
        let group = match ResultGroup::deserialize(raw) {
            Ok(g) => g,
            Err(e) => {
                log::debug!("skipping malformed result group: {e}");
                continue;
            },
        };
        for line in &group.lines {
            for fragment in contract.extract(&line.line) {
                let Some(reference) = Reference::new(page.reference_url(fragment), group.path.as_str(), line.lno)
                else {
                    continue;
                };
                index.push(fragment, reference);
            }
        }
    }
    return;
}

/// Build a fragment index from a pre-built `fragment -> [reference]` document.
///
/// Entries whose value is not an array are logged and skipped, as are records
/// that do not deserialize or carry line number zero.
///
/// # Errors
///
/// Returns `Error::InvalidResponseFormat` if the payload is not a JSON object.
pub fn parse_prebuilt(payload: &Value) -> Result<FragmentIndex, Error> {
    let entries = expect_object(payload)?;
    let mut index = FragmentIndex::default();

    for (fragment, value) in entries {
        let Value::Array(records) = value else {
            let err = Error::UnexpectedFragmentShape {
                found: json_type_name(value),
                fragment: fragment.clone(),
            };
            log::warn!("{err}");
            continue;
        };
        for raw in records {
            match ReferenceRecord::deserialize(raw) {
                Ok(record) => {
                    if let Some(reference) = Reference::new(record.url, record.filepath, record.line_number) {
                        index.push(fragment, reference);
                    }
                },
                Err(e) => log::warn!("skipping malformed reference under `#{fragment}`: {e}"),
            }
        }
    }

    return Ok(index);
}
