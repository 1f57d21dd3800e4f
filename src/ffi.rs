//! FFI interface for the page-rendering host
//!
//! Selector sets, requests and results all cross the boundary as JSON.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::page::Content;
use crate::record::value_for_field;
use crate::selector_set::{SelectorSet, SetValidationReport};
use crate::types::FieldName;
use crate::validation::ValidationReport;

/// Result struct returned to the host
/// Both pointers are owned by Rust and must be freed via free_extraction_result
#[repr(C)]
pub struct ExtractionResultFFI {
    /// JSON-serialized result (null-terminated)
    pub json_ptr: *mut c_char,
    /// Error message if the call failed (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldExtractionRequest {
    selector_set: Value,
    field: String,
    /// Page URL, used to resolve relative links
    #[serde(default)]
    url: Option<String>,
}

/// Both members are null when the field is absent from the set or disabled
#[derive(Debug, Serialize)]
struct FieldExtractionResult {
    values: Option<Vec<String>>,
    validation: Option<ValidationReport>,
}

/// Run one field of a selector set against an HTML page.
///
/// # Arguments
/// * `html_ptr` - Pointer to HTML content (UTF-8, not necessarily null-terminated)
/// * `html_len` - Length of HTML content in bytes
/// * `request_json` - `{ "selectorSet": <record>, "field": "title", "url": "..." }`
///
/// # Returns
/// `{ "values": [...], "validation": { "valid": .., "errors": [..] } }` in
/// json_ptr (both null when the field is absent or disabled), or an error
/// message in error_ptr
///
/// # Safety
/// - `html_ptr` must point to valid memory of at least `html_len` bytes
/// - `request_json` must be a valid null-terminated C string
/// - Caller must free the result via `free_extraction_result`
#[no_mangle]
pub unsafe extern "C" fn selector_set_extract(
    html_ptr: *const c_char,
    html_len: usize,
    request_json: *const c_char,
) -> ExtractionResultFFI {
    let html = match read_html(html_ptr, html_len) {
        Ok(html) => html,
        Err(msg) => return make_error_result(msg),
    };
    let request_str = match read_c_str(request_json, "Request JSON") {
        Ok(s) => s,
        Err(msg) => return make_error_result(&msg),
    };

    let request: FieldExtractionRequest = match serde_json::from_str(request_str) {
        Ok(r) => r,
        Err(e) => return make_error_result(&format!("Failed to parse request JSON: {}", e)),
    };

    match extract_field(&html, request) {
        Ok(result) => make_json_result(&result),
        Err(msg) => make_error_result(&msg),
    }
}

/// Validate a stored selector set record.
///
/// # Returns
/// `{ "valid": .., "errors": { "<field>": [..], "selector_set": [..] } }`
///
/// # Safety
/// - `record_json` must be a valid null-terminated C string
/// - Caller must free the result via `free_extraction_result`
#[no_mangle]
pub unsafe extern "C" fn selector_set_validate(record_json: *const c_char) -> ExtractionResultFFI {
    let record_str = match read_c_str(record_json, "Record JSON") {
        Ok(s) => s,
        Err(msg) => return make_error_result(&msg),
    };

    match validate_record(record_str) {
        Ok(report) => make_json_result(&report),
        Err(msg) => make_error_result(&msg),
    }
}

/// Free an ExtractionResultFFI returned by this module
///
/// # Safety
/// - `result` must have been returned by one of the functions above
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn free_extraction_result(result: ExtractionResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

unsafe fn read_html(html_ptr: *const c_char, html_len: usize) -> Result<String, &'static str> {
    if html_ptr.is_null() || html_len == 0 {
        return Ok(String::new());
    }
    let slice = std::slice::from_raw_parts(html_ptr as *const u8, html_len);
    std::str::from_utf8(slice)
        .map(str::to_string)
        .map_err(|_| "Invalid UTF-8 in HTML content")
}

unsafe fn read_c_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, String> {
    if ptr.is_null() {
        return Err(format!("{} is null", what));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| format!("Invalid UTF-8 in {}", what))
}

fn extract_field(html: &str, request: FieldExtractionRequest) -> Result<FieldExtractionResult, String> {
    let field: FieldName = request.field.parse().map_err(|e| format!("{}", e))?;
    let set = SelectorSet::from_record(request.selector_set)
        .map_err(|e| format!("Invalid selector set: {}", e))?;
    let base = request.url.as_deref().and_then(|u| Url::parse(u).ok());

    let document = Html::parse_document(html);
    let Some(extracted) = set.extract(field, Content::Document(&document)) else {
        return Ok(FieldExtractionResult {
            values: None,
            validation: None,
        });
    };
    let validation = set.validate_results(&extracted, field);
    let values = extracted
        .iter()
        .filter_map(|v| value_for_field(field, v, base.as_ref()))
        .collect();

    Ok(FieldExtractionResult {
        values: Some(values),
        validation: Some(validation),
    })
}

fn validate_record(record: &str) -> Result<SetValidationReport, String> {
    let value: Value = serde_json::from_str(record).map_err(|e| format!("Failed to parse record JSON: {}", e))?;
    let set = SelectorSet::from_record(value).map_err(|e| format!("Invalid selector set: {}", e))?;
    Ok(set.validate())
}

fn make_json_result<T: Serialize>(value: &T) -> ExtractionResultFFI {
    match serde_json::to_string(value) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => ExtractionResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("Result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&format!("Failed to serialize result: {}", e)),
    }
}

fn make_error_result(msg: &str) -> ExtractionResultFFI {
    let error_cstr = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    ExtractionResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr: error_cstr.into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::RawStrategyConfig;
    use crate::types::PageKind;

    const HTML: &str = r#"
        <div class="gs_r"><h3 class="gs_rt"><a href="/p/1">Deep residual learning for image recognition</a></h3></div>
        <div class="gs_r"><h3 class="gs_rt"><a href="/p/2">Batch normalization accelerates training</a></h3></div>
        <a class="pdf" href="/files/resnet.pdf">PDF</a>
    "#;

    fn record() -> Value {
        let mut set = SelectorSet::new("scholar.google.com", PageKind::SearchResults);
        set.set_field("title", "structural", RawStrategyConfig::structural(".gs_rt a"))
            .unwrap();
        set.set_field("pdf", "structural", RawStrategyConfig::structural("a.pdf"))
            .unwrap();
        set.to_record().unwrap()
    }

    /// Call through the C ABI and read back (json, error)
    fn call_extract(html: &str, request: &Value) -> (Option<Value>, Option<String>) {
        let request = CString::new(request.to_string()).unwrap();
        unsafe {
            let result = selector_set_extract(html.as_ptr() as *const c_char, html.len(), request.as_ptr());
            let out = read_result(&result);
            free_extraction_result(result);
            out
        }
    }

    unsafe fn read_result(result: &ExtractionResultFFI) -> (Option<Value>, Option<String>) {
        let json = (!result.json_ptr.is_null()).then(|| {
            serde_json::from_str(CStr::from_ptr(result.json_ptr).to_str().unwrap()).unwrap()
        });
        let error = (!result.error_ptr.is_null())
            .then(|| CStr::from_ptr(result.error_ptr).to_str().unwrap().to_string());
        (json, error)
    }

    #[test]
    fn test_extract_title_field() {
        let request = serde_json::json!({ "selectorSet": record(), "field": "title" });
        let (json, error) = call_extract(HTML, &request);
        assert!(error.is_none());

        let json = json.unwrap();
        assert_eq!(json["values"][0], "Deep residual learning for image recognition");
        assert_eq!(json["values"].as_array().unwrap().len(), 2);
        // title expects exactly one match
        assert_eq!(json["validation"]["valid"], false);
    }

    #[test]
    fn test_extract_resolves_links_against_url() {
        let request = serde_json::json!({
            "selectorSet": record(),
            "field": "pdf",
            "url": "https://scholar.google.com/scholar?q=resnet"
        });
        let (json, _) = call_extract(HTML, &request);
        let json = json.unwrap();
        assert_eq!(json["values"][0], "https://scholar.google.com/files/resnet.pdf");
        assert_eq!(json["validation"]["valid"], true);
    }

    #[test]
    fn test_absent_or_disabled_field_is_null() {
        let request = serde_json::json!({ "selectorSet": record(), "field": "abstract" });
        let (json, error) = call_extract(HTML, &request);
        assert!(error.is_none());
        let json = json.unwrap();
        assert!(json["values"].is_null());
        assert!(json["validation"].is_null());

        let mut set = SelectorSet::from_record(record()).unwrap();
        assert!(set.set_enabled(FieldName::Pdf, false));
        let request = serde_json::json!({ "selectorSet": set.to_record().unwrap(), "field": "pdf" });
        let (json, _) = call_extract(HTML, &request);
        assert!(json.unwrap()["values"].is_null());
    }

    #[test]
    fn test_extract_errors() {
        let request = serde_json::json!({ "selectorSet": record(), "field": "authors" });
        let (json, error) = call_extract(HTML, &request);
        assert!(json.is_none());
        assert!(error.unwrap().contains("authors"));

        let request = serde_json::json!({ "selectorSet": { "domain": 3 }, "field": "title" });
        let (_, error) = call_extract(HTML, &request);
        assert!(error.unwrap().starts_with("Invalid selector set"));

        unsafe {
            let result = selector_set_extract(ptr::null(), 0, ptr::null());
            let (_, error) = read_result(&result);
            assert_eq!(error.as_deref(), Some("Request JSON is null"));
            free_extraction_result(result);
        }
    }

    #[test]
    fn test_validate_record() {
        let mut record = record();
        record["extractors"]["title"]["strategy"]["pathQuery"] = Value::String(String::new());
        let input = CString::new(record.to_string()).unwrap();

        unsafe {
            let result = selector_set_validate(input.as_ptr());
            let (json, error) = read_result(&result);
            free_extraction_result(result);

            assert!(error.is_none());
            let json = json.unwrap();
            assert_eq!(json["valid"], false);
            assert!(json["errors"]["title"].is_array());
            assert!(json["errors"].get("pdf").is_none());
        }
    }
}
