use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};

use crate::error::WriteError;

pub const DEFAULT_CONTENT_TYPE: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");

/// The transport carries a field name length in a single byte.
const MAX_FIELD_NAME_LEN: usize = u8::MAX as usize;

/// Sizes the transport's fixed response preamble needs before any field is added.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub count: u32,
    pub size: u32,
}

impl FieldLayout {
    /// Counts every field instance and sums the byte length of each name and value.
    pub fn measure(headers: &HeaderMap) -> Result<Self, WriteError> {
        let mut count: u32 = 0;
        let mut size: u32 = 0;

        for (name, value) in headers {
            let name_len = name.as_str().len();
            if name_len > MAX_FIELD_NAME_LEN {
                return Err(WriteError::field_too_large(format!(
                    "field name is {name_len} bytes, limit {MAX_FIELD_NAME_LEN}"
                )));
            }

            let field_size = u32::try_from(name_len + value.len())
                .map_err(|_overflow| WriteError::field_too_large(format!("field {name} does not fit u32")))?;

            count = count.checked_add(1).ok_or_else(|| WriteError::field_too_large("too many fields"))?;
            size = size.checked_add(field_size).ok_or_else(|| WriteError::field_too_large("fields size exceeds u32"))?;
        }

        Ok(Self { count, size })
    }
}

/// Inserts the default content type unless the caller already set one.
pub(crate) fn ensure_content_type(headers: &mut HeaderMap) {
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, DEFAULT_CONTENT_TYPE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderName, SET_COOKIE};

    #[test]
    fn measure_counts_each_value() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=22"));
        headers.insert("x-id", HeaderValue::from_static("7"));

        let layout = FieldLayout::measure(&headers).unwrap();

        assert_eq!(layout.count, 3);
        // "set-cookie" is 10 bytes
        assert_eq!(layout.size, (10 + 3) + (10 + 4) + (4 + 1));
    }

    #[test]
    fn measure_rejects_long_names() {
        let name = HeaderName::from_bytes("x".repeat(256).as_bytes()).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static("v"));

        assert!(matches!(FieldLayout::measure(&headers), Err(WriteError::FieldTooLarge { .. })));
    }

    #[test]
    fn content_type_is_kept_when_present() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        ensure_content_type(&mut headers);

        assert_eq!(headers.get_all(CONTENT_TYPE).iter().count(), 1);
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn content_type_defaults_to_html() {
        let mut headers = HeaderMap::new();

        ensure_content_type(&mut headers);

        assert_eq!(headers[CONTENT_TYPE], DEFAULT_CONTENT_TYPE);
    }
}
