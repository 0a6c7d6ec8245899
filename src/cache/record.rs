//! The persisted cache metadata row.

use http::HeaderMap;

use crate::constants;

/// A single row in the `cache_metadata` table, describing one cached
/// response. The response body itself lives alongside this row, at
/// `<cache-key><data-extension>` under the cache directory.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub cache_key: String,
    pub url: String,
    pub method: String,
    pub status_code: u16,
    pub status_message: String,
    /// Response headers, serialized as a JSON object of name -> value.
    pub response_header_json: String,
    pub response_body_size: u64,
    pub sent_request_at_epoch: u64,
    pub received_response_at_epoch: u64,
    pub created_at_epoch: u64,
    pub last_accessed_at_epoch: u64,
}

impl CacheRecord {
    /// The payload file name for this record, relative to the cache dir.
    pub fn payload_file_name(&self) -> String {
        format!("{}{}", self.cache_key, constants::CACHE_DATA_FILE_EXTENSION)
    }

    /// Deserializes [`CacheRecord::response_header_json`] back into a
    /// [`HeaderMap`]. Malformed JSON (e.g. from a row written by a future,
    /// incompatible schema version) yields an empty map rather than an
    /// error: a cache read failure demotes to a miss, it never fails the
    /// caller's request.
    pub fn response_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let Ok(serde_json::Value::Object(map)) =
            serde_json::from_str::<serde_json::Value>(&self.response_header_json)
        else {
            return headers;
        };
        for (name, value) in map {
            let Some(value) = value.as_str() else {
                continue;
            };
            let Ok(name) = http::HeaderName::try_from(name.as_str()) else {
                continue;
            };
            let Ok(value) = http::HeaderValue::try_from(value) else {
                continue;
            };
            headers.append(name, value);
        }
        headers
    }

    /// Serializes `headers` into the JSON document stored in
    /// [`CacheRecord::response_header_json`].
    pub fn encode_headers(headers: &HeaderMap) -> String {
        let mut map = serde_json::Map::new();
        for (name, value) in headers.iter() {
            if let Ok(value) = value.to_str() {
                map.insert(name.as_str().to_string(), serde_json::Value::from(value));
            }
        }
        serde_json::Value::Object(map).to_string()
    }
}

#[cfg(test)]
mod tests {
    use http::header::{CONTENT_TYPE, ETAG};

    use super::*;

    #[test]
    fn header_json_round_trips() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "text/plain".parse().unwrap());
        headers.insert(ETAG, "\"abc\"".parse().unwrap());

        let json = CacheRecord::encode_headers(&headers);
        let record = CacheRecord {
            cache_key: "deadbeef".into(),
            url: "http://example.com".into(),
            method: "GET".into(),
            status_code: 200,
            status_message: "OK".into(),
            response_header_json: json,
            response_body_size: 5,
            sent_request_at_epoch: 1,
            received_response_at_epoch: 2,
            created_at_epoch: 2,
            last_accessed_at_epoch: 2,
        };

        let decoded = record.response_headers();
        assert_eq!(decoded.get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(decoded.get(ETAG).unwrap(), "\"abc\"");
    }

    #[test]
    fn malformed_json_demotes_to_empty_headers() {
        let record = CacheRecord {
            cache_key: "deadbeef".into(),
            url: "http://example.com".into(),
            method: "GET".into(),
            status_code: 200,
            status_message: "OK".into(),
            response_header_json: "not json".into(),
            response_body_size: 0,
            sent_request_at_epoch: 1,
            received_response_at_epoch: 2,
            created_at_epoch: 2,
            last_accessed_at_epoch: 2,
        };
        assert!(record.response_headers().is_empty());
    }

    #[test]
    fn payload_file_name_has_data_extension() {
        let record = CacheRecord {
            cache_key: "deadbeef".into(),
            url: String::new(),
            method: "GET".into(),
            status_code: 200,
            status_message: "OK".into(),
            response_header_json: "{}".into(),
            response_body_size: 0,
            sent_request_at_epoch: 0,
            received_response_at_epoch: 0,
            created_at_epoch: 0,
            last_accessed_at_epoch: 0,
        };
        assert_eq!(record.payload_file_name(), "deadbeef.data");
    }
}
