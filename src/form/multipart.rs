//! Multipart form data parsing.

use bytes::Bytes;
use futures_util::{stream, FutureExt};
use multer::Multipart;

use super::FormValues;

/// Collect the text fields of a `multipart/form-data` body.
///
/// File parts and parts without a name are skipped. The body is already in
/// memory, so the parser never has to wait on the stream.
pub fn parse_multipart(content_type: &str, body: Bytes) -> Result<FormValues, String> {
    let boundary = multer::parse_boundary(content_type).map_err(|e| e.to_string())?;

    let mut multipart = Multipart::new(
        stream::once(async move { Ok::<_, std::io::Error>(body) }),
        boundary,
    );

    let mut values = FormValues::default();

    loop {
        let field = match multipart.next_field().now_or_never() {
            Some(result) => result.map_err(|e| e.to_string())?,
            None => return Err("multipart body is incomplete".to_string()),
        };
        let Some(field) = field else {
            break;
        };

        if field.file_name().is_some() {
            continue;
        }
        let name = match field.name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };

        let text = match field.text().now_or_never() {
            Some(result) => result.map_err(|e| e.to_string())?,
            None => return Err("multipart body is incomplete".to_string()),
        };
        values.push(name, text);
    }

    tracing::debug!(fields = values.len(), "parsed multipart form");
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT_TYPE: &str = "multipart/form-data; boundary=XX";

    #[test]
    fn test_text_fields_in_order() {
        let body = "--XX\r\n\
            Content-Disposition: form-data; name=\"limit\"\r\n\r\n\
            7\r\n\
            --XX\r\n\
            Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            file body\r\n\
            --XX\r\n\
            Content-Disposition: form-data; name=\"limit\"\r\n\r\n\
            9\r\n\
            --XX--\r\n";

        let values = parse_multipart(CONTENT_TYPE, Bytes::from_static(body.as_bytes())).unwrap();

        assert_eq!(values.get_all("limit"), vec!["7", "9"]);
        assert_eq!(values.get("upload"), None);
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_missing_boundary() {
        let err = parse_multipart("multipart/form-data", Bytes::new()).unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn test_truncated_body() {
        let body = "--XX\r\nContent-Disposition: form-data; name=\"limit\"\r\n\r\n7";
        assert!(parse_multipart(CONTENT_TYPE, Bytes::from_static(body.as_bytes())).is_err());
    }
}
