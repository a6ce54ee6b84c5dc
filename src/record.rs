//! The fixed ALB access-log schema and its positional parser.
//!
//! Field order is fixed by the log dialect; there is no schema negotiation. A
//! line with fewer than twenty fields parses into a record whose trailing
//! fields are absent, and those keys are dropped from the serialized document.
//! Numeric fields that are present but not parseable serialize as JSON null.

use crate::timefmt;
use crate::tokenizer::split_fields;
use serde::Serialize;

/// One parsed access-log entry, serialized with the wire keys the search
/// store's index mappings were built against.
#[derive(Debug, Clone, Serialize)]
pub struct AlbLogRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// Event time rendered in the configured offset; absent when the raw
    /// timestamp is missing or unparseable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(rename = "ELBName", skip_serializing_if = "Option::is_none")]
    pub elb_name: Option<String>,
    /// Client address with the port suffix stripped.
    #[serde(rename = "srcIP", skip_serializing_if = "Option::is_none")]
    pub src_ip: Option<String>,
    #[serde(rename = "serviceServer", skip_serializing_if = "Option::is_none")]
    pub service_server: Option<String>,
    #[serde(
        rename = "requestProcessingTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_processing_time: Option<f64>,
    #[serde(
        rename = "serviceServerProcessingTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub service_server_processing_time: Option<f64>,
    #[serde(
        rename = "responseProcessingTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_processing_time: Option<f64>,
    #[serde(rename = "elbStatusCode", skip_serializing_if = "Option::is_none")]
    pub elb_status_code: Option<f64>,
    #[serde(
        rename = "serviceServerStatusCode",
        skip_serializing_if = "Option::is_none"
    )]
    pub service_server_status_code: Option<f64>,
    #[serde(rename = "receivedBytes", skip_serializing_if = "Option::is_none")]
    pub received_bytes: Option<f64>,
    #[serde(rename = "sentBytes", skip_serializing_if = "Option::is_none")]
    pub sent_bytes: Option<f64>,
    #[serde(rename = "requestPath", skip_serializing_if = "Option::is_none")]
    pub request_path: Option<String>,
    #[serde(rename = "userAgent", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_cipher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_group_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chosen_cert_arn: Option<String>,
}

/// Parses one log line into the fixed schema.
///
/// Never fails: malformed numeric fields become NaN (null on the wire), a
/// malformed event time becomes an absent `time`, and a short line leaves the
/// missing trailing fields absent.
pub fn parse_line(line: &str, offset_hours: f64) -> AlbLogRecord {
    let fields = split_fields(line);
    let text = |idx: usize| fields.get(idx).cloned();
    let number = |idx: usize| fields.get(idx).map(|raw| coerce_number(raw));

    AlbLogRecord {
        scheme: text(0),
        time: fields
            .get(1)
            .and_then(|raw| timefmt::format_instant(raw, offset_hours, timefmt::DEFAULT_TEMPLATE)),
        elb_name: text(2),
        src_ip: fields.get(3).map(|addr| strip_port(addr)),
        service_server: text(4),
        request_processing_time: number(5),
        service_server_processing_time: number(6),
        response_processing_time: number(7),
        elb_status_code: number(8),
        service_server_status_code: number(9),
        received_bytes: number(10),
        sent_bytes: number(11),
        request_path: text(12),
        user_agent: text(13),
        ssl_cipher: text(14),
        ssl_protocol: text(15),
        target_group_arn: text(16),
        trace_id: text(17),
        domain_name: text(18),
        chosen_cert_arn: text(19),
    }
}

/// Everything up to the first `:`, dropping the port suffix of `ip:port`.
fn strip_port(address: &str) -> String {
    address.split(':').next().unwrap_or("").to_string()
}

/// Loose numeric coercion: surrounding whitespace is ignored, an empty field
/// coerces to zero, and anything unparseable becomes the NaN sentinel (which
/// serializes as JSON null) instead of an error.
fn coerce_number(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LINE: &str = concat!(
        r#"https 2018-07-02T22:23:00.186641Z app/my-loadbalancer/50dc6c495c0c9188 "#,
        r#"192.168.131.39:2817 10.0.0.1:80 0.086 0.048 0.037 200 200 34 366 "#,
        r#""GET https://www.example.com:443/ HTTP/1.1" "curl/7.46.0" "#,
        r#"ECDHE-RSA-AES128-GCM-SHA256 TLSv1.2 "#,
        r#"arn:aws:elasticloadbalancing:us-east-2:123456789012:targetgroup/my-targets/73e2d6bc24d8a067 "#,
        r#""Root=1-58337281-1d84f3d73c47ec4e58577259" "www.example.com" "#,
        r#""arn:aws:acm:us-east-2:123456789012:certificate/12345678-1234-1234-1234-123456789012""#
    );

    #[test]
    fn parses_a_well_formed_line() {
        let record = parse_line(SAMPLE_LINE, 9.0);

        assert_eq!(record.scheme.as_deref(), Some("https"));
        assert_eq!(record.time.as_deref(), Some("2018-07-03T07:23:00+09:00"));
        assert_eq!(
            record.elb_name.as_deref(),
            Some("app/my-loadbalancer/50dc6c495c0c9188")
        );
        assert_eq!(record.src_ip.as_deref(), Some("192.168.131.39"));
        assert_eq!(record.service_server.as_deref(), Some("10.0.0.1:80"));
        assert_eq!(record.request_processing_time, Some(0.086));
        assert_eq!(record.elb_status_code, Some(200.0));
        assert_eq!(record.received_bytes, Some(34.0));
        assert_eq!(record.sent_bytes, Some(366.0));
        assert_eq!(
            record.request_path.as_deref(),
            Some("GET https://www.example.com:443/ HTTP/1.1")
        );
        assert_eq!(record.user_agent.as_deref(), Some("curl/7.46.0"));
        assert_eq!(record.domain_name.as_deref(), Some("www.example.com"));
    }

    #[test]
    fn short_line_leaves_trailing_fields_absent() {
        let record = parse_line("https 2018-07-02T22:23:00.186641Z my-elb 10.0.0.5:3181", 0.0);

        assert_eq!(record.scheme.as_deref(), Some("https"));
        assert_eq!(record.src_ip.as_deref(), Some("10.0.0.5"));
        assert!(record.service_server.is_none());
        assert!(record.request_processing_time.is_none());
        assert!(record.chosen_cert_arn.is_none());

        let document = serde_json::to_value(&record).unwrap();
        let object = document.as_object().unwrap();
        assert!(!object.contains_key("serviceServer"));
        assert!(!object.contains_key("chosen_cert_arn"));
    }

    #[test]
    fn non_numeric_duration_serializes_as_null() {
        let line = SAMPLE_LINE.replacen("0.086", "bogus", 1);
        let record = parse_line(&line, 9.0);

        assert!(record.request_processing_time.unwrap().is_nan());

        let document = serde_json::to_value(&record).unwrap();
        assert!(document["requestProcessingTime"].is_null());
        assert_eq!(document["serviceServerProcessingTime"], 0.048);
    }

    #[test]
    fn unparseable_event_time_leaves_time_absent() {
        let line = SAMPLE_LINE.replacen("2018-07-02T22:23:00.186641Z", "-", 1);
        let record = parse_line(&line, 9.0);
        assert!(record.time.is_none());
    }

    #[test]
    fn serialized_document_uses_the_wire_keys() {
        let record = parse_line(SAMPLE_LINE, 0.0);
        let document = serde_json::to_value(&record).unwrap();
        let object = document.as_object().unwrap();

        for key in [
            "scheme",
            "time",
            "ELBName",
            "srcIP",
            "serviceServer",
            "requestProcessingTime",
            "serviceServerProcessingTime",
            "responseProcessingTime",
            "elbStatusCode",
            "serviceServerStatusCode",
            "receivedBytes",
            "sentBytes",
            "requestPath",
            "userAgent",
            "ssl_cipher",
            "ssl_protocol",
            "target_group_arn",
            "trace_id",
            "domain_name",
            "chosen_cert_arn",
        ] {
            assert!(object.contains_key(key), "missing wire key {key}");
        }
        assert_eq!(object.len(), 20);
    }

    #[test]
    fn parsing_is_a_pure_function_of_the_line() {
        let first = serde_json::to_vec(&parse_line(SAMPLE_LINE, 9.0)).unwrap();
        let second = serde_json::to_vec(&parse_line(SAMPLE_LINE, 9.0)).unwrap();
        assert_eq!(first, second);
    }
}
