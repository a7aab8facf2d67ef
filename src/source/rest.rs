use std::time::Duration;

use reqwest::blocking::{Client, ClientBuilder, Response};
use reqwest::header::{CONTENT_RANGE, HeaderMap, HeaderValue, RANGE};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, trace};

use super::{Chunk, RangeRequest, SearchPredicate, TableSource};
use crate::domain::{BrowserError, Result};
use crate::record::Record;

/// A table behind a PostgREST style query API (`/rest/v1/<table>`).
///
/// Ranges are requested with the `Range` header, ordering with `order=` and
/// the total count with `Prefer: count=exact`, which the service reports in
/// `Content-Range`.
#[derive(Debug)]
pub struct RestSource {
    client: Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct UpdatedAt {
    updated_at: Option<String>,
}

impl RestSource {
    pub fn new(url: &str, key: &str, table: &str) -> Result<Self> {
        Self::with_builder(Client::builder(), url, key, table)
    }

    pub(crate) fn with_builder(
        builder: ClientBuilder,
        url: &str,
        key: &str,
        table: &str,
    ) -> Result<Self> {
        if url.trim().is_empty() || key.trim().is_empty() {
            return Err(BrowserError::InvalidConfig(
                "service url and key are required".into(),
            ));
        }

        let mut headers = HeaderMap::new();
        let apikey = HeaderValue::from_str(key)
            .map_err(|e| BrowserError::InvalidConfig(format!("invalid service key: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| BrowserError::InvalidConfig(format!("invalid service key: {e}")))?;
        headers.insert("apikey", apikey);
        headers.insert("Authorization", bearer);

        let client = builder
            .user_agent(concat!("permits/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{}", url.trim_end_matches('/'), table),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(BrowserError::ServiceError {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            })
        }
    }
}

/// Query parameters of a range request, without the range itself.
pub(crate) fn query_params(request: &RangeRequest) -> Vec<(String, String)> {
    let direction = if request.order.ascending { "asc" } else { "desc" };
    let mut params = vec![
        ("select".to_string(), "*".to_string()),
        (
            "order".to_string(),
            format!("{}.{}", request.order.column, direction),
        ),
    ];
    if let Some(search) = &request.search {
        params.push(("or".to_string(), or_filter(search)));
    }
    params
}

/// `(col1.ilike."*term*",col2.ilike."*term*")`. The pattern is double quoted so
/// commas and parentheses in the term do not break the filter syntax.
pub(crate) fn or_filter(search: &SearchPredicate) -> String {
    let pattern = like_literal(&search.term)
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    let predicates = search
        .columns
        .iter()
        .map(|c| format!("{}.ilike.\"*{}*\"", c.id(), pattern))
        .collect::<Vec<_>>()
        .join(",");
    format!("({predicates})")
}

/// Escapes the LIKE wildcards of `term` so it matches literally.
///
/// `*` is the service's own wildcard and has no escape; it becomes `_`, one
/// arbitrary character. Callers re-check the returned rows.
fn like_literal(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        match c {
            '\\' | '%' | '_' => {
                out.push('\\');
                out.push(c);
            }
            '*' => out.push('_'),
            c => out.push(c),
        }
    }
    out
}

/// Total from a `Content-Range` header such as `0-999/12345` or `*/0`.
pub(crate) fn parse_total(content_range: &str) -> Option<usize> {
    content_range.rsplit_once('/')?.1.trim().parse().ok()
}

impl TableSource for RestSource {
    fn fetch_range(&self, request: &RangeRequest) -> Result<Chunk> {
        let last = request.offset + request.limit.max(1) - 1;
        let mut builder = self
            .client
            .get(&self.endpoint)
            .query(&query_params(request))
            .header("Range-Unit", "items")
            .header(RANGE, format!("{}-{}", request.offset, last));
        if request.count {
            builder = builder.header("Prefer", "count=exact");
        }

        let response = builder.send()?;
        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            debug!("Range {}-{} is past the end of the table", request.offset, last);
            return Ok(Chunk::default());
        }
        let response = self.check(response)?;

        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_total);
        let rows: Vec<Record> = response.json()?;
        trace!(
            "GET {} range {}-{} -> {} rows (total {:?})",
            self.endpoint,
            request.offset,
            last,
            rows.len(),
            total
        );

        Ok(Chunk { rows, total })
    }

    fn latest_update(&self) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("select", "updated_at"),
                ("order", "updated_at.desc"),
                ("limit", "1"),
            ])
            .send()?;
        let rows: Vec<UpdatedAt> = self.check(response)?.json()?;
        Ok(rows.into_iter().next().and_then(|r| r.updated_at))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    use super::*;
    use crate::fetch::PagedFetcher;
    use crate::record::ColumnId;
    use crate::source::OrderBy;

    /// Answers one request per entry of `responses` and sends back each request head.
    fn serve(responses: Vec<String>) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut buf).unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buf[..n]);
                }
                tx.send(String::from_utf8_lossy(&head).to_lowercase()).unwrap();
                stream.write_all(response.as_bytes()).unwrap();
            }
        });
        (url, rx)
    }

    #[test]
    fn builds_ordered_query() {
        let request = RangeRequest {
            order: OrderBy {
                column: "id".into(),
                ascending: true,
            },
            offset: 1000,
            limit: 1000,
            search: None,
            count: false,
        };
        assert_eq!(
            query_params(&request),
            vec![
                ("select".to_string(), "*".to_string()),
                ("order".to_string(), "id.asc".to_string()),
            ]
        );
    }

    #[test]
    fn or_filter_quotes_the_term() {
        let search = SearchPredicate {
            term: r#"a,b "c""#.into(),
            columns: vec![ColumnId::Project, ColumnId::Municipalities],
        };
        assert_eq!(
            or_filter(&search),
            r#"(projeto.ilike."*a,b \"c\"*",municipios.ilike."*a,b \"c\"*")"#
        );
    }

    #[test]
    fn or_filter_escapes_like_wildcards() {
        let filter = |term: &str| {
            or_filter(&SearchPredicate {
                term: term.into(),
                columns: vec![ColumnId::Project],
            })
        };
        assert_eq!(filter("50%"), r#"(projeto.ilike."*50\\%*")"#);
        assert_eq!(filter("a_b"), r#"(projeto.ilike."*a\\_b*")"#);
        assert_eq!(filter("x*y"), r#"(projeto.ilike."*x_y*")"#);
        assert_eq!(filter(r"a\b"), r#"(projeto.ilike."*a\\\\b*")"#);
    }

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_total("0-999/12345"), Some(12345));
        assert_eq!(parse_total("*/0"), Some(0));
        assert_eq!(parse_total("0-9/*"), None);
        assert_eq!(parse_total("garbage"), None);
    }

    #[test]
    fn rejects_missing_credentials() {
        assert!(matches!(
            RestSource::new("", "key", "t"),
            Err(BrowserError::InvalidConfig(_))
        ));
        let source = RestSource::new("https://example.org/", "key", "permits").unwrap();
        assert_eq!(source.endpoint(), "https://example.org/rest/v1/permits");
    }

    #[test]
    fn paged_fetch_reads_total_and_stops_on_416() {
        let body = r#"[{"id":1,"ano":2021,"portaria":"001"},{"id":2,"ano":"2020","portaria":"002"}]"#;
        let (url, requests) = serve(vec![
            format!(
                "HTTP/1.1 206 Partial Content\r\nContent-Type: application/json\r\n\
                 Content-Range: 0-1/3\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            ),
            "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: */3\r\n\
             Content-Length: 0\r\nConnection: close\r\n\r\n"
                .to_string(),
        ]);
        let source =
            RestSource::with_builder(Client::builder().no_proxy(), &url, "key", "permits").unwrap();
        let fetcher = PagedFetcher::new(
            Box::new(source),
            OrderBy {
                column: "id".into(),
                ascending: true,
            },
            2,
        );

        let rows = fetcher.fetch_all();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].year, Some(2020));
        assert_eq!(rows[0].order_number.as_deref(), Some("001"));

        let first = requests.recv().unwrap();
        assert!(first.starts_with("get /rest/v1/permits?"));
        assert!(first.contains("order=id.asc"));
        assert!(first.contains("range: 0-1\r\n"));
        assert!(first.contains("prefer: count=exact"));
        assert!(first.contains("apikey: key"));
        let second = requests.recv().unwrap();
        assert!(second.contains("range: 2-3\r\n"));
        assert!(!second.contains("prefer:"));
    }
}
