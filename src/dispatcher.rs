//! Dispatcher: resolve -> reform -> validate -> resign -> forward,
//! grounded in `provider.go`'s `ReformRequest` with the panic-as-control-flow
//! redesign from the Design Notes: every failure is an explicit `Result`
//! instead of a `panic`/`recover` pair, and a `catch_unwind` guard around
//! the whole pipeline turns a genuine programmer error into `InternalError`
//! rather than tearing down the request task.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::Response;
use futures::FutureExt;

use crate::body::RequestParts;
use crate::config::Forbidden;
use crate::endpoint::EndpointDirectory;
use crate::error::{ProxyError, Result, error_response};
use crate::hooks::{self, BaseInfo, RequestInfo, ResponseInfo};
use crate::reform::{self, CLOUD_ACCOUNT_ID_HEADER, CLOUD_ACCOUNT_NAME_HEADER, ORIGIN_URI_HEADER, REQUEST_ID_HEADER, SUB_PRODUCT_HEADER, TOP_ACCOUNT_ID_HEADER, VENDOR_NAME_HEADER};

pub struct Dispatcher {
    pub endpoints: Arc<EndpointDirectory>,
    pub forbidden: Forbidden,
    pub client: reqwest::Client,
    pub version: String,
}

impl Dispatcher {
    pub fn new(endpoints: Arc<EndpointDirectory>, forbidden: Forbidden, version: String) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(format!("keyproxy/{version}"))
            .build()
            .expect("failed to build forwarding client");
        Self {
            endpoints,
            forbidden,
            client,
            version,
        }
    }

    /// Runs the full pipeline behind a panic guard; `dispatch` itself never
    /// panics on well-formed input, but adapter bugs shouldn't take the
    /// request task down with them.
    pub async fn handle(&self, method: Method, uri: Uri, headers: HeaderMap, body: Body) -> Response {
        let request_time = SystemTime::now();
        let base = BaseInfo {
            cloud_account_id: header_value(&headers, CLOUD_ACCOUNT_ID_HEADER),
            cloud_account_name: header_value(&headers, CLOUD_ACCOUNT_NAME_HEADER),
            sub_product: header_value(&headers, SUB_PRODUCT_HEADER),
            top_account_id: header_value(&headers, TOP_ACCOUNT_ID_HEADER),
            vendor_name: header_value(&headers, VENDOR_NAME_HEADER),
            request_id: header_value(&headers, REQUEST_ID_HEADER),
            target_url: header_value(&headers, ORIGIN_URI_HEADER),
            proxy_version: self.version.clone(),
        };
        hooks::standard_on_request(&RequestInfo { base: base.clone(), request_time });

        let result = AssertUnwindSafe(self.dispatch(method, uri, headers, body))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(ProxyError::internal("panic while dispatching request")));

        let response = match result {
            Ok(response) => response,
            Err(err) => error_response(&err, &base.request_id, &self.version),
        };
        let (mut parts, body) = response.into_parts();
        parts.headers.insert(
            hooks::PROXY_VERSION_HEADER,
            HeaderValue::from_str(&self.version).unwrap_or(HeaderValue::from_static("")),
        );
        let response = Response::from_parts(parts, body);

        hooks::standard_on_response(&ResponseInfo {
            base,
            response_time: SystemTime::now(),
            cost: request_time.elapsed().unwrap_or(Duration::ZERO),
            http_status: response.status().as_u16(),
            proxy_exception: response.status().is_client_error() || response.status().is_server_error(),
            proxy_exception_text_code: response
                .headers()
                .get("X-Exception-TextCode")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string(),
        });
        response
    }

    async fn dispatch(&self, method: Method, uri: Uri, headers: HeaderMap, body: Body) -> Result<Response> {
        let cloud_account_name = header_value(&headers, CLOUD_ACCOUNT_NAME_HEADER);
        let adapter = self.endpoints.lookup(&cloud_account_name);

        if adapter.is_none() && self.forbidden.forbid_unknown_account() {
            return Err(ProxyError::cloud_account_not_found(format!(
                "cloud account is not found, name: {cloud_account_name}"
            )));
        }

        let mut parts = RequestParts::from_request(method, uri, headers, body).await?;
        reform::reform(&mut parts)?;

        let Some(adapter) = adapter else {
            return self.forward(parts).await;
        };

        let (ctx, matched) = adapter
            .validate(&mut parts)
            .map_err(|e| ProxyError::validate_credential_internal_err(e.to_string()))?;

        if !matched {
            if self.forbidden.forbid_signature_mismatch() {
                return Err(ProxyError::validate_credential_err(format!(
                    "[{}] proxy ak or sk is wrong",
                    adapter.name()
                )));
            }
            return self.forward(parts).await;
        }

        adapter
            .resign(&ctx, &mut parts)
            .map_err(|e| ProxyError::resign_internal_err(e.to_string()))?;

        self.forward(parts).await
    }

    async fn forward(&self, parts: RequestParts) -> Result<Response> {
        let url = parts.uri.to_string();
        let method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
            .map_err(|e| ProxyError::network_err(format!("invalid method: {e}")))?;

        let mut request = self.client.request(method, &url);
        for (name, value) in parts.headers.iter() {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
                reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
            ) {
                request = request.header(name, value);
            }
        }
        request = request.body(parts.body.to_vec());

        let response = request
            .send()
            .await
            .map_err(|e| ProxyError::network_err(e.to_string()))?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let mut builder = Response::builder().status(status);
        for (name, value) in response.headers().iter() {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_str().as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                builder = builder.header(name, value);
            }
        }
        let stream = response.bytes_stream();
        builder
            .body(Body::from_stream(stream))
            .map_err(|e| ProxyError::network_err(e.to_string()))
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("").to_string()
}

/// End-to-end dispatcher scenarios, exercised in-process against a real
/// local upstream instead of a live vendor sandbox (none is reachable in
/// CI).
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credential, Credentials, Endpoint};
    use crate::reform::KEPT_HEADERS_HEADER;
    use crate::vendor::aws;
    use crate::vendor::util::{aliyun_percent_encode, base64_std, hmac_sha1};
    use axum::routing::any;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn aliyun_endpoint() -> Endpoint {
        Endpoint {
            cloud_account_name: "acc".into(),
            vendor: "aliyun".into(),
            credentials: Credentials {
                proxy: Credential {
                    access_key: "proxy-ak".into(),
                    secret_key: "proxy-sk".into(),
                    ..Default::default()
                },
                real: Credential {
                    access_key: "real-ak".into(),
                    secret_key: "real-sk".into(),
                    ..Default::default()
                },
            },
        }
    }

    fn aws_endpoint() -> Endpoint {
        Endpoint {
            cloud_account_name: "acc".into(),
            vendor: "aws".into(),
            credentials: Credentials {
                proxy: Credential {
                    access_key: "proxy-ak".into(),
                    secret_key: "proxy-sk".into(),
                    ..Default::default()
                },
                real: Credential {
                    access_key: "real-ak".into(),
                    secret_key: "real-sk".into(),
                    ..Default::default()
                },
            },
        }
    }

    fn baidu_endpoint() -> Endpoint {
        Endpoint {
            cloud_account_name: "acc".into(),
            vendor: "baidu".into(),
            credentials: Credentials {
                proxy: Credential {
                    access_key: "proxy-ak".into(),
                    secret_key: "proxy-sk".into(),
                    ..Default::default()
                },
                real: Credential {
                    access_key: "real-ak".into(),
                    secret_key: "real-sk".into(),
                    ..Default::default()
                },
            },
        }
    }

    fn aliyun_sign(query: &BTreeMap<String, String>, secret: &str) -> String {
        let query_string = query
            .iter()
            .map(|(k, v)| format!("{}={}", aliyun_percent_encode(k), aliyun_percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let string_to_sign = format!(
            "GET&{}&{}",
            aliyun_percent_encode("/"),
            aliyun_percent_encode(&query_string)
        );
        base64_std(&hmac_sha1(format!("{secret}&").as_bytes(), string_to_sign.as_bytes()))
    }

    /// A bare-bones upstream standing in for a vendor endpoint: echoes the
    /// query string and the `authorization` header it received back as the
    /// response body, separated by `|`.
    async fn spawn_echo() -> (String, tokio::task::JoinHandle<()>) {
        async fn echo(uri: Uri, headers: HeaderMap) -> String {
            format!(
                "{}|{}",
                uri.query().unwrap_or(""),
                headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or("")
            )
        }
        let app = axum::Router::new().fallback(any(echo));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}"), handle)
    }

    fn envelope(cloud_account_name: &str, origin_uri: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CLOUD_ACCOUNT_NAME_HEADER, cloud_account_name.parse().unwrap());
        headers.insert(ORIGIN_URI_HEADER, origin_uri.parse().unwrap());
        headers
    }

    fn dispatcher(endpoints: Vec<Endpoint>, forbidden: Forbidden) -> Dispatcher {
        let directory = EndpointDirectory::new(endpoints).unwrap();
        Dispatcher::new(Arc::new(directory), forbidden, "test".into())
    }

    /// S1: Aliyun happy path — a validly proxy-signed request is resigned
    /// with the real credentials and forwarded.
    #[tokio::test]
    async fn s1_aliyun_happy_path_resigns_and_forwards() {
        let (base, upstream) = spawn_echo().await;
        let mut query = BTreeMap::new();
        query.insert("Action".to_string(), "Ping".to_string());
        query.insert("AccessKeyId".to_string(), "proxy-ak".to_string());
        let signature = aliyun_sign(&query, "proxy-sk");
        let origin_uri = format!(
            "{base}/?Action=Ping&AccessKeyId=proxy-ak&Signature={}",
            aliyun_percent_encode(&signature)
        );

        let dispatcher = dispatcher(vec![aliyun_endpoint()], Forbidden::default());
        let headers = envelope("acc", &origin_uri);
        let response = dispatcher
            .handle(Method::GET, Uri::from_static("/"), headers, Body::empty())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("AccessKeyId=real-ak"));
        assert!(!body.contains("proxy-ak"));
        upstream.abort();
    }

    /// S2: AWS pass-through — a validly proxy-signed SigV4 request is
    /// resigned with the real credentials and forwarded, exercising the
    /// interaction between `reform`'s header allow-list and AWS's
    /// client-declared `SignedHeaders` end-to-end.
    #[tokio::test]
    async fn s2_aws_pass_through_resigns_and_forwards() {
        let (base, upstream) = spawn_echo().await;
        let origin_uri = format!("{base}/bucket/key");

        let mut sign_parts = RequestParts {
            method: Method::GET,
            uri: Uri::try_from("https://s3.amazonaws.com/bucket/key").unwrap(),
            host: "s3.amazonaws.com".into(),
            headers: HeaderMap::new(),
            body: Default::default(),
        };
        sign_parts.headers.insert("host", "s3.amazonaws.com".parse().unwrap());
        let time = Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap();
        let forged = aws::sign_v4(&sign_parts, "proxy-ak", "proxy-sk", "us-east-1", "s3", time, "host");

        let dispatcher = dispatcher(vec![aws_endpoint()], Forbidden::default());
        let mut headers = envelope("acc", &origin_uri);
        headers.insert(KEPT_HEADERS_HEADER, "host,x-amz-date,authorization".parse().unwrap());
        headers.insert("host", "s3.amazonaws.com".parse().unwrap());
        headers.insert("x-amz-date", "20230615T120000Z".parse().unwrap());
        headers.insert("authorization", forged.parse().unwrap());

        let response = dispatcher
            .handle(Method::GET, Uri::from_static("/"), headers, Body::empty())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        let authorization = body.split('|').nth(1).unwrap();
        assert!(authorization.contains("Credential=real-ak/"));
        assert!(!authorization.contains("proxy-ak"));
        upstream.abort();
    }

    /// S3: unknown account, permissive mode — request is reformed and
    /// forwarded unsigned; the upstream's response passes straight through.
    #[tokio::test]
    async fn s3_unknown_account_permissive_forwards_unsigned() {
        let (base, upstream) = spawn_echo().await;
        let origin_uri = format!("{base}/?Action=Ping");

        let dispatcher = dispatcher(vec![], Forbidden::default());
        let headers = envelope("missing", &origin_uri);
        let response = dispatcher
            .handle(Method::GET, Uri::from_static("/"), headers, Body::empty())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        upstream.abort();
    }

    /// S3b: unknown account, strict mode — rejected before any forwarding.
    #[tokio::test]
    async fn unknown_account_strict_is_rejected() {
        let dispatcher = dispatcher(
            vec![],
            Forbidden {
                forbidden_account_not_found: true,
                forbidden_proxy_credential_err: false,
            },
        );
        let headers = envelope("missing", "http://127.0.0.1:1/");
        let response = dispatcher
            .handle(Method::GET, Uri::from_static("/"), headers, Body::empty())
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("Proxy.CloudAccountNotFound"));
    }

    /// S4: signature mismatch, strict mode — a tampered Baidu signature is
    /// rejected with 401 instead of being forwarded.
    #[tokio::test]
    async fn s4_signature_mismatch_strict_is_rejected() {
        let dispatcher = dispatcher(
            vec![baidu_endpoint()],
            Forbidden {
                forbidden_account_not_found: false,
                forbidden_proxy_credential_err: true,
            },
        );
        let mut headers = envelope("acc", "http://127.0.0.1:1/v2/instance");
        headers.insert(KEPT_HEADERS_HEADER, "host,x-bce-date,authorization".parse().unwrap());
        headers.insert("host", "bcc.bj.baidubce.com".parse().unwrap());
        headers.insert("x-bce-date", "2023-06-15T12:00:00Z".parse().unwrap());
        headers.insert(
            "authorization",
            "bce-auth-v1/proxy-ak/2023-06-15T12:00:00Z/1800/host/deadbeef"
                .parse()
                .unwrap(),
        );
        let response = dispatcher
            .handle(Method::GET, Uri::from_static("/"), headers, Body::empty())
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("Proxy.ValidateCredentialErr"));
    }

    /// S5: malformed envelope — an unparseable origin URI is a 500 before
    /// any forwarding is attempted.
    #[tokio::test]
    async fn s5_malformed_envelope_is_internal_error() {
        let dispatcher = dispatcher(vec![], Forbidden::default());
        let headers = envelope("missing", "http://bad host/path");
        let response = dispatcher
            .handle(Method::GET, Uri::from_static("/"), headers, Body::empty())
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("Proxy.ReformRequestInternalErr"));
    }

    /// S6: upstream network failure — nothing listens on the target port,
    /// so forwarding fails with a 502 carrying the transport error.
    #[tokio::test]
    async fn s6_upstream_network_failure_is_bad_gateway() {
        let dispatcher = dispatcher(vec![], Forbidden::default());
        let headers = envelope("missing", "http://127.0.0.1:1/path");
        let response = dispatcher
            .handle(Method::GET, Uri::from_static("/"), headers, Body::empty())
            .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("Proxy.NetworkErr"));
    }
}
