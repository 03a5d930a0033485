use std::time::{Duration, SystemTime};

pub const PROXY_STATUS_HEADER: &str = "X-Mcdn-Proxy-Status";
pub const PROXY_STATUS_FAILED: &str = "Failed";
pub const PROXY_VERSION_HEADER: &str = "X-Mcdn-Proxy-Version";

/// Envelope fields common to both the request and response hooks,
/// mirroring `common.BaseInfo` in the original implementation.
#[derive(Debug, Clone, Default)]
pub struct BaseInfo {
    pub cloud_account_id: String,
    pub cloud_account_name: String,
    pub sub_product: String,
    pub top_account_id: String,
    pub vendor_name: String,
    pub request_id: String,
    pub target_url: String,
    pub proxy_version: String,
}

#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub base: BaseInfo,
    pub request_time: SystemTime,
}

#[derive(Debug, Clone)]
pub struct ResponseInfo {
    pub base: BaseInfo,
    pub response_time: SystemTime,
    pub cost: Duration,
    pub http_status: u16,
    pub proxy_exception: bool,
    pub proxy_exception_text_code: String,
}

/// Default `on_request` hook: logs the inbound request, mirroring
/// `StandardOnRequest`.
pub fn standard_on_request(info: &RequestInfo) {
    tracing::info!(
        vendor = %info.base.vendor_name,
        cloud_account_id = %info.base.cloud_account_id,
        cloud_account_name = %info.base.cloud_account_name,
        sub_product = %info.base.sub_product,
        top_account_id = %info.base.top_account_id,
        target_url = %info.base.target_url,
        proxy_version = %info.base.proxy_version,
        request_time = ?info.request_time,
        "inbound request"
    );
}

/// Default `on_response` hook: logs cost and status, mirroring
/// `StandardOnResponse`.
pub fn standard_on_response(info: &ResponseInfo) {
    tracing::info!(
        cloud_account_name = %info.base.cloud_account_name,
        vendor = %info.base.vendor_name,
        response_time = ?info.response_time,
        cost_ms = info.cost.as_millis() as u64,
        status = info.http_status,
        proxy_exception = info.proxy_exception,
        proxy_exception_text_code = %info.proxy_exception_text_code,
        "outbound response"
    );
}
