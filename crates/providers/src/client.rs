use reqwest::{Client, Proxy};
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of proxy resolution for one endpoint.
#[derive(Debug, PartialEq)]
enum ProxyChoice {
    Use(String),
    Direct,
    /// Nothing configured; reqwest reads HTTPS_PROXY / HTTP_PROXY itself.
    Inherit,
}

/// Matches a host against `no_proxy` rules: exact host, `*.suffix`
/// (subdomains only) and `.suffix` (the domain and its subdomains).
fn host_bypasses_proxy(host: &str, rules: &[String]) -> bool {
    let host = host.to_lowercase();
    rules.iter().any(|rule| {
        let rule = rule.trim().to_lowercase();
        if rule.is_empty() {
            false
        } else if let Some(suffix) = rule.strip_prefix("*.") {
            host.ends_with(&format!(".{}", suffix))
        } else if let Some(suffix) = rule.strip_prefix('.') {
            host == suffix || host.ends_with(&format!(".{}", suffix))
        } else {
            host == rule
        }
    })
}

fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let authority = rest.split('/').next()?.rsplit('@').next()?;
    if let Some(v6) = authority.strip_prefix('[') {
        return v6.split(']').next().map(str::to_string);
    }
    authority.split(':').next().map(str::to_string)
}

fn choose_proxy(
    endpoint_proxy: Option<&str>,
    global_proxy: Option<&str>,
    no_proxy: &[String],
    api_base: &str,
) -> ProxyChoice {
    match endpoint_proxy {
        Some("") => return ProxyChoice::Direct,
        Some(p) => return ProxyChoice::Use(p.to_string()),
        None => {}
    }

    match global_proxy {
        Some(global) if !global.is_empty() => {
            let bypass = host_of(api_base)
                .map(|h| host_bypasses_proxy(&h, no_proxy))
                .unwrap_or(false);
            if bypass {
                ProxyChoice::Direct
            } else {
                ProxyChoice::Use(global.to_string())
            }
        }
        _ => ProxyChoice::Inherit,
    }
}

/// Build the reqwest client used for completion calls against `api_base`.
///
/// `endpoint_proxy` is `providers.<name>.proxy` (`Some("")` forces a direct
/// connection), `global_proxy` and `no_proxy` come from the `network` section.
pub fn build_http_client(
    endpoint_proxy: Option<&str>,
    global_proxy: Option<&str>,
    no_proxy: &[String],
    api_base: &str,
    timeout: Duration,
) -> Client {
    let mut builder = Client::builder().timeout(timeout);

    match choose_proxy(endpoint_proxy, global_proxy, no_proxy, api_base) {
        ProxyChoice::Use(proxy_url) => match Proxy::all(&proxy_url) {
            Ok(p) => {
                info!(proxy = %proxy_url, api_base = %api_base, "Completion client using proxy");
                builder = builder.proxy(p);
            }
            Err(e) => {
                warn!(error = %e, proxy = %proxy_url, "Invalid proxy URL, connecting directly");
            }
        },
        ProxyChoice::Direct => {
            info!(api_base = %api_base, "Completion client forced to direct connect");
            builder = builder.no_proxy();
        }
        ProxyChoice::Inherit => {}
    }

    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to build HTTP client, using default");
        Client::new()
    })
}
