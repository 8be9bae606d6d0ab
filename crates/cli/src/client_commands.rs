//! Thin HTTP client for a running gateway.

use {
    anyhow::{Context, Result, bail},
    serde_json::{Value, json},
};

/// `http://bind:port` from the loaded config unless `url` is given.
fn base_url(url: Option<String>) -> String {
    match url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => {
            let config = zahra_config::discover_and_load();
            format!("http://{}:{}", config.gateway.bind, config.gateway.port)
        },
    }
}

fn error_message(body: &Value) -> &str {
    body.get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
}

pub async fn status(url: Option<String>) -> Result<()> {
    let base = base_url(url);
    let body: Value = reqwest::get(format!("{base}/status"))
        .await
        .with_context(|| format!("gateway not reachable at {base}"))?
        .json()
        .await?;

    let status = body.get("status").and_then(Value::as_str).unwrap_or("unknown");
    let state = body.get("state").and_then(Value::as_str).unwrap_or("unknown");
    println!("status: {status} ({state})");
    if let Some(err) = body.get("last_error").and_then(Value::as_str) {
        println!("last error: {err}");
    }
    Ok(())
}

pub async fn send(url: Option<String>, token: Option<String>, to: &str, message: &str) -> Result<()> {
    let base = base_url(url);
    let mut req = reqwest::Client::new()
        .post(format!("{base}/send"))
        .json(&json!({ "number": to, "message": message }));
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        req = req.bearer_auth(token);
    }

    let resp = req
        .send()
        .await
        .with_context(|| format!("gateway not reachable at {base}"))?;
    let code = resp.status();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    if !code.is_success() {
        bail!("send failed ({code}): {}", error_message(&body));
    }
    println!("sent to {to}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_url_wins() {
        assert_eq!(
            base_url(Some("http://10.0.0.2:3000/".into())),
            "http://10.0.0.2:3000"
        );
    }

    #[test]
    fn error_message_falls_back() {
        assert_eq!(error_message(&json!({ "error": "not connected" })), "not connected");
        assert_eq!(error_message(&Value::Null), "unknown error");
    }
}
