//! HTTP implementation of [`TransferGateway`] on top of `reqwest`.

use super::{TransferGateway, TransferRequest, TransferResponse};
use crate::config::settings::GatewaySettings;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Calls the provider's transfer endpoint with a JSON body.
#[derive(Debug, Clone)]
pub struct HttpTransferGateway {
    client: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
}

impl HttpTransferGateway {
    /// Builds a gateway from the `[gateway]` settings.
    pub fn new(settings: &GatewaySettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("batch-transfer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, settings))
    }

    /// Builds a gateway around an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, settings: &GatewaySettings) -> Self {
        Self {
            client,
            endpoint: endpoint_url(&settings.base_url, &settings.transfer_path),
            api_token: settings.api_token.clone(),
        }
    }

    /// Full URL transfers are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn endpoint_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[async_trait]
impl TransferGateway for HttpTransferGateway {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferResponse> {
        debug!(
            source = %request.source_account_id,
            contact_type = request.contact_type.as_str(),
            amount = %request.amount,
            "Posting transfer to {}",
            self.endpoint
        );

        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<TransferResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(e) if status.is_success() => {
                warn!("Unreadable transfer response: {}", body);
                Err(e.into())
            }
            Err(_) => Err(Error::Gateway {
                message: format!("Transfer endpoint returned HTTP {status}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::ContactType;
    use crate::gateway::BATCH_TRANSFER_ORIGIN;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Reads one HTTP/1.1 request (head plus `content-length` body) as text.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut chunk = [0_u8; 1024];
        loop {
            let read = socket.read(&mut chunk).await.unwrap();
            if read == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..read]);

            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= head_end + 4 + content_length {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&raw).to_string()
    }

    /// Serves a single canned response and hands back the request it received.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });

        (base_url, handle)
    }

    fn gateway_for(base_url: String, api_token: Option<&str>) -> HttpTransferGateway {
        HttpTransferGateway::new(&GatewaySettings {
            base_url,
            transfer_path: "/api/transfer".to_string(),
            api_token: api_token.map(ToString::to_string),
        })
        .unwrap()
    }

    fn sample_request() -> TransferRequest {
        TransferRequest {
            source_account_id: "12".to_string(),
            contact_type: ContactType::Email,
            target_identifier: "user@x.com".to_string(),
            amount: "10".to_string(),
            origin: BATCH_TRANSFER_ORIGIN.to_string(),
            force: false,
            memo: Some("March payouts".to_string()),
            auto_2fa: false,
        }
    }

    #[test]
    fn test_endpoint_url_joins_single_slash() {
        assert_eq!(
            endpoint_url("https://provider.example/", "/transfer"),
            "https://provider.example/transfer"
        );
        assert_eq!(
            endpoint_url("https://provider.example", "transfer"),
            "https://provider.example/transfer"
        );
    }

    #[test]
    fn test_gateway_uses_settings() -> Result<()> {
        let settings = GatewaySettings {
            base_url: "http://localhost:9000".to_string(),
            transfer_path: "/api/transfer".to_string(),
            api_token: Some("token".to_string()),
        };
        let gateway = HttpTransferGateway::new(&settings)?;
        assert_eq!(gateway.endpoint(), "http://localhost:9000/api/transfer");
        Ok(())
    }

    #[tokio::test]
    async fn test_success_posts_json_with_bearer_token() -> Result<()> {
        let (base_url, server) =
            serve_once("200 OK", r#"{"success":true,"data":{"transferId":77}}"#).await;
        let gateway = gateway_for(base_url, Some("secret"));

        let response = gateway.transfer(&sample_request()).await?;
        assert!(response.success);
        assert_eq!(response.transfer_id(), Some(77));

        let received = server.await.unwrap();
        let lowered = received.to_ascii_lowercase();
        assert!(received.starts_with("POST /api/transfer HTTP/1.1"));
        assert!(lowered.contains("authorization: bearer secret"));
        assert!(lowered.contains("content-type: application/json"));
        assert!(received.contains(r#""targetIdentifier":"user@x.com""#));
        assert!(received.contains(r#""source":"batch""#));
        assert!(received.contains(r#""remarks":"March payouts""#));
        Ok(())
    }

    #[tokio::test]
    async fn test_no_token_sends_no_authorization() -> Result<()> {
        let (base_url, server) = serve_once("200 OK", r#"{"success":true}"#).await;
        let gateway = gateway_for(base_url, None);

        gateway.transfer(&sample_request()).await?;
        let received = server.await.unwrap();
        assert!(!received.to_ascii_lowercase().contains("authorization:"));
        Ok(())
    }

    #[tokio::test]
    async fn test_error_status_with_envelope_is_refusal() -> Result<()> {
        let (base_url, server) = serve_once(
            "400 Bad Request",
            r#"{"success":false,"message":"Insufficient balance"}"#,
        )
        .await;
        let gateway = gateway_for(base_url, None);

        let response = gateway.transfer(&sample_request()).await?;
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("Insufficient balance"));
        server.await.unwrap();
        Ok(())
    }

    #[tokio::test]
    async fn test_error_status_without_envelope_is_gateway_error() {
        let (base_url, server) = serve_once("502 Bad Gateway", "<html>upstream down</html>").await;
        let gateway = gateway_for(base_url, None);

        let result = gateway.transfer(&sample_request()).await;
        match result {
            Err(Error::Gateway { message }) => assert!(message.contains("502")),
            other => panic!("expected gateway error, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_success_status_with_unreadable_body_is_serialization_error() {
        let (base_url, server) = serve_once("200 OK", "not json").await;
        let gateway = gateway_for(base_url, None);

        let result = gateway.transfer(&sample_request()).await;
        assert!(matches!(result, Err(Error::Serialization(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let result = gateway_for(base_url, None).transfer(&sample_request()).await;
        assert!(matches!(result, Err(Error::Http(_))));
    }
}
