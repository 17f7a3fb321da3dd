use aws_sdk_ses::Client;
use aws_sdk_ses::config::{BehaviorVersion, Credentials, Region as AwsRegion};
use aws_sdk_ses::error::DisplayErrorContext;
use aws_sdk_ses::primitives::DateTime;
use aws_sdk_ses::types::{Body, Content, Destination as SesDestination, Message};
use serde_json::{Value, json};
use signal_core::resolve_env_str;

use super::{
    AwsCreds, Destination, MailConnection, MailConnector, MailServiceError, Region,
    SendEmailRequest,
};

const CHARSET: &str = "UTF-8";
const CREDENTIALS_PROVIDER: &str = "signal-blocks-static";

/// Built-in SES connector backed by the AWS SDK.
///
/// Credentials are the static key/secret from the block config; the region picks the endpoint.
/// `[[NAME]]` placeholders left in the credentials (the defaults) are read from the environment here.
/// The SDK is async, so each connection owns a current-thread tokio runtime and blocks on it.
/// Do not call from inside another tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct SesConnector;

struct SesConnection {
    client: Client,
    runtime: tokio::runtime::Runtime,
}

impl MailConnector for SesConnector {
    fn connect(
        &self,
        region: Region,
        creds: &AwsCreds,
    ) -> Result<Box<dyn MailConnection>, MailServiceError> {
        let connect_err = |message: String| MailServiceError::Connect {
            region: region.endpoint_name().to_string(),
            message,
        };
        let access_key = resolve_env_str(&creds.access_key).map_err(|e| connect_err(e.to_string()))?;
        let access_secret =
            resolve_env_str(&creds.access_secret).map_err(|e| connect_err(e.to_string()))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| connect_err(e.to_string()))?;
        let credentials = Credentials::new(
            access_key,
            access_secret,
            None,
            None,
            CREDENTIALS_PROVIDER,
        );
        let config = aws_sdk_ses::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(AwsRegion::new(region.endpoint_name()))
            .credentials_provider(credentials)
            .build();
        Ok(Box::new(SesConnection {
            client: Client::from_conf(config),
            runtime,
        }))
    }
}

fn utf8_content(data: &str) -> Result<Content, MailServiceError> {
    Content::builder()
        .data(data)
        .charset(CHARSET)
        .build()
        .map_err(|e| MailServiceError::Send(e.to_string()))
}

fn ses_destination(destination: &Destination) -> SesDestination {
    let builder = SesDestination::builder().set_to_addresses(Some(destination.to_addresses().to_vec()));
    match (destination.cc_addresses(), destination.bcc_addresses()) {
        (None, None) => builder.build(),
        (cc, bcc) => builder
            .set_cc_addresses(Some(cc.unwrap_or_default().to_vec()))
            .set_bcc_addresses(Some(bcc.unwrap_or_default().to_vec()))
            .build(),
    }
}

fn rfc3339(ts: &DateTime) -> Option<String> {
    chrono::DateTime::from_timestamp(ts.secs(), ts.subsec_nanos()).map(|dt| dt.to_rfc3339())
}

impl MailConnection for SesConnection {
    fn send_email(&self, request: &SendEmailRequest) -> Result<(), MailServiceError> {
        let body = Body::builder()
            .text(utf8_content(&request.body)?)
            .html(utf8_content(&request.html_body)?)
            .build();
        let message = Message::builder()
            .subject(utf8_content(&request.subject)?)
            .body(body)
            .build();
        let send = self
            .client
            .send_email()
            .source(&request.source)
            .destination(ses_destination(&request.destination))
            .message(message)
            .send();
        self.runtime
            .block_on(send)
            .map(|_| ())
            .map_err(|e| MailServiceError::Send(DisplayErrorContext(&e).to_string()))
    }

    fn get_send_quota(&self) -> Result<Value, MailServiceError> {
        let out = self
            .runtime
            .block_on(self.client.get_send_quota().send())
            .map_err(|e| MailServiceError::Query {
                operation: "get_send_quota",
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(json!({
            "GetSendQuotaResponse": {
                "GetSendQuotaResult": {
                    "Max24HourSend": out.max24_hour_send(),
                    "MaxSendRate": out.max_send_rate(),
                    "SentLast24Hours": out.sent_last24_hours(),
                }
            }
        }))
    }

    fn get_send_statistics(&self) -> Result<Value, MailServiceError> {
        let out = self
            .runtime
            .block_on(self.client.get_send_statistics().send())
            .map_err(|e| MailServiceError::Query {
                operation: "get_send_statistics",
                message: DisplayErrorContext(&e).to_string(),
            })?;
        let points: Vec<Value> = out
            .send_data_points()
            .iter()
            .map(|p| {
                json!({
                    "Timestamp": p.timestamp().and_then(rfc3339),
                    "DeliveryAttempts": p.delivery_attempts(),
                    "Bounces": p.bounces(),
                    "Complaints": p.complaints(),
                    "Rejects": p.rejects(),
                })
            })
            .collect();
        Ok(json!({
            "GetSendStatisticsResponse": {
                "GetSendStatisticsResult": {
                    "SendDataPoints": points,
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_destination_carries_only_to() {
        let dest = ses_destination(&Destination::To(vec!["a@x.com".into()]));
        assert_eq!(dest.to_addresses(), &["a@x.com".to_string()]);
        assert!(dest.cc_addresses.is_none());
        assert!(dest.bcc_addresses.is_none());
    }

    #[test]
    fn categorized_destination_carries_all_lists() {
        let dest = ses_destination(&Destination::Categorized {
            to: vec![],
            cc: vec!["c@x.com".into()],
            bcc: vec!["b@x.com".into()],
        });
        assert!(dest.to_addresses().is_empty());
        assert_eq!(dest.cc_addresses(), &["c@x.com".to_string()]);
        assert_eq!(dest.bcc_addresses(), &["b@x.com".to_string()]);
    }

    #[test]
    fn content_is_utf8_tagged() {
        let content = utf8_content("Grüße").unwrap();
        assert_eq!(content.data(), "Grüße");
        assert_eq!(content.charset(), Some(CHARSET));
    }

    #[test]
    fn timestamps_render_as_rfc3339() {
        let ts = DateTime::from_secs(0);
        assert_eq!(rfc3339(&ts).as_deref(), Some("1970-01-01T00:00:00+00:00"));
    }

    #[test]
    fn connect_builds_client_without_network() {
        let conn = SesConnector.connect(Region::EuWest1, &AwsCreds::new("KEY", "SECRET"));
        assert!(conn.is_ok());
    }

    #[test]
    fn unresolved_credential_placeholder_fails_connect() {
        let creds = AwsCreds::new("[[SIGNAL_BLOCKS_TEST_UNSET_KEY_ID]]", "SECRET");
        let err = SesConnector.connect(Region::UsWest2, &creds).err().unwrap();
        assert!(matches!(err, MailServiceError::Connect { .. }));
        assert!(err.to_string().contains("SIGNAL_BLOCKS_TEST_UNSET_KEY_ID"));
    }
}
