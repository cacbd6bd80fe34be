use std::time::Duration;

use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};

use crate::config::AwsSettings;

/// Build an `SdkConfig` from backend settings.
///
/// Credentials always come from the SDK's default provider chain; only the
/// profile it reads from can be chosen here.
pub async fn build_sdk_config(settings: &AwsSettings) -> aws_config::SdkConfig {
    let mut builder = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &settings.region {
        builder = builder.region(Region::new(region.clone()));
    }
    if let Some(profile) = &settings.profile {
        builder = builder.profile_name(profile);
    }
    if let Some(endpoint) = &settings.endpoint {
        builder = builder.endpoint_url(endpoint);
    }
    if let Some(timeout_ms) = settings.timeout_ms {
        builder = builder.timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(Duration::from_millis(timeout_ms))
                .build(),
        );
    }

    let config = builder.load().await;
    tracing::debug!(
        region = ?config.region(),
        endpoint = ?settings.endpoint,
        "loaded AWS SDK config"
    );
    config
}
