//! Failure-to-message mapping.

use llamadesk_core::download::{DownloadError, DownloadStatus};
use llamadesk_core::ports::{LocalizerPort, MessageKey};
use llamadesk_core::utils::format_bytes;

/// Message key and optional argument for a failure.
pub fn message_for(error: &DownloadError) -> (MessageKey, Option<String>) {
    match error {
        DownloadError::NoConnection => (MessageKey::NoInternetConnection, None),
        DownloadError::ConnectionLost { .. } => (MessageKey::LostInternetConnection, None),
        DownloadError::LocalBackendUnreachable { .. } => (MessageKey::OllamaLocalUnreachable, None),
        DownloadError::RemoteBackendUnreachable { .. } => {
            (MessageKey::OllamaRemoteUnreachable, None)
        }
        DownloadError::Api { status_code, .. } => {
            (MessageKey::DownloadFailed, Some(status_code.to_string()))
        }
        DownloadError::InsufficientDiskSpace { required_bytes } => (
            MessageKey::DiskSpaceInsufficient,
            Some(format_bytes(*required_bytes)),
        ),
        DownloadError::DiskFull => (MessageKey::DiskFullDuringDownload, None),
        DownloadError::EndedWithoutConfirmation => (MessageKey::DownloadUnconfirmed, None),
        DownloadError::Cancelled | DownloadError::Other { .. } => {
            (MessageKey::DownloadFailed, Some(error.to_string()))
        }
    }
}

/// Build the terminal status for `error`.
///
/// A template that cannot take the argument still yields a message: the
/// raw template followed by the argument in parentheses.
pub fn failure_status(localizer: &dyn LocalizerPort, error: &DownloadError) -> DownloadStatus {
    let (key, arg) = message_for(error);
    let template = localizer.get_string(key);

    let message = match arg {
        None => template,
        Some(arg) => match localizer.format(&template, std::slice::from_ref(&arg)) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(
                    target: "llamadesk.download",
                    key = %key,
                    error = %e,
                    "Message template rejected its argument"
                );
                format!("{template} ({arg})")
            }
        },
    };

    if matches!(error, DownloadError::EndedWithoutConfirmation) {
        DownloadStatus::unconfirmed(message)
    } else {
        DownloadStatus::failed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llamadesk_core::download::DownloadState;
    use llamadesk_core::ports::{EnglishCatalog, LocalizeError, format_template};
    use mockall::mock;

    mock! {
        Localizer {}
        impl LocalizerPort for Localizer {
            fn get_string(&self, key: MessageKey) -> String;
            fn format(&self, template: &str, args: &[String]) -> Result<String, LocalizeError>;
        }
    }

    #[test]
    fn test_mapping_table() {
        let cases = [
            (DownloadError::NoConnection, MessageKey::NoInternetConnection, None),
            (
                DownloadError::connection_lost("reset by peer"),
                MessageKey::LostInternetConnection,
                None,
            ),
            (
                DownloadError::backend_unreachable("http://localhost:11434", false),
                MessageKey::OllamaLocalUnreachable,
                None,
            ),
            (
                DownloadError::backend_unreachable("http://gpu-box:11434", true),
                MessageKey::OllamaRemoteUnreachable,
                None,
            ),
            (
                DownloadError::api(503, "Service Unavailable"),
                MessageKey::DownloadFailed,
                Some("503".to_string()),
            ),
            (
                DownloadError::insufficient_disk_space(4_700_000_000),
                MessageKey::DiskSpaceInsufficient,
                Some("4.7 GB".to_string()),
            ),
            (DownloadError::DiskFull, MessageKey::DiskFullDuringDownload, None),
            (
                DownloadError::other("manifest unknown"),
                MessageKey::DownloadFailed,
                Some("manifest unknown".to_string()),
            ),
        ];

        for (error, key, arg) in cases {
            assert_eq!(message_for(&error), (key, arg), "{error:?}");
        }
    }

    #[test]
    fn test_api_error_message_embeds_status_code() {
        let status = failure_status(&EnglishCatalog, &DownloadError::api(503, "unavailable"));
        assert_eq!(status.state, DownloadState::Failed);
        assert_eq!(status.message.as_deref(), Some("Download failed: 503"));
    }

    #[test]
    fn test_disk_space_message_is_human_readable() {
        let status = failure_status(
            &EnglishCatalog,
            &DownloadError::insufficient_disk_space(4_000_000_000),
        );
        let message = status.message.unwrap();
        assert!(message.contains("4.0 GB"), "{message}");
        assert!(!message.contains("4000000000"), "{message}");
    }

    #[test]
    fn test_unconfirmed_has_its_own_state() {
        let status = failure_status(&EnglishCatalog, &DownloadError::EndedWithoutConfirmation);
        assert_eq!(status.state, DownloadState::Unconfirmed);
        assert!(status.message.is_some());
    }

    #[test]
    fn test_format_failure_falls_back_to_parenthesized_argument() {
        let mut localizer = MockLocalizer::new();
        localizer
            .expect_get_string()
            .returning(|_| "Download failed with {1}".to_string());
        localizer
            .expect_format()
            .times(1)
            .returning(|template, args| format_template(template, args));

        let status = failure_status(&localizer, &DownloadError::api(502, "bad gateway"));

        assert_eq!(status.state, DownloadState::Failed);
        assert_eq!(
            status.message.as_deref(),
            Some("Download failed with {1} (502)")
        );
    }

    #[test]
    fn test_keys_without_argument_skip_formatting() {
        let mut localizer = MockLocalizer::new();
        localizer
            .expect_get_string()
            .withf(|key| *key == MessageKey::NoInternetConnection)
            .returning(|_| "offline {0}".to_string());
        localizer.expect_format().never();

        let status = failure_status(&localizer, &DownloadError::NoConnection);
        assert_eq!(status.message.as_deref(), Some("offline {0}"));
    }
}
