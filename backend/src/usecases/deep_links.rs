use chrono::{DateTime, SecondsFormat, Utc};
use url::form_urlencoded;
use uuid::Uuid;

pub struct SuccessDeepLink<'a> {
    pub scheme: &'a str,
    pub subscription_id: Uuid,
    pub amount: i64,
    pub transaction_id: &'a str,
    pub timestamp: DateTime<Utc>,
    pub episode_id: Option<&'a str>,
}

impl SuccessDeepLink<'_> {
    /// `{scheme}://payment/success?success=true&subscription_id=..&amount=..&transaction_id=..&timestamp=..[&episode_id=..]`
    pub fn to_url(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("success", "true")
            .append_pair("subscription_id", &self.subscription_id.to_string())
            .append_pair("amount", &self.amount.to_string())
            .append_pair("transaction_id", self.transaction_id)
            .append_pair(
                "timestamp",
                &self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        if let Some(episode_id) = self.episode_id {
            query.append_pair("episode_id", episode_id);
        }

        format!("{}://payment/success?{}", self.scheme, query.finish())
    }
}

/// Appends percent-encoded query pairs to an absolute URL or a bare path.
pub fn with_query(base: &str, pairs: &[(&str, &str)]) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        query.append_pair(key, value);
    }
    let query = query.finish();

    if query.is_empty() {
        return base.to_string();
    }

    let separator = match base.split_once('?') {
        Some((_, existing)) if existing.is_empty() || existing.ends_with('&') => "",
        Some(_) => "&",
        None => "?",
    };
    format!("{base}{separator}{query}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn deep_link_has_expected_shape() {
        let subscription_id = Uuid::parse_str("7f1c2b5e-3a44-4f0e-9a51-2f5d1f6e9b10").unwrap();
        let link = SuccessDeepLink {
            scheme: "audiostory",
            subscription_id,
            amount: 0,
            transaction_id: "FREE-abc",
            timestamp: Utc.with_ymd_and_hms(2024, 3, 20, 8, 30, 0).unwrap(),
            episode_id: Some("ep 12"),
        };

        assert_eq!(
            link.to_url(),
            "audiostory://payment/success?success=true\
             &subscription_id=7f1c2b5e-3a44-4f0e-9a51-2f5d1f6e9b10\
             &amount=0&transaction_id=FREE-abc\
             &timestamp=2024-03-20T08%3A30%3A00Z&episode_id=ep+12"
        );
    }

    #[test]
    fn episode_is_omitted_when_absent() {
        let link = SuccessDeepLink {
            scheme: "audiostory",
            subscription_id: Uuid::new_v4(),
            amount: 900_000,
            transaction_id: "TXN-1",
            timestamp: Utc::now(),
            episode_id: None,
        };

        let url = link.to_url();
        assert!(url.starts_with("audiostory://payment/success?success=true&"));
        assert!(url.contains("&amount=900000&"));
        assert!(!url.contains("episode_id"));
    }

    #[test]
    fn query_is_appended_with_the_right_separator() {
        assert_eq!(
            with_query("/payment/failure", &[("message", "card declined")]),
            "/payment/failure?message=card+declined"
        );
        assert_eq!(
            with_query("https://shop.example/done?lang=fa", &[("payment_id", "42")]),
            "https://shop.example/done?lang=fa&payment_id=42"
        );
    }
}
