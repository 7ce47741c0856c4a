use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use url::Url;

/// Placeholders recognized by [`format_context`].
pub const AD_TITLE: &str = "ad_title";
pub const AD_DESCRIPTION: &str = "ad_description";
pub const PLACEMENT_TEMPLATE: &str = "placement_template";
pub const LINK: &str = "link";

/// A product recommendation returned by the matching service.
///
/// Older API versions name the fields `ad_title`, `ad_description`,
/// `placement` and `url`; both spellings are accepted.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct RecommendedAd {
    #[serde(alias = "ad_title")]
    pub title: String,
    #[serde(alias = "ad_description")]
    pub description: String,
    #[serde(alias = "placement")]
    pub placement_template: String,
    #[serde(default, alias = "url", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl RecommendedAd {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        placement_template: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            placement_template: placement_template.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Checks the field contents serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("ad title is empty".to_string());
        }
        if let Some(link) = &self.link {
            let parsed = Url::parse(link).map_err(|e| format!("invalid ad link '{}': {}", link, e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(format!("ad link '{}' is not http(s)", link));
            }
        }
        Ok(())
    }
}

/// Body of a successful matching response.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AdResponse {
    pub ads: Vec<RecommendedAd>,
}

impl AdResponse {
    /// Decode and validate a raw response body.
    pub fn parse(body: serde_json::Value) -> Result<Self, String> {
        let response: AdResponse =
            serde_json::from_value(body).map_err(|e| format!("unexpected response shape: {}", e))?;
        for ad in &response.ads {
            ad.validate()?;
        }
        Ok(response)
    }
}

/// Single slot holding the latest recommendation until the caller takes it.
#[derive(Debug, Default)]
pub struct AdCache {
    latest: Option<RecommendedAd>,
}

impl AdCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, ad: RecommendedAd) {
        self.latest = Some(ad);
    }

    /// Return the cached ad and empty the slot, so each ad is delivered once.
    pub fn take(&mut self) -> Option<RecommendedAd> {
        self.latest.take()
    }

    pub fn peek(&self) -> Option<&RecommendedAd> {
        self.latest.as_ref()
    }

    pub fn clear(&mut self) {
        self.latest = None;
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_none()
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([A-Za-z_]+)\}").expect("placeholder pattern is valid"))
}

/// Substitute the ad's fields into `template`.
///
/// Recognized placeholders are `{ad_title}`, `{ad_description}`,
/// `{placement_template}` and `{link}`; anything else is left as written.
/// Substitution is a single pass, so braces inside ad text are never
/// expanded again.
pub fn format_context(ad: &RecommendedAd, template: &str) -> String {
    placeholder_pattern()
        .replace_all(template, |caps: &Captures| match &caps[1] {
            AD_TITLE => ad.title.clone(),
            AD_DESCRIPTION => ad.description.clone(),
            PLACEMENT_TEMPLATE => ad.placement_template.clone(),
            LINK => ad.link.clone().unwrap_or_default(),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn laptop() -> RecommendedAd {
        RecommendedAd::new("Laptop", "Fast", "Try the {ad_title}")
    }

    #[test]
    fn formats_known_placeholders() {
        let out = format_context(&laptop(), "Product: {ad_title} - {ad_description}");
        assert_eq!(out, "Product: Laptop - Fast");
    }

    #[test]
    fn leaves_unknown_placeholders_verbatim() {
        let out = format_context(&laptop(), "{ad_title} costs {price} {not closed");
        assert_eq!(out, "Laptop costs {price} {not closed");
    }

    #[test]
    fn does_not_expand_placeholders_inside_ad_fields() {
        let out = format_context(&laptop(), "{placement_template}!");
        assert_eq!(out, "Try the {ad_title}!");
    }

    #[test]
    fn missing_link_formats_as_empty() {
        let ad = laptop();
        assert_eq!(format_context(&ad, "[{link}]"), "[]");
        let ad = ad.with_link("https://shop.example.com/laptop");
        assert_eq!(format_context(&ad, "[{link}]"), "[https://shop.example.com/laptop]");
    }

    #[test]
    fn cache_delivers_once() {
        let mut cache = AdCache::new();
        cache.store(laptop());
        assert_eq!(cache.peek(), Some(&laptop()));
        assert_eq!(cache.take(), Some(laptop()));
        assert_eq!(cache.take(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn parses_current_and_legacy_field_names() {
        let current = AdResponse::parse(json!({
            "ads": [{
                "title": "Laptop",
                "description": "Fast",
                "placement_template": "Consider {ad_title}",
                "link": "https://shop.example.com/laptop"
            }]
        }))
        .unwrap();
        assert_eq!(current.ads[0].title, "Laptop");

        let legacy = AdResponse::parse(json!({
            "ads": [{
                "ad_title": "Phone",
                "ad_description": "Small",
                "placement": "inline",
                "url": "http://shop.example.com/phone"
            }]
        }))
        .unwrap();
        assert_eq!(legacy.ads[0].title, "Phone");
        assert_eq!(legacy.ads[0].link.as_deref(), Some("http://shop.example.com/phone"));
    }

    #[test]
    fn empty_list_is_valid() {
        let response = AdResponse::parse(json!({"ads": []})).unwrap();
        assert!(response.ads.is_empty());
    }

    #[test]
    fn rejects_malformed_responses() {
        assert!(AdResponse::parse(json!({"recommendations": []})).is_err());
        assert!(AdResponse::parse(json!({"ads": [{"title": "Laptop"}]})).is_err());
        assert!(AdResponse::parse(json!({
            "ads": [{"title": " ", "description": "d", "placement_template": "p"}]
        }))
        .is_err());
        assert!(AdResponse::parse(json!({
            "ads": [{"title": "t", "description": "d", "placement_template": "p", "link": "ftp://x"}]
        }))
        .is_err());
    }
}
